//! Command-line arguments for pipeline entry points

use clap::Parser;

/// Runner flags shared by every Gantry pipeline binary.
#[derive(Debug, Clone, Default, Parser)]
#[command(about = "Run a Gantry action pipeline", disable_version_flag = true)]
pub struct RunnerArgs {
    /// Only run actions whose name matches at least one of these
    /// comma-separated substrings (dependencies are pulled in automatically)
    #[arg(short = 'o', long, value_delimiter = ',', value_name = "SUBSTRS")]
    pub only: Vec<String>,

    /// Show a list of all action names and exit
    #[arg(long, alias = "list-actions")]
    pub list: bool,

    /// Show the action dependency graph and exit
    #[arg(long)]
    pub graph: bool,

    /// Comma-separated tags to attach to every run launched
    #[arg(long, value_delimiter = ',', value_name = "TAGS")]
    pub tags: Vec<String>,

    /// Development mode: keep everything local, skip the tracking backend
    #[arg(long)]
    pub dev: bool,

    /// Verbose internal logging
    #[arg(long)]
    pub debug: bool,

    /// Pin an input artifact to a specific version (e.g. "corpus:v3");
    /// may be given multiple times
    #[arg(long = "artifact-override", value_name = "NAMEVER")]
    pub artifact_overrides: Vec<String>,

    /// Extra environment variable (KEY=VALUE) to pass through to actions;
    /// may be given multiple times
    #[arg(long = "extra-env-var", value_name = "VAR")]
    pub extra_env_vars: Vec<String>,

    /// Maximum number of actions running at once
    #[arg(long, value_name = "N")]
    pub concurrency: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_splits_on_commas() {
        let args = RunnerArgs::parse_from(["pipeline", "--only", "train,eval"]);
        assert_eq!(args.only, vec!["train", "eval"]);
    }

    #[test]
    fn test_defaults() {
        let args = RunnerArgs::parse_from(["pipeline"]);
        assert!(args.only.is_empty());
        assert!(!args.dev);
        assert!(!args.list);
        assert!(args.concurrency.is_none());
    }

    #[test]
    fn test_repeated_overrides() {
        let args = RunnerArgs::parse_from([
            "pipeline",
            "--artifact-override",
            "corpus:v3",
            "--artifact-override",
            "model:v1",
        ]);
        assert_eq!(args.artifact_overrides, vec!["corpus:v3", "model:v1"]);
    }

    #[test]
    fn test_list_alias() {
        let args = RunnerArgs::parse_from(["pipeline", "--list-actions"]);
        assert!(args.list);
    }
}
