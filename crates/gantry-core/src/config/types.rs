//! Configuration types

use std::collections::BTreeSet;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::artifact::ArtifactName;
use crate::provenance::Provenance;

/// Configuration file name searched for in the project tree.
pub const CONFIG_FILE_NAME: &str = "gantry.toml";

/// Main configuration for a Gantry project, as read from `gantry.toml`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Project identity
    pub project: ProjectConfig,

    /// Blob store configuration
    pub store: StoreConfig,

    /// Tracking backend configuration
    pub tracking: TrackingConfig,

    /// Scheduler configuration
    pub runner: RunnerConfig,
}

/// Project identity configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Project name; the namespace all artifacts live under
    pub name: String,

    /// Bucket that holds this project's artifacts
    pub bucket: String,
}

/// Blob store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Root directory for the filesystem-backed store
    pub root: PathBuf,

    /// Local content cache directory
    pub cache_dir: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            root: gantry_home().join("store"),
            cache_dir: gantry_home().join("cache"),
        }
    }
}

/// Tracking backend configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Root directory for run records and the artifact catalog
    pub root: PathBuf,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            root: gantry_home().join("runs"),
        }
    }
}

/// Scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Maximum number of actions running at once
    pub concurrency: usize,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            concurrency: default_concurrency(),
        }
    }
}

fn default_concurrency() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

fn gantry_home() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".gantry")
}

/// Fully resolved, immutable runtime configuration.
///
/// Assembled once at process entry from `Config` plus command-line state and
/// threaded down through the runner and trackers. Core logic never reads
/// environment variables or config files on its own.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// Project name
    pub project_name: String,
    /// Artifact bucket
    pub bucket: String,
    /// Filesystem store root
    pub store_root: PathBuf,
    /// Local content cache directory
    pub cache_dir: PathBuf,
    /// Tracking backend root
    pub tracking_root: PathBuf,
    /// Maximum concurrent actions
    pub concurrency: usize,
    /// Development mode: local cache only, no backend writes
    pub dev_mode: bool,
    /// Extra verbosity for debugging pipeline internals
    pub debug: bool,
    /// Tags applied to every run launched by this process
    pub tags: BTreeSet<String>,
    /// Pinned artifact versions, applied during input resolution
    pub artifact_overrides: Vec<ArtifactName>,
    /// Code provenance captured at process entry
    pub provenance: Provenance,
}

impl RuntimeConfig {
    /// Build a runtime configuration from a project config with defaults for
    /// all process-level state.
    pub fn from_config(config: &Config) -> Self {
        Self {
            project_name: config.project.name.clone(),
            bucket: config.project.bucket.clone(),
            store_root: config.store.root.clone(),
            cache_dir: config.store.cache_dir.clone(),
            tracking_root: config.tracking.root.clone(),
            concurrency: config.runner.concurrency,
            dev_mode: false,
            debug: false,
            tags: BTreeSet::new(),
            artifact_overrides: Vec::new(),
            provenance: Provenance::default(),
        }
    }

    /// Enable or disable development mode.
    pub fn with_dev_mode(mut self, dev_mode: bool) -> Self {
        self.dev_mode = dev_mode;
        self
    }

    /// Enable or disable debug verbosity.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Set run tags.
    pub fn with_tags(mut self, tags: BTreeSet<String>) -> Self {
        self.tags = tags;
        self
    }

    /// Set pinned artifact versions.
    pub fn with_artifact_overrides(mut self, overrides: Vec<ArtifactName>) -> Self {
        self.artifact_overrides = overrides;
        self
    }

    /// Attach captured provenance.
    pub fn with_provenance(mut self, provenance: Provenance) -> Self {
        self.provenance = provenance;
        self
    }

    /// Override the scheduler concurrency.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_concurrency_positive() {
        assert!(RunnerConfig::default().concurrency > 0);
    }

    #[test]
    fn test_runtime_config_builders() {
        let mut config = Config::default();
        config.project.name = "nlp".to_string();
        config.project.bucket = "experiments".to_string();

        let runtime = RuntimeConfig::from_config(&config)
            .with_dev_mode(true)
            .with_concurrency(2);

        assert_eq!(runtime.project_name, "nlp");
        assert_eq!(runtime.bucket, "experiments");
        assert!(runtime.dev_mode);
        assert_eq!(runtime.concurrency, 2);
    }
}
