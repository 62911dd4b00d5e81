//! The tracker capability interface
//!
//! A tracker is the only sanctioned path for an action to read and write
//! versioned artifacts and to emit metrics while it runs. Two implementations
//! exist: [`crate::BackendTracker`] binds a blob store and tracking backend;
//! [`crate::DevTracker`] preserves the same artifact-resolution contract
//! against the local cache only.

use std::path::{Path, PathBuf};

use serde_json::Value;
use walkdir::WalkDir;

use gantry_core::{ArtifactRef, GantryError, StoreKey, TrackerError};

/// Everything needed to declare one output artifact.
#[derive(Debug, Clone)]
pub struct OutputSpec {
    /// Artifact name; must appear in the owning action's static output list
    pub name: String,
    /// Local files or directories holding the artifact's content
    pub local_paths: Vec<PathBuf>,
    /// Store location (bucket and key prefix) the content belongs under
    pub destination: StoreKey,
    /// Free-form classification string (e.g. "dataset", "predictions")
    pub artifact_type: String,
    /// Local path prefix to drop when deriving store keys
    pub strip_prefix: Option<PathBuf>,
    /// Extra information recorded with the artifact
    pub metadata: Value,
}

impl OutputSpec {
    /// Create a spec with no files attached yet.
    pub fn new(
        name: impl Into<String>,
        destination: StoreKey,
        artifact_type: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            local_paths: Vec::new(),
            destination,
            artifact_type: artifact_type.into(),
            strip_prefix: None,
            metadata: Value::Null,
        }
    }

    /// Add a local file or directory.
    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.local_paths.push(path.into());
        self
    }

    /// Set the local paths wholesale.
    pub fn with_paths(mut self, paths: Vec<PathBuf>) -> Self {
        self.local_paths = paths;
        self
    }

    /// Drop a local path prefix when deriving store keys.
    pub fn with_strip_prefix(mut self, prefix: impl Into<PathBuf>) -> Self {
        self.strip_prefix = Some(prefix.into());
        self
    }

    /// Attach metadata.
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }
}

/// Run-scoped mediator between an action and artifact/metric persistence.
pub trait Tracker: Send {
    /// Store local content as a named, versioned output artifact.
    ///
    /// Content already present at the destination under the same fingerprint
    /// is not uploaded again; the existing version is returned.
    fn declare_output(&mut self, spec: OutputSpec) -> Result<ArtifactRef, GantryError>;

    /// Resolve a named input artifact and materialize it locally.
    ///
    /// The descriptor may be a bare name or a `project/name:version` form.
    /// Returns local paths to the artifact's files.
    fn declare_input(&mut self, descriptor: &str) -> Result<Vec<PathBuf>, GantryError>;

    /// Record a set of metric values against this run.
    fn log(&mut self, values: serde_json::Map<String, Value>) -> Result<(), GantryError>;
}

/// One local file slated for storage, with its derived store key suffix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct OutputFile {
    pub local: PathBuf,
    pub key_suffix: String,
}

/// Expand an output spec's local paths into individual files.
///
/// Directories are walked recursively in sorted order. The key suffix for a
/// file is its path with `strip_prefix` removed when it applies; otherwise a
/// plain file keeps its file name and a file found under a passed directory
/// keeps the directory's name plus the relative path.
pub(crate) fn expand_output_files(spec: &OutputSpec) -> Result<Vec<OutputFile>, GantryError> {
    let mut files = Vec::new();

    for path in &spec.local_paths {
        if path.is_dir() {
            let mut walker: Vec<PathBuf> = WalkDir::new(path)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|entry| entry.ok())
                .filter(|entry| entry.file_type().is_file())
                .map(|entry| entry.into_path())
                .collect();
            walker.sort();
            for file in walker {
                let suffix = derive_suffix(&file, spec.strip_prefix.as_deref(), Some(path));
                files.push(OutputFile {
                    local: file,
                    key_suffix: suffix,
                });
            }
        } else {
            let suffix = derive_suffix(path, spec.strip_prefix.as_deref(), None);
            files.push(OutputFile {
                local: path.clone(),
                key_suffix: suffix,
            });
        }
    }

    if files.is_empty() {
        return Err(TrackerError::EmptyOutput(spec.name.clone()).into());
    }
    Ok(files)
}

fn derive_suffix(file: &Path, strip_prefix: Option<&Path>, source_dir: Option<&Path>) -> String {
    if let Some(prefix) = strip_prefix {
        if let Ok(stripped) = file.strip_prefix(prefix) {
            return path_to_key(stripped);
        }
    }

    if let Some(dir) = source_dir {
        if let (Some(dir_name), Ok(relative)) = (dir.file_name(), file.strip_prefix(dir)) {
            return path_to_key(&Path::new(dir_name).join(relative));
        }
    }

    file.file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| path_to_key(file))
}

fn path_to_key(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn spec_with(paths: Vec<PathBuf>) -> OutputSpec {
        OutputSpec::new("out", StoreKey::new("bucket", "prefix"), "dataset").with_paths(paths)
    }

    #[test]
    fn test_expand_plain_file_uses_file_name() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("results.txt");
        fs::write(&file, b"x").unwrap();

        let files = expand_output_files(&spec_with(vec![file.clone()])).unwrap();
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].local, file);
        assert_eq!(files[0].key_suffix, "results.txt");
    }

    #[test]
    fn test_expand_strip_prefix() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("work").join("out");
        fs::create_dir_all(&nested).unwrap();
        let file = nested.join("results.txt");
        fs::write(&file, b"x").unwrap();

        let spec = spec_with(vec![file]).with_strip_prefix(dir.path().join("work"));
        let files = expand_output_files(&spec).unwrap();
        assert_eq!(files[0].key_suffix, "out/results.txt");
    }

    #[test]
    fn test_expand_directory_keeps_dir_name() {
        let dir = tempfile::tempdir().unwrap();
        let out_dir = dir.path().join("shards");
        fs::create_dir_all(out_dir.join("sub")).unwrap();
        fs::write(out_dir.join("a.bin"), b"a").unwrap();
        fs::write(out_dir.join("sub").join("b.bin"), b"b").unwrap();

        let files = expand_output_files(&spec_with(vec![out_dir])).unwrap();
        let suffixes: Vec<&str> = files.iter().map(|f| f.key_suffix.as_str()).collect();
        assert_eq!(suffixes, vec!["shards/a.bin", "shards/sub/b.bin"]);
    }

    #[test]
    fn test_expand_empty_is_an_error() {
        let err = expand_output_files(&spec_with(Vec::new())).unwrap_err();
        assert!(matches!(
            err,
            GantryError::Tracker(TrackerError::EmptyOutput(_))
        ));
    }
}
