//! Run-scoped and development artifact catalogs

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use tracing::debug;

use gantry_core::{ArtifactRef, CacheError};

/// Artifacts produced so far during the current process run.
///
/// Shared across all concurrently running actions; `declare_input` consults
/// this before falling back to the tracking backend, so an action always sees
/// exactly the versions its parents produced in this run.
#[derive(Default)]
pub struct RunCatalog {
    entries: Mutex<BTreeMap<String, ArtifactRef>>,
}

impl RunCatalog {
    /// Record an artifact produced this run.
    ///
    /// Output names are unique per graph, so a name is only ever published
    /// once per run.
    pub fn publish(&self, artifact: &ArtifactRef) {
        if let Ok(mut entries) = self.entries.lock() {
            debug!(artifact = %artifact.name, "published to run catalog");
            entries.insert(artifact.name.clone(), artifact.clone());
        }
    }

    /// Look up an artifact produced this run.
    pub fn get(&self, name: &str) -> Option<ArtifactRef> {
        self.entries.lock().ok()?.get(name).cloned()
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct DevArtifactMapping {
    artifacts_by_name: BTreeMap<String, ArtifactRef>,
}

/// Persistent name→artifact mapping for development mode.
///
/// Development runs do not talk to a tracking backend, so resolution of
/// artifacts produced by earlier dev runs goes through this JSON file in the
/// cache directory instead.
pub struct DevArtifactStore {
    path: PathBuf,
    mapping: Mutex<DevArtifactMapping>,
}

impl DevArtifactStore {
    /// Open (or create) the mapping stored in `cache_dir`.
    pub fn open(cache_dir: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let path = cache_dir.into().join("dev_artifacts.json");
        let mapping = if path.exists() {
            let contents = fs::read_to_string(&path)?;
            serde_json::from_str(&contents)?
        } else {
            DevArtifactMapping::default()
        };
        Ok(Self {
            path,
            mapping: Mutex::new(mapping),
        })
    }

    /// Record an artifact, persisting the mapping.
    pub fn publish(&self, artifact: &ArtifactRef) -> Result<(), CacheError> {
        let mut mapping = self
            .mapping
            .lock()
            .map_err(|_| CacheError::Internal("mapping lock poisoned".to_string()))?;
        mapping
            .artifacts_by_name
            .insert(artifact.name.clone(), artifact.clone());

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let serialized = serde_json::to_string_pretty(&*mapping)?;
        fs::write(&self.path, serialized)?;
        Ok(())
    }

    /// Look up an artifact by name.
    pub fn get(&self, name: &str) -> Option<ArtifactRef> {
        self.mapping
            .lock()
            .ok()?
            .artifacts_by_name
            .get(name)
            .cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use gantry_core::{StoredObject, VersionedStoreKey};

    fn artifact(name: &str) -> ArtifactRef {
        ArtifactRef::new(
            name,
            "dataset",
            vec![StoredObject::new(
                VersionedStoreKey::new("bucket", format!("{name}.bin"), "dev"),
                "fp",
            )],
            serde_json::Value::Null,
        )
        .unwrap()
    }

    #[test]
    fn test_run_catalog_publish_get() {
        let catalog = RunCatalog::default();
        assert!(catalog.get("corpus").is_none());
        catalog.publish(&artifact("corpus"));
        assert_eq!(catalog.get("corpus").unwrap().name, "corpus");
    }

    #[test]
    fn test_dev_store_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        {
            let store = DevArtifactStore::open(dir.path()).unwrap();
            store.publish(&artifact("corpus")).unwrap();
        }
        let reopened = DevArtifactStore::open(dir.path()).unwrap();
        assert!(reopened.get("corpus").is_some());
        assert!(reopened.get("absent").is_none());
    }
}
