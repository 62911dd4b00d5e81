//! Blob store client trait and filesystem-backed implementation
//!
//! The store contract is versioned and overwrite-safe: every `put` against a
//! key mints a fresh version token, and existing `(key, version)` pairs are
//! never mutated. Remote stores (S3 and friends) live behind the same trait
//! outside this workspace.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use gantry_core::{StoreError, StoreKey, VersionedStoreKey};

/// Client interface to a versioned blob store.
pub trait BlobStore: Send + Sync {
    /// Upload a local file, minting a new version for the destination key.
    fn put(&self, local: &Path, dest: &StoreKey) -> Result<VersionedStoreKey, StoreError>;

    /// Download a specific version of an object into `into`.
    fn fetch(&self, object: &VersionedStoreKey, into: &Path) -> Result<(), StoreError>;

    /// The most recently minted version token for a key.
    fn latest_version(&self, key: &StoreKey) -> Result<String, StoreError>;
}

/// Directory-backed blob store.
///
/// Layout: `<root>/<bucket>/<key>/<version>`, where each key becomes a
/// directory grouping all of its versions. Version tokens are monotonic
/// (`v0`, `v1`, ...) per key. Suitable for development and tests; the trait
/// boundary is where remote stores plug in.
#[derive(Debug, Clone)]
pub struct FsBlobStore {
    root: PathBuf,
}

impl FsBlobStore {
    /// Create a store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn key_dir(&self, key: &StoreKey) -> PathBuf {
        self.root.join(&key.bucket).join(&key.key)
    }

    fn version_path(&self, object: &VersionedStoreKey) -> PathBuf {
        self.key_dir(&object.unversioned()).join(&object.version_id)
    }

    /// Version tokens currently minted for a key, in minting order.
    fn versions(&self, key: &StoreKey) -> Result<Vec<String>, StoreError> {
        let dir = self.key_dir(key);
        if !dir.exists() {
            return Ok(Vec::new());
        }

        let mut versions: Vec<(u64, String)> = Vec::new();
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name().to_string_lossy().to_string();
            if let Some(counter) = name.strip_prefix('v').and_then(|n| n.parse::<u64>().ok()) {
                versions.push((counter, name));
            }
        }
        versions.sort();
        Ok(versions.into_iter().map(|(_, name)| name).collect())
    }
}

impl BlobStore for FsBlobStore {
    fn put(&self, local: &Path, dest: &StoreKey) -> Result<VersionedStoreKey, StoreError> {
        let existing = self.versions(dest)?;
        let version_id = format!("v{}", existing.len());

        let dir = self.key_dir(dest);
        fs::create_dir_all(&dir)?;
        let target = dir.join(&version_id);
        fs::copy(local, &target)?;

        info!(key = %dest, version = %version_id, "stored object");
        Ok(dest.with_version(version_id))
    }

    fn fetch(&self, object: &VersionedStoreKey, into: &Path) -> Result<(), StoreError> {
        let source = self.version_path(object);
        if !source.exists() {
            return Err(StoreError::VersionNotFound {
                bucket: object.bucket.clone(),
                key: object.key.clone(),
                version: object.version_id.clone(),
            });
        }

        if let Some(parent) = into.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::copy(&source, into)?;
        debug!(object = %object, "fetched object");
        Ok(())
    }

    fn latest_version(&self, key: &StoreKey) -> Result<String, StoreError> {
        self.versions(key)?
            .pop()
            .ok_or_else(|| StoreError::NotFound {
                bucket: key.bucket.clone(),
                key: key.key.clone(),
            })
    }
}
