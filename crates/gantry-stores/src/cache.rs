//! Local content cache for stored objects
//!
//! The cache is keyed by content fingerprint, not by object name or version:
//! distinct versions with identical bytes share one blob on disk. An index
//! maps store coordinates back to fingerprints so uploads of already-stored
//! content can be skipped.
//!
//! The cache is shared across concurrently running actions. Blob reads and
//! writes are safe from any thread, and `get_or_fetch` guarantees at most one
//! in-flight transfer per fingerprint; concurrent requesters for the same
//! fingerprint wait on the first transfer instead of duplicating it.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Condvar, Mutex};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use gantry_core::{CacheError, GantryError, StoreError, StoreKey, VersionedStoreKey};

/// One index record: a store coordinate and the fingerprint of its bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Bucket of the recorded object
    pub bucket: String,
    /// Key of the recorded object
    pub key: String,
    /// Version token of the recorded object
    pub version_id: String,
    /// SHA-256 fingerprint of the object's bytes
    pub fingerprint: String,
}

/// Content-addressed cache of stored objects.
pub struct ContentCache {
    root: PathBuf,
    index: Mutex<Vec<CacheEntry>>,
    in_flight: Mutex<HashSet<String>>,
    transfer_done: Condvar,
}

impl ContentCache {
    /// Open (or create) a cache rooted at `root`, loading any existing index.
    pub fn open(root: impl Into<PathBuf>) -> Result<Self, CacheError> {
        let root = root.into();
        fs::create_dir_all(root.join("objects"))?;
        fs::create_dir_all(root.join("tmp"))?;

        let index_path = root.join("index.json");
        let index = if index_path.exists() {
            let contents = fs::read_to_string(&index_path)?;
            serde_json::from_str(&contents)?
        } else {
            Vec::new()
        };

        Ok(Self {
            root,
            index: Mutex::new(index),
            in_flight: Mutex::new(HashSet::new()),
            transfer_done: Condvar::new(),
        })
    }

    /// Path a blob with this fingerprint would live at.
    fn blob_path(&self, fingerprint: &str) -> PathBuf {
        self.root.join("objects").join(fingerprint)
    }

    /// Local path for a fingerprint, if its blob is present.
    pub fn lookup(&self, fingerprint: &str) -> Option<PathBuf> {
        let path = self.blob_path(fingerprint);
        path.exists().then_some(path)
    }

    /// Copy a local file into the cache under its fingerprint.
    ///
    /// Cached blobs are made read-only; identical content already present is
    /// left untouched.
    pub fn insert_file(&self, source: &Path, fingerprint: &str) -> Result<PathBuf, CacheError> {
        let target = self.blob_path(fingerprint);
        if target.exists() {
            return Ok(target);
        }

        // Unique staging path per call: concurrent inserts of the same
        // content must not collide before the final atomic rename.
        static STAGING_SEQ: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);
        let seq = STAGING_SEQ.fetch_add(1, std::sync::atomic::Ordering::Relaxed);
        let staging = self
            .root
            .join("tmp")
            .join(format!("{fingerprint}.{seq}.partial"));
        fs::copy(source, &staging)?;
        let mut permissions = fs::metadata(&staging)?.permissions();
        permissions.set_readonly(true);
        fs::set_permissions(&staging, permissions)?;
        fs::rename(&staging, &target)?;

        debug!(fingerprint, "cached blob");
        Ok(target)
    }

    /// Record that a store object holds content with this fingerprint.
    pub fn record_object(
        &self,
        object: &VersionedStoreKey,
        fingerprint: &str,
    ) -> Result<(), CacheError> {
        let mut index = self
            .index
            .lock()
            .map_err(|_| CacheError::Internal("index lock poisoned".to_string()))?;

        let entry = CacheEntry {
            bucket: object.bucket.clone(),
            key: object.key.clone(),
            version_id: object.version_id.clone(),
            fingerprint: fingerprint.to_string(),
        };
        if !index.contains(&entry) {
            index.push(entry);
            let serialized = serde_json::to_string_pretty(&*index)?;
            fs::write(self.root.join("index.json"), serialized)?;
        }
        Ok(())
    }

    /// The version already holding this exact content at a key, if any.
    ///
    /// This is the upload-dedup check: when a key already has a version with
    /// the same fingerprint, declaring the same content again reuses it.
    pub fn version_for(&self, key: &StoreKey, fingerprint: &str) -> Option<String> {
        let index = self.index.lock().ok()?;
        index
            .iter()
            .find(|entry| {
                entry.bucket == key.bucket
                    && entry.key == key.key
                    && entry.fingerprint == fingerprint
            })
            .map(|entry| entry.version_id.clone())
    }

    /// Materialize an object locally, transferring it at most once.
    ///
    /// If the blob is already cached the path is returned immediately. If
    /// another thread is transferring the same fingerprint, this call blocks
    /// until that transfer completes. Otherwise `fetch` is invoked with a
    /// staging path to fill.
    pub fn get_or_fetch(
        &self,
        object: &VersionedStoreKey,
        fingerprint: &str,
        fetch: &(dyn Fn(&Path) -> Result<(), StoreError> + Sync),
    ) -> Result<PathBuf, GantryError> {
        loop {
            let mut in_flight = self
                .in_flight
                .lock()
                .map_err(|_| CacheError::Internal("in-flight lock poisoned".to_string()))?;

            if let Some(path) = self.lookup(fingerprint) {
                return Ok(path);
            }

            if in_flight.insert(fingerprint.to_string()) {
                break;
            }

            // Another thread owns this transfer; wait and re-check.
            in_flight = self
                .transfer_done
                .wait(in_flight)
                .map_err(|_| CacheError::Internal("in-flight lock poisoned".to_string()))?;
            drop(in_flight);
        }

        let result = self.transfer(object, fingerprint, fetch);

        let mut in_flight = self
            .in_flight
            .lock()
            .map_err(|_| CacheError::Internal("in-flight lock poisoned".to_string()))?;
        in_flight.remove(fingerprint);
        self.transfer_done.notify_all();
        drop(in_flight);

        result
    }

    fn transfer(
        &self,
        object: &VersionedStoreKey,
        fingerprint: &str,
        fetch: &(dyn Fn(&Path) -> Result<(), StoreError> + Sync),
    ) -> Result<PathBuf, GantryError> {
        info!(object = %object, "fetching and caching object");
        let staging = self
            .root
            .join("tmp")
            .join(format!("{fingerprint}.download"));
        fetch(&staging)?;

        let path = self.insert_file(&staging, fingerprint)?;
        let _ = fs::remove_file(&staging);
        self.record_object(object, fingerprint)?;
        Ok(path)
    }
}
