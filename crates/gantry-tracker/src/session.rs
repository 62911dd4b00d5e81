//! Tracker session lifecycle
//!
//! A session surrounds one action's run: opened immediately before the run
//! procedure, closed immediately after, on the failure path too. The factory
//! owns the process-wide pieces (store, backend, cache, run catalog) and
//! hands each action the right tracker for the configured mode.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use gantry_core::{ArtifactName, GantryError, RuntimeConfig, TrackerError};
use gantry_stores::{BlobStore, ContentCache, TrackingBackend};

use crate::backend::BackendTracker;
use crate::catalog::{DevArtifactStore, RunCatalog};
use crate::dev::DevTracker;
use crate::tracker::Tracker;

/// Identity and declared I/O of the action a session belongs to.
#[derive(Debug, Clone)]
pub struct SessionSpec {
    /// Fully qualified action name
    pub qualified_name: String,
    /// Coarse category
    pub job_group: String,
    /// Specific category
    pub job_type: String,
    /// Configuration parameters captured at graph build time
    pub config: Value,
    /// The action's static output list
    pub declared_outputs: Vec<String>,
    /// Input namespace: the union of parent output names, in parent
    /// declaration order
    pub parent_outputs: Vec<String>,
}

impl SessionSpec {
    /// Gate an output declaration against the static output list.
    pub(crate) fn check_output(&self, name: &str) -> Result<(), TrackerError> {
        if self.declared_outputs.iter().any(|o| o == name) {
            Ok(())
        } else {
            Err(TrackerError::ArtifactConflict {
                action: self.qualified_name.clone(),
                name: name.to_string(),
            })
        }
    }

    /// Gate an input declaration against the parent output namespace.
    ///
    /// Actions with no parents are exempt: they may resolve pre-existing
    /// external artifacts from the catalog.
    pub(crate) fn check_input(&self, name: &ArtifactName) -> Result<(), TrackerError> {
        if self.parent_outputs.is_empty() {
            return Ok(());
        }
        if self.parent_outputs.iter().any(|o| *o == name.name) {
            Ok(())
        } else {
            Err(TrackerError::UnresolvedArtifact(name.to_string()))
        }
    }
}

enum SessionTracker {
    Backend(BackendTracker),
    Dev(DevTracker),
}

/// A live tracker session for one action execution.
pub struct TrackerSession {
    inner: SessionTracker,
    qualified_name: String,
}

impl TrackerSession {
    /// The tracker to hand to the action's run procedure.
    pub fn tracker(&mut self) -> &mut dyn Tracker {
        match &mut self.inner {
            SessionTracker::Backend(tracker) => tracker,
            SessionTracker::Dev(tracker) => tracker,
        }
    }

    /// Close the session, committing the run record.
    ///
    /// Must be called whether the run procedure succeeded or failed; the
    /// status is recorded either way.
    pub fn close(self, success: bool) -> Result<(), GantryError> {
        debug!(action = %self.qualified_name, success, "closing tracker session");
        match self.inner {
            SessionTracker::Backend(tracker) => tracker.finish(success),
            SessionTracker::Dev(tracker) => tracker.finish(success),
        }
    }
}

/// Builds tracker sessions for a whole pipeline run.
pub struct SessionFactory {
    runtime: Arc<RuntimeConfig>,
    store: Arc<dyn BlobStore>,
    backend: Arc<dyn TrackingBackend>,
    cache: Arc<ContentCache>,
    run_catalog: Arc<RunCatalog>,
    dev_store: Arc<DevArtifactStore>,
}

impl SessionFactory {
    /// Create a factory bound to a store and backend.
    ///
    /// Opens the shared content cache and (for development mode) the local
    /// artifact mapping under the configured cache directory.
    pub fn new(
        runtime: Arc<RuntimeConfig>,
        store: Arc<dyn BlobStore>,
        backend: Arc<dyn TrackingBackend>,
    ) -> Result<Self, GantryError> {
        let cache = Arc::new(ContentCache::open(&runtime.cache_dir)?);
        let dev_store = Arc::new(DevArtifactStore::open(&runtime.cache_dir)?);
        Ok(Self {
            runtime,
            store,
            backend,
            cache,
            run_catalog: Arc::new(RunCatalog::default()),
            dev_store,
        })
    }

    /// Whether sessions will run in development mode.
    pub fn dev_mode(&self) -> bool {
        self.runtime.dev_mode
    }

    /// Open a session for one action.
    ///
    /// In production mode this starts a run on the tracking backend; in
    /// development mode nothing leaves the local machine.
    pub fn open(&self, spec: SessionSpec) -> Result<TrackerSession, GantryError> {
        let qualified_name = spec.qualified_name.clone();
        let inner = if self.runtime.dev_mode {
            SessionTracker::Dev(DevTracker::new(
                spec,
                self.runtime.clone(),
                self.cache.clone(),
                self.run_catalog.clone(),
                self.dev_store.clone(),
            ))
        } else {
            SessionTracker::Backend(BackendTracker::open(
                spec,
                self.runtime.clone(),
                self.store.clone(),
                self.backend.clone(),
                self.cache.clone(),
                self.run_catalog.clone(),
            )?)
        };
        Ok(TrackerSession {
            inner,
            qualified_name,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(parents: &[&str]) -> SessionSpec {
        SessionSpec {
            qualified_name: "build.munge".to_string(),
            job_group: "build".to_string(),
            job_type: "munge".to_string(),
            config: serde_json::json!({}),
            declared_outputs: vec!["corpus".to_string()],
            parent_outputs: parents.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn test_check_output_gate() {
        let spec = spec(&[]);
        assert!(spec.check_output("corpus").is_ok());
        assert!(matches!(
            spec.check_output("surprise"),
            Err(TrackerError::ArtifactConflict { .. })
        ));
    }

    #[test]
    fn test_check_input_requires_parent_output() {
        let spec = spec(&["raw-data"]);
        let known = ArtifactName::parse("raw-data").unwrap();
        let unknown = ArtifactName::parse("other").unwrap();
        assert!(spec.check_input(&known).is_ok());
        assert!(matches!(
            spec.check_input(&unknown),
            Err(TrackerError::UnresolvedArtifact(_))
        ));
    }

    #[test]
    fn test_check_input_root_actions_unrestricted() {
        let spec = spec(&[]);
        let external = ArtifactName::parse("anything").unwrap();
        assert!(spec.check_input(&external).is_ok());
    }
}
