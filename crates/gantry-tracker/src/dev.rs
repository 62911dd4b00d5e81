//! Development-mode tracker
//!
//! Preserves the artifact-resolution contract of the backend tracker with no
//! store uploads and no tracking backend: content lands in the local cache
//! under a fixed version token and the name mapping persists as JSON so later
//! development runs can resolve earlier outputs. Intended for a fast
//! edit-run-debug loop.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::{debug, info};

use gantry_core::{
    digest_file, ArtifactName, ArtifactRef, CacheError, GantryError, RuntimeConfig,
    StoredObject, TrackerError,
};
use gantry_stores::ContentCache;

use crate::catalog::{DevArtifactStore, RunCatalog};
use crate::session::SessionSpec;
use crate::tracker::{expand_output_files, OutputSpec, Tracker};

/// Version token used for everything stored in development mode.
pub const DEV_VERSION: &str = "dev";

/// Local-only tracker for development mode.
pub struct DevTracker {
    spec: SessionSpec,
    runtime: Arc<RuntimeConfig>,
    cache: Arc<ContentCache>,
    run_catalog: Arc<RunCatalog>,
    dev_store: Arc<DevArtifactStore>,
}

impl DevTracker {
    pub(crate) fn new(
        spec: SessionSpec,
        runtime: Arc<RuntimeConfig>,
        cache: Arc<ContentCache>,
        run_catalog: Arc<RunCatalog>,
        dev_store: Arc<DevArtifactStore>,
    ) -> Self {
        info!(action = %spec.qualified_name, "started development tracker");
        Self {
            spec,
            runtime,
            cache,
            run_catalog,
            dev_store,
        }
    }

    /// Close the session. Nothing is flushed anywhere in development mode.
    pub(crate) fn finish(self, success: bool) -> Result<(), GantryError> {
        info!(
            action = %self.spec.qualified_name,
            success,
            "development tracker finished"
        );
        Ok(())
    }

    fn resolve(&self, name: &ArtifactName) -> Option<ArtifactRef> {
        self.run_catalog
            .get(&name.name)
            .or_else(|| self.dev_store.get(&name.name))
    }
}

impl Tracker for DevTracker {
    fn declare_output(&mut self, spec: OutputSpec) -> Result<ArtifactRef, GantryError> {
        self.spec.check_output(&spec.name)?;
        let files = expand_output_files(&spec)?;

        let mut objects = Vec::with_capacity(files.len());
        for file in &files {
            let fingerprint = digest_file(&file.local)?;
            self.cache.insert_file(&file.local, &fingerprint)?;

            let versioned = spec.destination.join(&file.key_suffix).with_version(DEV_VERSION);
            self.cache.record_object(&versioned, &fingerprint)?;
            objects.push(StoredObject::new(versioned, fingerprint));
        }

        let artifact = ArtifactRef::new(spec.name, spec.artifact_type, objects, spec.metadata)?;
        self.run_catalog.publish(&artifact);
        self.dev_store.publish(&artifact)?;
        info!(
            action = %self.spec.qualified_name,
            artifact = %artifact.name,
            files = files.len(),
            "[offline] declared output into local cache"
        );
        Ok(artifact)
    }

    fn declare_input(&mut self, descriptor: &str) -> Result<Vec<PathBuf>, GantryError> {
        let parsed = ArtifactName::parse(descriptor)?;
        self.spec.check_input(&parsed)?;

        let resolved = parsed.resolve(
            Some(&self.runtime.project_name),
            &self.runtime.artifact_overrides,
        );
        let artifact = self
            .resolve(&resolved)
            .ok_or_else(|| TrackerError::UnresolvedArtifact(descriptor.to_string()))?;

        let mut paths = Vec::with_capacity(artifact.objects.len());
        for object in &artifact.objects {
            let path = self.cache.lookup(&object.fingerprint).ok_or_else(|| {
                CacheError::Internal(format!(
                    "blob for '{}' missing from development cache",
                    artifact.name
                ))
            })?;
            paths.push(path);
        }
        debug!(
            action = %self.spec.qualified_name,
            artifact = %artifact.name,
            paths = paths.len(),
            "[offline] declared input"
        );
        Ok(paths)
    }

    fn log(
        &mut self,
        values: serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), GantryError> {
        // Nothing to persist; surface the metrics in the log stream instead.
        info!(
            action = %self.spec.qualified_name,
            metrics = %serde_json::Value::Object(values),
            "[offline] metrics"
        );
        Ok(())
    }
}
