//! Backend-bound tracker
//!
//! The production tracker: artifacts go to the blob store through the content
//! cache, runs and metrics go to the tracking backend.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use gantry_core::{
    digest_file, ArtifactName, ArtifactRef, GantryError, RuntimeConfig, StoredObject,
    TrackerError, LATEST_VERSION,
};
use gantry_stores::{
    ArtifactDirection, BlobStore, ContentCache, MetricRecord, RunDescriptor, RunHandle,
    RunStatus, TrackingBackend,
};

use crate::catalog::RunCatalog;
use crate::session::SessionSpec;
use crate::tracker::{expand_output_files, OutputSpec, Tracker};

/// Tracker backed by a blob store and tracking backend.
pub struct BackendTracker {
    spec: SessionSpec,
    runtime: Arc<RuntimeConfig>,
    store: Arc<dyn BlobStore>,
    backend: Arc<dyn TrackingBackend>,
    cache: Arc<ContentCache>,
    run_catalog: Arc<RunCatalog>,
    handle: RunHandle,
    dropped_logs: u64,
}

impl BackendTracker {
    /// Start a run on the backend and bind a tracker to it.
    pub(crate) fn open(
        spec: SessionSpec,
        runtime: Arc<RuntimeConfig>,
        store: Arc<dyn BlobStore>,
        backend: Arc<dyn TrackingBackend>,
        cache: Arc<ContentCache>,
        run_catalog: Arc<RunCatalog>,
    ) -> Result<Self, GantryError> {
        let descriptor = RunDescriptor {
            project: runtime.project_name.clone(),
            job_group: spec.job_group.clone(),
            job_type: spec.job_type.clone(),
            qualified_name: spec.qualified_name.clone(),
            config: spec.config.clone(),
            tags: runtime.tags.clone(),
            provenance: runtime.provenance.clone(),
        };
        let handle = backend.start_run(&descriptor)?;
        Ok(Self {
            spec,
            runtime,
            store,
            backend,
            cache,
            run_catalog,
            handle,
            dropped_logs: 0,
        })
    }

    /// Commit the run record with its final status.
    ///
    /// This is the final flush: unlike mid-run metric logging, a backend
    /// failure here is not recoverable.
    pub(crate) fn finish(self, success: bool) -> Result<(), GantryError> {
        if self.dropped_logs > 0 {
            warn!(
                action = %self.spec.qualified_name,
                dropped = self.dropped_logs,
                "metric records were dropped due to backend errors"
            );
        }
        let status = if success {
            RunStatus::Succeeded
        } else {
            RunStatus::Failed
        };
        self.backend.finish(&self.handle, status)?;
        Ok(())
    }

    fn store_file(
        &self,
        local: &Path,
        dest: &gantry_core::StoreKey,
    ) -> Result<StoredObject, GantryError> {
        let fingerprint = digest_file(local)?;

        // Skip the upload when this exact content is already stored at the
        // destination; reuse its version.
        if let Some(version) = self.cache.version_for(dest, &fingerprint) {
            debug!(key = %dest, version, "content already stored, skipping upload");
            return Ok(StoredObject::new(dest.with_version(version), fingerprint));
        }

        info!(key = %dest, local = %local.display(), "uploading");
        let versioned = self.store.put(local, dest)?;
        self.cache.insert_file(local, &fingerprint)?;
        self.cache.record_object(&versioned, &fingerprint)?;
        Ok(StoredObject::new(versioned, fingerprint))
    }

    fn resolve(&self, name: &ArtifactName) -> Result<Option<ArtifactRef>, GantryError> {
        // Prefer what this run has already produced; the backend covers
        // artifacts from earlier runs and pinned versions.
        if let Some(artifact) = self.run_catalog.get(&name.name) {
            match name.version.as_deref() {
                None | Some(LATEST_VERSION) => return Ok(Some(artifact)),
                Some(version) if artifact.version() == Some(version) => {
                    return Ok(Some(artifact))
                }
                _ => {}
            }
        }
        Ok(self.backend.resolve_artifact(name)?)
    }
}

impl Tracker for BackendTracker {
    fn declare_output(&mut self, spec: OutputSpec) -> Result<ArtifactRef, GantryError> {
        self.spec.check_output(&spec.name)?;
        let files = expand_output_files(&spec)?;

        let mut objects = Vec::with_capacity(files.len());
        for file in &files {
            let dest = spec.destination.join(&file.key_suffix);
            objects.push(self.store_file(&file.local, &dest)?);
        }

        let artifact = ArtifactRef::new(spec.name, spec.artifact_type, objects, spec.metadata)?;
        self.backend
            .log_artifact(&self.handle, &artifact, ArtifactDirection::Output)?;
        self.run_catalog.publish(&artifact);
        info!(
            action = %self.spec.qualified_name,
            artifact = %artifact.name,
            version = artifact.version().unwrap_or("?"),
            files = files.len(),
            "declared output"
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
            .resolve(&resolved)?
            .ok_or_else(|| TrackerError::UnresolvedArtifact(descriptor.to_string()))?;

        self.backend
            .log_artifact(&self.handle, &artifact, ArtifactDirection::Input)?;

        let mut paths = Vec::with_capacity(artifact.objects.len());
        for object in &artifact.objects {
            let location = object.location.clone();
            let store = self.store.clone();
            let path = self.cache.get_or_fetch(
                &object.location,
                &object.fingerprint,
                &move |staging: &Path| store.fetch(&location, staging),
            )?;
            paths.push(path);
        }
        debug!(
            action = %self.spec.qualified_name,
            artifact = %artifact.name,
            paths = paths.len(),
            "declared input"
        );
        Ok(paths)
    }

    fn log(
        &mut self,
        values: serde_json::Map<String, serde_json::Value>,
    ) -> Result<(), GantryError> {
        let record = MetricRecord::now(values);
        if let Err(err) = self.backend.log(&self.handle, &record) {
            // Mid-run metric failures are recoverable; the run continues.
            self.dropped_logs += 1;
            warn!(
                action = %self.spec.qualified_name,
                error = %err,
                "failed to log metrics, continuing"
            );
        }
        Ok(())
    }
}
