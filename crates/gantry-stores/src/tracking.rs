//! Tracking backend client trait and local implementations
//!
//! A tracking backend records runs (one per executed action), their metric
//! streams, and the artifacts they consumed and produced. The catalog half of
//! the backend maps artifact names to their registered versions so later runs
//! can resolve `latest` or pinned versions. Remote experiment trackers plug
//! in behind the same trait.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use gantry_core::{ArtifactName, ArtifactRef, Provenance, TrackerError, LATEST_VERSION};

/// Final status of a tracked run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// The action's run procedure returned successfully
    Succeeded,
    /// The action's run procedure returned an error
    Failed,
}

/// Whether an artifact was consumed or produced by a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ArtifactDirection {
    /// Declared as an input
    Input,
    /// Declared as an output
    Output,
}

/// One timestamped metric observation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricRecord {
    /// When the observation was recorded
    pub timestamp: DateTime<Utc>,
    /// Metric values by name
    pub values: serde_json::Map<String, serde_json::Value>,
}

impl MetricRecord {
    /// Create a record stamped with the current time.
    pub fn now(values: serde_json::Map<String, serde_json::Value>) -> Self {
        Self {
            timestamp: Utc::now(),
            values,
        }
    }
}

/// Identity and configuration of a run about to start.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunDescriptor {
    /// Project namespace
    pub project: String,
    /// Coarse category of the action (e.g. "build", "model")
    pub job_group: String,
    /// Specific category of the action (e.g. "munge", "evaluate")
    pub job_type: String,
    /// Fully qualified action name
    pub qualified_name: String,
    /// Action configuration parameters
    pub config: serde_json::Value,
    /// Organizational tags
    pub tags: BTreeSet<String>,
    /// Code provenance for the process that launched this run
    pub provenance: Provenance,
}

/// Opaque handle to an open run.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RunHandle(pub String);

/// Everything recorded about one run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunRecord {
    /// Run id (also the handle)
    pub id: String,
    /// Run identity and configuration
    pub descriptor: RunDescriptor,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run finished, once it has
    pub finished_at: Option<DateTime<Utc>>,
    /// Final status, once finished
    pub status: Option<RunStatus>,
    /// Metric observations in log order
    pub metrics: Vec<MetricRecord>,
    /// Artifacts declared as inputs
    pub inputs: Vec<ArtifactRef>,
    /// Artifacts declared as outputs
    pub outputs: Vec<ArtifactRef>,
}

/// Client interface to a tracking backend.
pub trait TrackingBackend: Send + Sync {
    /// Open a run and return its handle.
    fn start_run(&self, descriptor: &RunDescriptor) -> Result<RunHandle, TrackerError>;

    /// Append a metric record to a run.
    fn log(&self, handle: &RunHandle, record: &MetricRecord) -> Result<(), TrackerError>;

    /// Register an artifact as consumed or produced by a run.
    fn log_artifact(
        &self,
        handle: &RunHandle,
        artifact: &ArtifactRef,
        direction: ArtifactDirection,
    ) -> Result<(), TrackerError>;

    /// Resolve a (project-qualified) artifact name against the catalog.
    fn resolve_artifact(&self, name: &ArtifactName) -> Result<Option<ArtifactRef>, TrackerError>;

    /// Close a run, committing its record.
    fn finish(&self, handle: &RunHandle, status: RunStatus) -> Result<(), TrackerError>;
}

fn mint_run_id(job_type: &str) -> String {
    static RUN_SEQ: AtomicU64 = AtomicU64::new(0);
    let seq = RUN_SEQ.fetch_add(1, Ordering::Relaxed);
    format!("{}-{}-{}", job_type, Utc::now().timestamp_millis(), seq)
}

/// Artifact catalog: every registered version of every artifact name,
/// oldest first.
type Catalog = BTreeMap<String, Vec<ArtifactRef>>;

fn catalog_lookup(catalog: &Catalog, name: &ArtifactName) -> Option<ArtifactRef> {
    let versions = catalog.get(&name.name)?;
    match name.version.as_deref() {
        None | Some(LATEST_VERSION) => versions.last().cloned(),
        Some(version) => versions
            .iter()
            .rev()
            .find(|artifact| artifact.version() == Some(version))
            .cloned(),
    }
}

/// Directory-backed tracking backend.
///
/// Run records land under `<root>/<project>/runs/<run-id>.json` when a run
/// finishes; the artifact catalog lives at `<root>/<project>/catalog.json`
/// and is updated as outputs are registered.
pub struct FsTrackingBackend {
    root: PathBuf,
    open_runs: Mutex<HashMap<String, RunRecord>>,
    catalog_lock: Mutex<()>,
}

impl FsTrackingBackend {
    /// Create a backend rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            open_runs: Mutex::new(HashMap::new()),
            catalog_lock: Mutex::new(()),
        }
    }

    fn backend_err(message: impl std::fmt::Display) -> TrackerError {
        TrackerError::Backend(message.to_string())
    }

    fn catalog_path(&self, project: &str) -> PathBuf {
        self.root.join(project).join("catalog.json")
    }

    fn load_catalog(&self, project: &str) -> Result<Catalog, TrackerError> {
        let path = self.catalog_path(project);
        if !path.exists() {
            return Ok(Catalog::new());
        }
        let contents = fs::read_to_string(&path).map_err(Self::backend_err)?;
        serde_json::from_str(&contents).map_err(Self::backend_err)
    }

    fn register_output(&self, project: &str, artifact: &ArtifactRef) -> Result<(), TrackerError> {
        let _guard = self
            .catalog_lock
            .lock()
            .map_err(|_| Self::backend_err("catalog lock poisoned"))?;

        let mut catalog = self.load_catalog(project)?;
        let versions = catalog.entry(artifact.name.clone()).or_default();
        if !versions.iter().any(|existing| existing == artifact) {
            versions.push(artifact.clone());
        }

        let path = self.catalog_path(project);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(Self::backend_err)?;
        }
        let serialized = serde_json::to_string_pretty(&catalog).map_err(Self::backend_err)?;
        fs::write(&path, serialized).map_err(Self::backend_err)?;
        debug!(project, artifact = %artifact.name, "registered artifact in catalog");
        Ok(())
    }

    fn with_run<T>(
        &self,
        handle: &RunHandle,
        apply: impl FnOnce(&mut RunRecord) -> T,
    ) -> Result<T, TrackerError> {
        let mut runs = self
            .open_runs
            .lock()
            .map_err(|_| Self::backend_err("run table lock poisoned"))?;
        let record = runs
            .get_mut(&handle.0)
            .ok_or_else(|| Self::backend_err(format!("unknown run handle: {}", handle.0)))?;
        Ok(apply(record))
    }
}

impl TrackingBackend for FsTrackingBackend {
    fn start_run(&self, descriptor: &RunDescriptor) -> Result<RunHandle, TrackerError> {
        let id = mint_run_id(&descriptor.job_type);
        let record = RunRecord {
            id: id.clone(),
            descriptor: descriptor.clone(),
            started_at: Utc::now(),
            finished_at: None,
            status: None,
            metrics: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        };

        let mut runs = self
            .open_runs
            .lock()
            .map_err(|_| Self::backend_err("run table lock poisoned"))?;
        runs.insert(id.clone(), record);
        info!(run = %id, action = %descriptor.qualified_name, "run started");
        Ok(RunHandle(id))
    }

    fn log(&self, handle: &RunHandle, record: &MetricRecord) -> Result<(), TrackerError> {
        self.with_run(handle, |run| run.metrics.push(record.clone()))
    }

    fn log_artifact(
        &self,
        handle: &RunHandle,
        artifact: &ArtifactRef,
        direction: ArtifactDirection,
    ) -> Result<(), TrackerError> {
        let project = self.with_run(handle, |run| {
            match direction {
                ArtifactDirection::Input => run.inputs.push(artifact.clone()),
                ArtifactDirection::Output => run.outputs.push(artifact.clone()),
            }
            run.descriptor.project.clone()
        })?;

        if direction == ArtifactDirection::Output {
            self.register_output(&project, artifact)?;
        }
        Ok(())
    }

    fn resolve_artifact(&self, name: &ArtifactName) -> Result<Option<ArtifactRef>, TrackerError> {
        let Some(project) = name.project.as_deref() else {
            return Ok(None);
        };
        let catalog = self.load_catalog(project)?;
        Ok(catalog_lookup(&catalog, name))
    }

    fn finish(&self, handle: &RunHandle, status: RunStatus) -> Result<(), TrackerError> {
        let mut runs = self
            .open_runs
            .lock()
            .map_err(|_| Self::backend_err("run table lock poisoned"))?;
        let mut record = runs
            .remove(&handle.0)
            .ok_or_else(|| Self::backend_err(format!("unknown run handle: {}", handle.0)))?;
        drop(runs);

        record.finished_at = Some(Utc::now());
        record.status = Some(status);

        let dir = self.root.join(&record.descriptor.project).join("runs");
        fs::create_dir_all(&dir).map_err(Self::backend_err)?;
        let serialized = serde_json::to_string_pretty(&record).map_err(Self::backend_err)?;
        fs::write(dir.join(format!("{}.json", record.id)), serialized)
            .map_err(Self::backend_err)?;

        info!(run = %record.id, ?status, "run finished");
        Ok(())
    }
}

/// In-memory tracking backend that collects everything it is told.
///
/// Useful for tests and for inspecting what a pipeline would record without
/// touching disk.
#[derive(Default)]
pub struct MemoryTrackingBackend {
    state: Mutex<MemoryState>,
}

#[derive(Default)]
struct MemoryState {
    open: HashMap<String, RunRecord>,
    finished: Vec<RunRecord>,
    catalog: Catalog,
}

impl MemoryTrackingBackend {
    /// All finished run records, in finish order.
    pub fn finished_runs(&self) -> Vec<RunRecord> {
        self.state
            .lock()
            .map(|state| state.finished.clone())
            .unwrap_or_default()
    }

    /// Registered versions for an artifact name, oldest first.
    pub fn versions_of(&self, name: &str) -> Vec<ArtifactRef> {
        self.state
            .lock()
            .ok()
            .and_then(|state| state.catalog.get(name).cloned())
            .unwrap_or_default()
    }
}

impl TrackingBackend for MemoryTrackingBackend {
    fn start_run(&self, descriptor: &RunDescriptor) -> Result<RunHandle, TrackerError> {
        let id = mint_run_id(&descriptor.job_type);
        let record = RunRecord {
            id: id.clone(),
            descriptor: descriptor.clone(),
            started_at: Utc::now(),
            finished_at: None,
            status: None,
            metrics: Vec::new(),
            inputs: Vec::new(),
            outputs: Vec::new(),
        };
        let mut state = self
            .state
            .lock()
            .map_err(|_| TrackerError::Backend("state lock poisoned".to_string()))?;
        state.open.insert(id.clone(), record);
        Ok(RunHandle(id))
    }

    fn log(&self, handle: &RunHandle, record: &MetricRecord) -> Result<(), TrackerError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| TrackerError::Backend("state lock poisoned".to_string()))?;
        let run = state
            .open
            .get_mut(&handle.0)
            .ok_or_else(|| TrackerError::Backend(format!("unknown run handle: {}", handle.0)))?;
        run.metrics.push(record.clone());
        Ok(())
    }

    fn log_artifact(
        &self,
        handle: &RunHandle,
        artifact: &ArtifactRef,
        direction: ArtifactDirection,
    ) -> Result<(), TrackerError> {
        let mut guard = self
            .state
            .lock()
            .map_err(|_| TrackerError::Backend("state lock poisoned".to_string()))?;
        let state = &mut *guard;
        let run = state
            .open
            .get_mut(&handle.0)
            .ok_or_else(|| TrackerError::Backend(format!("unknown run handle: {}", handle.0)))?;
        match direction {
            ArtifactDirection::Input => run.inputs.push(artifact.clone()),
            ArtifactDirection::Output => {
                run.outputs.push(artifact.clone());
                state
                    .catalog
                    .entry(artifact.name.clone())
                    .or_default()
                    .push(artifact.clone());
            }
        }
        Ok(())
    }

    fn resolve_artifact(&self, name: &ArtifactName) -> Result<Option<ArtifactRef>, TrackerError> {
        let state = self
            .state
            .lock()
            .map_err(|_| TrackerError::Backend("state lock poisoned".to_string()))?;
        Ok(catalog_lookup(&state.catalog, name))
    }

    fn finish(&self, handle: &RunHandle, status: RunStatus) -> Result<(), TrackerError> {
        let mut state = self
            .state
            .lock()
            .map_err(|_| TrackerError::Backend("state lock poisoned".to_string()))?;
        let mut record = state
            .open
            .remove(&handle.0)
            .ok_or_else(|| TrackerError::Backend(format!("unknown run handle: {}", handle.0)))?;
        record.finished_at = Some(Utc::now());
        record.status = Some(status);
        state.finished.push(record);
        Ok(())
    }
}
