//! Action scheduler
//!
//! Converts a built action graph into an executed schedule. Scheduling is
//! ready-queue based: an action becomes eligible the moment every parent that
//! is going to run this time has succeeded. A bounded pool (tokio semaphore)
//! limits how many actions run at once; each action's run procedure executes
//! on a blocking thread inside a fresh tracker session.
//!
//! Failure policy: a failing action marks itself failed and all of its
//! transitive dependents skipped. In-flight siblings finish; independent
//! branches keep executing.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, info, instrument, warn};

use gantry_core::{GantryError, RuntimeConfig};
use gantry_graph::{select, ActionGraph};
use gantry_stores::{BlobStore, TrackingBackend};
use gantry_tracker::SessionFactory;

use crate::report::{ActionResult, ActionStatus, ExecutionReport};
use crate::reporter::{ReporterRegistry, RunEvent, RunReporter};

/// One line of a dry-run listing.
#[derive(Debug, Clone)]
pub struct ActionListing {
    /// Node id in declaration order
    pub id: usize,
    /// Fully qualified action name
    pub qualified_name: String,
    /// Specific category
    pub job_type: String,
    /// Declared output artifact names
    pub outputs: Vec<String>,
    /// Whether the selection filters include this action
    pub selected: bool,
    /// Whether the action would actually execute
    pub would_run: bool,
}

/// Executes an action graph, honoring dependencies and selection filters.
pub struct ActionRunner {
    graph: ActionGraph,
    runtime: Arc<RuntimeConfig>,
    factory: Arc<SessionFactory>,
    reporters: ReporterRegistry,
}

impl ActionRunner {
    /// Create a runner for an already constructed graph.
    pub fn new(
        graph: ActionGraph,
        runtime: Arc<RuntimeConfig>,
        store: Arc<dyn BlobStore>,
        backend: Arc<dyn TrackingBackend>,
    ) -> Result<Self, GantryError> {
        let factory = Arc::new(SessionFactory::new(runtime.clone(), store, backend)?);
        Ok(Self {
            graph,
            runtime,
            factory,
            reporters: ReporterRegistry::new(),
        })
    }

    /// Add a progress reporter.
    pub fn add_reporter(&mut self, reporter: Arc<dyn RunReporter>) {
        self.reporters.register(reporter);
    }

    /// The graph this runner executes.
    pub fn graph(&self) -> &ActionGraph {
        &self.graph
    }

    /// Dry run: what would execute under these filters, without executing.
    pub fn plan(&self, filters: &[String]) -> Vec<ActionListing> {
        let selection = select(&self.graph, filters);
        self.graph
            .nodes()
            .iter()
            .map(|node| {
                let selected = selection.is_selected(node.id);
                ActionListing {
                    id: node.id,
                    qualified_name: node.qualified_name.clone(),
                    job_type: node.job_type.clone(),
                    outputs: node.outputs.clone(),
                    selected,
                    would_run: selected && (!node.skip || selection.is_matched(node.id)),
                }
            })
            .collect()
    }

    /// Execute the selected subgraph and report per-action outcomes.
    #[instrument(skip_all, fields(actions = self.graph.len(), concurrency = self.runtime.concurrency))]
    pub async fn run(&self, filters: &[String]) -> Result<ExecutionReport, GantryError> {
        let run_started = Instant::now();
        let selection = select(&self.graph, filters);
        let count = self.graph.len();

        let mut status: Vec<Option<ActionStatus>> = vec![None; count];
        let mut durations = vec![Duration::ZERO; count];
        let mut runnable = vec![false; count];

        for node in self.graph.nodes() {
            if !selection.is_selected(node.id) {
                status[node.id] = Some(ActionStatus::NotSelected);
            } else if node.skip && !selection.is_matched(node.id) {
                // Deliberately skipped; dependents resolve its outputs from
                // earlier runs via the backend catalog.
                status[node.id] = Some(ActionStatus::Skipped);
                self.reporters.broadcast(&RunEvent::Skipped {
                    id: node.id,
                    name: node.qualified_name.clone(),
                    reason: "skipped by configuration".to_string(),
                });
            } else {
                runnable[node.id] = true;
            }
        }

        // Only parents that run this time gate readiness; everything else is
        // satisfied from previous runs.
        let mut blockers: Vec<usize> = self
            .graph
            .nodes()
            .iter()
            .map(|node| node.parents.iter().filter(|p| runnable[**p]).count())
            .collect();

        let mut ready: Vec<usize> = (0..count)
            .filter(|id| runnable[*id] && blockers[*id] == 0)
            .collect();
        let mut pending = runnable.iter().filter(|r| **r).count();

        info!(selected = selection.len(), pending, "starting run");

        let semaphore = Arc::new(Semaphore::new(self.runtime.concurrency));
        let mut join_set: JoinSet<(usize, Duration, Result<(), GantryError>)> = JoinSet::new();

        while pending > 0 {
            for id in std::mem::take(&mut ready) {
                let Some(node) = self.graph.get(id) else {
                    continue;
                };
                let Some(spec) = self.graph.session_spec(id) else {
                    continue;
                };
                self.reporters.broadcast(&RunEvent::Started {
                    id,
                    name: node.qualified_name.clone(),
                });

                let action = node.action().clone();
                let factory = self.factory.clone();
                let semaphore = semaphore.clone();
                join_set.spawn(async move {
                    let permit = match semaphore.acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => {
                            return (
                                id,
                                Duration::ZERO,
                                Err(GantryError::Other("scheduler semaphore closed".to_string())),
                            )
                        }
                    };
                    let started = Instant::now();
                    let joined = tokio::task::spawn_blocking(move || {
                        let mut session = factory.open(spec)?;
                        let run_result = action.run(session.tracker());
                        let success = run_result.is_ok();
                        // Close the session on the failure path too.
                        let close_result = session.close(success);
                        run_result.and(close_result)
                    })
                    .await;
                    drop(permit);

                    let outcome = match joined {
                        Ok(result) => result,
                        Err(join_error) => Err(GantryError::Other(format!(
                            "action panicked: {join_error}"
                        ))),
                    };
                    (id, started.elapsed(), outcome)
                });
            }

            let Some(joined) = join_set.join_next().await else {
                // No tasks left but nodes still pending: every remaining node
                // is unreachable (should not happen in an acyclic graph).
                warn!(pending, "scheduler drained with pending actions");
                break;
            };
            let (id, elapsed, outcome) = joined
                .map_err(|error| GantryError::Other(format!("scheduler task failed: {error}")))?;

            pending -= 1;
            durations[id] = elapsed;
            let name = self
                .graph
                .get(id)
                .map(|node| node.qualified_name.clone())
                .unwrap_or_default();

            match outcome {
                Ok(()) => {
                    status[id] = Some(ActionStatus::Succeeded);
                    self.reporters.broadcast(&RunEvent::Succeeded {
                        id,
                        name,
                        duration: elapsed,
                    });
                    for child in self.graph.children(id) {
                        if runnable[*child] && status[*child].is_none() {
                            blockers[*child] -= 1;
                            if blockers[*child] == 0 {
                                ready.push(*child);
                            }
                        }
                    }
                }
                Err(error) => {
                    debug!(action = %name, error = %error, "action failed");
                    self.reporters.broadcast(&RunEvent::Failed {
                        id,
                        name: name.clone(),
                        duration: elapsed,
                        error: error.to_string(),
                    });
                    status[id] = Some(ActionStatus::Failed(error.to_string()));

                    // No dependent of a failure may start; siblings already
                    // in flight are left to finish. Propagation follows
                    // runnable paths only: a config-skipped node resolves its
                    // outputs from an earlier run, so its dependents do not
                    // consume anything the failed action was going to produce.
                    let mut to_skip: Vec<usize> = self.graph.children(id).to_vec();
                    while let Some(dependent) = to_skip.pop() {
                        if runnable[dependent] && status[dependent].is_none() {
                            status[dependent] = Some(ActionStatus::Skipped);
                            pending -= 1;
                            self.reporters.broadcast(&RunEvent::Skipped {
                                id: dependent,
                                name: self
                                    .graph
                                    .get(dependent)
                                    .map(|node| node.qualified_name.clone())
                                    .unwrap_or_default(),
                                reason: format!("ancestor '{name}' failed"),
                            });
                            to_skip.extend_from_slice(self.graph.children(dependent));
                        }
                    }
                }
            }
        }

        let results: Vec<ActionResult> = self
            .graph
            .nodes()
            .iter()
            .map(|node| ActionResult {
                id: node.id,
                qualified_name: node.qualified_name.clone(),
                outputs: node.outputs.clone(),
                status: status[node.id].clone().unwrap_or(ActionStatus::Skipped),
                duration: durations[node.id],
            })
            .collect();
        let report = ExecutionReport::new(results);

        let (succeeded, failed, skipped, _) = report.counts();
        self.reporters.broadcast(&RunEvent::RunCompleted {
            total: succeeded + failed + skipped,
            succeeded,
            failed,
            skipped,
            duration: run_started.elapsed(),
        });
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::PathBuf;

    use gantry_core::{Config, StoreKey};
    use gantry_graph::test_support::StubAction;
    use gantry_graph::GraphBuilder;
    use gantry_stores::{FsBlobStore, MemoryTrackingBackend};
    use gantry_tracker::OutputSpec;

    use crate::reporter::CollectingReporter;

    struct Fixture {
        dir: tempfile::TempDir,
        runtime: Arc<RuntimeConfig>,
        store: Arc<FsBlobStore>,
        backend: Arc<MemoryTrackingBackend>,
    }

    fn fixture(dev_mode: bool) -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.project.name = "nlp".to_string();
        config.project.bucket = "experiments".to_string();
        config.store.root = dir.path().join("store");
        config.store.cache_dir = dir.path().join("cache");
        config.tracking.root = dir.path().join("runs");
        config.runner.concurrency = 4;

        Fixture {
            runtime: Arc::new(RuntimeConfig::from_config(&config).with_dev_mode(dev_mode)),
            store: Arc::new(FsBlobStore::new(dir.path().join("store"))),
            backend: Arc::new(MemoryTrackingBackend::default()),
            dir,
        }
    }

    fn runner(fixture: &Fixture, graph: ActionGraph) -> ActionRunner {
        ActionRunner::new(
            graph,
            fixture.runtime.clone(),
            fixture.store.clone(),
            fixture.backend.clone(),
        )
        .unwrap()
    }

    fn write_and_declare(
        work: PathBuf,
        name: &'static str,
        contents: &'static [u8],
    ) -> impl Fn(&mut dyn gantry_tracker::Tracker) -> Result<(), GantryError> + Send + Sync {
        move |tracker| {
            let path = work.join(format!("{name}.bin"));
            fs::write(&path, contents)?;
            tracker.declare_output(
                OutputSpec::new(name, StoreKey::new("experiments", "artifacts"), "dataset")
                    .with_path(path),
            )?;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_linear_pipeline_round_trip() {
        let fixture = fixture(false);
        let work = fixture.dir.path().join("work");
        fs::create_dir_all(&work).unwrap();

        let mut builder = GraphBuilder::new();
        let ingest = builder
            .add_action(
                StubAction::new("build", "ingest", &["dataset"])
                    .with_run(write_and_declare(work.clone(), "dataset", b"raw rows")),
                &[],
            )
            .unwrap();
        let train_work = work.clone();
        builder
            .add_action(
                StubAction::new("model", "train", &["model"]).with_run(move |tracker| {
                    let inputs = tracker.declare_input("dataset")?;
                    let bytes = fs::read(&inputs[0])?;
                    if bytes != b"raw rows" {
                        return Err(GantryError::Other("input bytes differ".to_string()));
                    }
                    let path = train_work.join("model.bin");
                    fs::write(&path, b"weights")?;
                    tracker.declare_output(
                        OutputSpec::new(
                            "model",
                            StoreKey::new("experiments", "artifacts"),
                            "model",
                        )
                        .with_path(path),
                    )?;
                    Ok(())
                }),
                &[ingest],
            )
            .unwrap();

        let runner = runner(&fixture, builder.finish());
        let report = runner.run(&[]).await.unwrap();

        assert!(report.success());
        assert_eq!(
            report.status_of("build.ingest"),
            Some(&ActionStatus::Succeeded)
        );
        assert_eq!(
            report.status_of("model.train"),
            Some(&ActionStatus::Succeeded)
        );

        // Both runs were committed to the backend.
        assert_eq!(fixture.backend.finished_runs().len(), 2);
        assert_eq!(fixture.backend.versions_of("model").len(), 1);
    }

    #[tokio::test]
    async fn test_failure_skips_dependents_but_not_siblings() {
        let fixture = fixture(true);

        let mut builder = GraphBuilder::new();
        let ingest = builder
            .add_action(StubAction::new("build", "ingest-dataset", &["dataset"]), &[])
            .unwrap();
        let train = builder
            .add_action(
                StubAction::new("model", "train-model", &["model"]).failing("corrupt shard"),
                &[ingest],
            )
            .unwrap();
        builder
            .add_action(StubAction::new("model", "eval-model", &["metrics"]), &[train])
            .unwrap();
        builder
            .add_action(StubAction::new("report", "summarize", &["summary"]), &[])
            .unwrap();

        let runner = runner(&fixture, builder.finish());
        let report = runner.run(&[]).await.unwrap();

        assert!(!report.success());
        assert_eq!(report.exit_code(), 1);
        assert_eq!(
            report.status_of("build.ingest-dataset"),
            Some(&ActionStatus::Succeeded)
        );
        assert!(matches!(
            report.status_of("model.train-model"),
            Some(ActionStatus::Failed(message)) if message.contains("corrupt shard")
        ));
        assert_eq!(
            report.status_of("model.eval-model"),
            Some(&ActionStatus::Skipped)
        );
        assert_eq!(
            report.status_of("report.summarize"),
            Some(&ActionStatus::Succeeded)
        );
    }

    #[tokio::test]
    async fn test_filter_runs_matched_and_ancestors_only() {
        let fixture = fixture(true);

        let mut builder = GraphBuilder::new();
        let ingest = builder
            .add_action(StubAction::new("build", "ingest-dataset", &["dataset"]), &[])
            .unwrap();
        let train = builder
            .add_action(StubAction::new("model", "train-model", &["model"]), &[ingest])
            .unwrap();
        builder
            .add_action(StubAction::new("model", "eval-model", &["metrics"]), &[train])
            .unwrap();

        let runner = runner(&fixture, builder.finish());
        let report = runner.run(&["train".to_string()]).await.unwrap();

        assert_eq!(
            report.status_of("build.ingest-dataset"),
            Some(&ActionStatus::Succeeded)
        );
        assert_eq!(
            report.status_of("model.train-model"),
            Some(&ActionStatus::Succeeded)
        );
        assert_eq!(
            report.status_of("model.eval-model"),
            Some(&ActionStatus::NotSelected)
        );
    }

    #[tokio::test]
    async fn test_failure_skips_transitive_dependents() {
        let fixture = fixture(true);

        let mut builder = GraphBuilder::new();
        let a = builder
            .add_action(
                StubAction::new("build", "ingest", &["dataset"]).failing("disk full"),
                &[],
            )
            .unwrap();
        let b = builder
            .add_action(StubAction::new("model", "train", &["model"]), &[a])
            .unwrap();
        builder
            .add_action(StubAction::new("model", "eval", &["metrics"]), &[b])
            .unwrap();

        let runner = runner(&fixture, builder.finish());
        let report = runner.run(&[]).await.unwrap();

        assert!(matches!(
            report.status_of("build.ingest"),
            Some(ActionStatus::Failed(_))
        ));
        assert_eq!(report.status_of("model.train"), Some(&ActionStatus::Skipped));
        assert_eq!(report.status_of("model.eval"), Some(&ActionStatus::Skipped));
    }

    #[tokio::test]
    async fn test_skipped_link_contains_failure_propagation() {
        let fixture = fixture(true);

        // The middle node is config-skipped: its output comes from an
        // earlier run, so the leaf does not consume anything the failing
        // root was going to produce.
        let mut builder = GraphBuilder::new();
        let root = builder
            .add_action(
                StubAction::new("build", "ingest", &["dataset"]).failing("boom"),
                &[],
            )
            .unwrap();
        let pinned = builder
            .add_action_with(StubAction::new("build", "clean", &["clean-data"]), &[root], true)
            .unwrap();
        builder
            .add_action(StubAction::new("model", "train", &["model"]), &[pinned])
            .unwrap();

        let runner = runner(&fixture, builder.finish());
        let report = runner.run(&[]).await.unwrap();

        assert!(matches!(
            report.status_of("build.ingest"),
            Some(ActionStatus::Failed(_))
        ));
        assert_eq!(report.status_of("build.clean"), Some(&ActionStatus::Skipped));
        assert_eq!(
            report.status_of("model.train"),
            Some(&ActionStatus::Succeeded)
        );
    }

    #[tokio::test]
    async fn test_config_skip_is_honored_and_children_still_run() {
        let fixture = fixture(true);

        let mut builder = GraphBuilder::new();
        let skipped = builder
            .add_action_with(StubAction::new("build", "ingest", &["dataset"]), &[], true)
            .unwrap();
        builder
            .add_action(StubAction::new("model", "train", &["model"]), &[skipped])
            .unwrap();

        let runner = runner(&fixture, builder.finish());
        let report = runner.run(&[]).await.unwrap();

        assert_eq!(report.status_of("build.ingest"), Some(&ActionStatus::Skipped));
        assert_eq!(
            report.status_of("model.train"),
            Some(&ActionStatus::Succeeded)
        );
        assert!(report.success());
    }

    #[tokio::test]
    async fn test_direct_filter_match_overrides_skip() {
        let fixture = fixture(true);

        let mut builder = GraphBuilder::new();
        builder
            .add_action_with(StubAction::new("build", "ingest", &["dataset"]), &[], true)
            .unwrap();

        let runner = runner(&fixture, builder.finish());
        let report = runner.run(&["ingest".to_string()]).await.unwrap();
        assert_eq!(
            report.status_of("build.ingest"),
            Some(&ActionStatus::Succeeded)
        );
    }

    #[test]
    fn test_plan_lists_without_executing() {
        let fixture = fixture(true);

        let mut builder = GraphBuilder::new();
        let ingest = builder
            .add_action(
                StubAction::new("build", "ingest", &["dataset"]).failing("must never run"),
                &[],
            )
            .unwrap();
        builder
            .add_action(StubAction::new("model", "train", &["model"]), &[ingest])
            .unwrap();

        let runner = runner(&fixture, builder.finish());
        let plan = runner.plan(&["train".to_string()]);

        assert_eq!(plan.len(), 2);
        assert!(plan.iter().all(|listing| listing.would_run));
        assert_eq!(plan[0].qualified_name, "build.ingest");
        assert_eq!(plan[1].outputs, vec!["model"]);
    }

    #[tokio::test]
    async fn test_reporter_sees_lifecycle_events() {
        let fixture = fixture(true);

        let mut builder = GraphBuilder::new();
        builder
            .add_action(StubAction::new("build", "ingest", &["dataset"]), &[])
            .unwrap();

        let mut runner = runner(&fixture, builder.finish());
        let collector = Arc::new(CollectingReporter::default());
        runner.add_reporter(collector.clone());

        runner.run(&[]).await.unwrap();

        let events = collector.events();
        assert!(events
            .iter()
            .any(|event| matches!(event, RunEvent::Started { .. })));
        assert!(events
            .iter()
            .any(|event| matches!(event, RunEvent::Succeeded { .. })));
        assert!(events
            .iter()
            .any(|event| matches!(event, RunEvent::RunCompleted { .. })));
    }

    #[tokio::test]
    async fn test_siblings_run_concurrently_within_pool() {
        let fixture = fixture(true);

        // Two independent roots and a join node; the join must observe both
        // parents' outputs in its input namespace.
        let mut builder = GraphBuilder::new();
        let left = builder
            .add_action(StubAction::new("build", "left", &["left-data"]), &[])
            .unwrap();
        let right = builder
            .add_action(StubAction::new("build", "right", &["right-data"]), &[])
            .unwrap();
        builder
            .add_action(StubAction::new("model", "join", &["joined"]), &[left, right])
            .unwrap();

        let runner = runner(&fixture, builder.finish());
        let report = runner.run(&[]).await.unwrap();
        assert!(report.success());
        let (succeeded, _, _, _) = report.counts();
        assert_eq!(succeeded, 3);
    }
}
