//! Gantry - provenance-first pipeline runner
//!
//! Projects declare a graph of actions (named, parameterized units of work
//! with explicit parent dependencies and output artifact names) through an
//! [`ActionBuilder`]; gantry schedules the graph, and every action runs inside
//! a tracker session that mediates versioned artifact I/O against a
//! content-addressed store.
//!
//! A pipeline binary is just:
//!
//! ```ignore
//! fn main() -> anyhow::Result<std::process::ExitCode> {
//!     gantry::launch(MyPipeline)
//! }
//! ```
//!
//! where `MyPipeline` implements [`ActionBuilder`]. The binary then accepts
//! the standard runner flags (`--only`, `--list`, `--graph`, `--dev`, ...).

mod args;
mod exit_codes;
mod logging;
mod output;

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use console::style;
use tracing::warn;

pub use args::RunnerArgs;
pub use output::ConsoleReporter;

pub use gantry_core::{
    ArtifactName, ArtifactRef, Config, GantryError, Provenance, Result, RuntimeConfig, StoreKey,
    StoredObject, VersionedStoreKey,
};
pub use gantry_graph::{Action, ActionBuilder, ActionGraph, ActionHandle, GraphBuilder};
pub use gantry_runner::{
    ActionListing, ActionResult, ActionRunner, ActionStatus, ExecutionReport, RunEvent,
    RunReporter,
};
pub use gantry_stores::{BlobStore, FsBlobStore, FsTrackingBackend, TrackingBackend};
pub use gantry_tracker::{OutputSpec, SessionFactory, Tracker};

/// Parse command-line arguments and run a pipeline.
///
/// The conventional entry point for pipeline binaries; see the crate docs.
pub fn launch(builder: impl ActionBuilder) -> anyhow::Result<ExitCode> {
    launch_with_args(builder, RunnerArgs::parse())
}

/// Run a pipeline with already-parsed arguments.
pub fn launch_with_args(builder: impl ActionBuilder, args: RunnerArgs) -> anyhow::Result<ExitCode> {
    let _guard = logging::init_tracing(args.debug);

    // Environment passthrough happens once, at the entry point; nothing
    // deeper in the stack reads ambient environment state.
    for pair in &args.extra_env_vars {
        match pair.split_once('=') {
            Some((key, value)) => std::env::set_var(key, value),
            None => warn!(var = %pair, "ignoring malformed --extra-env-var (expected KEY=VALUE)"),
        }
    }

    let cwd = std::env::current_dir()?;
    let runtime = match assemble_runtime(builder.project_name(), &args, &cwd) {
        Ok(runtime) => Arc::new(runtime),
        Err(error) => {
            eprintln!("{} {error}", style("configuration error:").red().bold());
            return Ok(ExitCode::from(exit_codes::BUILD_ERROR));
        }
    };

    let graph = match builder.build() {
        Ok(graph) => graph,
        Err(error) => {
            eprintln!("{} {error}", style("graph construction error:").red().bold());
            return Ok(ExitCode::from(exit_codes::BUILD_ERROR));
        }
    };

    let store = Arc::new(FsBlobStore::new(&runtime.store_root));
    let backend = Arc::new(FsTrackingBackend::new(&runtime.tracking_root));
    let mut runner = ActionRunner::new(graph, runtime.clone(), store, backend)?;
    runner.add_reporter(ConsoleReporter::shared());

    if args.list {
        output::print_listing(&runner.plan(&args.only));
        return Ok(ExitCode::from(exit_codes::SUCCESS));
    }
    if args.graph {
        output::print_graph(runner.graph());
        return Ok(ExitCode::from(exit_codes::SUCCESS));
    }

    if runtime.dev_mode {
        println!(
            "{}",
            style("⚠ DEV MODE: nothing will be tracked").red().bold()
        );
    }

    let tokio_runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    let report = tokio_runtime.block_on(runner.run(&args.only))?;
    output::print_report(&report);

    Ok(ExitCode::from(if report.success() {
        exit_codes::SUCCESS
    } else {
        exit_codes::ACTION_FAILURE
    }))
}

/// Merge the discovered config file, the builder's project identity, and the
/// command line into the immutable runtime configuration.
fn assemble_runtime(
    project_name: &str,
    args: &RunnerArgs,
    cwd: &Path,
) -> Result<RuntimeConfig> {
    let mut config = match gantry_core::find_config(cwd) {
        Some(path) => gantry_core::read_config(&path)?,
        None => Config::default(),
    };

    // The builder owns the project identity; the config file fills in
    // storage locations and scheduling knobs.
    config.project.name = project_name.to_string();
    if config.project.bucket.is_empty() {
        config.project.bucket = project_name.to_string();
    }
    gantry_core::validate_config(&config)?;

    let overrides = args
        .artifact_overrides
        .iter()
        .map(|descriptor| ArtifactName::parse(descriptor))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut runtime = RuntimeConfig::from_config(&config)
        .with_dev_mode(args.dev)
        .with_debug(args.debug)
        .with_tags(args.tags.iter().map(|tag| tag.trim().to_string()).collect())
        .with_artifact_overrides(overrides)
        .with_provenance(Provenance::capture(cwd));
    if let Some(concurrency) = args.concurrency {
        runtime = runtime.with_concurrency(concurrency.max(1));
    }
    Ok(runtime)
}
