//! Gantry Runner - selection and scheduling of action graphs
//!
//! This crate converts a built action graph into an executed schedule:
//! selection filters with ancestor closure, a bounded concurrent scheduler
//! that opens a tracker session around every action, failure containment to
//! transitive dependents, and per-action execution reports.

pub mod report;
pub mod reporter;
pub mod scheduler;

pub use report::{ActionResult, ActionStatus, ExecutionReport};
pub use reporter::{CollectingReporter, ReporterRegistry, RunEvent, RunReporter, TracingReporter};
pub use scheduler::{ActionListing, ActionRunner};
