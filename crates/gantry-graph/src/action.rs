//! The action capability interface

use gantry_core::GantryError;
use gantry_tracker::Tracker;

/// A declared, named unit of trackable work.
///
/// Actions are constructed during graph building and are immutable
/// afterwards; each selected action executes at most once per run. The
/// `job_group`/`job_type` pair is organizational: group is the general goal
/// ("build", "model"), type the specific step ("munge", "evaluate").
///
/// An action's identity is its group, type, and a deterministic encoding of
/// its configuration; two registrations with identical identity are a
/// build-time error.
pub trait Action: Send + Sync {
    /// Coarse category of this action.
    fn job_group(&self) -> &str;

    /// Specific category of this action.
    fn job_type(&self) -> &str;

    /// Names of the artifacts this action will produce when run.
    ///
    /// Every name declared through the tracker at run time must appear here.
    fn outputs(&self) -> Vec<String>;

    /// Configuration parameters captured at construction.
    ///
    /// If the action were a function call, these would be its arguments
    /// (hyperparameters, flags, ...). The encoding must be deterministic for
    /// a given configuration; it feeds the action's identity.
    fn config(&self) -> serde_json::Value {
        serde_json::Value::Object(serde_json::Map::new())
    }

    /// Execute this action.
    ///
    /// All artifact and metric I/O goes through `tracker`.
    fn run(&self, tracker: &mut dyn Tracker) -> Result<(), GantryError>;
}
