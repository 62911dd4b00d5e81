//! Stub actions for tests

use std::sync::Arc;

use gantry_core::GantryError;
use gantry_tracker::Tracker;

use crate::action::Action;

type RunFn = dyn Fn(&mut dyn Tracker) -> Result<(), GantryError> + Send + Sync;

/// Configurable action for graph and scheduler tests.
pub struct StubAction {
    job_group: String,
    job_type: String,
    outputs: Vec<String>,
    config: serde_json::Value,
    run_fn: Option<Arc<RunFn>>,
}

impl StubAction {
    /// A stub that succeeds without doing anything.
    pub fn new(job_group: &str, job_type: &str, outputs: &[&str]) -> Self {
        Self {
            job_group: job_group.to_string(),
            job_type: job_type.to_string(),
            outputs: outputs.iter().map(|s| s.to_string()).collect(),
            config: serde_json::Value::Object(serde_json::Map::new()),
            run_fn: None,
        }
    }

    /// Attach configuration parameters.
    pub fn with_config(mut self, config: serde_json::Value) -> Self {
        self.config = config;
        self
    }

    /// Attach a run procedure.
    pub fn with_run(
        mut self,
        run_fn: impl Fn(&mut dyn Tracker) -> Result<(), GantryError> + Send + Sync + 'static,
    ) -> Self {
        self.run_fn = Some(Arc::new(run_fn));
        self
    }

    /// A stub whose run procedure always fails with `message`.
    pub fn failing(self, message: &str) -> Self {
        let message = message.to_string();
        self.with_run(move |_| Err(GantryError::Other(message.clone())))
    }
}

impl Action for StubAction {
    fn job_group(&self) -> &str {
        &self.job_group
    }

    fn job_type(&self) -> &str {
        &self.job_type
    }

    fn outputs(&self) -> Vec<String> {
        self.outputs.clone()
    }

    fn config(&self) -> serde_json::Value {
        self.config.clone()
    }

    fn run(&self, tracker: &mut dyn Tracker) -> Result<(), GantryError> {
        match &self.run_fn {
            Some(run_fn) => run_fn(tracker),
            None => Ok(()),
        }
    }
}
