//! Execution reports

use std::time::Duration;

/// Final status of one action in a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ActionStatus {
    /// Ran and returned successfully
    Succeeded,
    /// Ran and failed, with the originating error message
    Failed(String),
    /// Selected but not run: skipped by configuration or because an
    /// ancestor failed
    Skipped,
    /// Outside the selected subgraph
    NotSelected,
}

impl ActionStatus {
    /// Whether this status represents a failure.
    pub fn is_failure(&self) -> bool {
        matches!(self, Self::Failed(_))
    }
}

/// Outcome of one action.
#[derive(Debug, Clone)]
pub struct ActionResult {
    /// Node id in declaration order
    pub id: usize,
    /// Fully qualified action name
    pub qualified_name: String,
    /// Declared output artifact names
    pub outputs: Vec<String>,
    /// Final status
    pub status: ActionStatus,
    /// Wall-clock execution time (zero when the action did not run)
    pub duration: Duration,
}

/// Per-action outcomes of a whole run, in declaration order.
#[derive(Debug, Clone)]
pub struct ExecutionReport {
    results: Vec<ActionResult>,
}

impl ExecutionReport {
    pub(crate) fn new(results: Vec<ActionResult>) -> Self {
        Self { results }
    }

    /// All results, in declaration order.
    pub fn results(&self) -> &[ActionResult] {
        &self.results
    }

    /// Status of a specific action by qualified name.
    pub fn status_of(&self, qualified_name: &str) -> Option<&ActionStatus> {
        self.results
            .iter()
            .find(|result| result.qualified_name == qualified_name)
            .map(|result| &result.status)
    }

    /// Whether every selected action ran successfully.
    pub fn success(&self) -> bool {
        !self.results.iter().any(|result| result.status.is_failure())
    }

    /// Process exit code reflecting `success`.
    pub fn exit_code(&self) -> i32 {
        if self.success() {
            0
        } else {
            1
        }
    }

    /// Counts of (succeeded, failed, skipped, not selected).
    pub fn counts(&self) -> (usize, usize, usize, usize) {
        let mut counts = (0, 0, 0, 0);
        for result in &self.results {
            match result.status {
                ActionStatus::Succeeded => counts.0 += 1,
                ActionStatus::Failed(_) => counts.1 += 1,
                ActionStatus::Skipped => counts.2 += 1,
                ActionStatus::NotSelected => counts.3 += 1,
            }
        }
        counts
    }

    /// Human-readable per-action summary.
    pub fn summary(&self) -> String {
        let mut lines = String::new();
        for result in &self.results {
            let status = match &result.status {
                ActionStatus::Succeeded => "succeeded".to_string(),
                ActionStatus::Failed(error) => format!("failed: {error}"),
                ActionStatus::Skipped => "skipped".to_string(),
                ActionStatus::NotSelected => "not selected".to_string(),
            };
            lines.push_str(&format!("{} -> {}\n", result.qualified_name, status));
        }
        let (succeeded, failed, skipped, not_selected) = self.counts();
        lines.push_str(&format!(
            "{succeeded} succeeded, {failed} failed, {skipped} skipped, {not_selected} not selected\n"
        ));
        lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn result(name: &str, status: ActionStatus) -> ActionResult {
        ActionResult {
            id: 0,
            qualified_name: name.to_string(),
            outputs: vec![],
            status,
            duration: Duration::ZERO,
        }
    }

    #[test]
    fn test_success_and_exit_code() {
        let report = ExecutionReport::new(vec![
            result("a", ActionStatus::Succeeded),
            result("b", ActionStatus::NotSelected),
        ]);
        assert!(report.success());
        assert_eq!(report.exit_code(), 0);

        let report = ExecutionReport::new(vec![
            result("a", ActionStatus::Failed("boom".to_string())),
            result("b", ActionStatus::Skipped),
        ]);
        assert!(!report.success());
        assert_eq!(report.exit_code(), 1);
    }

    #[test]
    fn test_status_of() {
        let report = ExecutionReport::new(vec![result("model.train", ActionStatus::Succeeded)]);
        assert_eq!(
            report.status_of("model.train"),
            Some(&ActionStatus::Succeeded)
        );
        assert_eq!(report.status_of("absent"), None);
    }

    #[test]
    fn test_summary_carries_error_message() {
        let report = ExecutionReport::new(vec![result(
            "model.train",
            ActionStatus::Failed("corrupt shard".to_string()),
        )]);
        let summary = report.summary();
        assert!(summary.contains("model.train -> failed: corrupt shard"));
        assert!(summary.contains("0 succeeded, 1 failed"));
    }

    #[test]
    fn test_counts() {
        let report = ExecutionReport::new(vec![
            result("a", ActionStatus::Succeeded),
            result("b", ActionStatus::Succeeded),
            result("c", ActionStatus::Failed("x".to_string())),
            result("d", ActionStatus::Skipped),
            result("e", ActionStatus::NotSelected),
        ]);
        assert_eq!(report.counts(), (2, 1, 1, 1));
    }
}
