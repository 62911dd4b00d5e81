//! Run progress reporting

use std::sync::Arc;
use std::time::Duration;

/// Events emitted while a run executes
#[derive(Debug, Clone)]
pub enum RunEvent {
    /// An action is starting execution
    Started { id: usize, name: String },
    /// An action completed successfully
    Succeeded {
        id: usize,
        name: String,
        duration: Duration,
    },
    /// An action failed
    Failed {
        id: usize,
        name: String,
        duration: Duration,
        error: String,
    },
    /// An action was skipped
    Skipped {
        id: usize,
        name: String,
        reason: String,
    },
    /// The whole run finished
    RunCompleted {
        total: usize,
        succeeded: usize,
        failed: usize,
        skipped: usize,
        duration: Duration,
    },
}

/// Trait for reporting run progress
pub trait RunReporter: Send + Sync {
    /// Handle a run event
    fn report(&self, event: &RunEvent);
}

/// Simple reporter that logs to tracing
#[derive(Debug, Default)]
pub struct TracingReporter;

impl RunReporter for TracingReporter {
    fn report(&self, event: &RunEvent) {
        match event {
            RunEvent::Started { name, .. } => {
                tracing::info!("Running {}", name);
            }
            RunEvent::Succeeded { name, duration, .. } => {
                tracing::info!("{} succeeded in {:.1}s", name, duration.as_secs_f64());
            }
            RunEvent::Failed {
                name,
                duration,
                error,
                ..
            } => {
                tracing::error!("{} failed after {:.1}s: {}", name, duration.as_secs_f64(), error);
            }
            RunEvent::Skipped { name, reason, .. } => {
                tracing::info!("{} skipped: {}", name, reason);
            }
            RunEvent::RunCompleted {
                total,
                succeeded,
                failed,
                skipped,
                duration,
            } => {
                tracing::info!(
                    "Run complete: {}/{} succeeded, {} failed, {} skipped ({:.1}s)",
                    succeeded,
                    total,
                    failed,
                    skipped,
                    duration.as_secs_f64()
                );
            }
        }
    }
}

/// Reporter that collects events for later inspection (useful for testing)
#[derive(Debug, Default)]
pub struct CollectingReporter {
    events: std::sync::Mutex<Vec<RunEvent>>,
}

impl CollectingReporter {
    /// Get all collected events
    pub fn events(&self) -> Vec<RunEvent> {
        self.events.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

impl RunReporter for CollectingReporter {
    fn report(&self, event: &RunEvent) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event.clone());
        }
    }
}

/// Registry of run reporters
pub struct ReporterRegistry {
    reporters: Vec<Arc<dyn RunReporter>>,
}

impl ReporterRegistry {
    /// A registry with the tracing reporter installed.
    pub fn new() -> Self {
        Self {
            reporters: vec![Arc::new(TracingReporter)],
        }
    }

    /// A registry with no reporters.
    pub fn empty() -> Self {
        Self {
            reporters: Vec::new(),
        }
    }

    /// Add a reporter.
    pub fn register(&mut self, reporter: Arc<dyn RunReporter>) {
        self.reporters.push(reporter);
    }

    /// Broadcast an event to all registered reporters
    pub fn broadcast(&self, event: &RunEvent) {
        for reporter in &self.reporters {
            reporter.report(event);
        }
    }
}

impl Default for ReporterRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_reporter() {
        let reporter = CollectingReporter::default();
        reporter.report(&RunEvent::Started {
            id: 0,
            name: "model.train".to_string(),
        });
        reporter.report(&RunEvent::Succeeded {
            id: 0,
            name: "model.train".to_string(),
            duration: Duration::from_secs(3),
        });
        assert_eq!(reporter.events().len(), 2);
    }

    #[test]
    fn test_broadcast_reaches_all_reporters() {
        let first = Arc::new(CollectingReporter::default());
        let second = Arc::new(CollectingReporter::default());

        let mut registry = ReporterRegistry::empty();
        registry.register(first.clone());
        registry.register(second.clone());

        registry.broadcast(&RunEvent::Started {
            id: 0,
            name: "build.ingest".to_string(),
        });
        assert_eq!(first.events().len(), 1);
        assert_eq!(second.events().len(), 1);
    }

    #[test]
    fn test_tracing_reporter_handles_all_events() {
        let reporter = TracingReporter;
        reporter.report(&RunEvent::Failed {
            id: 0,
            name: "model.train".to_string(),
            duration: Duration::from_secs(1),
            error: "boom".to_string(),
        });
        reporter.report(&RunEvent::RunCompleted {
            total: 1,
            succeeded: 0,
            failed: 1,
            skipped: 0,
            duration: Duration::from_secs(1),
        });
    }
}
