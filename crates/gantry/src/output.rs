//! Styled console output for pipeline runs

use std::sync::Arc;
use std::time::Duration;

use console::style;

use gantry_graph::ActionGraph;
use gantry_runner::{ActionListing, ExecutionReport, RunEvent, RunReporter};

/// Reporter that prints per-action progress to the console.
#[derive(Debug, Default)]
pub struct ConsoleReporter;

impl ConsoleReporter {
    /// Boxed for registration with a runner.
    pub fn shared() -> Arc<Self> {
        Arc::new(Self)
    }
}

impl RunReporter for ConsoleReporter {
    fn report(&self, event: &RunEvent) {
        match event {
            RunEvent::Started { name, .. } => {
                println!("{} {}", style("→ running").green(), style(name).bold());
            }
            RunEvent::Succeeded { name, duration, .. } => {
                println!(
                    "{} {} ({})",
                    style("✓").green().bold(),
                    name,
                    format_duration(*duration)
                );
            }
            RunEvent::Failed {
                name,
                duration,
                error,
                ..
            } => {
                println!(
                    "{} {} ({}): {}",
                    style("✗").red().bold(),
                    style(name).red(),
                    format_duration(*duration),
                    error
                );
            }
            RunEvent::Skipped { name, reason, .. } => {
                println!(
                    "{} {} ({})",
                    style("↷").yellow(),
                    style(name).yellow().italic(),
                    reason
                );
            }
            RunEvent::RunCompleted {
                total,
                succeeded,
                failed,
                skipped,
                duration,
            } => {
                let summary = format!(
                    "{succeeded}/{total} succeeded, {failed} failed, {skipped} skipped \
                     ({})",
                    format_duration(*duration)
                );
                if *failed > 0 {
                    println!("{}", style(summary).red());
                } else {
                    println!("{}", style(summary).green());
                }
            }
        }
    }
}

fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs_f64();
    if secs < 60.0 {
        format!("{secs:.1}s")
    } else {
        format!("{}m{:02}s", duration.as_secs() / 60, duration.as_secs() % 60)
    }
}

/// Print the dry-run listing: one line per action.
pub fn print_listing(listings: &[ActionListing]) {
    for listing in listings {
        let marker = if listing.would_run {
            style(" GO ").black().on_green().to_string()
        } else if listing.selected {
            style("SKIP").black().on_yellow().to_string()
        } else {
            style(" -- ").dim().to_string()
        };
        println!(
            "{} [{}] {}",
            marker,
            style(&listing.job_type).bold(),
            listing.outputs.join(" ")
        );
    }
}

/// Print the dependency graph as an indented tree.
pub fn print_graph(graph: &ActionGraph) {
    for node in graph.nodes() {
        if node.parents.is_empty() {
            print_subtree(graph, node.id, 0);
        }
    }
}

fn print_subtree(graph: &ActionGraph, id: usize, depth: usize) {
    let Some(node) = graph.get(id) else {
        return;
    };
    let indent = "   ".repeat(depth);
    let connector = if depth == 0 { "" } else { "└─ " };
    println!(
        "{indent}{connector}{} [{}]",
        style(&node.qualified_name).bold(),
        node.outputs.join(", ")
    );
    for child in graph.children(id) {
        print_subtree(graph, *child, depth + 1);
    }
}

/// Print the final per-action report.
pub fn print_report(report: &ExecutionReport) {
    print!("{}", report.summary());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(Duration::from_secs(95)), "1m35s");
    }
}
