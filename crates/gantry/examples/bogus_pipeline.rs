//! A bogus pipeline for trying gantry outside a real project.
//!
//! Enough to exercise a run end to end, including `--dev` mode:
//!
//! ```text
//! cargo run --example bogus_pipeline -- --dev
//! cargo run --example bogus_pipeline -- --list
//! ```

use std::fs;
use std::process::ExitCode;

use gantry::{Action, ActionBuilder, GantryError, GraphBuilder, OutputSpec, StoreKey, Tracker};

/// Prints a message to let you know it ran and creates an output artifact.
struct BogusParentAction;

impl Action for BogusParentAction {
    fn job_group(&self) -> &str {
        "bogus"
    }

    fn job_type(&self) -> &str {
        "parent"
    }

    fn outputs(&self) -> Vec<String> {
        vec!["bogus-parent".to_string()]
    }

    fn run(&self, tracker: &mut dyn Tracker) -> Result<(), GantryError> {
        let scratch = std::env::temp_dir();
        let output_path = scratch.join("bogus-output1.txt");
        fs::write(&output_path, "BogusParentAction output!\n")?;

        tracker.declare_output(
            OutputSpec::new(
                "bogus-parent",
                StoreKey::new("bogus-bucket", "key1"),
                "bogus-artifact",
            )
            .with_path(&output_path)
            .with_strip_prefix(&scratch)
            .with_metadata(serde_json::json!({ "meaning-of-life": 42 })),
        )?;
        println!("Hello world from BogusParentAction.");
        Ok(())
    }
}

/// Prints a message to let you know it ran and reads the parent's artifact.
struct BogusChildAction;

impl Action for BogusChildAction {
    fn job_group(&self) -> &str {
        "bogus"
    }

    fn job_type(&self) -> &str {
        "child"
    }

    fn outputs(&self) -> Vec<String> {
        vec!["bogus-child".to_string()]
    }

    fn run(&self, tracker: &mut dyn Tracker) -> Result<(), GantryError> {
        let input_paths = tracker.declare_input("bogus-parent")?;
        let text = fs::read_to_string(&input_paths[0])?;

        println!("Hello world from BogusChildAction.");
        println!("Parent action created artifact with this text: {text:?}");
        Ok(())
    }
}

struct BogusPipeline;

impl ActionBuilder for BogusPipeline {
    fn project_name(&self) -> &str {
        "bogus-project"
    }

    fn build_actions(&self, graph: &mut GraphBuilder) -> Result<(), GantryError> {
        let parent = graph.add_action(BogusParentAction, &[])?;
        graph.add_action(BogusChildAction, &[parent])?;
        Ok(())
    }
}

fn main() -> anyhow::Result<ExitCode> {
    gantry::launch(BogusPipeline)
}
