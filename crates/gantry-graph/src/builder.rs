//! The action builder contract

use gantry_core::GantryError;

use crate::graph::{ActionGraph, GraphBuilder};

/// Produces a project's action graph from its configuration.
///
/// Implementations register every action the project can run, parents first:
///
/// ```ignore
/// use gantry_core::GantryError;
/// use gantry_graph::{ActionBuilder, GraphBuilder};
/// use gantry_graph::test_support::StubAction;
///
/// struct Pipeline;
///
/// impl ActionBuilder for Pipeline {
///     fn project_name(&self) -> &str {
///         "nlp"
///     }
///
///     fn build_actions(&self, graph: &mut GraphBuilder) -> Result<(), GantryError> {
///         let ingest = graph.add_action(StubAction::new("build", "ingest", &["dataset"]), &[])?;
///         graph.add_action(StubAction::new("model", "train", &["model"]), &[ingest])?;
///         Ok(())
///     }
/// }
///
/// let graph = Pipeline.build().unwrap();
/// assert_eq!(graph.len(), 2);
/// ```
pub trait ActionBuilder {
    /// The project namespace all of this builder's artifacts live in.
    fn project_name(&self) -> &str;

    /// Register the project's actions.
    fn build_actions(&self, graph: &mut GraphBuilder) -> Result<(), GantryError>;

    /// Build the complete graph.
    fn build(&self) -> Result<ActionGraph, GantryError> {
        let mut builder = GraphBuilder::new();
        self.build_actions(&mut builder)?;
        Ok(builder.finish())
    }
}
