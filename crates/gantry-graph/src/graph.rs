//! Action graph construction and queries
//!
//! Graphs are built parents-first: registering an action requires handles to
//! already-registered parents, which makes cycles structurally impossible.
//! There is no separate cycle check because none is needed.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, info, instrument};

use gantry_core::{validate_name_component, GantryError, GraphError};
use gantry_tracker::SessionSpec;

use crate::action::Action;

/// Handle to a registered action, usable as a parent reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ActionHandle(pub(crate) usize);

impl ActionHandle {
    /// Index of the action in declaration order.
    pub fn index(&self) -> usize {
        self.0
    }
}

/// One registered action with its derived graph state.
pub struct ActionNode {
    /// Index in declaration order
    pub id: usize,
    /// Fully qualified name (`job_group.job_type`, disambiguated if needed)
    pub qualified_name: String,
    /// Coarse category
    pub job_group: String,
    /// Specific category
    pub job_type: String,
    /// Captured configuration parameters
    pub config: serde_json::Value,
    /// Fingerprint of the canonical configuration encoding
    pub config_digest: String,
    /// Declared output artifact names
    pub outputs: Vec<String>,
    /// Parent action ids, in declaration order
    pub parents: Vec<usize>,
    /// Whether this action should be skipped under the current configuration
    pub skip: bool,
    pub(crate) action: Arc<dyn Action>,
}

impl ActionNode {
    /// The action's run procedure and declared interface.
    pub fn action(&self) -> &Arc<dyn Action> {
        &self.action
    }

    /// Text the selection filter matches against: the qualified name plus
    /// the declared output names.
    pub fn match_text(&self) -> String {
        let mut text = self.qualified_name.clone();
        for output in &self.outputs {
            text.push(' ');
            text.push_str(output);
        }
        text
    }
}

/// Builds an [`ActionGraph`] one action at a time.
#[derive(Default)]
pub struct GraphBuilder {
    nodes: Vec<ActionNode>,
    identities: HashSet<(String, String, String)>,
    name_counts: HashMap<(String, String), usize>,
    output_owners: HashMap<String, usize>,
}

impl GraphBuilder {
    /// Create an empty builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an action with its parents.
    pub fn add_action(
        &mut self,
        action: impl Action + 'static,
        parents: &[ActionHandle],
    ) -> Result<ActionHandle, GantryError> {
        self.add_action_with(action, parents, false)
    }

    /// Register an action, optionally marking it skipped.
    ///
    /// Skipped actions stay in the graph (their outputs resolve from earlier
    /// runs) but are not executed unless a selection filter names them
    /// directly.
    pub fn add_action_with(
        &mut self,
        action: impl Action + 'static,
        parents: &[ActionHandle],
        skip: bool,
    ) -> Result<ActionHandle, GantryError> {
        let action: Arc<dyn Action> = Arc::new(action);
        let job_group = action.job_group().to_string();
        let job_type = action.job_type().to_string();
        let outputs = action.outputs();
        let config = action.config();

        for parent in parents {
            if parent.0 >= self.nodes.len() {
                return Err(GraphError::InvalidParent(parent.0).into());
            }
        }

        let base_name = format!("{job_group}.{job_type}");
        if outputs.is_empty() {
            return Err(GraphError::NoOutputs(base_name).into());
        }
        for output in &outputs {
            validate_name_component(output, "artifact")?;
            if let Some(owner) = self.output_owners.get(output) {
                return Err(GraphError::DuplicateOutput {
                    output: output.clone(),
                    producer: self.nodes[*owner].qualified_name.clone(),
                }
                .into());
            }
        }

        let config_digest = gantry_core::digest_value(&config);
        let identity = (job_group.clone(), job_type.clone(), config_digest.clone());
        if !self.identities.insert(identity) {
            return Err(GraphError::DuplicateAction(base_name).into());
        }

        // Same group and type with a different config is legal; later
        // registrations get an occurrence suffix to stay unique.
        let occurrence = self
            .name_counts
            .entry((job_group.clone(), job_type.clone()))
            .and_modify(|count| *count += 1)
            .or_insert(1);
        let qualified_name = if *occurrence == 1 {
            base_name
        } else {
            format!("{base_name}.{occurrence}")
        };

        let id = self.nodes.len();
        for output in &outputs {
            self.output_owners.insert(output.clone(), id);
        }

        debug!(action = %qualified_name, parents = parents.len(), skip, "registered action");
        self.nodes.push(ActionNode {
            id,
            qualified_name,
            job_group,
            job_type,
            config,
            config_digest,
            outputs,
            parents: parents.iter().map(|p| p.0).collect(),
            skip,
            action,
        });
        Ok(ActionHandle(id))
    }

    /// Finish building.
    #[instrument(skip_all, fields(actions = self.nodes.len()))]
    pub fn finish(self) -> ActionGraph {
        let mut children: Vec<Vec<usize>> = vec![Vec::new(); self.nodes.len()];
        for node in &self.nodes {
            for parent in &node.parents {
                children[*parent].push(node.id);
            }
        }
        info!(actions = self.nodes.len(), "action graph built");
        ActionGraph {
            nodes: self.nodes,
            children,
        }
    }
}

/// A complete, acyclic graph of actions in declaration order.
///
/// Declaration order is already a topological order: every parent handle
/// predates its children by construction.
pub struct ActionGraph {
    nodes: Vec<ActionNode>,
    children: Vec<Vec<usize>>,
}

impl ActionGraph {
    /// All nodes, in declaration order.
    pub fn nodes(&self) -> &[ActionNode] {
        &self.nodes
    }

    /// Get a node by id.
    pub fn get(&self, id: usize) -> Option<&ActionNode> {
        self.nodes.get(id)
    }

    /// Ids of the nodes that depend on `id`.
    pub fn children(&self, id: usize) -> &[usize] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Number of actions in the graph.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the graph has no actions.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// The input namespace of a node: its parents' declared outputs, in
    /// parent declaration order then output declaration order.
    pub fn input_namespace(&self, id: usize) -> Vec<String> {
        let Some(node) = self.nodes.get(id) else {
            return Vec::new();
        };
        node.parents
            .iter()
            .flat_map(|parent| self.nodes[*parent].outputs.iter().cloned())
            .collect()
    }

    /// Session identity for one node's execution.
    pub fn session_spec(&self, id: usize) -> Option<SessionSpec> {
        let node = self.nodes.get(id)?;
        Some(SessionSpec {
            qualified_name: node.qualified_name.clone(),
            job_group: node.job_group.clone(),
            job_type: node.job_type.clone(),
            config: node.config.clone(),
            declared_outputs: node.outputs.clone(),
            parent_outputs: self.input_namespace(id),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::StubAction;

    #[test]
    fn test_graph_records_every_action_and_edge() {
        let mut builder = GraphBuilder::new();
        let ingest = builder
            .add_action(StubAction::new("build", "ingest", &["raw-data"]), &[])
            .unwrap();
        let train = builder
            .add_action(StubAction::new("model", "train", &["model"]), &[ingest])
            .unwrap();
        let _eval = builder
            .add_action(StubAction::new("model", "eval", &["metrics"]), &[train])
            .unwrap();
        let graph = builder.finish();

        assert_eq!(graph.len(), 3);
        assert_eq!(graph.get(1).unwrap().parents, vec![0]);
        assert_eq!(graph.get(2).unwrap().parents, vec![1]);
        assert_eq!(graph.children(0), &[1]);
        assert_eq!(graph.children(1), &[2]);
        assert!(graph.children(2).is_empty());
    }

    #[test]
    fn test_qualified_names_disambiguate_configs() {
        let mut builder = GraphBuilder::new();
        builder
            .add_action(
                StubAction::new("model", "train", &["model-a"]).with_config(serde_json::json!({
                    "lr": 0.1
                })),
                &[],
            )
            .unwrap();
        builder
            .add_action(
                StubAction::new("model", "train", &["model-b"]).with_config(serde_json::json!({
                    "lr": 0.01
                })),
                &[],
            )
            .unwrap();
        let graph = builder.finish();

        assert_eq!(graph.get(0).unwrap().qualified_name, "model.train");
        assert_eq!(graph.get(1).unwrap().qualified_name, "model.train.2");
    }

    #[test]
    fn test_identical_identity_rejected() {
        let mut builder = GraphBuilder::new();
        builder
            .add_action(StubAction::new("model", "train", &["model-a"]), &[])
            .unwrap();
        let err = builder
            .add_action(StubAction::new("model", "train", &["model-b"]), &[])
            .unwrap_err();
        assert!(matches!(
            err,
            GantryError::Graph(GraphError::DuplicateAction(_))
        ));
    }

    #[test]
    fn test_duplicate_output_rejected() {
        let mut builder = GraphBuilder::new();
        builder
            .add_action(StubAction::new("build", "ingest", &["corpus"]), &[])
            .unwrap();
        let err = builder
            .add_action(StubAction::new("build", "scrape", &["corpus"]), &[])
            .unwrap_err();
        assert!(matches!(
            err,
            GantryError::Graph(GraphError::DuplicateOutput { .. })
        ));
    }

    #[test]
    fn test_invalid_parent_handle() {
        let mut builder = GraphBuilder::new();
        let err = builder
            .add_action(
                StubAction::new("model", "train", &["model"]),
                &[ActionHandle(7)],
            )
            .unwrap_err();
        assert!(matches!(
            err,
            GantryError::Graph(GraphError::InvalidParent(7))
        ));
    }

    #[test]
    fn test_no_outputs_rejected() {
        let mut builder = GraphBuilder::new();
        let err = builder
            .add_action(StubAction::new("model", "train", &[]), &[])
            .unwrap_err();
        assert!(matches!(err, GantryError::Graph(GraphError::NoOutputs(_))));
    }

    #[test]
    fn test_input_namespace_order() {
        let mut builder = GraphBuilder::new();
        let a = builder
            .add_action(StubAction::new("build", "ingest", &["raw", "labels"]), &[])
            .unwrap();
        let b = builder
            .add_action(StubAction::new("build", "clean", &["clean-data"]), &[])
            .unwrap();
        let joined = builder
            .add_action(StubAction::new("model", "train", &["model"]), &[b, a])
            .unwrap();
        let graph = builder.finish();

        // Parent declaration order (b first), then each parent's outputs.
        assert_eq!(
            graph.input_namespace(joined.index()),
            vec!["clean-data", "raw", "labels"]
        );
    }

    #[test]
    fn test_session_spec_carries_identity() {
        let mut builder = GraphBuilder::new();
        let parent = builder
            .add_action(StubAction::new("build", "ingest", &["raw"]), &[])
            .unwrap();
        let child = builder
            .add_action(StubAction::new("model", "train", &["model"]), &[parent])
            .unwrap();
        let graph = builder.finish();

        let spec = graph.session_spec(child.index()).unwrap();
        assert_eq!(spec.qualified_name, "model.train");
        assert_eq!(spec.declared_outputs, vec!["model"]);
        assert_eq!(spec.parent_outputs, vec!["raw"]);
    }
}
