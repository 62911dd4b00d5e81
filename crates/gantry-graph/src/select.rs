//! Subgraph selection
//!
//! A node is selected when its match text contains any filter substring
//! (case-sensitive), or when it is a transitive dependency of a selected
//! node: a child cannot run without its parents' outputs existing, so
//! ancestors are always pulled in. An empty filter list selects everything.

use tracing::{debug, instrument};

use crate::graph::ActionGraph;

/// The outcome of applying selection filters to a graph.
pub struct Selection {
    selected: Vec<bool>,
    matched: Vec<bool>,
}

impl Selection {
    /// Whether a node is in the selected subgraph.
    pub fn is_selected(&self, id: usize) -> bool {
        self.selected.get(id).copied().unwrap_or(false)
    }

    /// Whether a node's match text was hit by a filter directly.
    ///
    /// A direct match overrides the node's skip flag.
    pub fn is_matched(&self, id: usize) -> bool {
        self.matched.get(id).copied().unwrap_or(false)
    }

    /// Selected node ids in declaration order.
    pub fn selected_ids(&self) -> Vec<usize> {
        self.selected
            .iter()
            .enumerate()
            .filter_map(|(id, selected)| selected.then_some(id))
            .collect()
    }

    /// Number of selected nodes.
    pub fn len(&self) -> usize {
        self.selected.iter().filter(|s| **s).count()
    }

    /// Whether nothing was selected.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Apply name-substring filters to a graph.
#[instrument(skip_all, fields(actions = graph.len(), filters = filters.len()))]
pub fn select(graph: &ActionGraph, filters: &[String]) -> Selection {
    let count = graph.len();

    if filters.is_empty() {
        return Selection {
            selected: vec![true; count],
            matched: vec![false; count],
        };
    }

    let mut matched = vec![false; count];
    for node in graph.nodes() {
        let text = node.match_text();
        matched[node.id] = filters.iter().any(|filter| text.contains(filter.trim()));
    }

    // Pull in ancestors of every matched node.
    let mut selected = matched.clone();
    let mut stack: Vec<usize> = matched
        .iter()
        .enumerate()
        .filter_map(|(id, hit)| hit.then_some(id))
        .collect();
    while let Some(id) = stack.pop() {
        if let Some(node) = graph.get(id) {
            for parent in &node.parents {
                if !selected[*parent] {
                    selected[*parent] = true;
                    stack.push(*parent);
                }
            }
        }
    }

    debug!(selected = selected.iter().filter(|s| **s).count(), "selection applied");
    Selection { selected, matched }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::GraphBuilder;
    use crate::test_support::StubAction;

    /// ingest <- train <- eval, plus an unrelated report branch.
    fn build_graph() -> ActionGraph {
        let mut builder = GraphBuilder::new();
        let ingest = builder
            .add_action(StubAction::new("build", "ingest-dataset", &["dataset"]), &[])
            .unwrap();
        let train = builder
            .add_action(StubAction::new("model", "train-model", &["model"]), &[ingest])
            .unwrap();
        builder
            .add_action(StubAction::new("model", "eval-model", &["metrics"]), &[train])
            .unwrap();
        builder
            .add_action(StubAction::new("report", "summarize", &["summary"]), &[])
            .unwrap();
        builder.finish()
    }

    #[test]
    fn test_filter_pulls_in_ancestors() {
        let graph = build_graph();
        let selection = select(&graph, &["train".to_string()]);

        // "train" matches only train-model, but ingest-dataset is pulled in
        // as its ancestor; eval-model and the report branch are not.
        assert!(selection.is_selected(0));
        assert!(selection.is_selected(1));
        assert!(!selection.is_selected(2));
        assert!(!selection.is_selected(3));
        assert_eq!(selection.selected_ids(), vec![0, 1]);

        assert!(!selection.is_matched(0));
        assert!(selection.is_matched(1));
    }

    #[test]
    fn test_empty_filters_select_everything() {
        let graph = build_graph();
        let selection = select(&graph, &[]);
        assert_eq!(selection.len(), graph.len());
        assert!(!selection.is_matched(0));
    }

    #[test]
    fn test_filters_match_output_names() {
        let graph = build_graph();
        let selection = select(&graph, &["metrics".to_string()]);
        // Matching an output name selects its producer and ancestors.
        assert_eq!(selection.selected_ids(), vec![0, 1, 2]);
    }

    #[test]
    fn test_match_is_case_sensitive() {
        let graph = build_graph();
        let selection = select(&graph, &["TRAIN".to_string()]);
        assert!(selection.is_empty());
    }

    #[test]
    fn test_multiple_filters_union() {
        let graph = build_graph();
        let selection = select(&graph, &["summarize".to_string(), "eval".to_string()]);
        assert_eq!(selection.selected_ids(), vec![0, 1, 2, 3]);
    }
}
