//! Focus view-model: highlight one node and its direct neighbours.

use std::collections::HashSet;

use serde::Serialize;

use sleuth_core::{GraphSnapshot, SleuthError, SleuthResult};

/// Partition of a graph around a selected node. Ids keep snapshot order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FocusPartition {
    pub selected: String,
    pub connected: Vec<String>,
    pub others: Vec<String>,
    pub incident_edges: Vec<String>,
    pub other_edges: Vec<String>,
}

pub fn focus_partition(graph: &GraphSnapshot, selected: &str) -> SleuthResult<FocusPartition> {
    if !graph.contains_node(selected) {
        return Err(SleuthError::NodeNotFound(selected.to_string()));
    }

    let mut neighbours = HashSet::new();
    let mut incident_edges = Vec::new();
    let mut other_edges = Vec::new();
    for edge in &graph.edges {
        match edge.other_end(selected) {
            Some(other) => {
                neighbours.insert(other);
                incident_edges.push(edge.id.clone());
            }
            None => other_edges.push(edge.id.clone()),
        }
    }

    let (connected, others): (Vec<String>, Vec<String>) = graph
        .nodes
        .iter()
        .filter(|n| n.id != selected)
        .map(|n| n.id.clone())
        .partition(|id| neighbours.contains(id.as_str()));

    Ok(FocusPartition {
        selected: selected.to_string(),
        connected,
        others,
        incident_edges,
        other_edges,
    })
}

/// What the presentation layer should draw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FocusView {
    Unpartitioned,
    Focused(FocusPartition),
}

/// Remembers which node, if any, is focused.
#[derive(Debug, Clone, Default)]
pub struct FocusState {
    selected: Option<String>,
}

impl FocusState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    /// Focus `node`, or reset if it is already the focused one.
    pub fn toggle(&mut self, graph: &GraphSnapshot, node: &str) -> SleuthResult<FocusView> {
        if self.selected.as_deref() == Some(node) {
            self.selected = None;
            return Ok(FocusView::Unpartitioned);
        }
        let partition = focus_partition(graph, node)?;
        self.selected = Some(node.to_string());
        Ok(FocusView::Focused(partition))
    }

    pub fn clear(&mut self) {
        self.selected = None;
    }

    /// Recompute the view against a (possibly newer) graph. A focused node
    /// that no longer exists drops the focus.
    pub fn view(&mut self, graph: &GraphSnapshot) -> FocusView {
        match self.selected.as_deref().map(|id| focus_partition(graph, id)) {
            Some(Ok(partition)) => FocusView::Focused(partition),
            Some(Err(_)) => {
                self.selected = None;
                FocusView::Unpartitioned
            }
            None => FocusView::Unpartitioned,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sleuth_core::{GraphEdge, GraphNode};

    fn graph() -> GraphSnapshot {
        let node = |id: &str| GraphNode {
            id: id.into(),
            label: id.into(),
            node_type: Default::default(),
            role: Default::default(),
        };
        let edge = |id: &str, from: &str, to: &str| GraphEdge {
            id: id.into(),
            from: from.into(),
            to: to.into(),
            label: String::new(),
            edge_type: String::new(),
            context: None,
        };
        GraphSnapshot {
            nodes: vec![node("a"), node("b"), node("c"), node("d")],
            edges: vec![edge("ab", "a", "b"), edge("ca", "c", "a"), edge("cd", "c", "d")],
        }
    }

    #[test]
    fn test_partition() {
        let p = focus_partition(&graph(), "a").unwrap();
        assert_eq!(p.connected, vec!["b", "c"]);
        assert_eq!(p.others, vec!["d"]);
        assert_eq!(p.incident_edges, vec!["ab", "ca"]);
        assert_eq!(p.other_edges, vec!["cd"]);
    }

    #[test]
    fn test_toggle_same_node_resets() {
        let graph = graph();
        let mut state = FocusState::new();

        assert!(matches!(state.toggle(&graph, "c").unwrap(), FocusView::Focused(_)));
        assert_eq!(state.selected(), Some("c"));
        assert!(matches!(state.toggle(&graph, "d").unwrap(), FocusView::Focused(_)));
        assert_eq!(state.toggle(&graph, "d").unwrap(), FocusView::Unpartitioned);
        assert_eq!(state.selected(), None);
    }

    #[test]
    fn test_view_drops_vanished_focus() {
        let mut graph = graph();
        let mut state = FocusState::new();
        state.toggle(&graph, "d").unwrap();

        graph.nodes.retain(|n| n.id != "d");
        graph.edges.retain(|e| !e.touches("d"));

        assert_eq!(state.view(&graph), FocusView::Unpartitioned);
        assert!(state.selected().is_none());
        assert!(state.toggle(&graph, "zz").is_err());
    }
}
