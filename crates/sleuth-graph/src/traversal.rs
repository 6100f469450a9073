//! Traversal over a case graph snapshot.
//!
//! All traversals treat edges as undirected unless a [`ConeDirection`] says
//! otherwise. They fail only when a named node is absent from the snapshot;
//! "nothing reachable" is an ordinary, empty result.

use std::collections::{BTreeSet, HashMap, HashSet};

use serde::Serialize;
use tracing::debug;

use sleuth_core::{GraphSnapshot, SleuthError, SleuthResult};

/// Which edges an expansion cone follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConeDirection {
    /// Follow edges both ways.
    #[default]
    Both,
    /// Only `from -> to`.
    Outgoing,
    /// Only `to -> from`.
    Incoming,
}

impl ConeDirection {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "both" | "undirected" => Some(Self::Both),
            "out" | "outgoing" => Some(Self::Outgoing),
            "in" | "incoming" => Some(Self::Incoming),
            _ => None,
        }
    }
}

/// Nodes and edges reached from a center within some number of hops.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Cone {
    pub center: String,
    pub depth: usize,
    /// Reached node ids, center included.
    pub nodes: BTreeSet<String>,
    /// Ids of edges traversed to reach them.
    pub edges: BTreeSet<String>,
}

impl Cone {
    pub fn contains(&self, node: &str) -> bool {
        self.nodes.contains(node)
    }
}

fn require_node(graph: &GraphSnapshot, id: &str) -> SleuthResult<()> {
    if graph.contains_node(id) {
        Ok(())
    } else {
        Err(SleuthError::NodeNotFound(id.to_string()))
    }
}

/// Breadth expansion from `center`, `depth` levels deep.
///
/// Each level scans every edge and crosses the ones with an endpoint on the
/// current frontier. `depth == 0` yields just the center.
pub fn expansion_cone(
    graph: &GraphSnapshot,
    center: &str,
    depth: usize,
    direction: ConeDirection,
) -> SleuthResult<Cone> {
    require_node(graph, center)?;

    let mut nodes = BTreeSet::from([center.to_string()]);
    let mut edges = BTreeSet::new();
    let mut frontier: HashSet<&str> = HashSet::from([center]);

    for _ in 0..depth {
        if frontier.is_empty() {
            break;
        }
        let mut next = HashSet::new();

        for edge in &graph.edges {
            let forward = direction != ConeDirection::Incoming && frontier.contains(edge.from.as_str());
            let backward = direction != ConeDirection::Outgoing && frontier.contains(edge.to.as_str());

            if forward {
                edges.insert(edge.id.clone());
                if nodes.insert(edge.to.clone()) {
                    next.insert(edge.to.as_str());
                }
            }
            if backward {
                edges.insert(edge.id.clone());
                if nodes.insert(edge.from.clone()) {
                    next.insert(edge.from.as_str());
                }
            }
        }
        frontier = next;
    }

    debug!(center, depth, nodes = nodes.len(), edges = edges.len(), "Expansion cone computed");
    Ok(Cone {
        center: center.to_string(),
        depth,
        nodes,
        edges,
    })
}

/// Undirected adjacency with neighbours in edge order, without repeats.
struct Adjacency<'a> {
    neighbours: HashMap<&'a str, Vec<&'a str>>,
}

impl<'a> Adjacency<'a> {
    fn undirected(graph: &'a GraphSnapshot) -> Self {
        let mut neighbours: HashMap<&str, Vec<&str>> = HashMap::new();
        for edge in &graph.edges {
            let (a, b) = (edge.from.as_str(), edge.to.as_str());
            for (x, y) in [(a, b), (b, a)] {
                let list = neighbours.entry(x).or_default();
                if !list.contains(&y) {
                    list.push(y);
                }
            }
        }
        Self { neighbours }
    }

    fn of(&self, node: &str) -> &[&'a str] {
        self.neighbours.get(node).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Every simple path from `from` to `to` with at most `max_depth` edges.
///
/// Paths come back in discovery order (depth-first, neighbours in edge order).
/// `from == to` yields the single path `[from]`.
pub fn find_all_paths(
    graph: &GraphSnapshot,
    from: &str,
    to: &str,
    max_depth: usize,
) -> SleuthResult<Vec<Vec<String>>> {
    require_node(graph, from)?;
    require_node(graph, to)?;

    let adjacency = Adjacency::undirected(graph);
    let mut paths = Vec::new();
    let mut path = vec![from];
    let mut visited = HashSet::new();

    walk(&adjacency, to, max_depth, &mut path, &mut visited, &mut paths);

    debug!(from, to, max_depth, found = paths.len(), "Path enumeration finished");
    Ok(paths)
}

fn walk<'a>(
    adjacency: &Adjacency<'a>,
    target: &str,
    max_depth: usize,
    path: &mut Vec<&'a str>,
    visited: &mut HashSet<&'a str>,
    paths: &mut Vec<Vec<String>>,
) {
    let Some(&current) = path.last() else {
        return;
    };
    if current == target {
        paths.push(path.iter().map(|s| s.to_string()).collect());
        return;
    }
    if path.len() > max_depth {
        return;
    }

    visited.insert(current);
    for &next in adjacency.of(current) {
        if visited.contains(next) {
            continue;
        }
        path.push(next);
        walk(adjacency, target, max_depth, path, visited, paths);
        path.pop();
    }
    visited.remove(current);
}

/// Ids of the edges joining consecutive nodes of `path`, in path order.
/// Parallel edges between the same pair are all included.
pub fn path_edges(graph: &GraphSnapshot, path: &[String]) -> Vec<String> {
    path.windows(2)
        .flat_map(|pair| {
            graph
                .edges
                .iter()
                .filter(move |e| (e.from == pair[0] && e.to == pair[1]) || (e.from == pair[1] && e.to == pair[0]))
                .map(|e| e.id.clone())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use sleuth_core::{GraphEdge, GraphNode};

    fn node(id: &str) -> GraphNode {
        GraphNode {
            id: id.into(),
            label: id.to_uppercase(),
            node_type: Default::default(),
            role: Default::default(),
        }
    }

    fn edge(id: &str, from: &str, to: &str) -> GraphEdge {
        GraphEdge {
            id: id.into(),
            from: from.into(),
            to: to.into(),
            label: "lien".into(),
            edge_type: "relation".into(),
            context: None,
        }
    }

    /// A - B - C - D
    fn chain() -> GraphSnapshot {
        GraphSnapshot {
            nodes: vec![node("a"), node("b"), node("c"), node("d")],
            edges: vec![edge("ab", "a", "b"), edge("bc", "b", "c"), edge("cd", "c", "d")],
        }
    }

    /// Square a-b-d, a-c-d plus a diagonal b-c and an isolated e.
    fn square() -> GraphSnapshot {
        GraphSnapshot {
            nodes: vec![node("a"), node("b"), node("c"), node("d"), node("e")],
            edges: vec![
                edge("ab", "a", "b"),
                edge("ac", "a", "c"),
                edge("bd", "b", "d"),
                edge("cd", "c", "d"),
                edge("bc", "b", "c"),
            ],
        }
    }

    fn assert_valid(graph: &GraphSnapshot, path: &[String], max_depth: usize) {
        assert!(path.len() - 1 <= max_depth);
        let unique: HashSet<&String> = path.iter().collect();
        assert_eq!(unique.len(), path.len(), "repeated node in {:?}", path);
        for pair in path.windows(2) {
            assert!(graph.has_edge_between(&pair[0], &pair[1]), "no edge in {:?}", pair);
        }
    }

    #[test]
    fn test_chain_paths_respect_depth() {
        let graph = chain();
        let paths = find_all_paths(&graph, "a", "d", 3).unwrap();
        assert_eq!(paths, vec![vec!["a", "b", "c", "d"]]);

        assert!(find_all_paths(&graph, "a", "d", 2).unwrap().is_empty());
    }

    #[test]
    fn test_paths_are_valid_and_complete() {
        let graph = square();
        let paths = find_all_paths(&graph, "a", "d", 4).unwrap();
        for path in &paths {
            assert_valid(&graph, path, 4);
        }
        // a-b-d, a-b-c-d, a-c-d, a-c-b-d
        assert_eq!(paths.len(), 4);

        let short = find_all_paths(&graph, "a", "d", 2).unwrap();
        assert_eq!(short.len(), 2);
    }

    #[test]
    fn test_path_to_self_and_unreachable() {
        let graph = square();
        assert_eq!(find_all_paths(&graph, "b", "b", 0).unwrap(), vec![vec!["b".to_string()]]);
        assert!(find_all_paths(&graph, "a", "e", 5).unwrap().is_empty());
    }

    #[test]
    fn test_unknown_node_is_an_error() {
        let graph = chain();
        assert!(matches!(find_all_paths(&graph, "a", "zz", 3), Err(SleuthError::NodeNotFound(_))));
        assert!(matches!(
            expansion_cone(&graph, "zz", 1, ConeDirection::Both),
            Err(SleuthError::NodeNotFound(_))
        ));
    }

    #[test]
    fn test_parallel_edges_do_not_duplicate_paths() {
        let mut graph = chain();
        graph.edges.push(edge("ba", "b", "a"));
        let paths = find_all_paths(&graph, "a", "c", 2).unwrap();
        assert_eq!(paths.len(), 1);
        assert_eq!(path_edges(&graph, &paths[0]), vec!["ab", "ba", "bc"]);
    }

    #[test]
    fn test_cone_depths() {
        let graph = chain();
        let zero = expansion_cone(&graph, "b", 0, ConeDirection::Both).unwrap();
        assert_eq!(zero.nodes.len(), 1);
        assert!(zero.edges.is_empty());

        let one = expansion_cone(&graph, "b", 1, ConeDirection::Both).unwrap();
        assert_eq!(one.nodes, BTreeSet::from(["a".into(), "b".into(), "c".into()]));
        assert_eq!(one.edges, BTreeSet::from(["ab".into(), "bc".into()]));

        let isolated = expansion_cone(&square(), "e", 3, ConeDirection::Both).unwrap();
        assert_eq!(isolated.nodes.len(), 1);
    }

    #[test]
    fn test_cone_is_monotonic_in_depth() {
        let graph = square();
        for center in ["a", "b", "e"] {
            let mut previous = expansion_cone(&graph, center, 0, ConeDirection::Both).unwrap();
            for depth in 1..5 {
                let cone = expansion_cone(&graph, center, depth, ConeDirection::Both).unwrap();
                assert!(previous.nodes.is_subset(&cone.nodes));
                assert!(previous.edges.is_subset(&cone.edges));
                previous = cone;
            }
        }
    }

    #[test]
    fn test_directed_cones() {
        let graph = chain();
        let out = expansion_cone(&graph, "b", 5, ConeDirection::Outgoing).unwrap();
        assert_eq!(out.nodes, BTreeSet::from(["b".into(), "c".into(), "d".into()]));

        let incoming = expansion_cone(&graph, "b", 5, ConeDirection::Incoming).unwrap();
        assert_eq!(incoming.nodes, BTreeSet::from(["a".into(), "b".into()]));
        assert_eq!(ConeDirection::from_str("OUT"), Some(ConeDirection::Outgoing));
    }
}
