//! Relation inference.
//!
//! Three heuristics propose links that are missing from the graph:
//!
//! - transitive: `A -> B -> C` suggests `A -> C`
//! - sibling: two nodes sharing a neighbour `P` in the same direction
//! - orphan: an isolated node is tied to a connected node of the same type
//!   or role
//!
//! A candidate is never proposed for a pair that already has an edge in
//! either direction, and each unordered pair is proposed at most once.

use std::collections::HashSet;
use std::fmt;

use serde::Serialize;
use tracing::debug;

use sleuth_core::{GraphNode, GraphSnapshot};

pub const TRANSITIVE_CONFIDENCE: f64 = 0.8;
pub const SIBLING_CONFIDENCE: f64 = 0.6;
pub const ORPHAN_CONFIDENCE: f64 = 0.5;

/// Maximum number of candidates returned by one generation.
pub const MAX_CANDIDATES: usize = 15;

const DEFAULT_LABEL: &str = "linked to";
const SIBLING_LABEL: &str = "associated with";

/// Heuristic that produced a candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CandidateKind {
    Transitive,
    Sibling,
    Orphan,
}

impl CandidateKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Transitive => "transitive",
            Self::Sibling => "sibling",
            Self::Orphan => "orphan",
        }
    }
}

impl fmt::Display for CandidateKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A proposed relation. Advisory until applied.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CandidateRelation {
    pub kind: CandidateKind,
    pub from_id: String,
    pub to_id: String,
    /// The intermediate or shared node, for transitive and sibling candidates.
    pub via: Option<String>,
    pub confidence: f64,
    pub reason: String,
    pub suggested_label: String,
}

/// Unordered pair key.
fn pair_key<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if a <= b {
        (a, b)
    } else {
        (b, a)
    }
}

struct Collector<'g> {
    graph: &'g GraphSnapshot,
    linked: HashSet<(&'g str, &'g str)>,
    proposed: HashSet<(String, String)>,
    out: Vec<CandidateRelation>,
}

impl<'g> Collector<'g> {
    fn new(graph: &'g GraphSnapshot) -> Self {
        let linked = graph
            .edges
            .iter()
            .map(|e| pair_key(e.from.as_str(), e.to.as_str()))
            .collect();
        Self {
            graph,
            linked,
            proposed: HashSet::new(),
            out: Vec::new(),
        }
    }

    /// True if `a` and `b` are distinct, unlinked and not proposed yet.
    fn open(&self, a: &str, b: &str) -> bool {
        if a == b || self.linked.contains(&pair_key(a, b)) {
            return false;
        }
        let (x, y) = pair_key(a, b);
        !self.proposed.contains(&(x.to_string(), y.to_string()))
    }

    fn push(&mut self, candidate: CandidateRelation) {
        let (x, y) = pair_key(&candidate.from_id, &candidate.to_id);
        self.proposed.insert((x.to_string(), y.to_string()));
        self.out.push(candidate);
    }

    fn transitive(&mut self) {
        let graph = self.graph;
        for first in &graph.edges {
            let (a, b) = (first.from.as_str(), first.to.as_str());
            for second in graph.edges.iter().filter(|e| e.from == b) {
                let c = second.to.as_str();
                if !self.open(a, c) {
                    continue;
                }
                let label = [first.label.as_str(), second.label.as_str()]
                    .into_iter()
                    .find(|l| !l.is_empty())
                    .unwrap_or(DEFAULT_LABEL);
                self.push(CandidateRelation {
                    kind: CandidateKind::Transitive,
                    from_id: a.to_string(),
                    to_id: c.to_string(),
                    via: Some(b.to_string()),
                    confidence: TRANSITIVE_CONFIDENCE,
                    reason: format!("via {}", graph.label_of(b)),
                    suggested_label: label.to_string(),
                });
            }
        }
    }

    fn siblings(&mut self) {
        let graph = self.graph;
        for parent in &graph.nodes {
            let p = parent.id.as_str();
            let targets = distinct(graph.edges.iter().filter(|e| e.from == p).map(|e| e.to.as_str()));
            let sources = distinct(graph.edges.iter().filter(|e| e.to == p).map(|e| e.from.as_str()));

            for group in [targets, sources] {
                for (i, &x) in group.iter().enumerate() {
                    for &y in &group[i + 1..] {
                        if x == p || y == p || !self.open(x, y) {
                            continue;
                        }
                        self.push(CandidateRelation {
                            kind: CandidateKind::Sibling,
                            from_id: x.to_string(),
                            to_id: y.to_string(),
                            via: Some(p.to_string()),
                            confidence: SIBLING_CONFIDENCE,
                            reason: format!("both linked to {}", parent.label),
                            suggested_label: SIBLING_LABEL.to_string(),
                        });
                    }
                }
            }
        }
    }

    fn orphans(&mut self) {
        let graph = self.graph;
        let connected: HashSet<&str> = graph
            .edges
            .iter()
            .flat_map(|e| [e.from.as_str(), e.to.as_str()])
            .collect();

        for orphan in graph.nodes.iter().filter(|n| !connected.contains(n.id.as_str())) {
            let peer = graph.nodes.iter().find(|n| {
                n.id != orphan.id
                    && connected.contains(n.id.as_str())
                    && (n.node_type == orphan.node_type || n.role == orphan.role)
            });
            if let Some(peer) = peer {
                if self.open(&orphan.id, &peer.id) {
                    self.push(orphan_candidate(orphan, peer));
                }
            }
        }
    }
}

fn orphan_candidate(orphan: &GraphNode, peer: &GraphNode) -> CandidateRelation {
    CandidateRelation {
        kind: CandidateKind::Orphan,
        from_id: orphan.id.clone(),
        to_id: peer.id.clone(),
        via: None,
        confidence: ORPHAN_CONFIDENCE,
        reason: format!("isolated {} node", orphan.node_type),
        suggested_label: DEFAULT_LABEL.to_string(),
    }
}

fn distinct<'a>(ids: impl Iterator<Item = &'a str>) -> Vec<&'a str> {
    let mut seen = HashSet::new();
    ids.filter(|id| seen.insert(*id)).collect()
}

/// Generate ranked candidates for `graph`, highest confidence first, at most
/// [`MAX_CANDIDATES`]. Ties keep discovery order.
pub fn generate_candidates(graph: &GraphSnapshot) -> Vec<CandidateRelation> {
    let mut collector = Collector::new(graph);
    collector.transitive();
    collector.siblings();
    collector.orphans();

    let mut candidates = collector.out;
    let found = candidates.len();
    candidates.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    candidates.truncate(MAX_CANDIDATES);

    debug!(found, kept = candidates.len(), "Relation candidates generated");
    candidates
}
