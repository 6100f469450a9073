//! Parsed case snapshot and its graph projection.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::model::{null_as_default, Entity, EntityRole, EntityType, Evidence, Hypothesis, Relation, TimelineEvent};

/// Structured view of a case as returned by the notation parser.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct CaseSnapshot {
    #[serde(default, deserialize_with = "null_as_default")]
    pub entities: Vec<Entity>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub evidence: Vec<Evidence>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub timeline: Vec<TimelineEvent>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub hypotheses: Vec<Hypothesis>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub relations: Vec<Relation>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub contexts: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub aliases: HashMap<String, Vec<String>>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sequences: Vec<Vec<String>>,
}

impl CaseSnapshot {
    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
            && self.evidence.is_empty()
            && self.timeline.is_empty()
            && self.hypotheses.is_empty()
            && self.relations.is_empty()
    }

    /// Every relation in the case: the top-level list first, then the ones
    /// nested under entities, with duplicates removed.
    ///
    /// Relations with an id are distinct per id. An id-less relation is a copy
    /// when an earlier relation has the same endpoints, type and label.
    /// Nested relations with an empty `from_id` are attributed to their owner.
    pub fn all_relations(&self) -> Vec<Relation> {
        let mut seen_ids = HashSet::new();
        let mut seen_links = HashSet::new();
        let mut out = Vec::new();

        let nested = self.entities.iter().flat_map(|e| {
            e.relations.iter().map(move |r| {
                let mut r = r.clone();
                if r.from_id.is_empty() {
                    r.from_id = e.id.clone();
                }
                r
            })
        });

        for rel in self.relations.iter().cloned().chain(nested) {
            let link = (
                rel.from_id.clone(),
                rel.to_id.clone(),
                rel.relation_type.clone(),
                rel.label.clone(),
            );
            let fresh = if rel.id.is_empty() {
                !seen_links.contains(&link)
            } else {
                seen_ids.insert(rel.id.clone())
            };
            seen_links.insert(link);
            if fresh {
                out.push(rel);
            }
        }
        out
    }

    /// Index from every way a relation may address an entity (id, name,
    /// alias) to the entity's id. Ids win over names, names over aliases.
    fn endpoint_index(&self) -> HashMap<&str, &str> {
        let mut index = HashMap::new();
        for e in &self.entities {
            index.insert(e.id.as_str(), e.id.as_str());
        }
        for e in self.entities.iter().filter(|e| !e.name.is_empty()) {
            index.entry(e.name.as_str()).or_insert(e.id.as_str());
        }
        for (alias, items) in &self.aliases {
            let target = items.first().and_then(|item| index.get(item.as_str()).copied());
            if let Some(id) = target {
                index.entry(alias.as_str()).or_insert(id);
            }
        }
        index
    }
}

/// Entity id addressed by `key`, accepting `@alias` references.
fn resolve_endpoint<'a>(index: &HashMap<&str, &'a str>, key: &str) -> Option<&'a str> {
    if key.is_empty() {
        return None;
    }
    index
        .get(key)
        .or_else(|| key.strip_prefix('@').and_then(|alias| index.get(alias)))
        .copied()
}

/// A node in the graph projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    pub id: String,
    pub label: String,
    #[serde(rename = "type")]
    pub node_type: EntityType,
    pub role: EntityRole,
}

/// An edge in the graph projection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GraphEdge {
    pub id: String,
    pub from: String,
    pub to: String,
    pub label: String,
    #[serde(rename = "type")]
    pub edge_type: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl GraphEdge {
    /// The endpoint opposite `node`, if the edge touches it.
    pub fn other_end(&self, node: &str) -> Option<&str> {
        if self.from == node {
            Some(&self.to)
        } else if self.to == node {
            Some(&self.from)
        } else {
            None
        }
    }

    pub fn touches(&self, node: &str) -> bool {
        self.from == node || self.to == node
    }
}

/// `{nodes, edges}` view used by traversal and inference.
///
/// Every edge endpoint is guaranteed to be one of `nodes`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct GraphSnapshot {
    pub nodes: Vec<GraphNode>,
    pub edges: Vec<GraphEdge>,
}

impl GraphSnapshot {
    /// Project a parsed case onto nodes and edges.
    ///
    /// Relation endpoints may name an entity by id, by name or by alias; edges
    /// always carry entity ids. Returns the projection and the relations left
    /// out because an endpoint matches no entity of the case.
    pub fn project(snapshot: &CaseSnapshot) -> (Self, Vec<Relation>) {
        let nodes: Vec<GraphNode> = snapshot
            .entities
            .iter()
            .map(|e| GraphNode {
                id: e.id.clone(),
                label: e.name.clone(),
                node_type: e.entity_type,
                role: e.role,
            })
            .collect();

        let index = snapshot.endpoint_index();
        let mut used_ids = HashSet::new();
        let mut edges = Vec::new();
        let mut dangling = Vec::new();

        for (position, rel) in snapshot.all_relations().into_iter().enumerate() {
            let from = resolve_endpoint(&index, &rel.from_id);
            let to = resolve_endpoint(&index, &rel.to_id);
            let (Some(from), Some(to)) = (from, to) else {
                dangling.push(rel);
                continue;
            };

            let id = if !rel.id.is_empty() && !used_ids.contains(&rel.id) {
                rel.id.clone()
            } else {
                format!("{}->{}#{}", from, to, position)
            };
            used_ids.insert(id.clone());

            edges.push(GraphEdge {
                id,
                context: rel.context().map(str::to_string),
                from: from.to_string(),
                to: to.to_string(),
                label: rel.label,
                edge_type: rel.relation_type,
            });
        }

        (Self { nodes, edges }, dangling)
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn contains_node(&self, id: &str) -> bool {
        self.nodes.iter().any(|n| n.id == id)
    }

    /// Display label of a node, falling back to its id.
    pub fn label_of<'a>(&'a self, id: &'a str) -> &'a str {
        self.node(id).map(|n| n.label.as_str()).unwrap_or(id)
    }

    /// True when any edge joins `a` and `b`, in either direction.
    pub fn has_edge_between(&self, a: &str, b: &str) -> bool {
        self.edges
            .iter()
            .any(|e| (e.from == a && e.to == b) || (e.from == b && e.to == a))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entity(id: &str, relations: Vec<Relation>) -> Entity {
        Entity {
            id: id.into(),
            name: id.to_uppercase(),
            relations,
            ..Default::default()
        }
    }

    fn rel(from: &str, to: &str, label: &str) -> Relation {
        Relation {
            from_id: from.into(),
            to_id: to.into(),
            relation_type: "lien".into(),
            label: label.into(),
            ..Default::default()
        }
    }

    #[test]
    fn test_nested_and_top_level_relations_are_merged() {
        let snapshot = CaseSnapshot {
            entities: vec![
                entity("a", vec![rel("", "b", "knows")]),
                entity("b", vec![]),
                entity("c", vec![]),
            ],
            relations: vec![rel("a", "b", "knows"), rel("b", "c", "employs")],
            ..Default::default()
        };

        let all = snapshot.all_relations();
        assert_eq!(all.len(), 2);

        let (graph, dangling) = GraphSnapshot::project(&snapshot);
        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.edges.len(), 2);
        assert!(dangling.is_empty());
        assert!(graph.has_edge_between("b", "a"));
        assert!(!graph.has_edge_between("a", "c"));
    }

    #[test]
    fn test_dangling_relations_are_set_aside() {
        let snapshot = CaseSnapshot {
            entities: vec![entity("a", vec![])],
            relations: vec![rel("a", "ghost", "knows")],
            ..Default::default()
        };

        let (graph, dangling) = GraphSnapshot::project(&snapshot);
        assert!(graph.edges.is_empty());
        assert_eq!(dangling.len(), 1);
        assert_eq!(dangling[0].to_id, "ghost");
    }

    #[test]
    fn test_edge_ids_are_unique() {
        let mut r1 = rel("a", "b", "knows");
        r1.id = "r1".into();
        let mut r2 = rel("b", "a", "calls");
        r2.id = "r1".into();

        let snapshot = CaseSnapshot {
            entities: vec![entity("a", vec![]), entity("b", vec![])],
            relations: vec![r1, r2],
            ..Default::default()
        };

        let (graph, _) = GraphSnapshot::project(&snapshot);
        assert_eq!(graph.edges[0].id, "r1");
        assert_ne!(graph.edges[1].id, "r1");
    }

    #[test]
    fn test_relations_with_distinct_ids_are_kept() {
        let mut suspects = rel("a", "b", "knows");
        suspects.id = "rel_suspects".into();
        suspects.context = Some("suspects".into());
        let mut witnesses = rel("a", "b", "knows");
        witnesses.id = "rel_temoins".into();
        witnesses.context = Some("temoins".into());

        let snapshot = CaseSnapshot {
            entities: vec![entity("a", vec![rel("", "b", "knows")]), entity("b", vec![])],
            relations: vec![suspects, witnesses],
            ..Default::default()
        };

        let all = snapshot.all_relations();
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].id, "rel_suspects");
        assert_eq!(all[1].id, "rel_temoins");

        let (graph, _) = GraphSnapshot::project(&snapshot);
        assert_eq!(graph.edges.len(), 2);
    }

    #[test]
    fn test_name_addressed_relations_resolve_to_entity_ids() {
        let json = r#"{
            "entities": [
                {"id": "marc", "name": "Marc Dubois", "type": "personne", "role": "suspect"},
                {"id": "anne", "name": "Anne Martin", "type": "personne", "role": "victime"},
                {"id": "garage", "name": "Garage Dubois", "type": "lieu"}
            ],
            "relations": [
                {"id": "Marc Dubois_menace_Anne Martin", "from_id": "Marc Dubois",
                 "to_id": "Anne Martin", "label": "menace", "type": "lien"},
                {"from_id": "@atelier", "to_id": "marc", "label": "appartient à", "type": "lien"},
                {"from_id": "Anne Martin", "to_id": "Paul Inconnu", "label": "connaît", "type": "lien"}
            ],
            "aliases": {"atelier": ["Garage Dubois"]},
            "graph": {"nodes": [], "edges": [{"from": "Marc Dubois", "to": "Anne Martin"}]}
        }"#;
        let snapshot: CaseSnapshot = serde_json::from_str(json).unwrap();

        let (graph, dangling) = GraphSnapshot::project(&snapshot);
        assert_eq!(graph.nodes.len(), 3);
        assert_eq!(graph.edges.len(), 2);
        assert_eq!(graph.edges[0].from, "marc");
        assert_eq!(graph.edges[0].to, "anne");
        assert_eq!(graph.edges[0].id, "Marc Dubois_menace_Anne Martin");
        assert!(graph.has_edge_between("garage", "marc"));
        assert_eq!(dangling.len(), 1);
        assert_eq!(dangling[0].to_id, "Paul Inconnu");
    }

    #[test]
    fn test_parser_payload_with_nulls() {
        let json = r#"{
            "entities": null, "evidence": [], "timeline": null,
            "hypotheses": [], "relations": null, "graph": {"nodes": [], "edges": []},
            "contexts": ["suspects"], "aliases": null, "sequences": null
        }"#;
        let snapshot: CaseSnapshot = serde_json::from_str(json).unwrap();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.contexts, vec!["suspects".to_string()]);
    }
}
