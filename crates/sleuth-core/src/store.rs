//! Graph Store: one case's snapshot plus the canonical text it came from.
//!
//! A `GraphStore` is immutable. Accepting a new snapshot means building a new
//! store, which rebuilds every cached projection at once, so readers can never
//! observe a cache that disagrees with the snapshot. Cloning is cheap (two
//! `Arc`s) and a clone keeps serving the snapshot it was taken from.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::model::{Entity, EntityRole, EntityType, Evidence, EvidenceKind, Hypothesis, HypothesisStatus, Relation, TimelineEvent};
use crate::snapshot::{CaseSnapshot, GraphSnapshot};

/// Read accessors over a single case.
#[derive(Debug, Clone)]
pub struct GraphStore {
    case_id: String,
    snapshot: Arc<CaseSnapshot>,
    cache: Arc<Projection>,
}

/// Derived data rebuilt whenever a snapshot is accepted.
#[derive(Debug, Default)]
struct Projection {
    raw_text: String,
    synced_at: Option<DateTime<Utc>>,
    entity_index: HashMap<String, usize>,
    evidence_index: HashMap<String, usize>,
    hypothesis_index: HashMap<String, usize>,
    timeline: Vec<TimelineEvent>,
    relations: Vec<Relation>,
    graph: GraphSnapshot,
    dangling: Vec<Relation>,
}

impl GraphStore {
    /// An empty store for a case that has not been loaded yet.
    pub fn empty(case_id: impl Into<String>) -> Self {
        Self {
            case_id: case_id.into(),
            snapshot: Arc::new(CaseSnapshot::default()),
            cache: Arc::new(Projection::default()),
        }
    }

    /// Build a store from an accepted snapshot and the text it was parsed from.
    pub fn new(case_id: impl Into<String>, snapshot: CaseSnapshot, raw_text: impl Into<String>) -> Self {
        let case_id = case_id.into();
        let snapshot = Arc::new(snapshot);
        let cache = Arc::new(Projection::build(&snapshot, raw_text.into()));

        if !cache.dangling.is_empty() {
            warn!(
                case_id = %case_id,
                count = cache.dangling.len(),
                "Case has relations pointing at unknown entities"
            );
        }
        debug!(
            case_id = %case_id,
            entities = snapshot.entities.len(),
            edges = cache.graph.edges.len(),
            "Graph store rebuilt"
        );

        Self { case_id, snapshot, cache }
    }

    pub fn case_id(&self) -> &str {
        &self.case_id
    }

    /// Shared handle on the underlying snapshot.
    pub fn snapshot(&self) -> &Arc<CaseSnapshot> {
        &self.snapshot
    }

    pub fn raw_text(&self) -> &str {
        &self.cache.raw_text
    }

    /// When this snapshot was accepted. `None` for a never-loaded store.
    pub fn last_sync(&self) -> Option<DateTime<Utc>> {
        self.cache.synced_at
    }

    pub fn entities(&self) -> &[Entity] {
        &self.snapshot.entities
    }

    pub fn entity(&self, id: &str) -> Option<&Entity> {
        self.cache.entity_index.get(id).map(|&i| &self.snapshot.entities[i])
    }

    pub fn entities_by_role(&self, role: EntityRole) -> Vec<&Entity> {
        self.snapshot.entities.iter().filter(|e| e.role == role).collect()
    }

    pub fn entities_by_type(&self, entity_type: EntityType) -> Vec<&Entity> {
        self.snapshot
            .entities
            .iter()
            .filter(|e| e.entity_type == entity_type)
            .collect()
    }

    /// Map of entity id to display name.
    pub fn entity_names(&self) -> HashMap<String, String> {
        self.snapshot
            .entities
            .iter()
            .map(|e| (e.id.clone(), e.name.clone()))
            .collect()
    }

    pub fn evidence(&self) -> &[Evidence] {
        &self.snapshot.evidence
    }

    pub fn evidence_by_id(&self, id: &str) -> Option<&Evidence> {
        self.cache.evidence_index.get(id).map(|&i| &self.snapshot.evidence[i])
    }

    pub fn evidence_by_type(&self, kind: EvidenceKind) -> Vec<&Evidence> {
        self.snapshot.evidence.iter().filter(|e| e.kind == kind).collect()
    }

    /// Timeline events sorted by timestamp, oldest first. Undated events last.
    pub fn timeline(&self) -> &[TimelineEvent] {
        &self.cache.timeline
    }

    pub fn timeline_event(&self, id: &str) -> Option<&TimelineEvent> {
        self.cache.timeline.iter().find(|e| e.id == id)
    }

    pub fn hypotheses(&self) -> &[Hypothesis] {
        &self.snapshot.hypotheses
    }

    pub fn hypothesis(&self, id: &str) -> Option<&Hypothesis> {
        self.cache.hypothesis_index.get(id).map(|&i| &self.snapshot.hypotheses[i])
    }

    pub fn hypotheses_by_status(&self, status: HypothesisStatus) -> Vec<&Hypothesis> {
        self.snapshot.hypotheses.iter().filter(|h| h.status == status).collect()
    }

    /// All relations of the case, including dangling ones.
    pub fn relations(&self) -> &[Relation] {
        &self.cache.relations
    }

    /// Relations whose endpoints are not entities of this case.
    pub fn dangling_relations(&self) -> &[Relation] {
        &self.cache.dangling
    }

    pub fn graph_snapshot(&self) -> &GraphSnapshot {
        &self.cache.graph
    }

    pub fn contexts(&self) -> &[String] {
        &self.snapshot.contexts
    }

    pub fn aliases(&self) -> &HashMap<String, Vec<String>> {
        &self.snapshot.aliases
    }

    pub fn sequences(&self) -> &[Vec<String>] {
        &self.snapshot.sequences
    }
}

impl Projection {
    fn build(snapshot: &CaseSnapshot, raw_text: String) -> Self {
        let index = |ids: Vec<&String>| -> HashMap<String, usize> {
            ids.into_iter()
                .enumerate()
                .rev()
                .map(|(i, id)| (id.clone(), i))
                .collect()
        };

        let mut timeline = snapshot.timeline.clone();
        // Stable sort keeps parser order for equal timestamps.
        timeline.sort_by(|a, b| match (a.timestamp, b.timestamp) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        });

        let (graph, dangling) = GraphSnapshot::project(snapshot);

        Self {
            raw_text,
            synced_at: Some(Utc::now()),
            entity_index: index(snapshot.entities.iter().map(|e| &e.id).collect()),
            evidence_index: index(snapshot.evidence.iter().map(|e| &e.id).collect()),
            hypothesis_index: index(snapshot.hypotheses.iter().map(|h| &h.id).collect()),
            timeline,
            relations: snapshot.all_relations(),
            graph,
            dangling,
        }
    }
}
