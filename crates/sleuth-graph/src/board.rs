//! Candidate board: the current list of inferred relations and what the
//! investigator does with them.

use tracing::info;
use uuid::Uuid;

use sleuth_core::{GraphSnapshot, Relation, SleuthError, SleuthResult};
use sleuth_sync::Synchronizer;

use crate::inference::{generate_candidates, CandidateRelation};

/// Relation type given to applied candidates.
pub const INFERENCE_RELATION_TYPE: &str = "inference";

/// Notation context tag marking a relation as inferred.
pub const INFERENCE_CONTEXT: &str = "inféré";

#[derive(Debug, Clone, Default)]
pub struct CandidateBoard {
    candidates: Vec<CandidateRelation>,
}

impl CandidateBoard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the list with a fresh generation over `graph`.
    pub fn generate(&mut self, graph: &GraphSnapshot) -> &[CandidateRelation] {
        self.candidates = generate_candidates(graph);
        &self.candidates
    }

    pub fn candidates(&self) -> &[CandidateRelation] {
        &self.candidates
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Write candidate `index` as a real, unverified relation.
    ///
    /// The candidate leaves the board only once the write succeeded.
    pub async fn apply(&mut self, index: usize, sync: &Synchronizer) -> SleuthResult<Relation> {
        let candidate = self.candidates.get(index).ok_or(SleuthError::InvalidCandidate {
            index,
            len: self.candidates.len(),
        })?;

        let uuid = Uuid::new_v4().simple().to_string();
        let relation = Relation {
            id: format!("rel_inf_{}", &uuid[..12]),
            from_id: candidate.from_id.clone(),
            to_id: candidate.to_id.clone(),
            relation_type: INFERENCE_RELATION_TYPE.to_string(),
            label: candidate.suggested_label.clone(),
            context: Some(INFERENCE_CONTEXT.to_string()),
            verified: false,
            source: format!("inference:{}", candidate.kind),
            timestamp: None,
        };

        let relation = sync.add_relation(relation).await?;
        let applied = self.candidates.remove(index);
        info!(
            kind = %applied.kind,
            from = %applied.from_id,
            to = %applied.to_id,
            relation = %relation.id,
            "Inferred relation applied"
        );
        Ok(relation)
    }

    /// Drop candidate `index` without writing anything.
    pub fn dismiss(&mut self, index: usize) -> Option<CandidateRelation> {
        if index >= self.candidates.len() {
            return None;
        }
        let dismissed = self.candidates.remove(index);
        info!(kind = %dismissed.kind, from = %dismissed.from_id, to = %dismissed.to_id, "Candidate dismissed");
        Some(dismissed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::inference::CandidateKind;
    use sleuth_core::{CaseSnapshot, ChangeNotifier, Entity, EntityType};
    use sleuth_sync::{MemoryBackend, Services};
    use std::sync::Arc;

    fn case() -> CaseSnapshot {
        let person = |id: &str, name: &str| Entity {
            id: id.into(),
            name: name.into(),
            entity_type: EntityType::Person,
            ..Default::default()
        };
        let rel = |from: &str, to: &str, label: &str| Relation {
            id: format!("{}_{}", from, to),
            from_id: from.into(),
            to_id: to.into(),
            relation_type: "relation".into(),
            label: label.into(),
            ..Default::default()
        };
        CaseSnapshot {
            entities: vec![person("a", "Alice"), person("b", "Bernard"), person("c", "Chloé")],
            relations: vec![rel("a", "b", "knows"), rel("b", "c", "employs")],
            ..Default::default()
        }
    }

    async fn loaded() -> (Arc<MemoryBackend>, Synchronizer) {
        let backend = Arc::new(MemoryBackend::new().with_case("case-1", &case()).unwrap());
        let sync = Synchronizer::new("case-1", Services::from_backend(backend.clone()), ChangeNotifier::new());
        sync.load().await.unwrap();
        (backend, sync)
    }

    #[tokio::test]
    async fn test_apply_writes_inferred_relation() {
        let (_backend, sync) = loaded().await;
        let mut board = CandidateBoard::new();
        board.generate(sync.store().graph_snapshot());
        assert_eq!(board.len(), 1);
        assert_eq!(board.candidates()[0].kind, CandidateKind::Transitive);

        let relation = board.apply(0, &sync).await.unwrap();

        assert!(board.is_empty());
        assert_eq!(relation.relation_type, "inference");
        assert!(!relation.verified);
        assert_eq!(relation.context(), Some("inféré"));
        let store = sync.store();
        assert!(store.graph_snapshot().has_edge_between("a", "c"));

        // The new edge closes the triangle, so nothing is left to infer.
        assert!(board.generate(store.graph_snapshot()).is_empty());
    }

    #[tokio::test]
    async fn test_failed_apply_keeps_candidate() {
        let (backend, sync) = loaded().await;
        let mut board = CandidateBoard::new();
        board.generate(sync.store().graph_snapshot());
        let before = sync.snapshot();

        backend.reject_next_patch("Relation refusée");
        let err = board.apply(0, &sync).await.unwrap_err();

        assert_eq!(err.to_string(), "Relation refusée");
        assert_eq!(board.len(), 1);
        assert!(Arc::ptr_eq(&before, &sync.snapshot()));
    }

    #[tokio::test]
    async fn test_dismiss_has_no_side_effect() {
        let (backend, sync) = loaded().await;
        let text_before = backend.text("case-1");
        let mut board = CandidateBoard::new();
        board.generate(sync.store().graph_snapshot());

        let dismissed = board.dismiss(0).unwrap();
        assert_eq!(dismissed.to_id, "c");
        assert!(board.is_empty());
        assert!(board.dismiss(0).is_none());
        assert_eq!(backend.text("case-1"), text_before);
        assert!(!sync.store().graph_snapshot().has_edge_between("a", "c"));
    }

    #[tokio::test]
    async fn test_apply_out_of_range() {
        let (_backend, sync) = loaded().await;
        let mut board = CandidateBoard::new();
        let err = board.apply(3, &sync).await.unwrap_err();
        assert!(matches!(err, SleuthError::InvalidCandidate { index: 3, len: 0 }));
    }
}
