//! In-process backend.
//!
//! Canonical text is the pretty JSON of a [`CaseSnapshot`], fragments are the
//! JSON of a single record, and patches are applied structurally by id. Used
//! for offline work on exported snapshots and as the test double for the
//! synchronizer.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;

use sleuth_core::{
    CaseSnapshot, Entity, Evidence, Hypothesis, Patch, PatchOperation, PatchTarget, Relation, ServiceError,
    TimelineEvent,
};

use crate::services::{
    CaseTextStore, FragmentGenerator, FragmentRequest, NotationParser, NotationValidator, PatchApplier, PatchOutcome,
    ValidationReport,
};

/// Backend that keeps every case's canonical text in memory.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    cases: Mutex<HashMap<String, String>>,
    fail_load: AtomicBool,
    fail_parse: AtomicBool,
    fail_persist: AtomicBool,
    pending_rejection: Mutex<Option<String>>,
    parse_calls: AtomicUsize,
    persist_calls: AtomicUsize,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Render a snapshot as canonical text.
    pub fn render(snapshot: &CaseSnapshot) -> Result<String, ServiceError> {
        serde_json::to_string_pretty(snapshot).map_err(|e| ServiceError::Other(e.to_string()))
    }

    /// Seed a case with a snapshot.
    pub fn with_case(self, case_id: &str, snapshot: &CaseSnapshot) -> Result<Self, ServiceError> {
        let text = Self::render(snapshot)?;
        self.set_text(case_id, text);
        Ok(self)
    }

    pub fn set_text(&self, case_id: &str, text: impl Into<String>) {
        self.cases
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(case_id.to_string(), text.into());
    }

    /// Stored canonical text of a case, if any.
    pub fn text(&self, case_id: &str) -> Option<String> {
        self.cases.lock().unwrap_or_else(|e| e.into_inner()).get(case_id).cloned()
    }

    pub fn set_load_failure(&self, fail: bool) {
        self.fail_load.store(fail, Ordering::SeqCst);
    }

    pub fn set_parse_failure(&self, fail: bool) {
        self.fail_parse.store(fail, Ordering::SeqCst);
    }

    pub fn set_persist_failure(&self, fail: bool) {
        self.fail_persist.store(fail, Ordering::SeqCst);
    }

    /// Reject the next patch with `message`.
    pub fn reject_next_patch(&self, message: impl Into<String>) {
        *self.pending_rejection.lock().unwrap_or_else(|e| e.into_inner()) = Some(message.into());
    }

    pub fn parse_calls(&self) -> usize {
        self.parse_calls.load(Ordering::SeqCst)
    }

    pub fn persist_calls(&self) -> usize {
        self.persist_calls.load(Ordering::SeqCst)
    }

    fn current_snapshot(&self, case_id: &str) -> Result<CaseSnapshot, String> {
        match self.text(case_id) {
            Some(text) if !text.trim().is_empty() => {
                serde_json::from_str(&text).map_err(|e| format!("Stored text for '{}' is invalid: {}", case_id, e))
            }
            _ => Ok(CaseSnapshot::default()),
        }
    }
}

fn fragment<T: DeserializeOwned>(patch: &Patch) -> Result<T, String> {
    let text = patch
        .fragment
        .as_deref()
        .ok_or_else(|| format!("Missing fragment for {} {}", patch.operation, patch.entity_type))?;
    serde_json::from_str(text).map_err(|e| format!("Invalid {} fragment: {}", patch.entity_type, e))
}

/// Add, replace or remove the record with `id` in `records`.
fn apply_by_id<T, F>(records: &mut Vec<T>, patch: &Patch, id_of: F) -> Result<(), String>
where
    T: DeserializeOwned,
    F: Fn(&T) -> &str,
{
    let position = records.iter().position(|r| id_of(r) == patch.entity_id);
    match (patch.operation, position) {
        (PatchOperation::Add, Some(_)) => Err(format!("{} '{}' already exists", patch.entity_type, patch.entity_id)),
        (PatchOperation::Add, None) => {
            records.push(fragment(patch)?);
            Ok(())
        }
        (PatchOperation::Update, Some(i)) => {
            records[i] = fragment(patch)?;
            Ok(())
        }
        (PatchOperation::Delete, Some(i)) => {
            records.remove(i);
            Ok(())
        }
        (_, None) => Err(format!("{} '{}' not found", patch.entity_type, patch.entity_id)),
    }
}

fn apply_relation(snapshot: &mut CaseSnapshot, patch: &Patch) -> Result<(), String> {
    let matches = |r: &Relation| r.id == patch.entity_id || format!("{}_{}", r.from_id, r.to_id) == patch.entity_id;

    match patch.operation {
        PatchOperation::Add => {
            let relation: Relation = fragment(patch)?;
            if snapshot.all_relations().iter().any(|r| !r.id.is_empty() && r.id == relation.id) {
                return Err(format!("relation '{}' already exists", relation.id));
            }
            snapshot.relations.push(relation);
            Ok(())
        }
        PatchOperation::Update => {
            let relation: Relation = fragment(patch)?;
            let existing = snapshot
                .relations
                .iter_mut()
                .find(|r| matches(r))
                .ok_or_else(|| format!("relation '{}' not found", patch.entity_id))?;
            *existing = relation;
            Ok(())
        }
        PatchOperation::Delete => {
            let before = snapshot.relations.len();
            snapshot.relations.retain(|r| !matches(r));
            let mut removed = before != snapshot.relations.len();
            for entity in &mut snapshot.entities {
                let nested = entity.relations.len();
                entity.relations.retain(|r| !matches(r));
                removed |= nested != entity.relations.len();
            }
            if removed {
                Ok(())
            } else {
                Err(format!("relation '{}' not found", patch.entity_id))
            }
        }
    }
}

fn apply_to_snapshot(snapshot: &mut CaseSnapshot, patch: &Patch) -> Result<(), String> {
    match patch.entity_type {
        PatchTarget::Entity => {
            apply_by_id::<Entity, _>(&mut snapshot.entities, patch, |e| &e.id)?;
            if patch.operation == PatchOperation::Delete {
                let id = patch.entity_id.as_str();
                snapshot.relations.retain(|r| r.from_id != id && r.to_id != id);
                for entity in &mut snapshot.entities {
                    entity.relations.retain(|r| r.to_id != id);
                }
            }
            Ok(())
        }
        PatchTarget::Evidence => apply_by_id::<Evidence, _>(&mut snapshot.evidence, patch, |e| &e.id),
        PatchTarget::Timeline => apply_by_id::<TimelineEvent, _>(&mut snapshot.timeline, patch, |e| &e.id),
        PatchTarget::Hypothesis => apply_by_id::<Hypothesis, _>(&mut snapshot.hypotheses, patch, |h| &h.id),
        PatchTarget::Relation => apply_relation(snapshot, patch),
    }
}

#[async_trait]
impl CaseTextStore for MemoryBackend {
    async fn load_text(&self, case_id: &str) -> Result<String, ServiceError> {
        if self.fail_load.load(Ordering::SeqCst) {
            return Err(ServiceError::transport("memory:load", "case text source unavailable"));
        }
        Ok(self.text(case_id).unwrap_or_default())
    }

    async fn persist_text(&self, case_id: &str, text: &str) -> Result<(), ServiceError> {
        self.persist_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_persist.load(Ordering::SeqCst) {
            return Err(ServiceError::transport("memory:persist", "case text sink unavailable"));
        }
        self.set_text(case_id, text);
        Ok(())
    }
}

#[async_trait]
impl NotationParser for MemoryBackend {
    async fn parse(&self, _case_id: &str, text: &str) -> Result<CaseSnapshot, ServiceError> {
        self.parse_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_parse.load(Ordering::SeqCst) {
            return Err(ServiceError::Other("parser unavailable".into()));
        }
        serde_json::from_str(text).map_err(|e| ServiceError::decode("memory:parse", e))
    }
}

#[async_trait]
impl FragmentGenerator for MemoryBackend {
    async fn generate(&self, request: FragmentRequest<'_>) -> Result<String, ServiceError> {
        let rendered = match request {
            FragmentRequest::Entity(e) => serde_json::to_string(e),
            FragmentRequest::Evidence(e) => serde_json::to_string(e),
            FragmentRequest::Timeline(e) => serde_json::to_string(e),
            FragmentRequest::Hypothesis(h) => serde_json::to_string(h),
            FragmentRequest::Relation { relation, .. } => serde_json::to_string(relation),
        };
        rendered.map_err(|e| ServiceError::Other(e.to_string()))
    }
}

#[async_trait]
impl PatchApplier for MemoryBackend {
    async fn apply(&self, case_id: &str, patch: &Patch) -> Result<PatchOutcome, ServiceError> {
        let rejection = self.pending_rejection.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(message) = rejection {
            return Ok(PatchOutcome::Rejected { message });
        }

        let mut snapshot = match self.current_snapshot(case_id) {
            Ok(snapshot) => snapshot,
            Err(message) => return Ok(PatchOutcome::Rejected { message }),
        };
        if let Err(message) = apply_to_snapshot(&mut snapshot, patch) {
            debug!(case_id, operation = %patch.operation, target = %patch.entity_type, %message, "Patch rejected");
            return Ok(PatchOutcome::Rejected { message });
        }

        let canonical_text = Self::render(&snapshot)?;
        self.set_text(case_id, canonical_text.clone());
        Ok(PatchOutcome::Applied {
            canonical_text,
            snapshot,
        })
    }
}

#[async_trait]
impl NotationValidator for MemoryBackend {
    async fn validate(&self, text: &str) -> Result<ValidationReport, ServiceError> {
        if text.trim().is_empty() {
            return Ok(ValidationReport::ok());
        }
        Ok(match serde_json::from_str::<CaseSnapshot>(text) {
            Ok(_) => ValidationReport::ok(),
            Err(e) => ValidationReport::with_errors(vec![format!("line {}: {}", e.line(), e)]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn case() -> CaseSnapshot {
        CaseSnapshot {
            entities: vec![
                Entity { id: "a".into(), name: "Anna".into(), ..Default::default() },
                Entity { id: "b".into(), name: "Bruno".into(), ..Default::default() },
            ],
            relations: vec![Relation {
                id: "r1".into(),
                from_id: "a".into(),
                to_id: "b".into(),
                label: "knows".into(),
                ..Default::default()
            }],
            ..Default::default()
        }
    }

    fn entity_patch(op: PatchOperation, entity: &Entity) -> Patch {
        Patch::write(op, PatchTarget::Entity, &entity.id, serde_json::to_string(entity).unwrap(), "entités")
    }

    #[tokio::test]
    async fn test_add_then_duplicate_is_rejected() {
        let backend = MemoryBackend::new().with_case("c", &case()).unwrap();
        let carla = Entity { id: "c".into(), name: "Carla".into(), ..Default::default() };

        let first = backend.apply("c", &entity_patch(PatchOperation::Add, &carla)).await.unwrap();
        match first {
            PatchOutcome::Applied { snapshot, .. } => assert_eq!(snapshot.entities.len(), 3),
            other => panic!("unexpected: {:?}", other),
        }

        let second = backend.apply("c", &entity_patch(PatchOperation::Add, &carla)).await.unwrap();
        assert!(matches!(second, PatchOutcome::Rejected { .. }));
    }

    #[tokio::test]
    async fn test_entity_delete_drops_its_relations() {
        let backend = MemoryBackend::new().with_case("c", &case()).unwrap();
        let outcome = backend.apply("c", &Patch::delete(PatchTarget::Entity, "b")).await.unwrap();
        match outcome {
            PatchOutcome::Applied { snapshot, .. } => {
                assert_eq!(snapshot.entities.len(), 1);
                assert!(snapshot.relations.is_empty());
            }
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_relation_delete_by_endpoint_key() {
        let backend = MemoryBackend::new().with_case("c", &case()).unwrap();
        let outcome = backend.apply("c", &Patch::delete(PatchTarget::Relation, "a_b")).await.unwrap();
        assert!(matches!(outcome, PatchOutcome::Applied { .. }));

        let missing = backend.apply("c", &Patch::delete(PatchTarget::Relation, "a_b")).await.unwrap();
        assert!(matches!(missing, PatchOutcome::Rejected { .. }));
    }

    #[tokio::test]
    async fn test_forced_rejection_applies_once() {
        let backend = MemoryBackend::new().with_case("c", &case()).unwrap();
        backend.reject_next_patch("Contexte inconnu");

        let outcome = backend.apply("c", &Patch::delete(PatchTarget::Entity, "a")).await.unwrap();
        match outcome {
            PatchOutcome::Rejected { message } => assert_eq!(message, "Contexte inconnu"),
            other => panic!("unexpected: {:?}", other),
        }
        let retry = backend.apply("c", &Patch::delete(PatchTarget::Entity, "a")).await.unwrap();
        assert!(matches!(retry, PatchOutcome::Applied { .. }));
    }

    #[tokio::test]
    async fn test_validator_reports_line() {
        let backend = MemoryBackend::new();
        assert!(backend.validate("").await.unwrap().valid);
        let report = backend.validate("{\n  \"entities\": [\n").await.unwrap();
        assert!(!report.valid);
        assert!(report.errors[0].starts_with("line "));
    }
}
