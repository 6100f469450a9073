//! Interfaces of the external notation services.
//!
//! The synchronizer never parses, generates or patches canonical text itself;
//! it delegates to these traits. [`crate::HttpBackend`] talks to the REST
//! service, [`crate::MemoryBackend`] keeps everything in process.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use sleuth_core::model::null_as_default;
use sleuth_core::{
    CaseSnapshot, Entity, Evidence, Hypothesis, Patch, Relation, ServiceError, SleuthError, SleuthResult,
    TimelineEvent,
};

/// Where a case's canonical text is read from and written back to.
#[async_trait]
pub trait CaseTextStore: Send + Sync {
    async fn load_text(&self, case_id: &str) -> Result<String, ServiceError>;

    async fn persist_text(&self, case_id: &str, text: &str) -> Result<(), ServiceError>;
}

/// Turns canonical text into a structured snapshot.
#[async_trait]
pub trait NotationParser: Send + Sync {
    async fn parse(&self, case_id: &str, text: &str) -> Result<CaseSnapshot, ServiceError>;
}

/// A record to render as a canonical-notation fragment.
#[derive(Debug, Clone, Copy)]
pub enum FragmentRequest<'a> {
    Entity(&'a Entity),
    Evidence(&'a Evidence),
    Timeline(&'a TimelineEvent),
    Hypothesis(&'a Hypothesis),
    /// The notation addresses entities by name, so relations carry the
    /// id-to-name map of the case.
    Relation {
        relation: &'a Relation,
        entity_names: &'a HashMap<String, String>,
    },
}

impl FragmentRequest<'_> {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Entity(_) => "entity",
            Self::Evidence(_) => "evidence",
            Self::Timeline(_) => "timeline",
            Self::Hypothesis(_) => "hypothesis",
            Self::Relation { .. } => "relation",
        }
    }
}

#[async_trait]
pub trait FragmentGenerator: Send + Sync {
    async fn generate(&self, request: FragmentRequest<'_>) -> Result<String, ServiceError>;
}

/// Result of a patch as reported by the applier.
#[derive(Debug, Clone)]
pub enum PatchOutcome {
    /// The patch went through; here is the whole new text and its parse.
    Applied {
        canonical_text: String,
        snapshot: CaseSnapshot,
    },
    /// The applier refused the patch and nothing changed.
    Rejected { message: String },
}

/// Applies a patch atomically: either everything or nothing changes.
#[async_trait]
pub trait PatchApplier: Send + Sync {
    async fn apply(&self, case_id: &str, patch: &Patch) -> Result<PatchOutcome, ServiceError>;
}

/// Structural check of canonical text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ValidationReport {
    pub valid: bool,
    #[serde(default, deserialize_with = "null_as_default")]
    pub errors: Vec<String>,
}

impl ValidationReport {
    pub fn ok() -> Self {
        Self {
            valid: true,
            errors: Vec::new(),
        }
    }

    pub fn with_errors(errors: Vec<String>) -> Self {
        Self {
            valid: errors.is_empty(),
            errors,
        }
    }

    /// Turn a failing report into `ValidationFailure`, for callers that want
    /// to gate on it. Validation itself never blocks editing.
    pub fn into_result(self) -> SleuthResult<Self> {
        if self.valid {
            Ok(self)
        } else {
            Err(SleuthError::ValidationFailure { errors: self.errors })
        }
    }
}

#[async_trait]
pub trait NotationValidator: Send + Sync {
    async fn validate(&self, text: &str) -> Result<ValidationReport, ServiceError>;
}

/// The set of services a synchronizer depends on.
#[derive(Clone)]
pub struct Services {
    pub text_store: Arc<dyn CaseTextStore>,
    pub parser: Arc<dyn NotationParser>,
    pub fragments: Arc<dyn FragmentGenerator>,
    pub patcher: Arc<dyn PatchApplier>,
    pub validator: Arc<dyn NotationValidator>,
}

impl Services {
    /// Use one backend for every service.
    pub fn from_backend<B>(backend: Arc<B>) -> Self
    where
        B: CaseTextStore + NotationParser + FragmentGenerator + PatchApplier + NotationValidator + 'static,
    {
        Self {
            text_store: backend.clone(),
            parser: backend.clone(),
            fragments: backend.clone(),
            patcher: backend.clone(),
            validator: backend,
        }
    }
}

impl std::fmt::Debug for Services {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Services").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validation_report_from_null_errors() {
        let report: ValidationReport = serde_json::from_str(r#"{"valid": true, "errors": null}"#).unwrap();
        assert!(report.valid);
        assert!(report.errors.is_empty());
        assert!(report.into_result().is_ok());
    }

    #[test]
    fn test_failing_report_into_result() {
        let report = ValidationReport::with_errors(vec!["ligne 3: contexte non fermé".into()]);
        assert!(!report.valid);
        match report.into_result() {
            Err(SleuthError::ValidationFailure { errors }) => assert_eq!(errors.len(), 1),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[test]
    fn test_fragment_kinds() {
        let entity = Entity::default();
        let names = HashMap::new();
        let relation = Relation::default();
        assert_eq!(FragmentRequest::Entity(&entity).kind(), "entity");
        assert_eq!(
            FragmentRequest::Relation { relation: &relation, entity_names: &names }.kind(),
            "relation"
        );
    }
}
