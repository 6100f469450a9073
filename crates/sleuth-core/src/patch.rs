//! Patch: the unit of mutation against the canonical notation.

use std::fmt;

use serde::{Deserialize, Serialize};

/// What a patch does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchOperation {
    Add,
    Update,
    Delete,
}

impl PatchOperation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Add => "add",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl fmt::Display for PatchOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of record a patch targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatchTarget {
    Entity,
    Evidence,
    Timeline,
    Hypothesis,
    Relation,
}

impl PatchTarget {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Entity => "entity",
            Self::Evidence => "evidence",
            Self::Timeline => "timeline",
            Self::Hypothesis => "hypothesis",
            Self::Relation => "relation",
        }
    }

    /// Prefix for generated ids.
    pub fn id_prefix(&self) -> &'static str {
        match self {
            Self::Entity => "ent",
            Self::Evidence => "ev",
            Self::Timeline => "evt",
            Self::Hypothesis => "hyp",
            Self::Relation => "rel",
        }
    }

    /// Fixed notation section for satellite records. Entities are placed by
    /// role instead and relations by their own context.
    pub fn default_context(&self) -> Option<&'static str> {
        match self {
            Self::Evidence => Some("preuves"),
            Self::Timeline => Some("chronologie"),
            Self::Hypothesis => Some("hypotheses"),
            Self::Relation => Some("relations"),
            Self::Entity => None,
        }
    }
}

impl fmt::Display for PatchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An atomic add/update/delete request sent to the patch applier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Patch {
    pub operation: PatchOperation,
    pub entity_type: PatchTarget,
    pub entity_id: String,
    #[serde(rename = "n4l_fragment", default, skip_serializing_if = "Option::is_none")]
    pub fragment: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

impl Patch {
    /// Add or update with a generated fragment placed in `context`.
    pub fn write(
        operation: PatchOperation,
        target: PatchTarget,
        entity_id: impl Into<String>,
        fragment: impl Into<String>,
        context: impl Into<String>,
    ) -> Self {
        Self {
            operation,
            entity_type: target,
            entity_id: entity_id.into(),
            fragment: Some(fragment.into()),
            context: Some(context.into()),
        }
    }

    pub fn delete(target: PatchTarget, entity_id: impl Into<String>) -> Self {
        Self {
            operation: PatchOperation::Delete,
            entity_type: target,
            entity_id: entity_id.into(),
            fragment: None,
            context: None,
        }
    }
}
