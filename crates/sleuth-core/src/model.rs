//! Case record models.
//!
//! These mirror the JSON the notation parser returns. Enumerations accept the
//! parser's native spelling (`personne`, `victime`, ...) as well as English
//! aliases, and fall back to an `Other` variant instead of failing.

use std::collections::HashMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Treat an explicit `null` the same as a missing field.
pub fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Kind of entity in a case.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EntityType {
    #[serde(rename = "personne", alias = "person")]
    Person,
    #[serde(rename = "lieu", alias = "place")]
    Place,
    #[serde(rename = "objet", alias = "object")]
    Object,
    #[serde(rename = "evenement", alias = "event")]
    Event,
    #[serde(rename = "organisation", alias = "organization")]
    Organization,
    #[serde(rename = "document")]
    Document,
    #[default]
    #[serde(rename = "autre", other)]
    Other,
}

impl EntityType {
    /// Parse from string (case-insensitive, either spelling).
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "personne" | "person" => Self::Person,
            "lieu" | "place" => Self::Place,
            "objet" | "object" => Self::Object,
            "evenement" | "event" => Self::Event,
            "organisation" | "organization" => Self::Organization,
            "document" => Self::Document,
            _ => Self::Other,
        }
    }

    /// Wire spelling.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Person => "personne",
            Self::Place => "lieu",
            Self::Object => "objet",
            Self::Event => "evenement",
            Self::Organization => "organisation",
            Self::Document => "document",
            Self::Other => "autre",
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Role an entity plays in the investigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EntityRole {
    #[serde(rename = "victime", alias = "victim")]
    Victim,
    #[serde(rename = "suspect")]
    Suspect,
    #[serde(rename = "temoin", alias = "witness")]
    Witness,
    #[serde(rename = "enqueteur", alias = "investigator")]
    Investigator,
    #[default]
    #[serde(rename = "autre", alias = "other", other)]
    Other,
}

impl EntityRole {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "victime" | "victim" => Self::Victim,
            "suspect" => Self::Suspect,
            "temoin" | "témoin" | "witness" => Self::Witness,
            "enqueteur" | "enquêteur" | "investigator" => Self::Investigator,
            _ => Self::Other,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Victim => "victime",
            Self::Suspect => "suspect",
            Self::Witness => "temoin",
            Self::Investigator => "enqueteur",
            Self::Other => "autre",
        }
    }

    /// Section of the canonical notation that holds entities with this role.
    pub fn notation_context(&self) -> &'static str {
        match self {
            Self::Victim => "victimes",
            Self::Suspect => "suspects",
            Self::Witness => "témoins",
            Self::Investigator => "enquêteurs",
            Self::Other => "entités",
        }
    }
}

impl fmt::Display for EntityRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A directed, labelled link between two entities.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Relation {
    #[serde(default)]
    pub id: String,
    pub from_id: String,
    pub to_id: String,
    #[serde(rename = "type", default)]
    pub relation_type: String,
    #[serde(default)]
    pub label: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub source: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl Relation {
    /// Context tag, ignoring the empty string the parser emits for "none".
    pub fn context(&self) -> Option<&str> {
        self.context.as_deref().filter(|c| !c.is_empty())
    }

    /// True when this relation joins `a` and `b` in either direction.
    pub fn joins(&self, a: &str, b: &str) -> bool {
        (self.from_id == a && self.to_id == b) || (self.from_id == b && self.to_id == a)
    }
}

/// A person, place, object or other participant in a case.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Entity {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub entity_type: EntityType,
    #[serde(default)]
    pub role: EntityRole,
    #[serde(default)]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub attributes: HashMap<String, String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub relations: Vec<Relation>,
}

/// Category of a piece of evidence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum EvidenceKind {
    #[serde(rename = "physique", alias = "physical")]
    Physical,
    #[serde(rename = "testimoniale", alias = "testimonial")]
    Testimonial,
    #[serde(rename = "documentaire", alias = "documentary")]
    Documentary,
    #[serde(rename = "numerique", alias = "digital")]
    Digital,
    #[serde(rename = "forensique", alias = "forensic")]
    Forensic,
    #[default]
    #[serde(rename = "autre", other)]
    Other,
}

impl EvidenceKind {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "physique" | "physical" => Self::Physical,
            "testimoniale" | "testimonial" => Self::Testimonial,
            "documentaire" | "documentary" => Self::Documentary,
            "numerique" | "digital" => Self::Digital,
            "forensique" | "forensic" => Self::Forensic,
            _ => Self::Other,
        }
    }
}

/// A piece of evidence and the entities it concerns.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Evidence {
    #[serde(default)]
    pub id: String,
    pub name: String,
    #[serde(rename = "type", default)]
    pub kind: EvidenceKind,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub location: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collected_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub collected_by: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub chain_of_custody: Vec<String>,
    /// Reliability score, 1 to 10.
    #[serde(default)]
    pub reliability: u8,
    #[serde(default, deserialize_with = "null_as_default")]
    pub linked_entities: Vec<String>,
    #[serde(default)]
    pub notes: String,
}

/// An event on the case timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct TimelineEvent {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub timestamp: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub location: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub entities: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub evidence: Vec<String>,
    #[serde(default)]
    pub verified: bool,
    #[serde(default)]
    pub source: String,
    /// high, medium or low.
    #[serde(default)]
    pub importance: String,
}

/// Status of an investigative hypothesis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum HypothesisStatus {
    #[serde(rename = "corroboree", alias = "supported")]
    Supported,
    #[serde(rename = "refutee", alias = "refuted")]
    Refuted,
    #[serde(rename = "partielle", alias = "partial")]
    Partial,
    #[default]
    #[serde(rename = "en_attente", alias = "pending", other)]
    Pending,
}

impl HypothesisStatus {
    pub fn from_str(s: &str) -> Self {
        match s.to_lowercase().as_str() {
            "corroboree" | "supported" => Self::Supported,
            "refutee" | "refuted" => Self::Refuted,
            "partielle" | "partial" => Self::Partial,
            _ => Self::Pending,
        }
    }
}

/// A working hypothesis with the evidence for and against it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct Hypothesis {
    #[serde(default)]
    pub id: String,
    pub title: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub status: HypothesisStatus,
    /// Confidence, 0 to 100.
    #[serde(default)]
    pub confidence_level: u8,
    #[serde(default, deserialize_with = "null_as_default")]
    pub supporting_evidence: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub contradicting_evidence: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub questions: Vec<String>,
    #[serde(default)]
    pub generated_by: String,
}
