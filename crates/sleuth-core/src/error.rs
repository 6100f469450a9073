//! Centralized error types for Sleuth.

use thiserror::Error;

/// Failure talking to one of the external notation services.
#[derive(Error, Debug)]
pub enum ServiceError {
    #[error("Transport error calling {endpoint}: {message}")]
    Transport { endpoint: String, message: String },

    /// Non-success reply; `message` is the body the service sent with it.
    #[error("{endpoint} answered with status {status}: {message}")]
    Status {
        endpoint: String,
        status: u16,
        message: String,
    },

    #[error("Could not decode response from {endpoint}: {message}")]
    Decode { endpoint: String, message: String },

    #[error("{0}")]
    Other(String),
}

impl ServiceError {
    pub fn transport(endpoint: impl Into<String>, message: impl ToString) -> Self {
        Self::Transport {
            endpoint: endpoint.into(),
            message: message.to_string(),
        }
    }

    pub fn status(endpoint: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::Status {
            endpoint: endpoint.into(),
            status,
            message: message.into(),
        }
    }

    pub fn decode(endpoint: impl Into<String>, message: impl ToString) -> Self {
        Self::Decode {
            endpoint: endpoint.into(),
            message: message.to_string(),
        }
    }
}

/// Main error type for Sleuth operations.
#[derive(Error, Debug)]
pub enum SleuthError {
    /// Case text could not be fetched or the parser rejected it.
    #[error("Failed to load case '{case_id}': {source}")]
    LoadFailure {
        case_id: String,
        #[source]
        source: ServiceError,
    },

    /// The patch applier refused the patch or could not be reached.
    /// The message is the service's own, untouched.
    #[error("{message}")]
    PatchFailure { message: String },

    /// The validator reported structural errors in the canonical text.
    #[error("Canonical text has {} structural error(s)", errors.len())]
    ValidationFailure { errors: Vec<String> },

    /// The new text was parsed locally but could not be written back.
    /// The in-memory snapshot and the remote source now disagree.
    #[error("Case '{case_id}' diverged from its stored text: local snapshot updated but write-back failed: {source}")]
    InconsistentWriteback {
        case_id: String,
        #[source]
        source: ServiceError,
    },

    #[error("Synchronizer is {state}, cannot {operation}")]
    NotReady { state: String, operation: String },

    #[error("Node not found in graph snapshot: {0}")]
    NodeNotFound(String),

    #[error("Entity not found: {0}")]
    EntityNotFound(String),

    #[error("No candidate at index {index} (list has {len})")]
    InvalidCandidate { index: usize, len: usize },

    #[error("Service error: {0}")]
    Service(#[from] ServiceError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type for Sleuth operations.
pub type SleuthResult<T> = Result<T, SleuthError>;

impl SleuthError {
    pub fn load(case_id: impl Into<String>, source: ServiceError) -> Self {
        Self::LoadFailure {
            case_id: case_id.into(),
            source,
        }
    }

    pub fn patch(message: impl Into<String>) -> Self {
        Self::PatchFailure {
            message: message.into(),
        }
    }

    pub fn not_ready(state: impl ToString, operation: impl Into<String>) -> Self {
        Self::NotReady {
            state: state.to_string(),
            operation: operation.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    /// True for the write-back divergence case, which callers should surface
    /// more prominently than an ordinary failure.
    pub fn is_divergence(&self) -> bool {
        matches!(self, Self::InconsistentWriteback { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn patch_failure_keeps_message_verbatim() {
        let err = SleuthError::patch("Entité introuvable: ent_42");
        assert_eq!(err.to_string(), "Entité introuvable: ent_42");
    }

    #[test]
    fn divergence_is_distinct() {
        let err = SleuthError::InconsistentWriteback {
            case_id: "case-1".into(),
            source: ServiceError::status("/api/n4l/sync", 500, "disk full"),
        };
        assert!(err.is_divergence());
        assert!(err.to_string().contains("diverged"));
        assert!(!SleuthError::patch("x").is_divergence());
    }
}
