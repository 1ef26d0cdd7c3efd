//! Engine error taxonomy
//!
//! Validation and not-found failures are raised before any state changes.
//! `NoEligibleModel` is a routing outcome rather than a fault; the routing
//! engine records it on the decision instead of returning it.

use thiserror::Error;

use crate::audit::Batch;

/// Errors raised by the registry, tracker, router and committer.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Malformed input, rejected before any state change
    #[error("{0}")]
    Validation(String),

    /// Reference to an unknown model (or batch, or decision)
    #[error("{0} not found")]
    NotFound(String),

    /// Routing found zero qualifying candidates
    #[error("no eligible model{}", capability_suffix(.capability))]
    NoEligibleModel { capability: Option<String> },

    /// The period already has a committed batch; carries the original
    #[error("period {} already committed in tx {}", .batch.period, .batch.ledger_tx)]
    DuplicateCommit { batch: Box<Batch> },

    /// Ledger submission timed out or was rejected; safe to retry
    #[error("ledger submission failed: {0}")]
    ExternalLedger(String),

    #[error("serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn capability_suffix(capability: &Option<String>) -> String {
    match capability {
        Some(cap) => format!(" with capability '{}'", cap),
        None => String::new(),
    }
}

impl EngineError {
    pub fn validation(message: impl Into<String>) -> Self {
        EngineError::Validation(message.into())
    }

    pub fn model_not_found(model_id: &str) -> Self {
        EngineError::NotFound(format!("model '{}'", model_id))
    }

    /// Stable error kind name surfaced to API clients
    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "ValidationError",
            EngineError::NotFound(_) => "NotFoundError",
            EngineError::NoEligibleModel { .. } => "NoEligibleModelError",
            EngineError::DuplicateCommit { .. } => "DuplicateCommitError",
            EngineError::ExternalLedger(_) => "ExternalLedgerError",
            EngineError::Serialization(_) => "InternalError",
        }
    }

    /// Whether the caller may retry the same request unchanged
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::ExternalLedger(_))
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_kinds() {
        assert_eq!(EngineError::validation("bad").kind(), "ValidationError");
        assert_eq!(EngineError::model_not_found("m").kind(), "NotFoundError");
        assert_eq!(
            EngineError::NoEligibleModel { capability: None }.kind(),
            "NoEligibleModelError"
        );
        assert!(EngineError::ExternalLedger("timeout".into()).is_retryable());
        assert!(!EngineError::validation("bad").is_retryable());
    }

    #[test]
    fn test_no_eligible_message() {
        let err = EngineError::NoEligibleModel {
            capability: Some("safety".to_string()),
        };
        assert_eq!(err.to_string(), "no eligible model with capability 'safety'");
        assert_eq!(
            EngineError::model_not_found("model_x").to_string(),
            "model 'model_x' not found"
        );
    }
}
