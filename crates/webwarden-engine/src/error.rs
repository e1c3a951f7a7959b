use thiserror::Error;
use webwarden_ai::{AggregateError, InferenceError};
use webwarden_core::DomainError;
use webwarden_store::StoreError;

/// Why a decision could not be made. No variant leaves a ledger write behind.
#[derive(Debug, Error)]
pub enum DecisionError {
    /// Missing or malformed user, domain, or text.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Inference(#[from] InferenceError),

    /// The chunker produced nothing for text that passed validation.
    #[error("no chunks produced for non-empty text")]
    EmptyInput,

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

impl DecisionError {
    /// HTTP status the boundary should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidRequest(_) => 400,
            Self::Inference(_) | Self::EmptyInput | Self::Store(_) => 500,
        }
    }

    /// Stable machine-readable error code for response bodies.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidRequest(_) => "invalid_request",
            Self::Inference(_) => "classification_failed",
            Self::EmptyInput | Self::Store(_) => "internal_server_error",
        }
    }
}

impl From<DomainError> for DecisionError {
    fn from(e: DomainError) -> Self {
        Self::InvalidRequest(e.to_string())
    }
}

impl From<AggregateError> for DecisionError {
    fn from(e: AggregateError) -> Self {
        match e {
            AggregateError::EmptyInput => Self::EmptyInput,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn status_codes() {
        assert_eq!(DecisionError::InvalidRequest("text".into()).status_code(), 400);
        assert_eq!(
            DecisionError::Inference(InferenceError::Timeout(Duration::from_secs(1))).status_code(),
            500
        );
        assert_eq!(DecisionError::EmptyInput.status_code(), 500);
        assert_eq!(DecisionError::Store(StoreError::NoResults).status_code(), 500);
    }

    #[test]
    fn domain_error_is_invalid_request() {
        let err: DecisionError = DomainError::Empty.into();
        assert!(matches!(err, DecisionError::InvalidRequest(_)));
        assert_eq!(err.code(), "invalid_request");
    }
}
