use std::time::Duration;

use thiserror::Error;

/// Failure of a single chunk inference. Never downgraded to a default category.
#[derive(Debug, Error)]
pub enum InferenceError {
    #[error("model unavailable: {0}")]
    Unavailable(String),

    #[error("inference failed: {0}")]
    Backend(String),

    #[error("inference timed out after {0:?}")]
    Timeout(Duration),

    #[error("label index {index} outside label space of {size}")]
    UnknownLabel { index: usize, size: usize },

    #[error("confidence {0} outside [0, 1]")]
    InvalidConfidence(f64),

    #[cfg(feature = "http")]
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[cfg(feature = "http")]
    #[error("model server returned {status}: {body}")]
    Server { status: u16, body: String },
}

#[cfg(any(feature = "onnx", feature = "http"))]
impl InferenceError {
    pub(crate) fn backend(e: impl std::fmt::Display) -> Self {
        Self::Backend(e.to_string())
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AggregateError {
    /// Aggregation was handed zero predictions; the chunker contract was broken upstream.
    #[error("no chunk predictions to aggregate")]
    EmptyInput,
}
