//! Inference layer: chunking long text, running one model call per chunk,
//! and reducing chunk votes to a single category.

pub mod aggregator;
pub mod chunker;
mod error;
pub mod labels;
mod port;

pub use aggregator::{MajorityVote, aggregate};
pub use chunker::{Chunker, Chunks, TokenCounter, WordCounter};
pub use error::{AggregateError, InferenceError};
pub use labels::LabelSpace;
pub use port::{InferencePort, check_prediction};

#[cfg(feature = "onnx")]
mod onnx;
#[cfg(feature = "onnx")]
pub use onnx::OnnxClassifier;

#[cfg(feature = "http")]
mod remote;
#[cfg(feature = "http")]
pub use remote::RemoteClassifier;
