pub mod domain;
pub mod model;
pub mod schema;

pub use domain::{DomainError, registrable_domain};
pub use model::{
    AggregateDecision, AllowedCategory, BlockedDomainEntry, Category, ChunkPrediction,
    ClassificationRequest, DecisionReason, DecisionResult,
};
pub use schema::ledger;
