//! Policy engine: decides whether a page's domain is blocked for a user.
//!
//! Flow per request: normalize and validate, check the ledger, chunk the
//! text, infer each chunk, aggregate, resolve the category, check the
//! allow-list, and record a block when the category is not allowed.

mod config;
mod engine;
mod error;

pub use config::EngineConfig;
pub use engine::PolicyEngine;
pub use error::DecisionError;
