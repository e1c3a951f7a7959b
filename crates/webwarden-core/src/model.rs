//! Shared types for classification requests, categories, and the block ledger.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A single classify-and-decide request as received from the boundary.
///
/// `domain` is raw: it may be a bare host, a subdomain-qualified host, or a
/// full URL. It is normalized before any lookup or storage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassificationRequest {
    pub user_id: String,
    pub domain: String,
    pub text: String,
}

impl ClassificationRequest {
    pub fn new(
        user_id: impl Into<String>,
        domain: impl Into<String>,
        text: impl Into<String>,
    ) -> Self {
        Self {
            user_id: user_id.into(),
            domain: domain.into(),
            text: text.into(),
        }
    }
}

/// A content category. Names are unique and stable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub name: String,
    pub description: String,
    /// Created by the engine on first sight of a model label, not by an admin.
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
}

impl Category {
    /// Category created lazily the first time the model emits its label.
    pub fn auto_created(name: &str, now: DateTime<Utc>) -> Self {
        Self {
            name: name.to_string(),
            description: format!("Automatically created category: {name}"),
            is_system: true,
            created_at: now,
        }
    }
}

/// Grant letting a user access one category, optionally until `expires_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AllowedCategory {
    pub user_id: String,
    pub category: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl AllowedCategory {
    /// A grant is active when it has no expiry or the expiry is still ahead of `now`.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_none_or(|expiry| now < expiry)
    }
}

/// One row of the per-user block ledger. At most one exists per `(user_id, domain)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockedDomainEntry {
    pub user_id: String,
    /// Normalized registrable domain.
    pub domain: String,
    /// Category that caused the block; `None` for manual blocks without one.
    pub original_category: Option<String>,
    pub blocked_at: DateTime<Utc>,
    pub is_manual: bool,
    pub notes: String,
}

impl BlockedDomainEntry {
    /// Entry recorded by the policy engine after a disallowed classification.
    pub fn classified(user_id: &str, domain: &str, category: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            domain: domain.to_string(),
            original_category: Some(category.to_string()),
            blocked_at: now,
            is_manual: false,
            notes: String::new(),
        }
    }

    /// Entry added by an administrator rather than by classification.
    pub fn manual(user_id: &str, domain: &str, notes: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            domain: domain.to_string(),
            original_category: None,
            blocked_at: now,
            is_manual: true,
            notes: notes.to_string(),
        }
    }
}

/// Model output for one chunk. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ChunkPrediction {
    pub label_index: usize,
    /// Softmax probability of `label_index`, in `[0, 1]`.
    pub confidence: f64,
}

impl ChunkPrediction {
    pub fn new(label_index: usize, confidence: f64) -> Self {
        Self {
            label_index,
            confidence,
        }
    }
}

/// Final category judgment for one request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AggregateDecision {
    pub category: String,
    /// Mean confidence over the chunks that voted for `category`, rounded to 4 decimals.
    pub confidence: f64,
    pub chunk_count: usize,
}

/// Why a decision was reached without running the classifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    /// The ledger already holds a block for this user and domain.
    DomainBlocked,
    /// The domain is configured as never-classified.
    DomainExempt,
}

impl DecisionReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::DomainBlocked => "domain_blocked",
            Self::DomainExempt => "domain_exempt",
        }
    }
}

/// The engine's answer, shaped for the JSON boundary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecisionResult {
    pub blocked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<DecisionReason>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    /// Number of chunks classified; absent when inference was skipped.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunks: Option<usize>,
}

impl DecisionResult {
    /// Ledger hit: only the domain and reason are echoed.
    pub fn ledger_hit(domain: &str) -> Self {
        Self {
            blocked: true,
            category: None,
            confidence: None,
            reason: Some(DecisionReason::DomainBlocked),
            domain: Some(domain.to_string()),
            chunks: None,
        }
    }

    pub fn exempt(domain: &str) -> Self {
        Self {
            blocked: false,
            category: None,
            confidence: None,
            reason: Some(DecisionReason::DomainExempt),
            domain: Some(domain.to_string()),
            chunks: None,
        }
    }

    /// Outcome of a full classification.
    pub fn classified(decision: AggregateDecision, domain: &str, blocked: bool) -> Self {
        Self {
            blocked,
            category: Some(decision.category),
            confidence: Some(decision.confidence),
            reason: None,
            domain: Some(domain.to_string()),
            chunks: Some(decision.chunk_count),
        }
    }
}
