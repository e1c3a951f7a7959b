//! Storage layer: per-user block ledger and category allow-lists.
//!
//! Two backends share the [`DomainLedger`] and [`CategoryDirectory`] traits:
//! [`MemoryStore`] for tests and embedding, and `DuckStore` (feature
//! `duckdb`) for a persistent single-file database.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use webwarden_core::{AllowedCategory, BlockedDomainEntry, Category};

mod error;
pub use error::StoreError;

mod memory;
pub use memory::MemoryStore;

#[cfg(feature = "duckdb")]
mod duck;
#[cfg(feature = "duckdb")]
pub use duck::DuckStore;

/// How an incoming domain is compared against stored ledger entries.
///
/// [`Containment`](Self::Containment) is the legacy rule: a stored entry
/// matches when either domain string contains the other, so a stored
/// `game-site.com` also matches `my-game-site.com`. It stays the default so
/// records blocked under the old rule keep matching.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LedgerMatch {
    /// Normalized registrable domains must be equal.
    Exact,
    #[default]
    Containment,
}

impl LedgerMatch {
    /// Whether `stored` (a ledger key) covers `incoming` (a normalized domain).
    pub fn matches(&self, stored: &str, incoming: &str) -> bool {
        match self {
            Self::Exact => stored == incoming,
            Self::Containment => stored.contains(incoming) || incoming.contains(stored),
        }
    }
}

/// Persistent set of `(user, domain)` blocks.
#[async_trait]
pub trait DomainLedger: Send + Sync {
    /// Whether any entry for `user_id` matches `domain` under `matching`.
    async fn exists(
        &self,
        user_id: &str,
        domain: &str,
        matching: LedgerMatch,
    ) -> Result<bool, StoreError>;

    /// Record a block. A second insert for the same `(user_id, domain)` is a
    /// no-op, including when two callers race; returns whether a row was added.
    async fn insert(&self, entry: &BlockedDomainEntry) -> Result<bool, StoreError>;

    /// Delete the entry for exactly `(user_id, domain)`; returns whether one existed.
    async fn remove(&self, user_id: &str, domain: &str) -> Result<bool, StoreError>;

    /// All entries for `user_id`, newest first.
    async fn list(&self, user_id: &str) -> Result<Vec<BlockedDomainEntry>, StoreError>;
}

/// Category table and per-user allow-list.
#[async_trait]
pub trait CategoryDirectory: Send + Sync {
    /// Fetch a category by name, creating it as system-defined on first sight.
    /// Concurrent first sights resolve to the same row.
    async fn get_or_create(&self, name: &str) -> Result<Category, StoreError>;

    /// Whether `user_id` holds a grant for `category` that is active at `now`.
    async fn is_user_allowed(
        &self,
        user_id: &str,
        category: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Insert or replace a grant.
    async fn allow(&self, grant: &AllowedCategory) -> Result<(), StoreError>;

    /// Remove a grant; returns whether one existed.
    async fn revoke(&self, user_id: &str, category: &str) -> Result<bool, StoreError>;
}
