//! In-process store backed by hash maps.

use std::collections::HashMap;
use std::collections::hash_map::Entry;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use webwarden_core::{AllowedCategory, BlockedDomainEntry, Category};

use crate::{CategoryDirectory, DomainLedger, LedgerMatch, StoreError};

type UserKey = (String, String);

/// Ledger and category directory held in memory.
///
/// Every mutation takes the relevant write lock for its whole
/// check-and-insert, so concurrent inserts of the same key collapse to one.
#[derive(Default)]
pub struct MemoryStore {
    blocked: RwLock<HashMap<UserKey, BlockedDomainEntry>>,
    categories: RwLock<HashMap<String, Category>>,
    grants: RwLock<HashMap<UserKey, AllowedCategory>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of ledger entries across all users.
    pub fn blocked_count(&self) -> usize {
        self.blocked.read().len()
    }

    /// Number of known categories.
    pub fn category_count(&self) -> usize {
        self.categories.read().len()
    }
}

fn key(user_id: &str, value: &str) -> UserKey {
    (user_id.to_string(), value.to_string())
}

#[async_trait]
impl DomainLedger for MemoryStore {
    async fn exists(
        &self,
        user_id: &str,
        domain: &str,
        matching: LedgerMatch,
    ) -> Result<bool, StoreError> {
        let blocked = self.blocked.read();
        Ok(blocked
            .values()
            .any(|e| e.user_id == user_id && matching.matches(&e.domain, domain)))
    }

    async fn insert(&self, entry: &BlockedDomainEntry) -> Result<bool, StoreError> {
        match self.blocked.write().entry(key(&entry.user_id, &entry.domain)) {
            Entry::Occupied(_) => Ok(false),
            Entry::Vacant(slot) => {
                slot.insert(entry.clone());
                Ok(true)
            }
        }
    }

    async fn remove(&self, user_id: &str, domain: &str) -> Result<bool, StoreError> {
        Ok(self.blocked.write().remove(&key(user_id, domain)).is_some())
    }

    async fn list(&self, user_id: &str) -> Result<Vec<BlockedDomainEntry>, StoreError> {
        let mut entries: Vec<BlockedDomainEntry> = self
            .blocked
            .read()
            .values()
            .filter(|e| e.user_id == user_id)
            .cloned()
            .collect();
        entries.sort_by(|a, b| {
            b.blocked_at
                .cmp(&a.blocked_at)
                .then_with(|| a.domain.cmp(&b.domain))
        });
        Ok(entries)
    }
}

#[async_trait]
impl CategoryDirectory for MemoryStore {
    async fn get_or_create(&self, name: &str) -> Result<Category, StoreError> {
        if let Some(existing) = self.categories.read().get(name) {
            return Ok(existing.clone());
        }
        let mut categories = self.categories.write();
        let category = categories
            .entry(name.to_string())
            .or_insert_with(|| Category::auto_created(name, Utc::now()));
        Ok(category.clone())
    }

    async fn is_user_allowed(
        &self,
        user_id: &str,
        category: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        Ok(self
            .grants
            .read()
            .get(&key(user_id, category))
            .is_some_and(|grant| grant.is_active_at(now)))
    }

    async fn allow(&self, grant: &AllowedCategory) -> Result<(), StoreError> {
        self.grants
            .write()
            .insert(key(&grant.user_id, &grant.category), grant.clone());
        Ok(())
    }

    async fn revoke(&self, user_id: &str, category: &str) -> Result<bool, StoreError> {
        Ok(self.grants.write().remove(&key(user_id, category)).is_some())
    }
}
