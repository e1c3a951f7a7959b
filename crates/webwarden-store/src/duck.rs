//! DuckDB storage for the block ledger and category allow-lists.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use duckdb::{Connection, params};
use parking_lot::Mutex;
use tracing::{debug, info};
use webwarden_core::{AllowedCategory, BlockedDomainEntry, Category};

use crate::{CategoryDirectory, DomainLedger, LedgerMatch, StoreError};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS categories (
    name VARCHAR PRIMARY KEY,
    description VARCHAR NOT NULL,
    is_system BOOLEAN NOT NULL,
    created_at_us BIGINT NOT NULL
);
CREATE TABLE IF NOT EXISTS allowed_categories (
    user_id VARCHAR NOT NULL,
    category VARCHAR NOT NULL,
    created_at_us BIGINT NOT NULL,
    expires_at_us BIGINT,
    PRIMARY KEY (user_id, category)
);
CREATE TABLE IF NOT EXISTS blocked_domains (
    user_id VARCHAR NOT NULL,
    domain VARCHAR NOT NULL,
    original_category VARCHAR,
    blocked_at_us BIGINT NOT NULL,
    is_manual BOOLEAN NOT NULL,
    notes VARCHAR NOT NULL,
    PRIMARY KEY (user_id, domain)
);
";

/// DuckDB-backed ledger and category directory.
///
/// Three tables: `categories`, `allowed_categories`, and `blocked_domains`.
/// The primary keys on `(user_id, category)` and `(user_id, domain)` carry the
/// uniqueness invariants; inserts use `ON CONFLICT DO NOTHING` so a losing
/// racer sees a no-op. Timestamps are stored as UTC microseconds.
///
/// Trait methods run their queries on the blocking pool, one at a time
/// through the connection mutex.
///
/// Supports both in-memory (ephemeral) and persistent (file-backed) modes.
pub struct DuckStore {
    conn: Arc<Mutex<Connection>>,
}

impl DuckStore {
    /// Open an in-memory DuckDB database with the schema created.
    pub fn open() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    /// Open or create a persistent DuckDB database at the given path.
    ///
    /// Existing tables and rows are kept; missing tables are created.
    pub fn open_persistent(path: &Path) -> Result<Self, StoreError> {
        let store = Self::init(Connection::open(path)?)?;
        info!(path = %path.display(), "opened ledger database");
        Ok(store)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Number of rows in `blocked_domains` across all users.
    pub fn blocked_count(&self) -> Result<usize, StoreError> {
        count_table(&self.conn.lock(), "blocked_domains")
    }

    /// Number of rows in `categories`.
    pub fn category_count(&self) -> Result<usize, StoreError> {
        count_table(&self.conn.lock(), "categories")
    }

    /// Run `f` against the connection on the blocking pool.
    async fn run<T, F>(&self, f: F) -> Result<T, StoreError>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> Result<T, StoreError> + Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || f(&conn.lock()))
            .await
            .map_err(|e| StoreError::Other(format!("store task: {e}")))?
    }
}

fn count_table(conn: &Connection, table: &str) -> Result<usize, StoreError> {
    let sql = format!("SELECT count(*)::BIGINT FROM {table}");
    let count: i64 = conn.query_row(&sql, [], |row| row.get(0))?;
    Ok(count as usize)
}

fn from_micros(us: i64) -> Result<DateTime<Utc>, StoreError> {
    DateTime::from_timestamp_micros(us).ok_or(StoreError::TimestampRange(us))
}

fn read_category(conn: &Connection, name: &str) -> Result<Category, StoreError> {
    let mut stmt = conn.prepare(
        "SELECT name, description, is_system, created_at_us FROM categories WHERE name = ?",
    )?;
    let mut rows = stmt.query_map([name], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, bool>(2)?,
            row.get::<_, i64>(3)?,
        ))
    })?;
    let (name, description, is_system, created_at_us) =
        rows.next().ok_or(StoreError::NoResults)??;
    Ok(Category {
        name,
        description,
        is_system,
        created_at: from_micros(created_at_us)?,
    })
}

#[async_trait]
impl DomainLedger for DuckStore {
    async fn exists(
        &self,
        user_id: &str,
        domain: &str,
        matching: LedgerMatch,
    ) -> Result<bool, StoreError> {
        let sql = match matching {
            LedgerMatch::Exact => {
                "SELECT count(*)::BIGINT FROM blocked_domains WHERE user_id = $1 AND domain = $2"
            }
            LedgerMatch::Containment => {
                "SELECT count(*)::BIGINT FROM blocked_domains
                 WHERE user_id = $1 AND (contains(domain, $2) OR contains($2, domain))"
            }
        };
        let (user_id, domain) = (user_id.to_owned(), domain.to_owned());
        self.run(move |conn| {
            let count: i64 = conn.query_row(sql, params![user_id, domain], |row| row.get(0))?;
            Ok(count > 0)
        })
        .await
    }

    async fn insert(&self, entry: &BlockedDomainEntry) -> Result<bool, StoreError> {
        let entry = entry.clone();
        self.run(move |conn| {
            let changed = conn.execute(
                "INSERT INTO blocked_domains VALUES (?, ?, ?, ?, ?, ?) ON CONFLICT DO NOTHING",
                params![
                    entry.user_id,
                    entry.domain,
                    entry.original_category,
                    entry.blocked_at.timestamp_micros(),
                    entry.is_manual,
                    entry.notes,
                ],
            )?;
            if changed == 0 {
                debug!(user = %entry.user_id, domain = %entry.domain, "ledger entry already present");
            }
            Ok(changed > 0)
        })
        .await
    }

    async fn remove(&self, user_id: &str, domain: &str) -> Result<bool, StoreError> {
        let (user_id, domain) = (user_id.to_owned(), domain.to_owned());
        self.run(move |conn| {
            let changed = conn.execute(
                "DELETE FROM blocked_domains WHERE user_id = ? AND domain = ?",
                params![user_id, domain],
            )?;
            Ok(changed > 0)
        })
        .await
    }

    async fn list(&self, user_id: &str) -> Result<Vec<BlockedDomainEntry>, StoreError> {
        let user_id = user_id.to_owned();
        self.run(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id, domain, original_category, blocked_at_us, is_manual, notes
                 FROM blocked_domains WHERE user_id = ?
                 ORDER BY blocked_at_us DESC, domain",
            )?;
            let rows = stmt.query_map([&user_id], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, i64>(3)?,
                    row.get::<_, bool>(4)?,
                    row.get::<_, String>(5)?,
                ))
            })?;

            let mut entries = Vec::new();
            for row in rows {
                let (user_id, domain, original_category, blocked_at_us, is_manual, notes) = row?;
                entries.push(BlockedDomainEntry {
                    user_id,
                    domain,
                    original_category,
                    blocked_at: from_micros(blocked_at_us)?,
                    is_manual,
                    notes,
                });
            }
            Ok(entries)
        })
        .await
    }
}

#[async_trait]
impl CategoryDirectory for DuckStore {
    async fn get_or_create(&self, name: &str) -> Result<Category, StoreError> {
        let fresh = Category::auto_created(name, Utc::now());
        self.run(move |conn| {
            let created = conn.execute(
                "INSERT INTO categories VALUES (?, ?, ?, ?) ON CONFLICT DO NOTHING",
                params![
                    fresh.name,
                    fresh.description,
                    fresh.is_system,
                    fresh.created_at.timestamp_micros(),
                ],
            )?;
            if created > 0 {
                info!(category = %fresh.name, "created category");
            }
            read_category(conn, &fresh.name)
        })
        .await
    }

    async fn is_user_allowed(
        &self,
        user_id: &str,
        category: &str,
        now: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let (user_id, category) = (user_id.to_owned(), category.to_owned());
        self.run(move |conn| {
            let count: i64 = conn.query_row(
                "SELECT count(*)::BIGINT FROM allowed_categories
                 WHERE user_id = ? AND category = ?
                   AND (expires_at_us IS NULL OR expires_at_us > ?)",
                params![user_id, category, now.timestamp_micros()],
                |row| row.get(0),
            )?;
            Ok(count > 0)
        })
        .await
    }

    async fn allow(&self, grant: &AllowedCategory) -> Result<(), StoreError> {
        let grant = grant.clone();
        self.run(move |conn| {
            conn.execute(
                "INSERT INTO allowed_categories VALUES (?, ?, ?, ?)
                 ON CONFLICT (user_id, category) DO UPDATE SET expires_at_us = excluded.expires_at_us",
                params![
                    grant.user_id,
                    grant.category,
                    grant.created_at.timestamp_micros(),
                    grant.expires_at.map(|t| t.timestamp_micros()),
                ],
            )?;
            Ok(())
        })
        .await
    }

    async fn revoke(&self, user_id: &str, category: &str) -> Result<bool, StoreError> {
        let (user_id, category) = (user_id.to_owned(), category.to_owned());
        self.run(move |conn| {
            let changed = conn.execute(
                "DELETE FROM allowed_categories WHERE user_id = ? AND category = ?",
                params![user_id, category],
            )?;
            Ok(changed > 0)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn entry(user: &str, domain: &str) -> BlockedDomainEntry {
        BlockedDomainEntry::classified(user, domain, "Games", Utc::now())
    }

    #[test]
    fn open_in_memory_creates_schema() {
        let store = DuckStore::open().unwrap();
        assert_eq!(store.blocked_count().unwrap(), 0);
        assert_eq!(store.category_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn insert_is_idempotent() {
        let store = DuckStore::open().unwrap();
        assert!(store.insert(&entry("u1", "game-site.com")).await.unwrap());
        assert!(!store.insert(&entry("u1", "game-site.com")).await.unwrap());
        assert!(store.insert(&entry("u2", "game-site.com")).await.unwrap());
        assert_eq!(store.blocked_count().unwrap(), 2);
    }

    #[tokio::test]
    async fn exists_respects_match_policy() {
        let store = DuckStore::open().unwrap();
        store.insert(&entry("u1", "game-site.com")).await.unwrap();

        assert!(store.exists("u1", "game-site.com", LedgerMatch::Exact).await.unwrap());
        assert!(!store.exists("u1", "my-game-site.com", LedgerMatch::Exact).await.unwrap());
        assert!(
            store
                .exists("u1", "my-game-site.com", LedgerMatch::Containment)
                .await
                .unwrap()
        );
        assert!(!store.exists("u2", "game-site.com", LedgerMatch::Containment).await.unwrap());
    }

    #[tokio::test]
    async fn concurrent_inserts_keep_one_row() {
        let store = Arc::new(DuckStore::open().unwrap());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let store = Arc::clone(&store);
            handles.push(tokio::spawn(async move {
                store.insert(&entry("u1", "game-site.com")).await.unwrap()
            }));
        }
        let mut inserted = 0;
        for handle in handles {
            if handle.await.unwrap() {
                inserted += 1;
            }
        }
        assert_eq!(inserted, 1);
        assert_eq!(store.blocked_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn list_and_remove() {
        let store = DuckStore::open().unwrap();
        let now = Utc::now();
        let manual = BlockedDomainEntry::manual("u1", "casino.com", "added by admin", now);
        store.insert(&manual).await.unwrap();
        store
            .insert(&BlockedDomainEntry::classified(
                "u1",
                "game-site.com",
                "Games",
                now + Duration::seconds(1),
            ))
            .await
            .unwrap();

        let listed = store.list("u1").await.unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].domain, "game-site.com");
        assert_eq!(listed[1].original_category, None);
        assert!(listed[1].is_manual);
        assert_eq!(listed[1].notes, "added by admin");

        assert!(store.remove("u1", "casino.com").await.unwrap());
        assert!(!store.remove("u1", "casino.com").await.unwrap());
        assert_eq!(store.list("u1").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn get_or_create_is_stable() {
        let store = DuckStore::open().unwrap();
        let first = store.get_or_create("Games").await.unwrap();
        assert!(first.is_system);
        let second = store.get_or_create("Games").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(store.category_count().unwrap(), 1);
    }

    #[tokio::test]
    async fn grants_upsert_and_expire() {
        let store = DuckStore::open().unwrap();
        let now = Utc::now();
        let mut grant = AllowedCategory {
            user_id: "u1".into(),
            category: "Games".into(),
            created_at: now,
            expires_at: Some(now - Duration::hours(1)),
        };
        store.allow(&grant).await.unwrap();
        assert!(!store.is_user_allowed("u1", "Games", now).await.unwrap());

        grant.expires_at = Some(now + Duration::hours(1));
        store.allow(&grant).await.unwrap();
        assert!(store.is_user_allowed("u1", "Games", now).await.unwrap());

        assert!(store.revoke("u1", "Games").await.unwrap());
        assert!(!store.is_user_allowed("u1", "Games", now).await.unwrap());
    }

    #[tokio::test(flavor = "current_thread")]
    async fn queries_wait_off_the_runtime_thread() {
        let store = Arc::new(DuckStore::open().unwrap());
        // Hold the connection so the query has to wait for it.
        let guard = store.conn.lock();
        let pending = tokio::spawn({
            let store = Arc::clone(&store);
            async move {
                store
                    .exists("u1", "game-site.com", LedgerMatch::Exact)
                    .await
            }
        });

        // The single runtime thread keeps running timers meanwhile.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;
        assert!(!pending.is_finished());

        drop(guard);
        assert!(!pending.await.unwrap().unwrap());
    }

    // ── Persistent storage tests ──

    #[test]
    fn open_persistent_creates_file() {
        let tmp = tempfile::TempDir::new().unwrap();
        let db_path = tmp.path().join("ledger.duckdb");
        assert!(!db_path.exists());

        let store = DuckStore::open_persistent(&db_path).unwrap();
        assert!(db_path.exists());
        assert_eq!(store.blocked_count().unwrap(), 0);
    }

    #[tokio::test]
    async fn persistent_ledger_survives_reopen() {
        let tmp = tempfile::TempDir::new().unwrap();
        let db_path = tmp.path().join("ledger.duckdb");

        let store = DuckStore::open_persistent(&db_path).unwrap();
        store.insert(&entry("u1", "game-site.com")).await.unwrap();
        store.get_or_create("Games").await.unwrap();
        drop(store);

        let store = DuckStore::open_persistent(&db_path).unwrap();
        assert!(store.exists("u1", "game-site.com", LedgerMatch::Exact).await.unwrap());
        assert_eq!(store.category_count().unwrap(), 1);
        assert!(!store.insert(&entry("u1", "game-site.com")).await.unwrap());
    }
}
