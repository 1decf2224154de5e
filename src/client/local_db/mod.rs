//! # Local Persistence Store
//!
//! Key-indexed durable storage for the offline layer, backed by SQLite.
//! Two logical stores live side by side:
//!
//! - **`mutationQueue`**: queued GraphQL writes, one record per mutation
//! - **`syncMeta`**: bookkeeping blobs keyed by purpose-prefixed strings
//!   (`prefetch_<eventId>`, `socket_queue_<channel>`, `last_sync_time`)
//!
//! ## Failure Semantics
//!
//! Storage problems never surface as errors. If the database cannot be
//! opened (read-only disk, quota, sandboxed profile) the store runs in an
//! *unavailable* mode where every write returns `false`, every read returns
//! `None` / empty, and counts are `0`. Individual query failures are logged
//! and degrade the same way, so the application keeps working without
//! persistence.
//!
//! ## Ordering
//!
//! Records carry an autoincrement sequence that upserts do not change, so
//! [`LocalStore::get_all_items`] returns records in first-insertion order.
//! Counts are always derived from a fresh query, never from a cached counter.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use eventsync::client::local_db::{LocalStore, StoreName};
//!
//! # async fn example() {
//! let store = LocalStore::open("/tmp/eventsync.db").await;
//! store.put(StoreName::SyncMeta, "prefetch_evt_1", &"2026-01-01T00:00:00Z").await;
//! let value: Option<String> = store.get(StoreName::SyncMeta, "prefetch_evt_1").await;
//! # }
//! ```

pub mod schema;
pub mod sync;

use serde::de::DeserializeOwned;
use serde::Serialize;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{Row, SqlitePool};
use std::path::Path;
use std::time::Duration;

/// Logical store names
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreName {
    /// Queued GraphQL mutations
    MutationQueue,
    /// Key-value bookkeeping
    SyncMeta,
}

impl StoreName {
    pub fn as_str(&self) -> &'static str {
        match self {
            StoreName::MutationQueue => "mutationQueue",
            StoreName::SyncMeta => "syncMeta",
        }
    }
}

/// Local store handle
///
/// Cheap to clone; clones share the connection pool.
#[derive(Debug, Clone)]
pub struct LocalStore {
    pool: Option<SqlitePool>,
}

impl LocalStore {
    /// Open or create the store at `path`.
    ///
    /// Falls back to an unavailable store if the file cannot be opened.
    pub async fn open(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::try_open(path).await {
            Ok(pool) => {
                tracing::info!("Local store opened at {}", path.display());
                Self { pool: Some(pool) }
            }
            Err(e) => {
                tracing::warn!(
                    "Local store unavailable at {} ({}); continuing without persistence",
                    path.display(),
                    e
                );
                Self::unavailable()
            }
        }
    }

    /// In-memory store, used by tests and ephemeral sessions
    pub async fn in_memory() -> Self {
        let result = async {
            // the database lives only as long as its one connection, so that
            // connection is never reaped or recycled
            let pool = SqlitePoolOptions::new()
                .min_connections(1)
                .max_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect("sqlite::memory:")
                .await?;
            init_schema(&pool).await?;
            Ok::<_, sqlx::Error>(pool)
        }
        .await;

        match result {
            Ok(pool) => Self { pool: Some(pool) },
            Err(e) => {
                tracing::warn!("In-memory store unavailable: {}", e);
                Self::unavailable()
            }
        }
    }

    /// Store with no backing database; all operations are no-ops
    pub fn unavailable() -> Self {
        Self { pool: None }
    }

    pub fn is_available(&self) -> bool {
        self.pool.is_some()
    }

    async fn try_open(path: &Path) -> Result<SqlitePool, sqlx::Error> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .synchronous(SqliteSynchronous::Normal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(options)
            .await?;

        init_schema(&pool).await?;
        Ok(pool)
    }

    /// Durably write a value. Returns `false` on any failure.
    pub async fn put<T: Serialize + ?Sized>(&self, store: StoreName, key: &str, value: &T) -> bool {
        self.write(store, key, value, None).await
    }

    /// Write a value that reads as absent once `ttl` has elapsed
    pub async fn put_expiring<T: Serialize + ?Sized>(
        &self,
        store: StoreName,
        key: &str,
        value: &T,
        ttl: Duration,
    ) -> bool {
        let expires_at = now_millis() + ttl.as_millis() as i64;
        self.write(store, key, value, Some(expires_at)).await
    }

    async fn write<T: Serialize + ?Sized>(
        &self,
        store: StoreName,
        key: &str,
        value: &T,
        expires_at: Option<i64>,
    ) -> bool {
        let Some(pool) = &self.pool else {
            return false;
        };

        let data = match serde_json::to_string(value) {
            Ok(data) => data,
            Err(e) => {
                tracing::warn!("Refusing to store {}/{}: {}", store.as_str(), key, e);
                return false;
            }
        };

        let result = sqlx::query(
            "INSERT INTO records (store, key, value, updated_at, expires_at)
             VALUES (?, ?, ?, ?, ?)
             ON CONFLICT (store, key) DO UPDATE SET
                value = excluded.value,
                updated_at = excluded.updated_at,
                expires_at = excluded.expires_at",
        )
        .bind(store.as_str())
        .bind(key)
        .bind(&data)
        .bind(chrono::Utc::now().to_rfc3339())
        .bind(expires_at)
        .execute(pool)
        .await;

        degrade("put", result.map(|_| true), false)
    }

    /// Read a value; `None` if absent, expired, undecodable or unavailable
    pub async fn get<T: DeserializeOwned>(&self, store: StoreName, key: &str) -> Option<T> {
        let pool = self.pool.as_ref()?;

        let result = sqlx::query(
            "SELECT value FROM records
             WHERE store = ? AND key = ? AND (expires_at IS NULL OR expires_at > ?)",
        )
        .bind(store.as_str())
        .bind(key)
        .bind(now_millis())
        .fetch_optional(pool)
        .await;

        let row = degrade("get", result, None)?;
        let data: String = row.try_get("value").ok()?;
        decode(store, key, &data)
    }

    /// All live values in a store, in insertion order
    pub async fn get_all_items<T: DeserializeOwned>(&self, store: StoreName) -> Vec<T> {
        self.get_with_prefix(store, "")
            .await
            .into_iter()
            .map(|(_, value)| value)
            .collect()
    }

    /// Live `(key, value)` pairs whose key starts with `prefix`, in insertion order
    pub async fn get_with_prefix<T: DeserializeOwned>(
        &self,
        store: StoreName,
        prefix: &str,
    ) -> Vec<(String, T)> {
        let Some(pool) = &self.pool else {
            return Vec::new();
        };

        let result = sqlx::query(
            "SELECT key, value FROM records
             WHERE store = ? AND substr(key, 1, ?) = ? AND (expires_at IS NULL OR expires_at > ?)
             ORDER BY seq ASC",
        )
        .bind(store.as_str())
        .bind(prefix.chars().count() as i64)
        .bind(prefix)
        .bind(now_millis())
        .fetch_all(pool)
        .await;

        degrade("get_with_prefix", result, Vec::new())
            .into_iter()
            .filter_map(|row| {
                let key: String = row.try_get("key").ok()?;
                let data: String = row.try_get("value").ok()?;
                let value = decode(store, &key, &data)?;
                Some((key, value))
            })
            .collect()
    }

    /// Number of live records in a store; `0` when unavailable
    pub async fn count_pending(&self, store: StoreName) -> usize {
        let Some(pool) = &self.pool else {
            return 0;
        };

        let result: Result<(i64,), _> = sqlx::query_as(
            "SELECT COUNT(*) FROM records
             WHERE store = ? AND (expires_at IS NULL OR expires_at > ?)",
        )
        .bind(store.as_str())
        .bind(now_millis())
        .fetch_one(pool)
        .await;

        degrade("count_pending", result.map(|(n,)| n.max(0) as usize), 0)
    }

    /// Remove one record
    pub async fn delete(&self, store: StoreName, key: &str) -> bool {
        let Some(pool) = &self.pool else {
            return false;
        };

        let result = sqlx::query("DELETE FROM records WHERE store = ? AND key = ?")
            .bind(store.as_str())
            .bind(key)
            .execute(pool)
            .await;

        degrade("delete", result.map(|_| true), false)
    }

    /// Remove every record in a store
    pub async fn clear(&self, store: StoreName) -> bool {
        let Some(pool) = &self.pool else {
            return false;
        };

        let result = sqlx::query("DELETE FROM records WHERE store = ?")
            .bind(store.as_str())
            .execute(pool)
            .await;

        degrade("clear", result.map(|_| true), false)
    }

    /// Drop expired records; returns how many were removed
    pub async fn purge_expired(&self) -> u64 {
        let Some(pool) = &self.pool else {
            return 0;
        };

        let result = sqlx::query("DELETE FROM records WHERE expires_at IS NOT NULL AND expires_at <= ?")
            .bind(now_millis())
            .execute(pool)
            .await;

        degrade("purge_expired", result.map(|r| r.rows_affected()), 0)
    }

    /// Get store statistics
    pub async fn stats(&self) -> StoreStats {
        StoreStats {
            available: self.is_available(),
            mutation_records: self.count_pending(StoreName::MutationQueue).await,
            meta_records: self.count_pending(StoreName::SyncMeta).await,
        }
    }
}

/// Store statistics
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreStats {
    /// Whether a database is backing the store
    pub available: bool,
    /// Records in `mutationQueue`
    pub mutation_records: usize,
    /// Records in `syncMeta`
    pub meta_records: usize,
}

/// Create tables and apply pending migrations
async fn init_schema(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(schema::CREATE_MIGRATIONS_TABLE).execute(pool).await?;

    let (current_version,): (i32,) =
        sqlx::query_as("SELECT COALESCE(MAX(version), 0) FROM schema_migrations")
            .fetch_one(pool)
            .await?;

    if !schema::needs_migration(current_version) {
        return Ok(());
    }

    for (version, statements) in schema::get_pending_migrations(current_version) {
        let mut tx = pool.begin().await?;
        for statement in statements {
            sqlx::query(*statement).execute(&mut *tx).await?;
        }
        sqlx::query("INSERT INTO schema_migrations (version, applied_at) VALUES (?, ?)")
            .bind(version)
            .bind(chrono::Utc::now().to_rfc3339())
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        tracing::debug!("Applied local store migration {}", version);
    }

    Ok(())
}

fn degrade<T>(operation: &str, result: Result<T, sqlx::Error>, fallback: T) -> T {
    match result {
        Ok(value) => value,
        Err(e) => {
            tracing::warn!("Local store {} failed: {}", operation, e);
            fallback
        }
    }
}

fn decode<T: DeserializeOwned>(store: StoreName, key: &str, data: &str) -> Option<T> {
    match serde_json::from_str(data) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!("Skipping undecodable record {}/{}: {}", store.as_str(), key, e);
            None
        }
    }
}

fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
