//! Database Schema Definitions
//!
//! Contains the local store schema and its migration table.

/// Current database schema version
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Statements applied for each schema version, in order
pub const MIGRATIONS: &[(i32, &[&str])] = &[(
    1,
    &[
        "CREATE TABLE IF NOT EXISTS records (
            seq INTEGER PRIMARY KEY AUTOINCREMENT,
            store TEXT NOT NULL,
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL,
            expires_at INTEGER,
            UNIQUE (store, key)
        )",
        "CREATE INDEX IF NOT EXISTS idx_records_store_seq ON records (store, seq)",
    ],
)];

/// Migration bookkeeping table
pub const CREATE_MIGRATIONS_TABLE: &str = "CREATE TABLE IF NOT EXISTS schema_migrations (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL
)";

/// Check if database needs migration
pub fn needs_migration(current_version: i32) -> bool {
    current_version < CURRENT_SCHEMA_VERSION
}

/// Get pending migrations
pub fn get_pending_migrations(current_version: i32) -> Vec<(i32, &'static [&'static str])> {
    MIGRATIONS
        .iter()
        .filter(|(v, _)| *v > current_version)
        .cloned()
        .collect()
}
