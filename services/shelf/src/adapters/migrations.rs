//! services/shelf/src/adapters/migrations.rs
//!
//! Schema history for the SQLite store.
//!
//! Every version is an additive step (new tables, new columns, new indexes)
//! and steps are applied in order, one transaction each, so a database several
//! versions behind still passes through every intermediate schema.
//! To change the schema, append a `Migration` and bump `CURRENT_SCHEMA_VERSION`.

use shelf_core::ports::{PortError, PortResult};
use sqlx::SqlitePool;
use tracing::info;

pub const CURRENT_SCHEMA_VERSION: i64 = 3;

/// Metadata key holding the applied schema version.
pub const SCHEMA_VERSION_KEY: &str = "schema_version";

#[derive(Debug)]
pub struct Migration {
    pub version: i64,
    pub description: &'static str,
    pub statements: &'static [&'static str],
}

pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "records and metadata",
        statements: &[
            "CREATE TABLE IF NOT EXISTS metadata (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL
            )",
            "CREATE TABLE IF NOT EXISTS records (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                key TEXT NOT NULL,
                title TEXT NOT NULL,
                body TEXT NOT NULL,
                notes_count INTEGER NOT NULL DEFAULT 0
            )",
        ],
    },
    Migration {
        version: 2,
        description: "sources, records tagged by source",
        statements: &[
            "CREATE TABLE IF NOT EXISTS sources (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL,
                url TEXT NOT NULL UNIQUE,
                created_at TEXT NOT NULL
            )",
            "ALTER TABLE records ADD COLUMN source_id INTEGER REFERENCES sources(id)",
            "CREATE INDEX IF NOT EXISTS idx_records_source ON records(source_id)",
        ],
    },
    Migration {
        version: 3,
        description: "annotations and learned words",
        statements: &[
            "CREATE TABLE IF NOT EXISTS annotations (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                source_id INTEGER NOT NULL REFERENCES sources(id),
                record_key TEXT NOT NULL,
                position INTEGER NOT NULL,
                text TEXT NOT NULL,
                note TEXT
            )",
            "CREATE INDEX IF NOT EXISTS idx_annotations_record ON annotations(source_id, record_key)",
            "CREATE TABLE IF NOT EXISTS learned_words (
                word TEXT PRIMARY KEY,
                added_at TEXT NOT NULL
            )",
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_records_source_key ON records(source_id, key)",
        ],
    },
];

/// Reads the applied schema version. A fresh database reports 0.
pub async fn stored_version(pool: &SqlitePool) -> Result<i64, sqlx::Error> {
    let has_metadata: Option<(String,)> =
        sqlx::query_as("SELECT name FROM sqlite_master WHERE type = 'table' AND name = 'metadata'")
            .fetch_optional(pool)
            .await?;
    if has_metadata.is_none() {
        return Ok(0);
    }
    let row: Option<(String,)> = sqlx::query_as("SELECT value FROM metadata WHERE key = ?1")
        .bind(SCHEMA_VERSION_KEY)
        .fetch_optional(pool)
        .await?;
    Ok(row.and_then(|(v,)| v.parse().ok()).unwrap_or(0))
}

/// Brings the database up to `CURRENT_SCHEMA_VERSION`.
pub async fn migrate(pool: &SqlitePool) -> PortResult<i64> {
    migrate_to(pool, CURRENT_SCHEMA_VERSION).await
}

/// Applies every migration after the stored version, up to and including `target`.
pub async fn migrate_to(pool: &SqlitePool, target: i64) -> PortResult<i64> {
    let from = stored_version(pool)
        .await
        .map_err(|e| PortError::StorageUnavailable(e.to_string()))?;
    if from > CURRENT_SCHEMA_VERSION {
        return Err(PortError::StorageUnavailable(format!(
            "database schema v{} is newer than the supported v{}",
            from, CURRENT_SCHEMA_VERSION
        )));
    }
    if from >= target {
        return Ok(from);
    }

    info!(from_version = from, to_version = target, "Starting schema migration");
    for migration in MIGRATIONS
        .iter()
        .filter(|m| m.version > from && m.version <= target)
    {
        apply(pool, migration)
            .await
            .map_err(|e| {
                PortError::StorageUnavailable(format!(
                    "migration to v{} failed: {}",
                    migration.version, e
                ))
            })?;
        info!(version = migration.version, description = migration.description, "Applied migration");
    }
    Ok(target)
}

async fn apply(pool: &SqlitePool, migration: &Migration) -> Result<(), sqlx::Error> {
    let mut tx = pool.begin().await?;
    for statement in migration.statements {
        sqlx::query(statement).execute(&mut *tx).await?;
    }
    sqlx::query("INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)")
        .bind(SCHEMA_VERSION_KEY)
        .bind(migration.version.to_string())
        .execute(&mut *tx)
        .await?;
    tx.commit().await
}
