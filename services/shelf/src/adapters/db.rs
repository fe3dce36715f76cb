//! services/shelf/src/adapters/db.rs
//!
//! This module contains the database adapter, which is the concrete implementation
//! of the `TableStore` port from the `core` crate. It keeps every table in one
//! SQLite file and talks to it through `sqlx`.

use super::migrations;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shelf_core::domain::{Annotation, AnnotationGroups, Record, RecordBody, Source};
use shelf_core::ports::{PortError, PortResult, TableStore};
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous};
use sqlx::{FromRow, SqlitePool};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info};

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// A SQLite adapter that implements the `TableStore` port.
///
/// The connection pool is opened, and the schema migrated, on first use.
/// It then lives as long as the adapter.
pub struct SqliteStore {
    path: PathBuf,
    pool: OnceCell<SqlitePool>,
}

impl SqliteStore {
    /// Creates a new `SqliteStore` for the database file at `path`. Nothing is
    /// opened until the first operation.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            pool: OnceCell::new(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The schema version of the opened database.
    pub async fn schema_version(&self) -> PortResult<i64> {
        let pool = self.pool().await?;
        migrations::stored_version(pool).await.map_err(map_sqlx)
    }

    async fn pool(&self) -> PortResult<&SqlitePool> {
        self.pool.get_or_try_init(|| self.open()).await
    }

    async fn open(&self) -> PortResult<SqlitePool> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| PortError::StorageUnavailable(e.to_string()))?;
        }

        let connect_opts = SqliteConnectOptions::new()
            .filename(&self.path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5))
            .synchronous(SqliteSynchronous::Normal);

        let pool = SqlitePoolOptions::new()
            .max_connections(4)
            .connect_with(connect_opts)
            .await
            .map_err(|e| PortError::StorageUnavailable(e.to_string()))?;

        let version = migrations::migrate(&pool).await?;
        info!(path = %self.path.display(), schema_version = version, "Database connected");
        Ok(pool)
    }
}

/// Pool-level failures mean the store itself is unusable; everything else is
/// an aborted statement or transaction.
fn map_sqlx(e: sqlx::Error) -> PortError {
    match e {
        sqlx::Error::PoolClosed | sqlx::Error::PoolTimedOut => {
            PortError::StorageUnavailable(e.to_string())
        }
        other => PortError::Transaction(other.to_string()),
    }
}

//=========================================================================================
// Database Row Structs
//=========================================================================================

#[derive(FromRow)]
struct RecordRow {
    key: String,
    body: String,
    notes_count: i64,
}
impl RecordRow {
    fn to_domain(self) -> PortResult<Record> {
        let body: RecordBody = serde_json::from_str(&self.body).map_err(|e| {
            PortError::Transaction(format!("corrupt body for record {}: {}", self.key, e))
        })?;
        Ok(Record {
            key: self.key,
            body,
            notes_count: self.notes_count.max(0) as usize,
        })
    }
}

#[derive(FromRow)]
struct SourceRow {
    id: i64,
    name: String,
    url: String,
    created_at: DateTime<Utc>,
}
impl SourceRow {
    fn to_domain(self) -> Source {
        Source {
            id: self.id,
            name: self.name,
            url: self.url,
            created_at: self.created_at,
        }
    }
}

#[derive(FromRow)]
struct AnnotationRow {
    record_key: String,
    text: String,
    note: Option<String>,
}
impl AnnotationRow {
    fn to_domain(self) -> Annotation {
        Annotation {
            book_id: self.record_key,
            text: self.text,
            note: self.note,
        }
    }
}

//=========================================================================================
// `TableStore` Trait Implementation
//=========================================================================================

#[async_trait]
impl TableStore for SqliteStore {
    async fn replace_records_for_source(
        &self,
        source_id: i64,
        records: &[Record],
        annotations: &AnnotationGroups,
    ) -> PortResult<()> {
        let pool = self.pool().await?;
        let mut tx = pool.begin().await.map_err(map_sqlx)?;

        let removed = sqlx::query("DELETE FROM annotations WHERE source_id = ?1")
            .bind(source_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?
            .rows_affected();
        let replaced = sqlx::query("DELETE FROM records WHERE source_id = ?1")
            .bind(source_id)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?
            .rows_affected();

        let mut annotation_rows = 0usize;
        for record in records {
            let body = serde_json::to_string(&record.body)
                .map_err(|e| PortError::Transaction(e.to_string()))?;
            sqlx::query(
                "INSERT INTO records (source_id, key, title, body, notes_count) VALUES (?1, ?2, ?3, ?4, ?5)",
            )
            .bind(source_id)
            .bind(&record.key)
            .bind(record.title())
            .bind(body)
            .bind(record.notes_count as i64)
            .execute(&mut *tx)
            .await
            .map_err(map_sqlx)?;

            let Some(group) = annotations.get(&record.key) else {
                continue;
            };
            for (position, annotation) in group.iter().enumerate() {
                sqlx::query(
                    "INSERT INTO annotations (source_id, record_key, position, text, note) VALUES (?1, ?2, ?3, ?4, ?5)",
                )
                .bind(source_id)
                .bind(&record.key)
                .bind(position as i64)
                .bind(&annotation.text)
                .bind(&annotation.note)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx)?;
                annotation_rows += 1;
            }
        }

        tx.commit().await.map_err(map_sqlx)?;
        debug!(
            source_id,
            replaced,
            removed_annotations = removed,
            inserted = records.len(),
            annotations = annotation_rows,
            "Replaced records for source"
        );
        Ok(())
    }

    async fn query_by_source(&self, source_id: i64) -> PortResult<Vec<Record>> {
        let pool = self.pool().await?;
        let rows: Vec<RecordRow> = sqlx::query_as(
            "SELECT key, body, notes_count FROM records WHERE source_id = ?1 ORDER BY id ASC",
        )
        .bind(source_id)
        .fetch_all(pool)
        .await
        .map_err(map_sqlx)?;

        rows.into_iter().map(RecordRow::to_domain).collect()
    }

    async fn query_all(&self) -> PortResult<Vec<Record>> {
        let pool = self.pool().await?;
        let rows: Vec<RecordRow> =
            sqlx::query_as("SELECT key, body, notes_count FROM records ORDER BY id ASC")
                .fetch_all(pool)
                .await
                .map_err(map_sqlx)?;

        rows.into_iter().map(RecordRow::to_domain).collect()
    }

    async fn count_by_source(&self, source_id: i64) -> PortResult<usize> {
        let pool = self.pool().await?;
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM records WHERE source_id = ?1")
            .bind(source_id)
            .fetch_one(pool)
            .await
            .map_err(map_sqlx)?;
        Ok(count.max(0) as usize)
    }

    async fn annotations_for(
        &self,
        source_id: i64,
        record_key: &str,
    ) -> PortResult<Vec<Annotation>> {
        let pool = self.pool().await?;
        let rows: Vec<AnnotationRow> = sqlx::query_as(
            "SELECT record_key, text, note FROM annotations WHERE source_id = ?1 AND record_key = ?2 ORDER BY position ASC",
        )
        .bind(source_id)
        .bind(record_key)
        .fetch_all(pool)
        .await
        .map_err(map_sqlx)?;

        Ok(rows.into_iter().map(AnnotationRow::to_domain).collect())
    }

    async fn upsert_source(&self, name: &str, url: &str) -> PortResult<i64> {
        let pool = self.pool().await?;
        let created = sqlx::query("INSERT OR IGNORE INTO sources (name, url, created_at) VALUES (?1, ?2, ?3)")
            .bind(name)
            .bind(url)
            .bind(Utc::now())
            .execute(pool)
            .await
            .map_err(map_sqlx)?
            .rows_affected()
            > 0;

        let (id,): (i64,) = sqlx::query_as("SELECT id FROM sources WHERE url = ?1")
            .bind(url)
            .fetch_one(pool)
            .await
            .map_err(map_sqlx)?;
        if created {
            info!(source_id = id, name, url, "Registered new source");
        }
        Ok(id)
    }

    async fn get_source(&self, source_id: i64) -> PortResult<Source> {
        let pool = self.pool().await?;
        let row: Option<SourceRow> =
            sqlx::query_as("SELECT id, name, url, created_at FROM sources WHERE id = ?1")
                .bind(source_id)
                .fetch_optional(pool)
                .await
                .map_err(map_sqlx)?;
        row.map(SourceRow::to_domain)
            .ok_or_else(|| PortError::NotFound(format!("Source {} not found", source_id)))
    }

    async fn find_source_by_url(&self, url: &str) -> PortResult<Option<Source>> {
        let pool = self.pool().await?;
        let row: Option<SourceRow> =
            sqlx::query_as("SELECT id, name, url, created_at FROM sources WHERE url = ?1")
                .bind(url)
                .fetch_optional(pool)
                .await
                .map_err(map_sqlx)?;
        Ok(row.map(SourceRow::to_domain))
    }

    async fn list_sources(&self) -> PortResult<Vec<Source>> {
        let pool = self.pool().await?;
        let rows: Vec<SourceRow> =
            sqlx::query_as("SELECT id, name, url, created_at FROM sources ORDER BY id ASC")
                .fetch_all(pool)
                .await
                .map_err(map_sqlx)?;
        Ok(rows.into_iter().map(SourceRow::to_domain).collect())
    }

    async fn learned_words(&self) -> PortResult<Vec<String>> {
        let pool = self.pool().await?;
        let rows: Vec<(String,)> = sqlx::query_as("SELECT word FROM learned_words ORDER BY rowid ASC")
            .fetch_all(pool)
            .await
            .map_err(map_sqlx)?;
        Ok(rows.into_iter().map(|(word,)| word).collect())
    }

    async fn add_learned_words(&self, words: &[String]) -> PortResult<usize> {
        let pool = self.pool().await?;
        let now = Utc::now();
        let mut tx = pool.begin().await.map_err(map_sqlx)?;
        let mut added = 0u64;
        for word in words {
            added += sqlx::query("INSERT OR IGNORE INTO learned_words (word, added_at) VALUES (?1, ?2)")
                .bind(word)
                .bind(now)
                .execute(&mut *tx)
                .await
                .map_err(map_sqlx)?
                .rows_affected();
        }
        tx.commit().await.map_err(map_sqlx)?;
        Ok(added as usize)
    }

    async fn get_metadata(&self, key: &str) -> PortResult<Option<String>> {
        let pool = self.pool().await?;
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM metadata WHERE key = ?1")
            .bind(key)
            .fetch_optional(pool)
            .await
            .map_err(map_sqlx)?;
        Ok(row.map(|(value,)| value))
    }

    async fn set_metadata(&self, key: &str, value: &str) -> PortResult<()> {
        let pool = self.pool().await?;
        sqlx::query("INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)")
            .bind(key)
            .bind(value)
            .execute(pool)
            .await
            .map_err(map_sqlx)?;
        Ok(())
    }
}
