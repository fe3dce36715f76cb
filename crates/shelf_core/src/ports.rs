//! crates/shelf_core/src/ports.rs
//!
//! Defines the service contracts (traits) for the library core.
//! These traits form the boundary of the hexagonal architecture, so the core
//! never depends on a concrete database, settings file, or HTTP client.

use crate::domain::{Annotation, AnnotationGroups, Record, Source};
use async_trait::async_trait;
use serde_json::Value;

//=========================================================================================
// Generic Port Error and Result Types
//=========================================================================================

/// The error type shared by every port operation.
#[derive(Debug, thiserror::Error)]
pub enum PortError {
    /// The network request failed, returned an error status, or the body was not JSON.
    #[error("Fetch failed: {0}")]
    Fetch(String),
    /// The document parsed but did not have the expected shape.
    #[error("Invalid dataset: {0}")]
    Validation(String),
    /// The store could not be opened or migrated.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),
    /// A read or write transaction was aborted.
    #[error("Transaction aborted: {0}")]
    Transaction(String),
    #[error("Item not found: {0}")]
    NotFound(String),
}

/// A convenience type alias for `Result<T, PortError>`.
pub type PortResult<T> = Result<T, PortError>;

//=========================================================================================
// Service Ports (Traits)
//=========================================================================================

#[async_trait]
pub trait TableStore: Send + Sync {
    // --- Records ---
    /// Deletes every record and annotation of `source_id`, then inserts the new
    /// ones, as a single transaction.
    async fn replace_records_for_source(
        &self,
        source_id: i64,
        records: &[Record],
        annotations: &AnnotationGroups,
    ) -> PortResult<()>;

    /// Records of one source in insertion order.
    async fn query_by_source(&self, source_id: i64) -> PortResult<Vec<Record>>;

    /// Every record in the store, in insertion order.
    async fn query_all(&self) -> PortResult<Vec<Record>>;

    async fn count_by_source(&self, source_id: i64) -> PortResult<usize>;

    async fn annotations_for(&self, source_id: i64, record_key: &str)
        -> PortResult<Vec<Annotation>>;

    // --- Sources ---
    /// Returns the id registered for `url`, creating the source if needed.
    async fn upsert_source(&self, name: &str, url: &str) -> PortResult<i64>;

    async fn get_source(&self, source_id: i64) -> PortResult<Source>;

    async fn find_source_by_url(&self, url: &str) -> PortResult<Option<Source>>;

    async fn list_sources(&self) -> PortResult<Vec<Source>>;

    // --- Learned words ---
    async fn learned_words(&self) -> PortResult<Vec<String>>;

    /// Inserts the words not already present and returns how many were new.
    async fn add_learned_words(&self, words: &[String]) -> PortResult<usize>;

    // --- Metadata ---
    async fn get_metadata(&self, key: &str) -> PortResult<Option<String>>;

    async fn set_metadata(&self, key: &str, value: &str) -> PortResult<()>;
}

/// Small persistent map for scalar preferences.
///
/// Implementations are best-effort: a failed write keeps the value in memory
/// and logs a warning instead of surfacing an error.
pub trait SettingsStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
}

#[async_trait]
pub trait DatasetFetcher: Send + Sync {
    /// Fetches `url` and parses the body as JSON.
    async fn fetch_json(&self, url: &str) -> PortResult<Value>;
}
