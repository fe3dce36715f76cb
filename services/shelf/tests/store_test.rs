//! SQLite table store tests
//!
//! Exercises `SqliteStore` directly: replace semantics, transaction boundaries,
//! sources, learned words, metadata and schema migrations.

mod common;

use shelf_core::domain::{Annotation, AnnotationGroups, Book, Record, RecordBody, Word};
use shelf_core::ports::{PortError, TableStore};
use shelf_lib::adapters::migrations::{self, CURRENT_SCHEMA_VERSION};
use shelf_lib::adapters::SqliteStore;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::Path;
use std::sync::Arc;

fn word_record(word: &str) -> Record {
    Record::word(Word {
        word: word.to_string(),
        translation: format!("{} (zh)", word),
        note: None,
        count: None,
        index: None,
    })
}

fn word_records(words: &[&str]) -> Vec<Record> {
    words.iter().map(|w| word_record(w)).collect()
}

fn keys(records: &[Record]) -> Vec<String> {
    records.iter().map(|r| r.key.clone()).collect()
}

async fn raw_pool(path: &Path) -> SqlitePool {
    let opts = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(true);
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(opts)
        .await
        .unwrap()
}

// ===== replace_records_for_source tests =====

#[tokio::test]
async fn test_replace_keeps_only_latest_payload() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::new(dir.path().join("shelf.db"));
    let source = store.upsert_source("CET4", "https://x/CET4.json").await.unwrap();

    store
        .replace_records_for_source(source, &word_records(&["apple", "banana", "cherry"]), &AnnotationGroups::new())
        .await
        .unwrap();
    store
        .replace_records_for_source(source, &word_records(&["delta", "echo"]), &AnnotationGroups::new())
        .await
        .unwrap();

    let records = store.query_by_source(source).await.unwrap();
    assert_eq!(keys(&records), vec!["delta", "echo"]);
    assert_eq!(store.count_by_source(source).await.unwrap(), 2);
}

#[tokio::test]
async fn test_replace_leaves_other_sources_alone() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::new(dir.path().join("shelf.db"));
    let first = store.upsert_source("a", "https://x/a.json").await.unwrap();
    let second = store.upsert_source("b", "https://x/b.json").await.unwrap();
    assert_ne!(first, second);

    store
        .replace_records_for_source(first, &word_records(&["apple"]), &AnnotationGroups::new())
        .await
        .unwrap();
    store
        .replace_records_for_source(second, &word_records(&["apple", "pear"]), &AnnotationGroups::new())
        .await
        .unwrap();
    store
        .replace_records_for_source(first, &word_records(&["fig"]), &AnnotationGroups::new())
        .await
        .unwrap();

    assert_eq!(keys(&store.query_by_source(second).await.unwrap()), vec!["apple", "pear"]);
    assert_eq!(keys(&store.query_all().await.unwrap()), vec!["apple", "pear", "fig"]);
}

#[tokio::test]
async fn test_failed_replace_rolls_back() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::new(dir.path().join("shelf.db"));
    let source = store.upsert_source("CET4", "https://x/CET4.json").await.unwrap();
    store
        .replace_records_for_source(source, &word_records(&["apple", "banana"]), &AnnotationGroups::new())
        .await
        .unwrap();

    // The second insert violates UNIQUE(source_id, key) after the delete already ran.
    let err = store
        .replace_records_for_source(source, &word_records(&["cherry", "cherry"]), &AnnotationGroups::new())
        .await
        .unwrap_err();
    assert!(matches!(err, PortError::Transaction(_)), "got {:?}", err);

    let records = store.query_by_source(source).await.unwrap();
    assert_eq!(keys(&records), vec!["apple", "banana"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_readers_never_see_a_half_replaced_source() {
    let dir = tempfile::tempdir().unwrap();
    let store = Arc::new(SqliteStore::new(dir.path().join("shelf.db")));
    let source = store.upsert_source("big", "https://x/big.json").await.unwrap();
    store
        .replace_records_for_source(source, &word_records(&["a", "b", "c"]), &AnnotationGroups::new())
        .await
        .unwrap();

    let replacement: Vec<Record> = (0..500).map(|i| word_record(&format!("word{}", i))).collect();
    let writer = {
        let store = store.clone();
        tokio::spawn(async move {
            store
                .replace_records_for_source(source, &replacement, &AnnotationGroups::new())
                .await
        })
    };

    while !writer.is_finished() {
        let seen = store.count_by_source(source).await.unwrap();
        assert!(seen == 3 || seen == 500, "reader saw {} records", seen);
    }
    writer.await.unwrap().unwrap();
    assert_eq!(store.count_by_source(source).await.unwrap(), 500);
}

#[tokio::test]
async fn test_annotations_are_replaced_with_their_records() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::new(dir.path().join("shelf.db"));
    let source = store.upsert_source("books", "https://x/books.json").await.unwrap();

    let book = Book {
        id: "b1".to_string(),
        title: "Dune".to_string(),
        author: "Frank Herbert".to_string(),
        path: "/dune".to_string(),
    };
    let mut groups = AnnotationGroups::new();
    groups.insert(
        "b1".to_string(),
        vec![
            Annotation { book_id: "b1".to_string(), text: "first".to_string(), note: Some("n".to_string()) },
            Annotation { book_id: "b1".to_string(), text: "second".to_string(), note: None },
        ],
    );
    store
        .replace_records_for_source(source, &[Record::book(book.clone(), 2)], &groups)
        .await
        .unwrap();

    let stored = store.annotations_for(source, "b1").await.unwrap();
    assert_eq!(stored, groups["b1"]);
    let records = store.query_by_source(source).await.unwrap();
    assert_eq!(records[0].notes_count, 2);
    assert_eq!(records[0].body, RecordBody::Book(book.clone()));

    store
        .replace_records_for_source(source, &[Record::book(book, 0)], &AnnotationGroups::new())
        .await
        .unwrap();
    assert!(store.annotations_for(source, "b1").await.unwrap().is_empty());
}

// ===== source tests =====

#[tokio::test]
async fn test_upsert_source_reuses_url() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::new(dir.path().join("shelf.db"));

    let id = store.upsert_source("CET4", "https://x/CET4.json").await.unwrap();
    let again = store.upsert_source("Renamed", "https://x/CET4.json").await.unwrap();
    assert_eq!(id, again);

    let source = store.get_source(id).await.unwrap();
    assert_eq!(source.name, "CET4");
    assert_eq!(store.list_sources().await.unwrap().len(), 1);
    assert_eq!(
        store.find_source_by_url("https://x/CET4.json").await.unwrap().map(|s| s.id),
        Some(id)
    );
    assert!(store.find_source_by_url("https://x/other.json").await.unwrap().is_none());
    assert!(matches!(store.get_source(id + 100).await, Err(PortError::NotFound(_))));
}

// ===== learned words and metadata tests =====

#[tokio::test]
async fn test_learned_words_are_a_set() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::new(dir.path().join("shelf.db"));

    let added = store
        .add_learned_words(&["apple".to_string(), "apple".to_string(), "banana".to_string()])
        .await
        .unwrap();
    assert_eq!(added, 2);
    let added = store
        .add_learned_words(&["banana".to_string(), "cherry".to_string()])
        .await
        .unwrap();
    assert_eq!(added, 1);
    assert_eq!(store.learned_words().await.unwrap(), vec!["apple", "banana", "cherry"]);
}

#[tokio::test]
async fn test_metadata_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::new(dir.path().join("shelf.db"));

    assert_eq!(store.get_metadata("lastFetched").await.unwrap(), None);
    store.set_metadata("lastFetched", "2024-01-01T00:00:00Z").await.unwrap();
    store.set_metadata("lastFetched", "2024-02-01T00:00:00Z").await.unwrap();
    assert_eq!(
        store.get_metadata("lastFetched").await.unwrap().as_deref(),
        Some("2024-02-01T00:00:00Z")
    );
}

// ===== open and migration tests =====

#[tokio::test]
async fn test_fresh_store_is_at_current_version() {
    let dir = tempfile::tempdir().unwrap();
    let store = SqliteStore::new(dir.path().join("nested").join("shelf.db"));
    assert_eq!(store.schema_version().await.unwrap(), CURRENT_SCHEMA_VERSION);
    assert!(store.path().exists());
}

#[tokio::test]
async fn test_v1_database_is_upgraded_in_place() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shelf.db");

    let pool = raw_pool(&path).await;
    assert_eq!(migrations::migrate_to(&pool, 1).await.unwrap(), 1);
    let body = serde_json::to_string(&word_record("legacy").body).unwrap();
    sqlx::query("INSERT INTO records (key, title, body, notes_count) VALUES (?1, ?2, ?3, 0)")
        .bind("legacy")
        .bind("legacy")
        .bind(body)
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    let store = SqliteStore::new(&path);
    assert_eq!(store.schema_version().await.unwrap(), CURRENT_SCHEMA_VERSION);
    assert_eq!(keys(&store.query_all().await.unwrap()), vec!["legacy"]);

    // Tables from later versions are usable on the upgraded file.
    let source = store.upsert_source("new", "https://x/new.json").await.unwrap();
    store
        .replace_records_for_source(source, &word_records(&["fresh"]), &AnnotationGroups::new())
        .await
        .unwrap();
    assert_eq!(keys(&store.query_all().await.unwrap()), vec!["legacy", "fresh"]);
}

#[tokio::test]
async fn test_newer_schema_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("shelf.db");

    let pool = raw_pool(&path).await;
    migrations::migrate(&pool).await.unwrap();
    sqlx::query("UPDATE metadata SET value = '99' WHERE key = ?1")
        .bind(migrations::SCHEMA_VERSION_KEY)
        .execute(&pool)
        .await
        .unwrap();
    pool.close().await;

    let store = SqliteStore::new(&path);
    let err = store.query_all().await.unwrap_err();
    assert!(matches!(err, PortError::StorageUnavailable(msg) if msg.contains("v99")));
}

#[tokio::test]
async fn test_unopenable_path_is_storage_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let blocker = dir.path().join("blocker");
    std::fs::write(&blocker, "").unwrap();

    let store = SqliteStore::new(blocker.join("shelf.db"));
    assert!(matches!(
        store.get_metadata("lastFetched").await,
        Err(PortError::StorageUnavailable(_))
    ));
}
