//! Shared fixtures for the integration tests: a temp-dir library backed by the
//! real SQLite and settings adapters, and a fetcher that serves canned JSON.

#![allow(dead_code)]

use async_trait::async_trait;
use serde_json::{json, Value};
use shelf_core::ports::{DatasetFetcher, PortError, PortResult};
use shelf_core::Library;
use shelf_lib::adapters::{JsonSettingsStore, SqliteStore};
use std::collections::HashMap;
use std::ops::Deref;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

pub const PAGE_SIZE: usize = 5;

/// Serves JSON documents registered per URL; unknown URLs fail like a 404.
#[derive(Default)]
pub struct StubFetcher {
    documents: Mutex<HashMap<String, Value>>,
    calls: AtomicUsize,
}

impl StubFetcher {
    pub fn serve(&self, url: &str, document: Value) {
        self.documents
            .lock()
            .unwrap()
            .insert(url.to_string(), document);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DatasetFetcher for StubFetcher {
    async fn fetch_json(&self, url: &str) -> PortResult<Value> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.documents
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| PortError::Fetch(format!("HTTP status client error (404 Not Found) for url ({})", url)))
    }
}

/// A `Library` wired to real adapters inside a temporary directory.
pub struct TestLibrary {
    pub library: Library,
    pub store: Arc<SqliteStore>,
    pub settings: Arc<JsonSettingsStore>,
    pub fetcher: Arc<StubFetcher>,
    pub dir: TempDir,
}

impl TestLibrary {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let fetcher = Arc::new(StubFetcher::default());
        let (library, store, settings) = build(&dir, fetcher.clone());
        Self {
            library,
            store,
            settings,
            fetcher,
            dir,
        }
    }

    /// A second library over the same files, as after an application restart.
    pub fn reopen(&self) -> Library {
        build(&self.dir, self.fetcher.clone()).0
    }

    pub fn db_path(&self) -> PathBuf {
        self.dir.path().join("shelf.db")
    }
}

impl Deref for TestLibrary {
    type Target = Library;

    fn deref(&self) -> &Library {
        &self.library
    }
}

fn build(
    dir: &TempDir,
    fetcher: Arc<StubFetcher>,
) -> (Library, Arc<SqliteStore>, Arc<JsonSettingsStore>) {
    let store = Arc::new(SqliteStore::new(dir.path().join("shelf.db")));
    let settings = Arc::new(JsonSettingsStore::open(dir.path().join("settings.json")));
    let library = Library::new(store.clone(), settings.clone(), fetcher, PAGE_SIZE);
    (library, store, settings)
}

/// A book export where book `i` carries `i % 3` annotations, plus one orphan.
pub fn books_document(titles: &[&str]) -> Value {
    let books: Vec<Value> = titles
        .iter()
        .enumerate()
        .map(|(i, title)| json!({"id": format!("b{}", i), "title": title, "author": "Anon", "path": format!("/books/{}", i)}))
        .collect();
    let mut annotations: Vec<Value> = Vec::new();
    for i in 0..titles.len() {
        for n in 0..(i % 3) {
            annotations.push(json!({"book_id": format!("b{}", i), "text": format!("passage {}-{}", i, n), "note": null}));
        }
    }
    annotations.push(json!({"book_id": "nobody", "text": "orphan", "note": "lost"}));
    json!({"books": books, "annotations": annotations})
}

/// A plain vocabulary list with one entry per headword.
pub fn words_document(words: &[&str]) -> Value {
    Value::Array(
        words
            .iter()
            .enumerate()
            .map(|(i, w)| json!({"word": w, "chinese": format!("{}的释义", w), "count": 100 - i}))
            .collect(),
    )
}

/// `n` distinct headwords: w00, w01, ...
pub fn numbered_words(n: usize) -> Vec<String> {
    (0..n).map(|i| format!("w{:02}", i)).collect()
}
