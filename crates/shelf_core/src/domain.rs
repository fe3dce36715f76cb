//! crates/shelf_core/src/domain.rs
//!
//! Defines the pure, core data structures for the library store.
//! Storage adapters decide how these are laid out on disk; the only
//! serialization concern here is the record body, which adapters persist as JSON.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// A book from an annotation export.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Book {
    pub id: String,
    pub title: String,
    pub author: String,
    pub path: String,
}

/// A vocabulary entry from a word dictionary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Word {
    pub word: String,
    pub translation: String,
    pub note: Option<String>,
    pub count: Option<u64>,
    pub index: Option<u64>,
}

/// The dataset-specific part of a `Record`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum RecordBody {
    Book(Book),
    Word(Word),
}

/// A Book or a Word normalized into the canonical shape.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    /// Natural key: the book id, or the normalized headword.
    pub key: String,
    pub body: RecordBody,
    /// Number of annotations attached at import time. Always 0 for words.
    pub notes_count: usize,
}

impl Record {
    pub fn book(book: Book, notes_count: usize) -> Self {
        Self {
            key: book.id.clone(),
            body: RecordBody::Book(book),
            notes_count,
        }
    }

    pub fn word(word: Word) -> Self {
        Self {
            key: normalize_word(&word.word),
            body: RecordBody::Word(word),
            notes_count: 0,
        }
    }

    /// The text shown in listings and matched by search.
    pub fn title(&self) -> &str {
        match &self.body {
            RecordBody::Book(book) => &book.title,
            RecordBody::Word(word) => &word.word,
        }
    }
}

/// A highlighted passage belonging to one book.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Annotation {
    pub book_id: String,
    pub text: String,
    pub note: Option<String>,
}

/// Annotations keyed by record key, each list in import order.
pub type AnnotationGroups = HashMap<String, Vec<Annotation>>;

/// One imported dataset, identified by its origin URL.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Source {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub created_at: DateTime<Utc>,
}

/// The result of transforming a fetched document, before it is written.
#[derive(Debug, Clone, Default)]
pub struct NormalizedDataset {
    pub records: Vec<Record>,
    pub annotations: AnnotationGroups,
}

/// Counters reported by a dataset import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImportReport {
    pub source_id: i64,
    /// Records present in the fetched document.
    pub total: usize,
    /// Records actually written for the source.
    pub inserted: usize,
}

/// Counters reported by a learned-words import.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LearnedImport {
    pub total: usize,
    pub added: usize,
}

/// A fixed-size window over a sequence of items.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub offset: usize,
    pub total: usize,
    pub has_next: bool,
    pub has_prev: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    pub fn as_str(&self) -> &'static str {
        match self {
            Theme::Light => "light",
            Theme::Dark => "dark",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "light" => Some(Theme::Light),
            // Older deck builds stored the dark theme as "black".
            "dark" | "black" => Some(Theme::Dark),
            _ => None,
        }
    }
}

/// Canonical form of a headword, used for record keys and the learned set.
pub fn normalize_word(word: &str) -> String {
    word.trim().to_lowercase()
}
