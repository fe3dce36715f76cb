//! crates/shelf_core/src/importer.rs
//!
//! Validates fetched JSON documents and reshapes them into normalized records.
//! Nothing in here touches storage; `Library` wires these steps to the ports.

use crate::domain::{normalize_word, Annotation, AnnotationGroups, Book, NormalizedDataset, Record, Word};
use crate::ports::{PortError, PortResult};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::collections::HashSet;

const FALLBACK_SOURCE_NAME: &str = "New Dictionary";

//=========================================================================================
// Wire Shapes
//=========================================================================================

/// Ids arrive as strings in some exports and as integers in others.
#[derive(Deserialize)]
#[serde(untagged)]
enum RawKey {
    Text(String),
    Number(serde_json::Number),
}

impl RawKey {
    fn into_string(self) -> String {
        match self {
            RawKey::Text(s) => s,
            RawKey::Number(n) => n.to_string(),
        }
    }
}

#[derive(Deserialize)]
struct RawBook {
    id: RawKey,
    title: Option<String>,
    author: Option<String>,
    path: Option<String>,
}

#[derive(Deserialize)]
struct RawAnnotation {
    book_id: RawKey,
    text: Option<String>,
    note: Option<String>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RawTranslation {
    Text(String),
    List(Vec<String>),
}

#[derive(Deserialize)]
struct RawWord {
    #[serde(alias = "name")]
    word: String,
    chinese: Option<String>,
    trans: Option<RawTranslation>,
    note: Option<Value>,
    count: Option<u64>,
    index: Option<u64>,
}

/// Frequency-list rows keyed by their Chinese column headers.
#[derive(Deserialize)]
struct RawKeyedWord {
    #[serde(rename = "序号")]
    index: Option<u64>,
    #[serde(rename = "词频")]
    count: Option<u64>,
    #[serde(rename = "单词")]
    word: String,
    #[serde(rename = "释义")]
    chinese: Option<String>,
    #[serde(rename = "其他拼写")]
    note: Option<Value>,
}

//=========================================================================================
// Books
//=========================================================================================

/// Parses a `{books, annotations}` export, groups annotations per book and
/// stamps each book with its annotation count.
pub fn parse_books(document: Value) -> PortResult<NormalizedDataset> {
    let Value::Object(mut root) = document else {
        return Err(PortError::Validation(
            "expected an object with `books` and `annotations` arrays".to_string(),
        ));
    };
    let books: Vec<RawBook> = take_array(&mut root, "books")?;
    let annotations: Vec<RawAnnotation> = take_array(&mut root, "annotations")?;

    let mut seen = HashSet::new();
    let books: Vec<Book> = books
        .into_iter()
        .map(|raw| Book {
            id: raw.id.into_string(),
            title: raw.title.unwrap_or_default(),
            author: raw.author.unwrap_or_default(),
            path: raw.path.unwrap_or_default(),
        })
        .filter(|book| seen.insert(book.id.clone()))
        .collect();

    let annotations = annotations
        .into_iter()
        .map(|raw| Annotation {
            book_id: raw.book_id.into_string(),
            text: raw.text.unwrap_or_default(),
            note: raw.note.filter(|n| !n.trim().is_empty()),
        })
        .collect();

    let groups = group_annotations(&books, annotations);
    let records = books
        .into_iter()
        .map(|book| {
            let notes_count = groups.get(&book.id).map_or(0, Vec::len);
            Record::book(book, notes_count)
        })
        .collect();

    Ok(NormalizedDataset {
        records,
        annotations: groups,
    })
}

/// Groups annotations by parent book, preserving their order.
/// Annotations pointing at an unknown book are dropped.
pub fn group_annotations(books: &[Book], annotations: Vec<Annotation>) -> AnnotationGroups {
    let known: HashSet<&str> = books.iter().map(|b| b.id.as_str()).collect();
    let mut groups = AnnotationGroups::new();
    let mut orphans = 0usize;
    for annotation in annotations {
        if !known.contains(annotation.book_id.as_str()) {
            orphans += 1;
            continue;
        }
        groups
            .entry(annotation.book_id.clone())
            .or_default()
            .push(annotation);
    }
    if orphans > 0 {
        tracing::debug!(orphans, "Dropped annotations without a matching book");
    }
    groups
}

fn take_array<T: for<'de> Deserialize<'de>>(root: &mut Map<String, Value>, field: &str) -> PortResult<Vec<T>> {
    match root.remove(field) {
        Some(value @ Value::Array(_)) => serde_json::from_value(value)
            .map_err(|e| PortError::Validation(format!("malformed `{}` entry: {}", field, e))),
        Some(_) => Err(PortError::Validation(format!("`{}` is not an array", field))),
        None => Err(PortError::Validation(format!("missing `{}` array", field))),
    }
}

//=========================================================================================
// Vocabulary
//=========================================================================================

/// Parses a word dictionary: either a plain array of entries, or an object
/// whose array-valued fields hold frequency-list rows.
pub fn parse_words(document: Value) -> PortResult<Vec<Word>> {
    let items = match document {
        Value::Array(items) => items,
        Value::Object(map) => {
            let mut items = Vec::new();
            let mut found = false;
            for (_, value) in map {
                if let Value::Array(list) = value {
                    found = true;
                    items.extend(list);
                }
            }
            if !found {
                return Err(PortError::Validation(
                    "dictionary object contains no word list".to_string(),
                ));
            }
            items
        }
        _ => {
            return Err(PortError::Validation(
                "expected a word list or an object holding one".to_string(),
            ))
        }
    };

    items
        .into_iter()
        .enumerate()
        .map(|(position, item)| parse_word_item(item).map_err(|e| match e {
            PortError::Validation(msg) => PortError::Validation(format!("word #{}: {}", position + 1, msg)),
            other => other,
        }))
        .collect()
}

fn parse_word_item(item: Value) -> PortResult<Word> {
    let keyed = item.get("单词").is_some();
    let word = if keyed {
        let raw: RawKeyedWord =
            serde_json::from_value(item).map_err(|e| PortError::Validation(e.to_string()))?;
        Word {
            word: raw.word,
            translation: raw.chinese.unwrap_or_default(),
            note: scalar_note(raw.note),
            count: raw.count,
            index: raw.index,
        }
    } else {
        let raw: RawWord =
            serde_json::from_value(item).map_err(|e| PortError::Validation(e.to_string()))?;
        let translation = match (raw.chinese, raw.trans) {
            (Some(chinese), _) => chinese,
            (None, Some(RawTranslation::Text(text))) => text,
            (None, Some(RawTranslation::List(list))) => list.join("; "),
            (None, None) => String::new(),
        };
        Word {
            word: raw.word,
            translation,
            note: scalar_note(raw.note),
            count: raw.count,
            index: raw.index,
        }
    };
    if word.word.trim().is_empty() {
        return Err(PortError::Validation("empty headword".to_string()));
    }
    Ok(word)
}

fn scalar_note(note: Option<Value>) -> Option<String> {
    match note? {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s),
        other => Some(other.to_string()),
    }
}

/// Turns words into records, skipping learned words and repeated headwords.
pub fn prepare_words(words: Vec<Word>, learned: &HashSet<String>) -> Vec<Record> {
    let mut seen = HashSet::new();
    words
        .into_iter()
        .map(Record::word)
        .filter(|record| !learned.contains(&record.key))
        .filter(|record| seen.insert(record.key.clone()))
        .collect()
}

//=========================================================================================
// Learned Words
//=========================================================================================

/// Parses a plain array of strings into normalized word keys.
/// Blank entries are skipped; repeats are kept so callers can count them.
pub fn parse_learned(document: Value) -> PortResult<Vec<String>> {
    let entries: Vec<String> = match document {
        Value::Array(_) => serde_json::from_value(document)
            .map_err(|e| PortError::Validation(format!("learned words must be strings: {}", e)))?,
        _ => {
            return Err(PortError::Validation(
                "expected an array of learned words".to_string(),
            ))
        }
    };
    Ok(entries
        .iter()
        .map(|w| normalize_word(w))
        .filter(|w| !w.is_empty())
        .collect())
}

//=========================================================================================
// Sources
//=========================================================================================

/// Display name for a source: the last non-empty path segment of its URL.
pub fn default_source_name(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or_default();
    path.rsplit('/')
        .find(|segment| !segment.is_empty() && !segment.ends_with(':'))
        .map(str::to_string)
        .unwrap_or_else(|| FALLBACK_SOURCE_NAME.to_string())
}
