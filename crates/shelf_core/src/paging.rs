//! crates/shelf_core/src/paging.rs
//!
//! Fixed-size windows over record sequences, plus title search.

use crate::domain::{Page, Record};

/// Number of pages needed to show `count` items.
pub fn page_count(count: usize, page_size: usize) -> usize {
    count.div_ceil(page_size.max(1))
}

/// Start of the last page, or `0` for an empty sequence.
fn last_page_offset(count: usize, page_size: usize) -> usize {
    if count == 0 {
        0
    } else {
        (count - 1) / page_size * page_size
    }
}

/// Clamps `offset` to the start of the last page, rounded down to a page boundary.
pub fn clamp_offset(offset: usize, count: usize, page_size: usize) -> usize {
    let page_size = page_size.max(1);
    let clamped = offset.min(last_page_offset(count, page_size));
    clamped - clamped % page_size
}

pub fn get_page<T: Clone>(items: &[T], offset: usize, page_size: usize) -> Page<T> {
    let page_size = page_size.max(1);
    let total = items.len();
    let offset = clamp_offset(offset, total, page_size);
    let end = (offset + page_size).min(total);
    Page {
        items: items[offset..end].to_vec(),
        offset,
        total,
        has_next: end < total,
        has_prev: offset > 0,
    }
}

/// Offset of 1-based `page_number`, or `None` when the page does not exist.
pub fn jump_to_page(page_number: usize, page_size: usize, count: usize) -> Option<usize> {
    let page_size = page_size.max(1);
    if page_number == 0 || page_number > page_count(count, page_size) {
        return None;
    }
    Some((page_number - 1) * page_size)
}

/// Validates a persisted offset against the current dataset.
///
/// An offset inside `[0, count)` is rounded down to its page boundary; one the
/// dataset has shrunk below resets to `0`.
pub fn restore_offset(stored: usize, count: usize, page_size: usize) -> usize {
    let page_size = page_size.max(1);
    if stored < count {
        stored - stored % page_size
    } else {
        0
    }
}

/// Case-insensitive substring match on record titles, order preserved.
pub fn search<'a>(records: &'a [Record], term: &str) -> Vec<&'a Record> {
    if term.trim().is_empty() {
        return records.iter().collect();
    }
    let needle = term.to_lowercase();
    records
        .iter()
        .filter(|r| r.title().to_lowercase().contains(&needle))
        .collect()
}
