//! Paginated result snapshots.
//!
//! # Invariants
//! - Only `page_size`, `page_index` and `record_count` are stored; every
//!   other paging number is derived from them.
//! - `page_size` is never zero: absent or non-positive sizes become
//!   `UNBOUNDED_PAGE_SIZE`.
//! - Previous/next page indexes are clamped to `[0, last_page_index]` and
//!   never negative.

use serde::Serialize;

/// Page size standing for "all rows on one page".
pub const UNBOUNDED_PAGE_SIZE: i64 = i64::MAX;

/// One materialized page plus the total matching row count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PaginatedResult<T> {
    records: Vec<T>,
    page_size: i64,
    page_index: i64,
    record_count: i64,
}

impl<T> PaginatedResult<T> {
    /// Wraps an already-sliced page.
    ///
    /// `page_size`/`page_index` go through the same defaulting as requests.
    pub fn new(records: Vec<T>, page_size: Option<i64>, page_index: Option<i64>, record_count: i64) -> Self {
        Self {
            records,
            page_size: normalize_page_size(page_size),
            page_index: normalize_page_index(page_index),
            record_count: record_count.max(0),
        }
    }

    /// Treats `records` as the only page of the whole result.
    pub fn from_records(records: Vec<T>) -> Self {
        let count = i64::try_from(records.len()).unwrap_or(i64::MAX);
        Self::new(records, Some(count), Some(0), count)
    }

    pub fn records(&self) -> &[T] {
        &self.records
    }

    pub fn into_records(self) -> Vec<T> {
        self.records
    }

    pub fn page_size(&self) -> i64 {
        self.page_size
    }

    pub fn page_index(&self) -> i64 {
        self.page_index
    }

    pub fn record_count(&self) -> i64 {
        self.record_count
    }

    pub fn page_count(&self) -> i64 {
        let full_pages = self.record_count / self.page_size;
        if self.record_count % self.page_size > 0 {
            full_pages + 1
        } else {
            full_pages
        }
    }

    pub fn first_page_index(&self) -> i64 {
        0
    }

    /// `-1` when there are no records.
    pub fn last_page_index(&self) -> i64 {
        self.page_count() - 1
    }

    pub fn previous_page_index(&self) -> i64 {
        (self.page_index - 1).max(self.first_page_index())
    }

    pub fn next_page_index(&self) -> i64 {
        self.page_index
            .saturating_add(1)
            .min(self.last_page_index())
            .max(self.first_page_index())
    }

    pub fn page_number(&self) -> i64 {
        self.page_index.saturating_add(1)
    }

    pub fn first_page_number(&self) -> i64 {
        self.first_page_index() + 1
    }

    pub fn last_page_number(&self) -> i64 {
        self.last_page_index() + 1
    }

    pub fn previous_page_number(&self) -> i64 {
        self.previous_page_index() + 1
    }

    pub fn next_page_number(&self) -> i64 {
        self.next_page_index() + 1
    }

    pub fn has_records(&self) -> bool {
        self.record_count != 0
    }

    pub fn has_next_page(&self) -> bool {
        self.page_number() < self.last_page_number()
    }

    pub fn has_previous_page(&self) -> bool {
        self.page_number() > self.first_page_number()
    }

    pub fn has_more_than_one_page(&self) -> bool {
        self.page_count() > 1
    }
}

pub(crate) fn normalize_page_size(page_size: Option<i64>) -> i64 {
    match page_size {
        Some(size) if size > 0 => size,
        _ => UNBOUNDED_PAGE_SIZE,
    }
}

pub(crate) fn normalize_page_index(page_index: Option<i64>) -> i64 {
    match page_index {
        Some(index) if index > 0 => index,
        _ => 0,
    }
}
