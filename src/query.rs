//! Query normalisation – turns raw presentation-layer input into typed
//! filters before delegating to the store.
//!
//! The policy is silent fallback: input that does not parse becomes
//! "filter absent" instead of an error. In an interactive search box a
//! half-typed number must narrow nothing, not fail the query.

use std::sync::Arc;

use anyhow::Result;
use chrono::{Local, NaiveDate, TimeZone};

use crate::db::{FileRecord, SearchFilters, SortKey};
use crate::store::MetadataStore;

/// Raw search input as a presentation layer would collect it. String
/// fields may be empty or garbage; both mean "no filter".
#[derive(Debug, Clone, Default)]
pub struct SearchRequest {
    /// Case-insensitive substring of the file name.
    pub name: String,
    /// Extension, with or without a leading dot, any case.
    pub extension: String,
    /// Inclusive size bounds in bytes.
    pub size_min: String,
    pub size_max: String,
    /// Inclusive mtime bounds as `YYYY-MM-DD` calendar days, local time.
    pub modified_from: String,
    pub modified_to: String,
    pub sort: SortKey,
    pub descending: bool,
    pub limit: usize,
    /// Zero-based page index; the offset is `page × limit`.
    pub page: usize,
}

/// Validates and normalises caller input, then runs queries against one
/// [`MetadataStore`].
pub struct QueryEngine {
    store: Arc<MetadataStore>,
}

impl QueryEngine {
    pub fn new(store: Arc<MetadataStore>) -> Self {
        Self { store }
    }

    /// Normalise `req` and execute it. The returned page is
    /// `records[page·limit .. page·limit + limit]` of the full sorted
    /// result; an out-of-range page is empty, not an error.
    pub fn search(&self, req: &SearchRequest) -> Result<Vec<FileRecord>> {
        let filters = SearchFilters {
            name_contains: trimmed(&req.name),
            extension: normalize_extension(&req.extension),
            size_min: parse_size(&req.size_min),
            size_max: parse_size(&req.size_max),
            modified_min: parse_day_start(&req.modified_from),
            modified_max: parse_day_end(&req.modified_to),
        };
        let offset = req.page.saturating_mul(req.limit);
        self.store
            .search(&filters, req.sort, req.descending, req.limit, offset)
    }

    /// Most recently indexed records, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<FileRecord>> {
        self.store.recent(limit)
    }

    /// All records that share content hash and size with another record.
    pub fn duplicates(&self) -> Result<Vec<FileRecord>> {
        self.store.duplicates()
    }
}

/* ─── input normalisation ─────────────────────────────────────────── */

fn trimmed(input: &str) -> Option<String> {
    let s = input.trim();
    if s.is_empty() {
        None
    } else {
        Some(s.to_string())
    }
}

/// `".TXT "` → `Some("txt")`; empty input → `None`. Only one leading dot
/// is stripped, matching how extensions are stored.
pub fn normalize_extension(input: &str) -> Option<String> {
    let s = input.trim();
    let s = s.strip_prefix('.').unwrap_or(s);
    if s.is_empty() {
        None
    } else {
        Some(s.to_lowercase())
    }
}

/// Non-negative byte count, or `None` for anything that does not parse.
pub fn parse_size(input: &str) -> Option<u64> {
    input.trim().parse::<u64>().ok()
}

/// `YYYY-MM-DD` → local-midnight epoch millis (inclusive lower bound).
pub fn parse_day_start(input: &str) -> Option<i64> {
    let naive = parse_day(input)?.and_hms_opt(0, 0, 0)?;
    Local
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.timestamp_millis())
}

/// `YYYY-MM-DD` → last millisecond of that local day (inclusive upper
/// bound).
pub fn parse_day_end(input: &str) -> Option<i64> {
    let naive = parse_day(input)?.and_hms_milli_opt(23, 59, 59, 999)?;
    Local
        .from_local_datetime(&naive)
        .single()
        .map(|dt| dt.timestamp_millis())
}

fn parse_day(input: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(input.trim(), "%Y-%m-%d").ok()
}
