//! fsidx – a local index of filesystem metadata.
//!
//! The crate scans a directory tree, records per-file attributes (path,
//! name, extension, size, mtime, indexing time, optional SHA-256) into a
//! SQLite store, and answers filtered, sorted, paginated queries plus a
//! duplicate-file report. Presentation layers (CLI, GUI, TUI) should
//! depend only on the facade and the types re-exported here, never on
//! internal modules directly.

#![deny(warnings)]

pub mod config;
pub mod db;
pub mod hash;
pub mod logging;
pub mod query;
pub mod scan;
pub mod store;
pub mod utils;

#[cfg(test)]
mod test_utils;

#[cfg(test)]
mod config_tests;
#[cfg(test)]
mod logging_tests;
#[cfg(test)]
mod query_tests;
#[cfg(test)]
mod store_tests;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;

pub use db::{FileRecord, NewFileRecord, SearchFilters, SortKey};
pub use query::{QueryEngine, SearchRequest};
pub use scan::{ScanIssue, ScanOptions, ScanProgress, ScanSummary, Scanner};
pub use store::MetadataStore;

/// Primary facade – open an index, then scan and query it.
pub struct FileIndex {
    cfg: config::Config,
    store: Arc<MetadataStore>,
}

impl FileIndex {
    /// Load configuration from env / workspace and open (or create) the
    /// index DB.
    pub fn open_default() -> Result<Self> {
        let cfg = config::Config::load()?;
        let store = Arc::new(MetadataStore::open(&cfg.db_path)?);
        Ok(Self { cfg, store })
    }

    /// Open an explicit DB path – handy for tests or headless tools.
    pub fn open_at<P: AsRef<Path>>(path: P) -> Result<Self> {
        let cfg = config::Config {
            db_path: path.as_ref().to_path_buf(),
        };
        let store = Arc::new(MetadataStore::open(&cfg.db_path)?);
        Ok(Self { cfg, store })
    }

    /// Recursively index the tree under `root`.
    pub fn scan<P: AsRef<Path>>(&self, root: P, options: ScanOptions) -> Result<ScanSummary> {
        self.scanner(options).scan(root.as_ref())
    }

    /// A configurable [`Scanner`] for callers that want to wire up a
    /// progress channel or a cancellation flag before scanning.
    pub fn scanner(&self, options: ScanOptions) -> Scanner {
        Scanner::with_options(self.store.clone(), options)
    }

    /// Normalised, filtered, sorted, paginated search.
    pub fn search(&self, req: &SearchRequest) -> Result<Vec<FileRecord>> {
        QueryEngine::new(self.store.clone()).search(req)
    }

    /// Most recently indexed records, newest first.
    pub fn recent(&self, limit: usize) -> Result<Vec<FileRecord>> {
        self.store.recent(limit)
    }

    /// Records sharing content hash and size with at least one other.
    pub fn duplicates(&self) -> Result<Vec<FileRecord>> {
        self.store.duplicates()
    }

    /// Drop records whose files no longer exist. The index never does
    /// this on its own; see [`MetadataStore::prune_missing`].
    pub fn prune_missing(&self) -> Result<usize> {
        self.store.prune_missing()
    }

    /// Total number of records in the index.
    pub fn count(&self) -> Result<u64> {
        self.store.count()
    }

    /// Commit pending writes and snapshot the index DB; returns the
    /// snapshot path.
    pub fn backup(&self) -> Result<PathBuf> {
        self.store.commit()?;
        db::backup(&self.cfg.db_path)
    }

    /// Path of the backing DB file.
    pub fn db_path(&self) -> &Path {
        &self.cfg.db_path
    }

    /// Shared handle to the underlying store.
    pub fn store(&self) -> &Arc<MetadataStore> {
        &self.store
    }
}
