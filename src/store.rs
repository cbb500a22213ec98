//! `MetadataStore` – the concurrency discipline around the SQLite layer.
//!
//! One connection owns the write path, serialised behind a mutex; upserts
//! accumulate in a lazily opened `BEGIN IMMEDIATE` transaction that
//! [`MetadataStore::commit`] closes. Queries run on an independent
//! read-only connection so they never wait on writer serialisation.

use std::path::{Path, PathBuf};
use std::result::Result as StdResult;
use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, Result};
use rusqlite::Connection;
use tracing::debug;

use crate::db::{self, FileRecord, NewFileRecord, SearchFilters, SortKey};

pub struct MetadataStore {
    db_path: PathBuf,
    writer: Mutex<Connection>,
}

impl MetadataStore {
    /// Open (or create) the store at `db_path` and run migrations.
    pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref().to_path_buf();
        let writer = db::open(&db_path)?;
        Ok(Self {
            db_path,
            writer: Mutex::new(writer),
        })
    }

    /// Path of the backing DB file.
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    fn writer(&self) -> Result<MutexGuard<'_, Connection>> {
        self.writer
            .lock()
            .map_err(|_| anyhow!("store writer mutex poisoned"))
    }

    fn reader(&self) -> Result<Connection> {
        db::open_read_only(&self.db_path)
    }

    /// Insert or update one record. The first upsert after a commit opens
    /// a batch transaction; nothing is durable until
    /// [`commit`](Self::commit).
    pub fn upsert(&self, rec: &NewFileRecord) -> Result<()> {
        let conn = self.writer()?;
        if conn.is_autocommit() {
            conn.execute_batch("BEGIN IMMEDIATE")?;
        }
        db::upsert_file(&conn, rec)
    }

    /// Flush pending writes durably. A no-op when no batch is open.
    pub fn commit(&self) -> Result<()> {
        let conn = self.writer()?;
        if !conn.is_autocommit() {
            conn.execute_batch("COMMIT")?;
            debug!("batch committed");
        }
        Ok(())
    }

    /// Filtered, sorted, paginated search. See [`db::search_files`].
    pub fn search(
        &self,
        filters: &SearchFilters,
        sort: SortKey,
        descending: bool,
        limit: usize,
        offset: usize,
    ) -> Result<Vec<FileRecord>> {
        db::search_files(&self.reader()?, filters, sort, descending, limit, offset)
    }

    /// Most recently indexed records first.
    pub fn recent(&self, limit: usize) -> Result<Vec<FileRecord>> {
        db::recent_files(&self.reader()?, limit)
    }

    /// Records sharing a `(sha256, size)` pair with at least one other.
    pub fn duplicates(&self) -> Result<Vec<FileRecord>> {
        db::duplicate_files(&self.reader()?)
    }

    /// Total number of committed records.
    pub fn count(&self) -> Result<u64> {
        db::file_count(&self.reader()?)
    }

    /// Remove records whose path can no longer be stat'ed and commit.
    ///
    /// The index never drops records on its own when files disappear;
    /// this is the explicit opt-in. Any writes pending in the current
    /// batch are committed along with the prune. Returns the number of
    /// records removed.
    pub fn prune_missing(&self) -> Result<usize> {
        let conn = self.writer()?;
        if conn.is_autocommit() {
            conn.execute_batch("BEGIN IMMEDIATE")?;
        }

        let stale: Vec<(i64, String)> = {
            let mut stmt = conn.prepare("SELECT id, path FROM files")?;
            let rows = stmt.query_map([], |r| {
                Ok((r.get::<_, i64>(0)?, r.get::<_, String>(1)?))
            })?;
            rows.collect::<StdResult<Vec<_>, _>>()?
                .into_iter()
                .filter(|(_, path)| std::fs::symlink_metadata(path).is_err())
                .collect()
        };

        let mut removed = 0usize;
        for (id, path) in stale {
            conn.execute("DELETE FROM files WHERE id = ?1", [id])?;
            debug!(path = %path, "pruned");
            removed += 1;
        }

        conn.execute_batch("COMMIT")?;
        Ok(removed)
    }
}

impl Drop for MetadataStore {
    fn drop(&mut self) {
        // closing the store commits any batch still open
        if let Ok(conn) = self.writer.lock() {
            if !conn.is_autocommit() {
                let _ = conn.execute_batch("COMMIT");
            }
        }
    }
}
