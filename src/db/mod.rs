//! SQLite layer – connection bootstrap, embedded migrations and the SQL
//! half of the metadata store (upsert, search, recent, duplicates).

use std::fs;
use std::path::{Path, PathBuf};
use std::result::Result as StdResult;

use anyhow::{Context, Result};
use chrono::Local;
use rusqlite::{
    backup::{Backup, StepResult},
    params, params_from_iter,
    types::Value,
    Connection, OpenFlags, OptionalExtension, TransactionBehavior,
};
use tracing::{debug, info};

use crate::utils::like_escape;

/* ─── schema version ───────────────────────────────────────────────── */

/// Current library schema version.
pub const SCHEMA_VERSION: i32 = MIGRATIONS.len() as i32;

/* ─── embedded migrations ─────────────────────────────────────────── */

const MIGRATIONS: &[(&str, &str)] = &[
    (
        "0001_initial_schema.sql",
        include_str!("migrations/0001_initial_schema.sql"),
    ),
    (
        "0002_search_indexes.sql",
        include_str!("migrations/0002_search_indexes.sql"),
    ),
];

/* ─── schema helpers ──────────────────────────────────────────────── */

/// Fetch the highest version recorded in the `schema_version` table.
pub fn current_schema_version(conn: &Connection) -> Result<i32> {
    let version: i32 = conn.query_row(
        "SELECT IFNULL(MAX(version), 0) FROM schema_version",
        [],
        |r| r.get(0),
    )?;
    Ok(version)
}

/* ─── connection bootstrap ────────────────────────────────────────── */

/// Open (or create) the index DB at `db_path`, apply pragmas and run any
/// pending migrations.
pub fn open<P: AsRef<Path>>(db_path: P) -> Result<Connection> {
    let db_path_ref = db_path.as_ref();
    let mut conn = Connection::open(db_path_ref)
        .with_context(|| format!("failed to open DB at {}", db_path_ref.display()))?;

    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;

    // Wait up to 30 s for a competing writer before giving up
    conn.busy_timeout(std::time::Duration::from_secs(30))?;

    apply_migrations(&mut conn)?;
    Ok(conn)
}

/// Read-only connection for queries. Never runs migrations; the writer
/// must have created the DB first.
pub fn open_read_only<P: AsRef<Path>>(db_path: P) -> Result<Connection> {
    let db_path_ref = db_path.as_ref();
    let conn = Connection::open_with_flags(db_path_ref, OpenFlags::SQLITE_OPEN_READ_ONLY)
        .with_context(|| format!("failed to open DB read-only at {}", db_path_ref.display()))?;
    conn.busy_timeout(std::time::Duration::from_secs(30))?;
    Ok(conn)
}

/* ─── migration runner ────────────────────────────────────────────── */

pub(crate) fn apply_migrations(conn: &mut Connection) -> Result<()> {
    // Ensure schema_version bookkeeping table exists
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS schema_version (
             version     INTEGER PRIMARY KEY,
             applied_on  TEXT NOT NULL
         );",
    )?;

    // Grab the write-lock up-front so migrations can run uninterrupted
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

    for (fname, sql) in MIGRATIONS {
        let version: i64 = fname
            .split('_')
            .next()
            .and_then(|s| s.parse().ok())
            .expect("migration filenames start with number");

        let already: Option<i64> = tx
            .query_row(
                "SELECT version FROM schema_version WHERE version = ?1",
                [version],
                |r| r.get(0),
            )
            .optional()?;

        if already.is_some() {
            debug!("migration {} already applied", fname);
            continue;
        }

        info!("applying migration {}", fname);
        tx.execute_batch(sql)
            .with_context(|| format!("could not apply migration {}", fname))?;

        tx.execute(
            "INSERT INTO schema_version (version, applied_on) VALUES (?1, ?2)",
            params![version, Local::now().to_rfc3339()],
        )?;
    }

    tx.commit()?;

    let current = current_schema_version(conn)?;
    if current != SCHEMA_VERSION {
        anyhow::bail!(
            "database schema version {} does not match library version {}",
            current,
            SCHEMA_VERSION
        );
    }

    Ok(())
}

/* ─── data model ──────────────────────────────────────────────────── */

/// A row of the `files` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRecord {
    pub id: i64,
    pub path: String,
    pub name: String,
    /// Lowercase, no leading dot; empty when the name has none.
    pub extension: String,
    pub size: u64,
    /// Source-filesystem mtime, epoch milliseconds.
    pub last_modified: i64,
    /// When this record was last written by a scan, epoch milliseconds.
    pub indexed_at: i64,
    /// 64-char lowercase hex SHA-256 of the content. `None` unless hashing
    /// was enabled and succeeded at least once for this path; not
    /// guaranteed fresh relative to `last_modified` when a later rescan
    /// skipped hashing.
    pub sha256: Option<String>,
}

/// Insert-side view of a record; the store assigns the rowid.
#[derive(Debug, Clone)]
pub struct NewFileRecord {
    pub path: String,
    pub name: String,
    pub extension: String,
    pub size: u64,
    pub last_modified: i64,
    pub indexed_at: i64,
    pub sha256: Option<String>,
}

/// Sort column for [`search_files`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Name,
    Extension,
    Size,
    LastModified,
    IndexedAt,
}

impl SortKey {
    fn column(self) -> &'static str {
        match self {
            SortKey::Name => "name",
            SortKey::Extension => "extension",
            SortKey::Size => "size",
            SortKey::LastModified => "last_modified",
            SortKey::IndexedAt => "indexed_at",
        }
    }
}

impl std::str::FromStr for SortKey {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "name" => Ok(SortKey::Name),
            "extension" => Ok(SortKey::Extension),
            "size" => Ok(SortKey::Size),
            "last_modified" => Ok(SortKey::LastModified),
            "indexed_at" => Ok(SortKey::IndexedAt),
            other => Err(anyhow::anyhow!("unknown sort key `{other}`")),
        }
    }
}

/// Normalised, typed search filters. Every field is independently
/// optional; `None` means the filter is absent. Bounds are inclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchFilters {
    pub name_contains: Option<String>,
    pub extension: Option<String>,
    pub size_min: Option<u64>,
    pub size_max: Option<u64>,
    pub modified_min: Option<i64>,
    pub modified_max: Option<i64>,
}

const RECORD_COLUMNS: &str = "id, path, name, extension, size, last_modified, indexed_at, sha256";

fn record_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<FileRecord> {
    Ok(FileRecord {
        id: row.get(0)?,
        path: row.get(1)?,
        name: row.get(2)?,
        extension: row.get(3)?,
        size: row.get::<_, i64>(4)? as u64,
        last_modified: row.get(5)?,
        indexed_at: row.get(6)?,
        sha256: row.get(7)?,
    })
}

/* ─── file record helpers ─────────────────────────────────────────── */

/// Insert or update one record, keyed by path.
///
/// Name, extension, size and both timestamps are always overwritten; the
/// stored hash is only replaced when the new record carries one
/// (COALESCE carry-forward).
pub fn upsert_file(conn: &Connection, rec: &NewFileRecord) -> Result<()> {
    let mut stmt = conn.prepare_cached(
        r#"
        INSERT INTO files(path, name, extension, size, last_modified, indexed_at, sha256)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        ON CONFLICT(path) DO UPDATE SET
            name          = excluded.name,
            extension     = excluded.extension,
            size          = excluded.size,
            last_modified = excluded.last_modified,
            indexed_at    = excluded.indexed_at,
            sha256        = COALESCE(excluded.sha256, files.sha256)
        "#,
    )?;
    stmt.execute(params![
        rec.path,
        rec.name,
        rec.extension,
        rec.size as i64,
        rec.last_modified,
        rec.indexed_at,
        rec.sha256,
    ])?;
    Ok(())
}

/// Filtered, sorted, paginated read of the `files` table.
///
/// Ties on the sort key are broken by `path ASC` so pages are stable. An
/// offset beyond the result set yields an empty page, not an error.
pub fn search_files(
    conn: &Connection,
    filters: &SearchFilters,
    sort: SortKey,
    descending: bool,
    limit: usize,
    offset: usize,
) -> Result<Vec<FileRecord>> {
    let mut sql = format!("SELECT {RECORD_COLUMNS} FROM files WHERE 1=1");
    let mut args: Vec<Value> = Vec::new();

    if let Some(name) = &filters.name_contains {
        sql.push_str(" AND name LIKE ? ESCAPE '\\'");
        args.push(Value::from(format!("%{}%", like_escape(name))));
    }
    if let Some(ext) = &filters.extension {
        sql.push_str(" AND extension = ?");
        args.push(Value::from(ext.clone()));
    }
    if let Some(min) = filters.size_min {
        sql.push_str(" AND size >= ?");
        args.push(Value::from(min as i64));
    }
    if let Some(max) = filters.size_max {
        sql.push_str(" AND size <= ?");
        args.push(Value::from(max as i64));
    }
    if let Some(min) = filters.modified_min {
        sql.push_str(" AND last_modified >= ?");
        args.push(Value::from(min));
    }
    if let Some(max) = filters.modified_max {
        sql.push_str(" AND last_modified <= ?");
        args.push(Value::from(max));
    }

    let direction = if descending { "DESC" } else { "ASC" };
    sql.push_str(&format!(
        " ORDER BY {} {}, path ASC LIMIT ? OFFSET ?",
        sort.column(),
        direction
    ));
    args.push(Value::from(limit as i64));
    args.push(Value::from(offset as i64));

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params_from_iter(args), record_from_row)?;
    let list = rows.collect::<StdResult<Vec<_>, _>>()?;
    Ok(list)
}

/// All records ordered by `indexed_at` descending, truncated to `limit`.
pub fn recent_files(conn: &Connection, limit: usize) -> Result<Vec<FileRecord>> {
    let mut stmt = conn.prepare_cached(&format!(
        "SELECT {RECORD_COLUMNS} FROM files ORDER BY indexed_at DESC, path ASC LIMIT ?1"
    ))?;
    let rows = stmt.query_map([limit as i64], record_from_row)?;
    let list = rows.collect::<StdResult<Vec<_>, _>>()?;
    Ok(list)
}

/// Records whose `(sha256, size)` pair occurs more than once. Rows with
/// no hash never count as duplicates, whatever their size.
pub fn duplicate_files(conn: &Connection) -> Result<Vec<FileRecord>> {
    let mut stmt = conn.prepare_cached(
        "SELECT f.id, f.path, f.name, f.extension, f.size, f.last_modified, f.indexed_at, f.sha256
           FROM files f
           JOIN (SELECT sha256, size
                   FROM files
                  WHERE sha256 IS NOT NULL
                  GROUP BY sha256, size
                 HAVING COUNT(*) > 1) dupes
             ON f.sha256 = dupes.sha256 AND f.size = dupes.size
          ORDER BY f.size DESC, f.name ASC, f.path ASC",
    )?;
    let rows = stmt.query_map([], record_from_row)?;
    let list = rows.collect::<StdResult<Vec<_>, _>>()?;
    Ok(list)
}

/// Total number of records.
pub fn file_count(conn: &Connection) -> Result<u64> {
    let n: i64 = conn.query_row("SELECT COUNT(*) FROM files", [], |r| r.get(0))?;
    Ok(n as u64)
}

/* ─── backup / restore helpers ────────────────────────────────────── */

/// Snapshot the index into `<db dir>/backups/backup_<stamp>.db` using
/// SQLite's online backup API; returns the snapshot path.
pub fn backup<P: AsRef<Path>>(db_path: P) -> Result<PathBuf> {
    let src = db_path.as_ref();
    let dir = src
        .parent()
        .ok_or_else(|| anyhow::anyhow!("invalid DB path: {}", src.display()))?
        .join("backups");
    fs::create_dir_all(&dir)?;

    let stamp = Local::now().format("%Y-%m-%d_%H-%M-%S");
    let dst = dir.join(format!("backup_{stamp}.db"));

    let src_conn = Connection::open_with_flags(src, OpenFlags::SQLITE_OPEN_READ_ONLY)?;
    let mut dst_conn = Connection::open(&dst)?;

    let bk = Backup::new(&src_conn, &mut dst_conn)?;
    while let StepResult::More = bk.step(100)? {}
    Ok(dst)
}

/// Replace the live index with a previously taken snapshot.
pub fn restore<P: AsRef<Path>>(backup_path: P, live_db_path: P) -> Result<()> {
    fs::copy(&backup_path, &live_db_path)?;
    Ok(())
}

/* ─── tests ───────────────────────────────────────────────────────── */
