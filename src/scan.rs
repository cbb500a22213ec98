//! Recursive directory scanner.
//!
//! A single sequential producer walks the tree and dispatches one job per
//! regular file over a bounded channel; a pool of worker threads hashes
//! (optionally), stamps and upserts. Commits are batched, progress is
//! emitted on an optional channel, and per-file failures are collected
//! rather than aborting the walk.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::db::NewFileRecord;
use crate::hash;
use crate::store::MetadataStore;
use crate::utils::{extension_of, now_millis, system_time_millis, to_db_path};

/* ─── configuration ───────────────────────────────────────────────── */

/// Scan tuning knobs.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    /// Hash file contents while indexing (needed for duplicate detection).
    pub compute_hash: bool,
    /// Worker pool size; `None` picks `max(2, available parallelism − 1)`.
    pub workers: Option<usize>,
    /// Commit the store after this many processed files.
    pub commit_every: usize,
    /// Emit a progress event after this many processed files.
    pub progress_every: usize,
    /// Turn the first store write error into a scan-level error instead
    /// of counting it and carrying on.
    pub fail_fast: bool,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            compute_hash: false,
            workers: None,
            commit_every: 500,
            progress_every: 200,
            fail_fast: false,
        }
    }
}

/// Pool size used when none is configured.
pub fn default_worker_count() -> usize {
    let cores = thread::available_parallelism().map(|n| n.get()).unwrap_or(2);
    cores.saturating_sub(1).max(2)
}

/* ─── observations ────────────────────────────────────────────────── */

/// Periodic progress observation; one event per `progress_every` files.
#[derive(Debug, Clone, Copy)]
pub struct ScanProgress {
    pub files_indexed: usize,
}

/// One skipped or failed per-file step that did not abort the scan.
#[derive(Debug, Clone)]
pub struct ScanIssue {
    pub path: PathBuf,
    pub reason: String,
}

/// Result of a completed scan.
#[derive(Debug)]
pub struct ScanSummary {
    /// Files successfully upserted.
    pub files_indexed: usize,
    /// Upserts or batch commits that failed.
    pub store_errors: usize,
    /// Per-file skips and failures, in no particular order.
    pub issues: Vec<ScanIssue>,
    /// True when the cancel flag stopped the walk early.
    pub cancelled: bool,
    pub elapsed: Duration,
}

/* ─── internal plumbing ───────────────────────────────────────────── */

struct Job {
    path: PathBuf,
    size: u64,
    modified: i64,
}

#[derive(Clone)]
struct WorkerShared {
    store: Arc<MetadataStore>,
    processed: Arc<AtomicUsize>,
    store_errors: Arc<AtomicUsize>,
    issues: Arc<Mutex<Vec<ScanIssue>>>,
    abort: Arc<AtomicBool>,
    progress: Option<Sender<ScanProgress>>,
    options: ScanOptions,
}

impl WorkerShared {
    fn push_issue(&self, path: PathBuf, reason: String) {
        if let Ok(mut issues) = self.issues.lock() {
            issues.push(ScanIssue { path, reason });
        }
    }

    fn record_store_error(&self, path: PathBuf, reason: String) {
        self.store_errors.fetch_add(1, Ordering::Relaxed);
        self.push_issue(path, reason);
        if self.options.fail_fast {
            self.abort.store(true, Ordering::Relaxed);
        }
    }
}

/* ─── scanner ─────────────────────────────────────────────────────── */

/// Drives a scan against one [`MetadataStore`].
pub struct Scanner {
    store: Arc<MetadataStore>,
    options: ScanOptions,
    progress: Option<Sender<ScanProgress>>,
    cancel: Option<Arc<AtomicBool>>,
}

impl Scanner {
    pub fn new(store: Arc<MetadataStore>) -> Self {
        Self::with_options(store, ScanOptions::default())
    }

    pub fn with_options(store: Arc<MetadataStore>, options: ScanOptions) -> Self {
        Self {
            store,
            options,
            progress: None,
            cancel: None,
        }
    }

    /// Emit [`ScanProgress`] events on `tx`. Delivery is lossy: the scan
    /// never blocks on a slow or vanished observer.
    pub fn on_progress(mut self, tx: Sender<ScanProgress>) -> Self {
        self.progress = Some(tx);
        self
    }

    /// Stop dispatching new files once `flag` becomes true. In-flight
    /// work still drains and commits.
    pub fn with_cancel(mut self, flag: Arc<AtomicBool>) -> Self {
        self.cancel = Some(flag);
        self
    }

    /// Walk `root`, index every regular file, wait for the pool to drain
    /// and commit.
    ///
    /// Pre-scan failures (missing root, not a directory, inaccessible)
    /// return an error before any work starts. Per-entry failures during
    /// the walk are collected in [`ScanSummary::issues`] and never abort
    /// the scan.
    pub fn scan(&self, root: &Path) -> Result<ScanSummary> {
        let started = Instant::now();

        let root = root
            .canonicalize()
            .with_context(|| format!("cannot access scan root {}", root.display()))?;
        if !root.is_dir() {
            bail!("scan root is not a directory: {}", root.display());
        }

        let workers = self
            .options
            .workers
            .unwrap_or_else(default_worker_count)
            .max(1);

        let shared = WorkerShared {
            store: self.store.clone(),
            processed: Arc::new(AtomicUsize::new(0)),
            store_errors: Arc::new(AtomicUsize::new(0)),
            issues: Arc::new(Mutex::new(Vec::new())),
            abort: Arc::new(AtomicBool::new(false)),
            progress: self.progress.clone(),
            options: self.options.clone(),
        };

        info!(
            root = %root.display(),
            workers,
            hash = self.options.compute_hash,
            "scan started"
        );

        let (job_tx, job_rx) = bounded::<Job>(workers * 2);
        let mut handles: Vec<JoinHandle<()>> = Vec::with_capacity(workers);
        for i in 0..workers {
            let rx: Receiver<Job> = job_rx.clone();
            let shared = shared.clone();
            let handle = thread::Builder::new()
                .name(format!("fsidx-worker-{i}"))
                .spawn(move || {
                    for job in rx.iter() {
                        index_one(&shared, job);
                    }
                })
                .context("failed to spawn scan worker")?;
            handles.push(handle);
        }
        drop(job_rx);

        let cancelled = self.walk(&root, &shared, &job_tx);

        // Drain barrier: close the channel, then wait for every worker.
        drop(job_tx);
        for handle in handles {
            let _ = handle.join();
        }

        // Final durability point; a failure here is a real error.
        self.store.commit().context("final commit failed")?;

        let issues = shared
            .issues
            .lock()
            .map(|mut v| std::mem::take(&mut *v))
            .unwrap_or_default();
        let summary = ScanSummary {
            files_indexed: shared.processed.load(Ordering::Relaxed),
            store_errors: shared.store_errors.load(Ordering::Relaxed),
            issues,
            cancelled,
            elapsed: started.elapsed(),
        };

        info!(
            indexed = summary.files_indexed,
            store_errors = summary.store_errors,
            skipped = summary.issues.len(),
            elapsed_ms = summary.elapsed.as_millis() as u64,
            "scan complete"
        );

        if self.options.fail_fast && summary.store_errors > 0 {
            bail!(
                "scan aborted after {} store write error(s)",
                summary.store_errors
            );
        }

        Ok(summary)
    }

    /// Sequential producer: walk the tree, dispatch one job per regular
    /// file. Returns true when the cancel flag stopped the walk.
    fn walk(&self, root: &Path, shared: &WorkerShared, job_tx: &Sender<Job>) -> bool {
        let db_path = self
            .store
            .db_path()
            .canonicalize()
            .unwrap_or_else(|_| self.store.db_path().to_path_buf());

        for entry in WalkDir::new(root) {
            if shared.abort.load(Ordering::Relaxed) {
                break;
            }
            if let Some(flag) = &self.cancel {
                if flag.load(Ordering::Relaxed) {
                    info!("scan cancelled");
                    return true;
                }
            }

            let entry = match entry {
                Ok(e) => e,
                Err(err) => {
                    let path = err.path().map(Path::to_path_buf).unwrap_or_default();
                    debug!(path = %path.display(), error = %err, "walk entry skipped");
                    shared.push_issue(path, err.to_string());
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            if is_store_file(entry.path(), &db_path) {
                continue;
            }

            let meta = match entry.metadata() {
                Ok(m) => m,
                Err(err) => {
                    shared.push_issue(entry.path().to_path_buf(), err.to_string());
                    continue;
                }
            };
            let modified = match meta.modified() {
                Ok(t) => system_time_millis(t),
                Err(err) => {
                    shared.push_issue(entry.path().to_path_buf(), err.to_string());
                    continue;
                }
            };

            let job = Job {
                path: entry.path().to_path_buf(),
                size: meta.len(),
                modified,
            };
            if job_tx.send(job).is_err() {
                // every worker is gone; nothing more can be indexed
                break;
            }
        }
        false
    }
}

/// Index one file: optional hash, stamp, upsert, cadence bookkeeping.
fn index_one(shared: &WorkerShared, job: Job) {
    if shared.abort.load(Ordering::Relaxed) {
        return;
    }

    let name = job
        .path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let sha256 = if shared.options.compute_hash {
        let digest = hash::hash_file(&job.path);
        if digest.is_none() {
            shared.push_issue(job.path.clone(), "content could not be hashed".into());
        }
        digest
    } else {
        None
    };

    let rec = NewFileRecord {
        path: to_db_path(&job.path),
        extension: extension_of(&name),
        name,
        size: job.size,
        last_modified: job.modified,
        indexed_at: now_millis(),
        sha256,
    };

    match shared.store.upsert(&rec) {
        Ok(()) => {
            let n = shared.processed.fetch_add(1, Ordering::Relaxed) + 1;
            debug!(file = %rec.path, "indexed");

            if n % shared.options.commit_every.max(1) == 0 {
                if let Err(e) = shared.store.commit() {
                    warn!(error = %e, "batch commit failed");
                    shared.record_store_error(job.path, format!("commit failed: {e}"));
                }
            }
            if n % shared.options.progress_every.max(1) == 0 {
                if let Some(tx) = &shared.progress {
                    let _ = tx.try_send(ScanProgress { files_indexed: n });
                }
            }
        }
        Err(e) => {
            warn!(file = %rec.path, error = %e, "upsert failed");
            shared.record_store_error(job.path, format!("upsert failed: {e}"));
        }
    }
}

/// The index's own DB file (and its WAL/SHM siblings) never gets indexed.
fn is_store_file(path: &Path, db_path: &Path) -> bool {
    if path.parent() != db_path.parent() {
        return false;
    }
    let (Some(name), Some(db_name)) = (
        path.file_name().and_then(|n| n.to_str()),
        db_path.file_name().and_then(|n| n.to_str()),
    ) else {
        return false;
    };
    name == db_name || name == format!("{db_name}-wal") || name == format!("{db_name}-shm")
}
