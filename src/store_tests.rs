// src/store_tests.rs

use super::db::NewFileRecord;
use super::store::MetadataStore;
use std::fs;
use std::sync::Arc;
use std::thread;
use tempfile::tempdir;

fn record(path: &str, size: u64) -> NewFileRecord {
    let name = path.rsplit('/').next().unwrap_or(path).to_string();
    NewFileRecord {
        path: path.to_string(),
        extension: crate::utils::extension_of(&name),
        name,
        size,
        last_modified: 1_000,
        indexed_at: 2_000,
        sha256: None,
    }
}

#[test]
fn commit_makes_writes_visible_to_readers() {
    let tmp = tempdir().unwrap();
    let store = MetadataStore::open(tmp.path().join("index.db")).unwrap();

    store.upsert(&record("/t/a.txt", 10)).unwrap();
    // the batch is still open, readers see the previous commit point
    assert_eq!(store.count().unwrap(), 0);

    store.commit().unwrap();
    assert_eq!(store.count().unwrap(), 1);
}

#[test]
fn commit_without_pending_writes_is_a_noop() {
    let tmp = tempdir().unwrap();
    let store = MetadataStore::open(tmp.path().join("index.db")).unwrap();
    store.commit().unwrap();
    store.commit().unwrap();
}

#[test]
fn drop_commits_the_open_batch() {
    let tmp = tempdir().unwrap();
    let db_path = tmp.path().join("index.db");

    let store = MetadataStore::open(&db_path).unwrap();
    store.upsert(&record("/t/a.txt", 10)).unwrap();
    drop(store);

    let reopened = MetadataStore::open(&db_path).unwrap();
    assert_eq!(reopened.count().unwrap(), 1);
}

#[test]
fn concurrent_upserts_all_land() {
    let tmp = tempdir().unwrap();
    let store = Arc::new(MetadataStore::open(tmp.path().join("index.db")).unwrap());

    let mut handles = Vec::new();
    for t in 0..4 {
        let store = store.clone();
        handles.push(thread::spawn(move || {
            for i in 0..25 {
                store.upsert(&record(&format!("/t/f{t}_{i}"), 1)).unwrap();
            }
        }));
    }
    for h in handles {
        h.join().unwrap();
    }

    store.commit().unwrap();
    assert_eq!(store.count().unwrap(), 100);
}

#[test]
fn prune_missing_drops_only_stale_records() {
    let tmp = tempdir().unwrap();
    let store = MetadataStore::open(tmp.path().join("index.db")).unwrap();

    let live = tmp.path().join("live.txt");
    fs::write(&live, b"here").unwrap();

    store
        .upsert(&record(&crate::utils::to_db_path(&live), 4))
        .unwrap();
    store
        .upsert(&record(
            &crate::utils::to_db_path(tmp.path().join("ghost.txt")),
            4,
        ))
        .unwrap();

    let removed = store.prune_missing().unwrap();
    assert_eq!(removed, 1);
    assert_eq!(store.count().unwrap(), 1);

    // nothing left to prune
    assert_eq!(store.prune_missing().unwrap(), 0);
}
