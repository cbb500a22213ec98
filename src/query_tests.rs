// src/query_tests.rs

use super::db::{NewFileRecord, SortKey};
use super::query::{
    normalize_extension, parse_day_end, parse_day_start, parse_size, QueryEngine, SearchRequest,
};
use super::store::MetadataStore;
use std::sync::Arc;
use tempfile::tempdir;

fn seeded_engine() -> (tempfile::TempDir, QueryEngine) {
    let tmp = tempdir().unwrap();
    let store = Arc::new(MetadataStore::open(tmp.path().join("index.db")).unwrap());

    for (path, size) in [
        ("/t/a.txt", 10_u64),
        ("/t/b.txt", 10),
        ("/t/c.log", 20),
    ] {
        let name = path.rsplit('/').next().unwrap().to_string();
        store
            .upsert(&NewFileRecord {
                path: path.to_string(),
                extension: crate::utils::extension_of(&name),
                name,
                size,
                last_modified: 1_000,
                indexed_at: 2_000,
                sha256: None,
            })
            .unwrap();
    }
    store.commit().unwrap();

    (tmp, QueryEngine::new(store))
}

#[test]
fn normalize_extension_variants() {
    assert_eq!(normalize_extension("TXT").as_deref(), Some("txt"));
    assert_eq!(normalize_extension(".txt").as_deref(), Some("txt"));
    assert_eq!(normalize_extension("  txt  ").as_deref(), Some("txt"));
    assert_eq!(normalize_extension(""), None);
    assert_eq!(normalize_extension("."), None);
    assert_eq!(normalize_extension("   "), None);
}

#[test]
fn parse_size_falls_back_to_absent() {
    assert_eq!(parse_size(" 123 "), Some(123));
    assert_eq!(parse_size(""), None);
    assert_eq!(parse_size("12a"), None);
    assert_eq!(parse_size("-5"), None);
}

#[test]
fn day_bounds_cover_the_whole_local_day() {
    // mid-January: no DST transition in either hemisphere
    let start = parse_day_start("2024-01-15").unwrap();
    let end = parse_day_end("2024-01-15").unwrap();
    assert_eq!(end - start, 86_399_999);
}

#[test]
fn malformed_dates_fall_back_to_absent() {
    assert_eq!(parse_day_start("2024-13-40"), None);
    assert_eq!(parse_day_start("yesterday"), None);
    assert_eq!(parse_day_end(""), None);
}

#[test]
fn extension_filter_accepts_all_spellings() {
    let (_tmp, engine) = seeded_engine();

    for spelling in ["TXT", ".txt", "txt", " .TxT "] {
        let req = SearchRequest {
            extension: spelling.to_string(),
            limit: 50,
            ..Default::default()
        };
        let rows = engine.search(&req).unwrap();
        assert_eq!(rows.len(), 2, "spelling {spelling:?} must match a.txt and b.txt");
        assert!(rows.iter().all(|r| r.extension == "txt"));
    }
}

#[test]
fn unparseable_filters_are_absent_not_errors() {
    let (_tmp, engine) = seeded_engine();

    let req = SearchRequest {
        size_min: "lots".to_string(),
        modified_from: "not-a-date".to_string(),
        limit: 50,
        ..Default::default()
    };
    assert_eq!(engine.search(&req).unwrap().len(), 3);
}

#[test]
fn size_filter_keeps_inclusive_bounds() {
    let (_tmp, engine) = seeded_engine();

    let req = SearchRequest {
        size_min: "15".to_string(),
        limit: 50,
        ..Default::default()
    };
    let rows = engine.search(&req).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "c.log");

    let req = SearchRequest {
        size_min: "10".to_string(),
        size_max: "10".to_string(),
        limit: 50,
        ..Default::default()
    };
    assert_eq!(engine.search(&req).unwrap().len(), 2);
}

#[test]
fn page_index_turns_into_an_offset() {
    let (_tmp, engine) = seeded_engine();

    let req = SearchRequest {
        sort: SortKey::Name,
        limit: 2,
        page: 1,
        ..Default::default()
    };
    let rows = engine.search(&req).unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].name, "c.log");

    // a page past the end is empty, not an error
    let req = SearchRequest {
        limit: 2,
        page: 7,
        ..Default::default()
    };
    assert!(engine.search(&req).unwrap().is_empty());
}

#[test]
fn recent_and_duplicates_pass_through() {
    let (_tmp, engine) = seeded_engine();

    assert_eq!(engine.recent(2).unwrap().len(), 2);
    // nothing was hashed, so nothing can be a duplicate
    assert!(engine.duplicates().unwrap().is_empty());
}
