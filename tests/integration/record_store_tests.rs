use chrono::{TimeZone, Utc};
use optimage::cache::{CacheError, OptimizationRecord, RecordStore, SqliteRecordStore};
use optimage::fingerprint::{identifier_for, ChangeSignature};
use rusqlite::{Connection, OptionalExtension};
use std::fs;
use std::sync::Arc;
use tempfile::tempdir;

fn record(relative: &str, signature: ChangeSignature) -> OptimizationRecord {
    OptimizationRecord {
        identifier: identifier_for(relative),
        relative_path: relative.to_string(),
        signature: Some(signature),
        optimized_at: Some(Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap()),
    }
}

#[test]
fn test_schema_keeps_one_signature_column() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("records.db");
    let store = SqliteRecordStore::open(&db).unwrap();
    store
        .save(&record("a.jpg", ChangeSignature::Md5("0123456789abcdef0123456789abcdef".into())))
        .unwrap();
    store
        .save(&record("b.jpg", ChangeSignature::ModifiedTime(1_700_000_000)))
        .unwrap();
    store.close().unwrap();

    let conn = Connection::open(&db).unwrap();
    let row: (String, Option<i64>, Option<String>, Option<String>) = conn
        .query_row(
            "SELECT path, modify_time, md5, crc32 FROM optimized_images WHERE hashed_path = ?1",
            [identifier_for("a.jpg").as_str()],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
        )
        .unwrap();
    assert_eq!(row.0, "a.jpg");
    assert_eq!(row.1, None);
    assert_eq!(row.2.as_deref(), Some("0123456789abcdef0123456789abcdef"));
    assert_eq!(row.3, None);

    let modify_time: Option<Option<i64>> = conn
        .query_row(
            "SELECT modify_time FROM optimized_images WHERE hashed_path = ?1",
            [identifier_for("b.jpg").as_str()],
            |r| r.get(0),
        )
        .optional()
        .unwrap();
    assert_eq!(modify_time, Some(Some(1_700_000_000)));
}

#[test]
fn test_store_behind_arc_and_trait_object() {
    let store: Arc<dyn RecordStore> = Arc::new(SqliteRecordStore::open_in_memory().unwrap());
    let saved = record("x/y.png", ChangeSignature::Crc32("cbf43926".into()));

    store.save(&saved).unwrap();
    assert_eq!(
        store.find_by_identifier(&saved.identifier).unwrap(),
        Some(saved.clone())
    );

    store.delete(&saved).unwrap();
    assert_eq!(store.find_by_identifier(&saved.identifier).unwrap(), None);

    // Deleting again is not an error
    store.delete(&saved).unwrap();
}

#[test]
fn test_create_returns_unsaved_empty_record() {
    let store = SqliteRecordStore::open_in_memory().unwrap();
    let fresh = store.create();

    assert!(fresh.identifier.is_empty());
    assert!(fresh.signature.is_none());
    assert!(fresh.optimized_at.is_none());
    assert_eq!(store.count().unwrap(), 0);
}

#[test]
fn test_garbage_file_is_rejected_at_open() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("records.db");
    fs::write(&db, vec![0xFFu8; 8192]).unwrap();

    assert!(matches!(
        SqliteRecordStore::open(&db),
        Err(CacheError::Open { .. })
    ));
}

#[test]
fn test_records_survive_reopen() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("nested").join("records.db");
    let saved = record("a.gif", ChangeSignature::ModifiedTime(-5));

    {
        let store = SqliteRecordStore::open(&db).unwrap();
        store.save(&saved).unwrap();
    }

    let store = SqliteRecordStore::open(&db).unwrap();
    assert_eq!(store.path(), Some(db.as_path()));
    assert_eq!(
        store.find_by_identifier(&saved.identifier).unwrap(),
        Some(saved)
    );
}
