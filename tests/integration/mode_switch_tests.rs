use super::support::{orchestrator_on, write_image, CountingOptimizer};
use optimage::cache::{RecordStore, SqliteRecordStore};
use optimage::fingerprint::{ChangeSignature, CheckMode, Hasher};
use optimage::orchestrator::Outcome;
use std::sync::Arc;
use tempfile::tempdir;

#[test]
fn test_switching_to_md5_reoptimizes_exactly_once() {
    let dir = tempdir().unwrap();
    let store = Arc::new(SqliteRecordStore::open_in_memory().unwrap());
    let fake = CountingOptimizer::new();
    let path = write_image(dir.path(), "catalog/a.jpg", b"jpeg bytes");

    let by_time = orchestrator_on(&store, dir.path(), CheckMode::ModifiedTime, &fake);
    assert!(by_time.optimize(&path));
    assert!(by_time.optimize(&path));
    assert_eq!(fake.calls(), 1);

    let by_content = orchestrator_on(&store, dir.path(), CheckMode::Md5, &fake);
    assert_eq!(by_content.process(&path).unwrap(), Outcome::Optimized);
    assert_eq!(fake.calls(), 2);

    let id = by_content.identifier_for(&path);
    let record = store.find_by_identifier(&id).unwrap().unwrap();
    let expected = Hasher::new().md5_hex(&path).unwrap();
    assert_eq!(record.signature, Some(ChangeSignature::Md5(expected)));

    assert_eq!(by_content.process(&path).unwrap(), Outcome::Skipped);
    assert_eq!(fake.calls(), 2);
    assert_eq!(store.count().unwrap(), 1);
}

#[test]
fn test_switching_back_and_forth_between_content_modes() {
    let dir = tempdir().unwrap();
    let store = Arc::new(SqliteRecordStore::open_in_memory().unwrap());
    let fake = CountingOptimizer::new();
    let path = write_image(dir.path(), "a.png", b"png bytes");

    let crc = orchestrator_on(&store, dir.path(), CheckMode::Crc32, &fake);
    let md5 = orchestrator_on(&store, dir.path(), CheckMode::Md5, &fake);

    assert!(crc.optimize(&path));
    assert!(md5.optimize(&path));
    assert!(crc.optimize(&path));
    assert_eq!(fake.calls(), 3);

    let record = store
        .find_by_identifier(&crc.identifier_for(&path))
        .unwrap()
        .unwrap();
    assert!(matches!(record.signature, Some(ChangeSignature::Crc32(ref hex)) if hex.len() == 8));
}

#[test]
fn test_disabling_leaves_existing_records_alone() {
    let dir = tempdir().unwrap();
    let store = Arc::new(SqliteRecordStore::open_in_memory().unwrap());
    let fake = CountingOptimizer::new();
    let path = write_image(dir.path(), "a.jpg", b"jpeg bytes");

    let md5 = orchestrator_on(&store, dir.path(), CheckMode::Md5, &fake);
    assert!(md5.optimize(&path));
    let id = md5.identifier_for(&path);
    let before = store.find_by_identifier(&id).unwrap().unwrap();

    let disabled = orchestrator_on(&store, dir.path(), CheckMode::Disabled, &fake);
    assert!(disabled.optimize(&path));
    assert!(disabled.optimize(&path));
    assert_eq!(fake.calls(), 3);

    let after = store.find_by_identifier(&id).unwrap().unwrap();
    assert_eq!(before, after);

    // Re-enabling picks the old record up again
    assert_eq!(md5.process(&path).unwrap(), Outcome::Skipped);
}
