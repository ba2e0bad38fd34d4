use super::support::{orchestrator, write_image, CountingOptimizer};
use filetime::{set_file_mtime, FileTime};
use optimage::cache::RecordStore;
use optimage::fingerprint::{ChangeSignature, CheckMode};
use optimage::orchestrator::{OptimizeError, Outcome};
use std::fs;
use std::path::Path;
use tempfile::tempdir;

#[test]
fn test_second_call_is_a_cache_hit_in_every_mode() {
    for mode in [CheckMode::ModifiedTime, CheckMode::Md5, CheckMode::Crc32] {
        let dir = tempdir().unwrap();
        let fake = CountingOptimizer::new();
        let orchestrator = orchestrator(dir.path(), mode, &fake);
        let path = write_image(dir.path(), "pub/media/a.jpg", b"jpeg data");

        assert!(orchestrator.optimize(&path), "first call in {mode}");
        assert!(orchestrator.optimize(&path), "second call in {mode}");
        assert_eq!(fake.calls(), 1, "gateway calls in {mode}");
        assert_eq!(orchestrator.store().count().unwrap(), 1);
    }
}

#[test]
fn test_record_contents_after_optimization() {
    let dir = tempdir().unwrap();
    let fake = CountingOptimizer::new();
    let orchestrator = orchestrator(dir.path(), CheckMode::ModifiedTime, &fake);
    let path = write_image(dir.path(), "a.jpg", b"jpeg data");
    set_file_mtime(&path, FileTime::from_unix_time(1_600_000_000, 0)).unwrap();

    assert_eq!(orchestrator.process(&path).unwrap(), Outcome::Optimized);

    let id = orchestrator.identifier_for(&path);
    let record = orchestrator.store().find_by_identifier(&id).unwrap().unwrap();
    assert_eq!(record.identifier, id);
    assert_eq!(record.relative_path, "a.jpg");
    assert_eq!(
        record.signature,
        Some(ChangeSignature::ModifiedTime(1_600_000_000))
    );
}

#[test]
fn test_touched_file_is_optimized_again() {
    let dir = tempdir().unwrap();
    let fake = CountingOptimizer::new();
    let orchestrator = orchestrator(dir.path(), CheckMode::ModifiedTime, &fake);
    let path = write_image(dir.path(), "a.png", b"png data");
    set_file_mtime(&path, FileTime::from_unix_time(1_600_000_000, 0)).unwrap();

    assert!(orchestrator.optimize(&path));
    set_file_mtime(&path, FileTime::from_unix_time(1_600_000_100, 0)).unwrap();

    assert_eq!(orchestrator.process(&path).unwrap(), Outcome::Optimized);
    assert_eq!(orchestrator.process(&path).unwrap(), Outcome::Skipped);
    assert_eq!(fake.calls(), 2);
}

#[test]
fn test_modified_time_ignores_content_with_same_timestamp() {
    let dir = tempdir().unwrap();
    let fake = CountingOptimizer::new();
    let orchestrator = orchestrator(dir.path(), CheckMode::ModifiedTime, &fake);
    let path = write_image(dir.path(), "a.jpg", b"original");
    let stamp = FileTime::from_unix_time(1_500_000_000, 0);
    set_file_mtime(&path, stamp).unwrap();

    assert!(orchestrator.optimize(&path));

    fs::write(&path, b"completely different bytes").unwrap();
    set_file_mtime(&path, stamp).unwrap();

    assert_eq!(orchestrator.process(&path).unwrap(), Outcome::Skipped);
    assert_eq!(fake.calls(), 1);
}

#[test]
fn test_sub_second_changes_are_invisible_to_modified_time() {
    let dir = tempdir().unwrap();
    let fake = CountingOptimizer::new();
    let orchestrator = orchestrator(dir.path(), CheckMode::ModifiedTime, &fake);
    let path = write_image(dir.path(), "a.jpg", b"original");
    set_file_mtime(&path, FileTime::from_unix_time(1_500_000_000, 100)).unwrap();

    assert!(orchestrator.optimize(&path));
    set_file_mtime(&path, FileTime::from_unix_time(1_500_000_000, 900_000_000)).unwrap();

    assert_eq!(orchestrator.process(&path).unwrap(), Outcome::Skipped);
}

#[test]
fn test_content_modes_detect_same_timestamp_edits() {
    for mode in [CheckMode::Md5, CheckMode::Crc32] {
        let dir = tempdir().unwrap();
        let fake = CountingOptimizer::new();
        let orchestrator = orchestrator(dir.path(), mode, &fake);
        let path = write_image(dir.path(), "a.jpg", b"original");
        let stamp = FileTime::from_unix_time(1_500_000_000, 0);
        set_file_mtime(&path, stamp).unwrap();

        assert!(orchestrator.optimize(&path));
        fs::write(&path, b"edited").unwrap();
        set_file_mtime(&path, stamp).unwrap();

        assert_eq!(orchestrator.process(&path).unwrap(), Outcome::Optimized, "{mode}");
        assert_eq!(fake.calls(), 2, "{mode}");
    }
}

#[test]
fn test_disabled_mode_never_persists() {
    let dir = tempdir().unwrap();
    let fake = CountingOptimizer::new();
    let orchestrator = orchestrator(dir.path(), CheckMode::Disabled, &fake);
    let path = write_image(dir.path(), "a.gif", b"gif data");

    for _ in 0..3 {
        assert!(orchestrator.optimize(&path));
    }

    assert_eq!(fake.calls(), 3);
    assert_eq!(orchestrator.store().count().unwrap(), 0);
}

#[test]
fn test_nonexistent_file_fails_without_side_effects() {
    let dir = tempdir().unwrap();
    let fake = CountingOptimizer::new();
    let orchestrator = orchestrator(dir.path(), CheckMode::Md5, &fake);
    let path = dir.path().join("missing.jpg");

    assert!(!orchestrator.optimize(&path));
    assert!(matches!(
        orchestrator.process(&path),
        Err(OptimizeError::FileNotFound(p)) if p == path
    ));
    assert_eq!(fake.calls(), 0);
    assert_eq!(orchestrator.store().count().unwrap(), 0);
}

#[test]
fn test_gateway_failure_leaves_no_record_and_retries() {
    let dir = tempdir().unwrap();
    let fake = CountingOptimizer::new();
    let orchestrator = orchestrator(dir.path(), CheckMode::Crc32, &fake);
    let path = write_image(dir.path(), "a.jpg", b"jpeg");

    fake.set_failing(true);
    assert!(!orchestrator.optimize(&path));
    assert!(!orchestrator.optimize(&path));
    assert_eq!(orchestrator.store().count().unwrap(), 0);

    fake.set_failing(false);
    assert!(orchestrator.optimize(&path));
    assert_eq!(fake.calls(), 3);
    assert_eq!(orchestrator.store().count().unwrap(), 1);
}

#[test]
fn test_failure_after_success_keeps_previous_record() {
    let dir = tempdir().unwrap();
    let fake = CountingOptimizer::new();
    let orchestrator = orchestrator(dir.path(), CheckMode::Md5, &fake);
    let path = write_image(dir.path(), "a.jpg", b"first");

    assert!(orchestrator.optimize(&path));
    let id = orchestrator.identifier_for(&path);
    let before = orchestrator.store().find_by_identifier(&id).unwrap().unwrap();

    fs::write(&path, b"second").unwrap();
    fake.set_failing(true);
    assert!(!orchestrator.optimize(&path));

    let after = orchestrator.store().find_by_identifier(&id).unwrap().unwrap();
    assert_eq!(before.signature, after.signature);
    assert_eq!(before.optimized_at, after.optimized_at);
}

#[test]
fn test_files_outside_root_keep_absolute_relative_path() {
    let root = tempdir().unwrap();
    let elsewhere = tempdir().unwrap();
    let fake = CountingOptimizer::new();
    let orchestrator = orchestrator(root.path(), CheckMode::Md5, &fake);

    let inside = write_image(root.path(), "a/b.jpg", b"same");
    let outside = write_image(elsewhere.path(), "a/b.jpg", b"same");

    assert_eq!(
        orchestrator.relative_path(&inside),
        Path::new("a").join("b.jpg").to_string_lossy()
    );
    assert_eq!(
        orchestrator.relative_path(&outside),
        outside.to_string_lossy()
    );
    assert_ne!(
        orchestrator.identifier_for(&inside),
        orchestrator.identifier_for(&outside)
    );

    assert!(orchestrator.optimize(&inside));
    assert!(orchestrator.optimize(&outside));
    assert_eq!(fake.calls(), 2);
    assert_eq!(orchestrator.store().count().unwrap(), 2);
}

#[cfg(target_os = "linux")]
#[test]
fn test_undecodable_names_get_their_own_records() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let dir = tempdir().unwrap();
    let fake = CountingOptimizer::new();
    let orchestrator = orchestrator(dir.path(), CheckMode::ModifiedTime, &fake);

    let media = dir.path().join("media");
    fs::create_dir_all(&media).unwrap();
    let a = media.join(OsStr::from_bytes(b"\xff.jpg"));
    let b = media.join(OsStr::from_bytes(b"\xfe.jpg"));
    let stamp = FileTime::from_unix_time(1_700_000_000, 0);
    for path in [&a, &b] {
        fs::write(path, b"jpeg").unwrap();
        set_file_mtime(path, stamp).unwrap();
    }

    assert_ne!(orchestrator.identifier_for(&a), orchestrator.identifier_for(&b));
    assert_eq!(orchestrator.process(&a).unwrap(), Outcome::Optimized);
    assert_eq!(orchestrator.process(&b).unwrap(), Outcome::Optimized);
    assert_eq!(fake.calls(), 2);
    assert_eq!(orchestrator.store().count().unwrap(), 2);

    assert_eq!(orchestrator.process(&b).unwrap(), Outcome::Skipped);
}
