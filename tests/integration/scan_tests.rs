use super::support::{orchestrator, write_image, CountingOptimizer};
use optimage::batch::BatchRunner;
use optimage::config::ScanSettings;
use optimage::fingerprint::CheckMode;
use optimage::scanner::{collect_images, ScanError, WalkerConfig};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tempfile::tempdir;

fn media_tree(root: &std::path::Path) {
    write_image(root, "pub/media/catalog/a.jpg", b"a");
    write_image(root, "pub/media/catalog/b.jpeg", b"b");
    write_image(root, "pub/media/wysiwyg/c.png", b"c");
    write_image(root, "pub/media/wysiwyg/d.gif", b"d");
    write_image(root, "pub/media/cache/e.jpg", b"e");
    write_image(root, "pub/media/notes.txt", b"text");
    write_image(root, "pub/media/.thumbs/f.jpg", b"f");
}

#[test]
fn test_collect_walks_directories_for_images() {
    let dir = tempdir().unwrap();
    media_tree(dir.path());

    let result = collect_images(
        &[dir.path().join("pub")],
        &WalkerConfig::default(),
        None,
    );

    assert!(result.errors.is_empty());
    assert_eq!(result.files.len(), 5);
    assert!(result.files.iter().all(|p| p.is_absolute()));
    assert!(!result.files.iter().any(|p| p.ends_with("notes.txt")));
    assert!(!result.files.iter().any(|p| p.ends_with("f.jpg")));
}

#[test]
fn test_collect_honours_scan_settings() {
    let dir = tempdir().unwrap();
    media_tree(dir.path());

    let settings = ScanSettings {
        extensions: vec!["jpg".into(), "jpeg".into()],
        ignore_patterns: vec!["cache/".into()],
        ..ScanSettings::default()
    };
    let result = collect_images(
        &[dir.path().to_path_buf()],
        &WalkerConfig::from_settings(&settings),
        None,
    );

    let mut names: Vec<_> = result
        .files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["a.jpg", "b.jpeg"]);
}

#[test]
fn test_collect_finds_media_excluded_from_version_control() {
    let dir = tempdir().unwrap();
    write_image(dir.path(), "pub/media/a.jpg", b"a");
    std::fs::write(dir.path().join(".gitignore"), "/pub/media/*\n").unwrap();

    let result = collect_images(&[dir.path().to_path_buf()], &WalkerConfig::default(), None);
    assert_eq!(result.files.len(), 1);
    assert!(result.files[0].ends_with("pub/media/a.jpg"));
}

#[test]
fn test_collect_deduplicates_overlapping_arguments() {
    let dir = tempdir().unwrap();
    media_tree(dir.path());
    let catalog = dir.path().join("pub/media/catalog");

    let result = collect_images(
        &[catalog.clone(), catalog.join("a.jpg"), catalog],
        &WalkerConfig::default(),
        None,
    );
    assert_eq!(result.files.len(), 2);
}

#[test]
fn test_collect_reports_missing_paths() {
    let dir = tempdir().unwrap();
    let result = collect_images(
        &[dir.path().join("nope")],
        &WalkerConfig::default(),
        None,
    );
    assert!(result.files.is_empty());
    assert!(matches!(result.errors.as_slice(), [ScanError::NotFound(_)]));
}

#[test]
fn test_scan_then_batch_then_rerun() {
    let dir = tempdir().unwrap();
    media_tree(dir.path());
    let fake = CountingOptimizer::new();
    let orchestrator = orchestrator(dir.path(), CheckMode::Crc32, &fake);

    let files = collect_images(&[dir.path().to_path_buf()], &WalkerConfig::default(), None).files;

    let first = BatchRunner::new(&orchestrator, 3).run(&files);
    assert_eq!(first.optimized, 5);
    assert!(first.is_clean());

    write_image(dir.path(), "pub/media/catalog/a.jpg", b"replaced");
    let second = BatchRunner::new(&orchestrator, 3).run(&files);
    assert_eq!(second.optimized, 1);
    assert_eq!(second.skipped, 4);
    assert_eq!(fake.calls(), 6);
}

#[test]
fn test_batch_reports_failures_per_file() {
    let dir = tempdir().unwrap();
    media_tree(dir.path());
    let fake = CountingOptimizer::new();
    fake.set_failing(true);
    let orchestrator = orchestrator(dir.path(), CheckMode::Md5, &fake);

    let files = collect_images(&[dir.path().to_path_buf()], &WalkerConfig::default(), None).files;
    let summary = BatchRunner::new(&orchestrator, 2)
        .with_shutdown_flag(Arc::new(AtomicBool::new(false)))
        .run(&files);

    assert_eq!(summary.failed, 5);
    assert_eq!(summary.failures.len(), 5);
    assert!(summary.failures[0].error.contains("simulated failure"));
    assert!(!summary.interrupted);
    assert_eq!(orchestrator.store().count().unwrap(), 0);
}
