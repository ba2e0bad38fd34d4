use super::support::{orchestrator, write_image, CountingOptimizer};
use optimage::fingerprint::CheckMode;
use optimage::orchestrator::Outcome;
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::Duration;
use tempfile::tempdir;

#[test]
fn test_concurrent_calls_for_one_file_optimize_once() {
    let dir = tempdir().unwrap();
    let fake = CountingOptimizer::slow(Duration::from_millis(50));
    let orchestrator = Arc::new(orchestrator(dir.path(), CheckMode::Md5, &fake));
    let path = write_image(dir.path(), "hot.jpg", b"popular image");

    let threads = 8;
    let barrier = Arc::new(Barrier::new(threads));
    let handles: Vec<_> = (0..threads)
        .map(|_| {
            let orchestrator = Arc::clone(&orchestrator);
            let barrier = Arc::clone(&barrier);
            let path = path.clone();
            thread::spawn(move || {
                barrier.wait();
                orchestrator.process(&path).unwrap()
            })
        })
        .collect();

    let outcomes: Vec<Outcome> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    assert_eq!(fake.calls(), 1);
    assert_eq!(
        outcomes.iter().filter(|o| **o == Outcome::Optimized).count(),
        1
    );
    assert_eq!(
        outcomes.iter().filter(|o| **o == Outcome::Skipped).count(),
        threads - 1
    );
}

#[test]
fn test_different_files_proceed_in_parallel() {
    let dir = tempdir().unwrap();
    let fake = CountingOptimizer::slow(Duration::from_millis(20));
    let orchestrator = Arc::new(orchestrator(dir.path(), CheckMode::Crc32, &fake));

    let paths: Vec<_> = (0..6)
        .map(|i| write_image(dir.path(), &format!("img_{i}.png"), format!("{i}").as_bytes()))
        .collect();

    let handles: Vec<_> = paths
        .iter()
        .cloned()
        .map(|path| {
            let orchestrator = Arc::clone(&orchestrator);
            thread::spawn(move || orchestrator.optimize(&path))
        })
        .collect();

    for handle in handles {
        assert!(handle.join().unwrap());
    }
    assert_eq!(fake.calls(), 6);
    assert_eq!(orchestrator.store().count().unwrap(), 6);
}

#[test]
fn test_orchestrator_is_send_and_sync() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<optimage::orchestrator::Orchestrator<optimage::cache::SqliteRecordStore>>();
}
