//! Shared fixtures for the integration tests.

use optimage::cache::SqliteRecordStore;
use optimage::fingerprint::CheckMode;
use optimage::gateway::{Gateway, GatewayError, ImageOptimizer};
use optimage::orchestrator::{Orchestrator, OrchestratorSettings};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Fake optimizer that counts calls and can be told to fail or dawdle.
#[derive(Default)]
pub struct CountingOptimizer {
    calls: AtomicUsize,
    fail: AtomicBool,
    delay: Option<Duration>,
    seen: Mutex<Vec<PathBuf>>,
}

impl CountingOptimizer {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Each call sleeps for `delay` before returning.
    pub fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay: Some(delay),
            ..Self::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn set_failing(&self, fail: bool) {
        self.fail.store(fail, Ordering::SeqCst);
    }

    pub fn seen(&self) -> Vec<PathBuf> {
        self.seen.lock().unwrap().clone()
    }
}

impl ImageOptimizer for CountingOptimizer {
    fn optimize(&self, path: &Path) -> Result<(), GatewayError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen.lock().unwrap().push(path.to_path_buf());
        if let Some(delay) = self.delay {
            std::thread::sleep(delay);
        }
        if self.fail.load(Ordering::SeqCst) {
            return Err(GatewayError::Failed {
                path: path.to_path_buf(),
                message: "simulated failure".into(),
            });
        }
        Ok(())
    }

    fn describe(&self) -> String {
        "counting fake".to_string()
    }
}

pub fn gateway(optimizer: &Arc<CountingOptimizer>) -> Arc<Gateway> {
    Arc::new(Gateway::with_optimizer(optimizer.clone()))
}

/// Orchestrator over a fresh in-memory store.
pub fn orchestrator(
    root: &Path,
    mode: CheckMode,
    optimizer: &Arc<CountingOptimizer>,
) -> Orchestrator<SqliteRecordStore> {
    Orchestrator::new(
        gateway(optimizer),
        SqliteRecordStore::open_in_memory().unwrap(),
        OrchestratorSettings::new(root, mode),
    )
}

/// Orchestrator over a shared store, for tests that swap settings.
pub fn orchestrator_on(
    store: &Arc<SqliteRecordStore>,
    root: &Path,
    mode: CheckMode,
    optimizer: &Arc<CountingOptimizer>,
) -> Orchestrator<Arc<SqliteRecordStore>> {
    Orchestrator::new(
        gateway(optimizer),
        Arc::clone(store),
        OrchestratorSettings::new(root, mode),
    )
}

/// Write `content` to `root/relative`, creating parent directories.
pub fn write_image(root: &Path, relative: &str, content: &[u8]) -> PathBuf {
    let path = root.join(relative);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, content).unwrap();
    path
}
