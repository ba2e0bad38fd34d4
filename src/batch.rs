//! Parallel batch optimization.
//!
//! [`BatchRunner`] pushes a list of files through an [`Orchestrator`] on a
//! dedicated rayon pool sized by `jobs`, and folds the per-file outcomes into
//! a [`BatchSummary`]. Ctrl+C stops new files from being started; files
//! already handed to the optimizer run to completion.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;
use serde::Serialize;

use crate::cache::RecordStore;
use crate::orchestrator::{Orchestrator, Outcome};
use crate::progress::ProgressCallback;

/// A file that could not be optimized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BatchFailure {
    /// The file
    pub path: PathBuf,
    /// Human-readable reason
    pub error: String,
}

/// Totals for one batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    /// Files handed to the runner.
    pub total: usize,
    /// Files the optimizer ran on.
    pub optimized: usize,
    /// Files skipped as unchanged.
    pub skipped: usize,
    /// Files that failed.
    pub failed: usize,
    /// Files never started because of an interrupt.
    pub not_started: usize,
    /// Combined size of optimized files before optimization.
    pub bytes_before: u64,
    /// Combined size of optimized files afterwards.
    pub bytes_after: u64,
    /// One entry per failed file.
    pub failures: Vec<BatchFailure>,
    /// Whether Ctrl+C cut the run short.
    pub interrupted: bool,
}

impl BatchSummary {
    /// Bytes removed by the optimizer (never negative).
    #[must_use]
    pub fn bytes_saved(&self) -> u64 {
        self.bytes_before.saturating_sub(self.bytes_after)
    }

    /// Whether every started file ended in success.
    #[must_use]
    pub fn is_clean(&self) -> bool {
        self.failed == 0
    }
}

enum FileResult {
    Optimized { before: u64, after: u64 },
    Skipped,
    Failed(BatchFailure),
}

/// Runs an orchestrator over many files in parallel.
pub struct BatchRunner<'a, S> {
    orchestrator: &'a Orchestrator<S>,
    jobs: usize,
    shutdown_flag: Option<Arc<AtomicBool>>,
    progress: Option<Arc<dyn ProgressCallback>>,
}

impl<'a, S: RecordStore> BatchRunner<'a, S> {
    /// Runner with `jobs` worker threads (at least one).
    #[must_use]
    pub fn new(orchestrator: &'a Orchestrator<S>, jobs: usize) -> Self {
        Self {
            orchestrator,
            jobs: jobs.max(1),
            shutdown_flag: None,
            progress: None,
        }
    }

    /// Stop starting new files once `flag` is set.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    /// Report progress to `callback`.
    #[must_use]
    pub fn with_progress(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress = Some(callback);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Optimize every file and summarize.
    pub fn run(&self, files: &[PathBuf]) -> BatchSummary {
        if let Some(progress) = &self.progress {
            progress.on_start(files.len());
        }

        let done = AtomicUsize::new(0);
        let work = || -> Vec<FileResult> {
            files
                .par_iter()
                .filter_map(|path| {
                    if self.is_shutdown_requested() {
                        return None;
                    }
                    let result = self.run_one(path);
                    let current = done.fetch_add(1, Ordering::SeqCst) + 1;
                    if let Some(progress) = &self.progress {
                        progress.on_progress(current, &path.to_string_lossy());
                    }
                    Some(result)
                })
                .collect()
        };

        let results = match rayon::ThreadPoolBuilder::new()
            .num_threads(self.jobs)
            .build()
        {
            Ok(pool) => pool.install(work),
            Err(e) => {
                log::warn!(
                    "Failed to create thread pool ({}), using global pool with {} threads",
                    e,
                    rayon::current_num_threads()
                );
                work()
            }
        };

        if let Some(progress) = &self.progress {
            progress.on_finish();
        }

        let mut summary = BatchSummary {
            total: files.len(),
            not_started: files.len() - results.len(),
            interrupted: self.is_shutdown_requested(),
            ..BatchSummary::default()
        };
        for result in results {
            match result {
                FileResult::Optimized { before, after } => {
                    summary.optimized += 1;
                    summary.bytes_before += before;
                    summary.bytes_after += after;
                }
                FileResult::Skipped => summary.skipped += 1,
                FileResult::Failed(failure) => {
                    summary.failed += 1;
                    summary.failures.push(failure);
                }
            }
        }
        summary.failures.sort_by(|a, b| a.path.cmp(&b.path));

        log::debug!(
            "Batch finished: {} optimized, {} skipped, {} failed, {} not started",
            summary.optimized,
            summary.skipped,
            summary.failed,
            summary.not_started
        );
        summary
    }

    fn run_one(&self, path: &Path) -> FileResult {
        let before = file_size(path);
        let result = self.orchestrator.process(path);
        self.orchestrator.log_result(path, &result);

        match result {
            Ok(Outcome::Optimized) => FileResult::Optimized {
                before,
                after: file_size(path),
            },
            Ok(Outcome::Skipped) => FileResult::Skipped,
            Err(e) => FileResult::Failed(BatchFailure {
                path: path.to_path_buf(),
                error: e.to_string(),
            }),
        }
    }
}

fn file_size(path: &Path) -> u64 {
    std::fs::metadata(path).map(|m| m.len()).unwrap_or(0)
}
