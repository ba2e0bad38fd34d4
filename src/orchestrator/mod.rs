//! Optimization orchestrator: decides skip vs. optimize vs. record update.
//!
//! # Overview
//!
//! For every file, [`Orchestrator::optimize`] walks the same decision chain:
//!
//! 1. Gateway unavailable: fail immediately, without touching the file.
//! 2. Not an existing regular file: fail.
//! 3. Derive the relative path and the [`FileIdentifier`], and take the
//!    per-identifier lock.
//! 4. Look the record up. If one exists and change detection is on, compare
//!    the stored signature with the file's current one; equal means the file
//!    was already optimized and nothing else happens.
//! 5. Run the optimizer. On failure no record is written, so the next call
//!    retries.
//! 6. With change detection disabled, stop here.
//! 7. Create the record if needed, store the post-optimization signature and
//!    save it. A failed save is logged and otherwise ignored.
//!
//! # Example
//!
//! ```no_run
//! use optimage::cache::SqliteRecordStore;
//! use optimage::config::Config;
//! use optimage::gateway::Gateway;
//! use optimage::orchestrator::{Orchestrator, OrchestratorSettings};
//! use std::path::Path;
//!
//! let config = Config::default();
//! let store = SqliteRecordStore::open(Path::new("/var/lib/optimage/records.db"))?;
//! let settings = OrchestratorSettings::from_config(&config)?;
//! let orchestrator = Orchestrator::new(Gateway::shared(&config), store, settings);
//!
//! if orchestrator.optimize(Path::new("/var/www/shop/pub/media/a.jpg")) {
//!     println!("optimized (or already up to date)");
//! }
//! # Ok::<(), anyhow::Error>(())
//! ```

pub mod locks;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::Utc;
use serde::Serialize;

use crate::cache::{CacheError, OptimizationRecord, RecordStore};
use crate::config::Config;
use crate::fingerprint::{
    identifier_for_bytes, relative_bytes, relative_path, CheckMode, FileIdentifier,
    FingerprintError, Hasher,
};
use crate::gateway::{Gateway, GatewayError};

pub use locks::{KeyedGuard, KeyedLocks};

/// What the orchestrator needs to know about the deployment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorSettings {
    /// Prefix stripped from absolute paths before hashing.
    pub root: PathBuf,
    /// Active change-detection mode.
    pub check_mode: CheckMode,
    /// Emit per-file diagnostics.
    pub logging: bool,
}

impl OrchestratorSettings {
    /// Settings with logging enabled.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>, check_mode: CheckMode) -> Self {
        Self {
            root: root.into(),
            check_mode,
            logging: true,
        }
    }

    /// Take root, check mode and logging flag from the configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if no root is configured and the current directory
    /// cannot be determined.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        Ok(Self {
            root: config.resolved_root()?,
            check_mode: config.check_mode,
            logging: config.logging,
        })
    }
}

/// Successful result of a single optimize request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The optimizer ran.
    Optimized,
    /// The stored signature matched; the optimizer was not called.
    Skipped,
}

/// Why an optimize or delete request failed.
#[derive(thiserror::Error, Debug)]
pub enum OptimizeError {
    /// The optimizer could not be initialized for this process.
    #[error("Image optimizer is not available")]
    GatewayUnavailable,

    /// The path does not reference an existing regular file.
    #[error("Image in {0} not found")]
    FileNotFound(PathBuf),

    /// The file could not be read to compute its signature.
    #[error(transparent)]
    Fingerprint(#[from] FingerprintError),

    /// The optimizer reported an error.
    #[error("Failed to optimize {path}: {source}")]
    GatewayOptimizeFailed {
        /// File being optimized
        path: PathBuf,
        /// Error from the gateway
        #[source]
        source: GatewayError,
    },

    /// The record store failed.
    #[error("Record store error: {0}")]
    Persistence(#[from] CacheError),

    /// Delete was asked for a file that has no record.
    #[error("No optimization record for {0}")]
    RecordNotFound(PathBuf),
}

/// The decision engine in front of the optimizer.
///
/// Generic over the [`RecordStore`] so tests and embedders can supply their
/// own persistence. Safe to share between threads.
pub struct Orchestrator<S> {
    gateway: Arc<Gateway>,
    store: S,
    settings: OrchestratorSettings,
    hasher: Hasher,
    locks: KeyedLocks,
}

impl<S> std::fmt::Debug for Orchestrator<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("gateway", &self.gateway)
            .field("store", &"<store>")
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl<S: RecordStore> Orchestrator<S> {
    /// Wire the orchestrator to its collaborators.
    #[must_use]
    pub fn new(gateway: Arc<Gateway>, store: S, settings: OrchestratorSettings) -> Self {
        Self {
            gateway,
            store,
            settings,
            hasher: Hasher::new(),
            locks: KeyedLocks::new(),
        }
    }

    /// Active settings.
    #[must_use]
    pub fn settings(&self) -> &OrchestratorSettings {
        &self.settings
    }

    /// The record store.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// The gateway.
    #[must_use]
    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    /// Path relative to the configured root (prefix stripped at most once).
    #[must_use]
    pub fn relative_path(&self, absolute_path: &Path) -> String {
        relative_path(&self.settings.root, absolute_path)
    }

    /// Record key for `absolute_path`.
    #[must_use]
    pub fn identifier_for(&self, absolute_path: &Path) -> FileIdentifier {
        identifier_for_bytes(relative_bytes(&self.settings.root, absolute_path))
    }

    /// Optimize a file unless it is known to be unchanged since its last
    /// optimization.
    ///
    /// Returns `true` when the file was optimized or skipped as up to date,
    /// `false` on any failure. Never panics on I/O or storage errors.
    pub fn optimize(&self, absolute_path: &Path) -> bool {
        let result = self.process(absolute_path);
        self.log_result(absolute_path, &result);
        result.is_ok()
    }

    /// Emit the per-file diagnostics for a [`Orchestrator::process`] result,
    /// if logging is enabled.
    pub(crate) fn log_result(&self, path: &Path, result: &Result<Outcome, OptimizeError>) {
        if !self.settings.logging {
            return;
        }
        match result {
            Ok(Outcome::Skipped) => {
                log::debug!("Image {} is unchanged, skipping", path.display());
            }
            Ok(Outcome::Optimized) => {
                log::info!("Image {} has been optimized successfully", path.display());
            }
            Err(e) => self.report(e),
        }
    }

    /// Same decision chain as [`Orchestrator::optimize`], with the reason
    /// for the result.
    ///
    /// # Errors
    ///
    /// Returns the [`OptimizeError`] that stopped the chain. Persistence
    /// problems while saving the record are not errors here.
    pub fn process(&self, absolute_path: &Path) -> Result<Outcome, OptimizeError> {
        if !self.gateway.is_available() {
            return Err(OptimizeError::GatewayUnavailable);
        }

        if !absolute_path.is_file() {
            return Err(OptimizeError::FileNotFound(absolute_path.to_path_buf()));
        }

        let relative = self.relative_path(absolute_path);
        let identifier = self.identifier_for(absolute_path);
        let _guard = self.locks.lock(&identifier);

        let mode = self.settings.check_mode;
        let existing = if mode.is_enabled() {
            self.lookup(&identifier)
        } else {
            None
        };

        if let Some(record) = &existing {
            if let Some(current) = self.hasher.signature(absolute_path, mode)? {
                if record.is_unchanged(&current) {
                    log::trace!("Record hit for {} ({})", relative, identifier);
                    return Ok(Outcome::Skipped);
                }
            }
        }

        self.gateway
            .optimize(absolute_path)
            .map_err(|source| OptimizeError::GatewayOptimizeFailed {
                path: absolute_path.to_path_buf(),
                source,
            })?;

        if !mode.is_enabled() {
            return Ok(Outcome::Optimized);
        }

        let record = existing.unwrap_or_else(|| {
            let mut record = self.store.create();
            record.identifier = identifier;
            record.relative_path = relative;
            record
        });
        self.record_optimized(absolute_path, record, mode);

        Ok(Outcome::Optimized)
    }

    /// Forget a file: drop its record so the next optimize runs again.
    ///
    /// Returns `true` if a record existed and was deleted.
    pub fn delete(&self, absolute_path: &Path) -> bool {
        match self.forget(absolute_path) {
            Ok(()) => true,
            Err(e) => {
                self.report(&e);
                false
            }
        }
    }

    /// Same as [`Orchestrator::delete`], with the reason for a failure.
    ///
    /// # Errors
    ///
    /// Returns [`OptimizeError::RecordNotFound`] when there is nothing to
    /// delete, or [`OptimizeError::Persistence`] on storage failure.
    pub fn forget(&self, absolute_path: &Path) -> Result<(), OptimizeError> {
        let identifier = self.identifier_for(absolute_path);
        let _guard = self.locks.lock(&identifier);

        match self.store.find_by_identifier(&identifier)? {
            Some(record) => {
                self.store.delete(&record)?;
                Ok(())
            }
            None => Err(OptimizeError::RecordNotFound(absolute_path.to_path_buf())),
        }
    }

    fn lookup(&self, identifier: &FileIdentifier) -> Option<OptimizationRecord> {
        match self.store.find_by_identifier(identifier) {
            Ok(record) => record,
            Err(e) => {
                if self.settings.logging {
                    log::warn!("Failed to query record for {}: {}", identifier, e);
                }
                None
            }
        }
    }

    /// Store the post-optimization signature. Best effort: failures are
    /// logged and the next call re-optimizes.
    fn record_optimized(&self, path: &Path, mut record: OptimizationRecord, mode: CheckMode) {
        match self.hasher.signature(path, mode) {
            Ok(signature) => record.signature = signature,
            Err(e) => {
                if self.settings.logging {
                    log::warn!("Optimized {} but could not fingerprint it: {}", path.display(), e);
                }
                return;
            }
        }
        record.optimized_at = Some(Utc::now());

        if let Err(e) = self.store.save(&record) {
            if self.settings.logging {
                log::warn!("Failed to save record for {}: {}", path.display(), e);
            }
        }
    }

    fn report(&self, error: &OptimizeError) {
        if !self.settings.logging {
            return;
        }
        match error {
            OptimizeError::GatewayUnavailable | OptimizeError::RecordNotFound(_) => {
                log::debug!("{}", error);
            }
            _ => log::error!("{}", error),
        }
    }
}
