//! Optimization record store.
//!
//! This module remembers which files have already been optimized, so that a
//! later request for an unchanged file can be answered without running the
//! external optimizer again.
//!
//! # Architecture
//!
//! The caching system is split into three components:
//!
//! * [`store`]: The [`RecordStore`] contract the orchestrator talks to.
//! * [`record`]: The [`OptimizationRecord`] data model.
//! * [`database`]: SQLite persistence ([`SqliteRecordStore`]).
//!
//! # Cache Invalidation
//!
//! Records are keyed by the hash of the file's root-relative path and hold
//! one signature in the active check mode (modification time, MD5 or
//! CRC-32). A record is stale when the freshly computed signature differs,
//! or when it was stored under a different check mode.

pub mod database;
pub mod record;
pub mod store;

pub use database::{CacheError, CacheResult, SqliteRecordStore};
pub use record::OptimizationRecord;
pub use store::RecordStore;
