//! Record store contract.

use super::{CacheResult, OptimizationRecord};
use crate::fingerprint::FileIdentifier;

/// Keyed persistence of [`OptimizationRecord`]s.
///
/// The store owns persisted records exclusively; callers only ever hold
/// transient copies. Implementations make no promise about concurrent
/// writers to the same identifier beyond last-write-wins; the orchestrator
/// serializes calls per identifier itself.
pub trait RecordStore: Send + Sync {
    /// Look up a record. Has no side effects.
    ///
    /// # Errors
    ///
    /// Returns a [`CacheError`](super::CacheError) if the storage cannot be queried.
    fn find_by_identifier(&self, id: &FileIdentifier) -> CacheResult<Option<OptimizationRecord>>;

    /// A new, empty, not yet persisted record.
    fn create(&self) -> OptimizationRecord {
        OptimizationRecord::default()
    }

    /// Insert or update by identifier. Saving the same record twice is a no-op.
    ///
    /// # Errors
    ///
    /// Returns a [`CacheError`](super::CacheError) on storage failure or when
    /// the record has no identifier.
    fn save(&self, record: &OptimizationRecord) -> CacheResult<()>;

    /// Remove the record with the same identifier. Removing an absent record
    /// is not an error.
    ///
    /// # Errors
    ///
    /// Returns a [`CacheError`](super::CacheError) on storage failure.
    fn delete(&self, record: &OptimizationRecord) -> CacheResult<()>;
}

impl<S: RecordStore + ?Sized> RecordStore for std::sync::Arc<S> {
    fn find_by_identifier(&self, id: &FileIdentifier) -> CacheResult<Option<OptimizationRecord>> {
        (**self).find_by_identifier(id)
    }

    fn create(&self) -> OptimizationRecord {
        (**self).create()
    }

    fn save(&self, record: &OptimizationRecord) -> CacheResult<()> {
        (**self).save(record)
    }

    fn delete(&self, record: &OptimizationRecord) -> CacheResult<()> {
        (**self).delete(record)
    }
}
