//! Per-identifier mutual exclusion.
//!
//! Two optimize calls for the same file must not both miss the cache and
//! both run the optimizer. [`KeyedLocks`] hands out one guard per identifier
//! at a time; calls for different identifiers never wait for each other.

use std::collections::HashSet;
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

use crate::fingerprint::FileIdentifier;

/// Set of currently held identifiers.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    held: Mutex<HashSet<FileIdentifier>>,
    released: Condvar,
}

/// Holds the lock for one identifier until dropped.
#[derive(Debug)]
pub struct KeyedGuard<'a> {
    owner: &'a KeyedLocks,
    key: FileIdentifier,
}

impl KeyedLocks {
    /// Create an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Block until `key` is free, then take it.
    pub fn lock(&self, key: &FileIdentifier) -> KeyedGuard<'_> {
        let mut held = self.held();
        while held.contains(key) {
            held = self
                .released
                .wait(held)
                .unwrap_or_else(PoisonError::into_inner);
        }
        held.insert(key.clone());

        KeyedGuard {
            owner: self,
            key: key.clone(),
        }
    }

    /// Take `key` only if nobody holds it.
    pub fn try_lock(&self, key: &FileIdentifier) -> Option<KeyedGuard<'_>> {
        let mut held = self.held();
        if !held.insert(key.clone()) {
            return None;
        }
        Some(KeyedGuard {
            owner: self,
            key: key.clone(),
        })
    }

    /// Number of identifiers currently locked.
    #[must_use]
    pub fn held_count(&self) -> usize {
        self.held().len()
    }

    // The set is only ever mutated by single insert/remove calls, so a
    // poisoned mutex still guards a consistent set.
    fn held(&self) -> MutexGuard<'_, HashSet<FileIdentifier>> {
        self.held.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for KeyedGuard<'_> {
    fn drop(&mut self) {
        self.owner.held().remove(&self.key);
        self.owner.released.notify_all();
    }
}
