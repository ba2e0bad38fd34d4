//! Optimization record definitions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::fingerprint::{ChangeSignature, CheckMode, FileIdentifier};

/// Last-known state of an optimized file.
///
/// A record is created by [`RecordStore::create`](super::RecordStore::create)
/// with every field unset, filled in by the caller and then persisted with
/// [`RecordStore::save`](super::RecordStore::save).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptimizationRecord {
    /// Primary key: hash of the relative path.
    pub identifier: FileIdentifier,
    /// Path relative to the configured root, as it was hashed.
    pub relative_path: String,
    /// Signature of the file right after its last optimization.
    pub signature: Option<ChangeSignature>,
    /// When the record was last saved.
    pub optimized_at: Option<DateTime<Utc>>,
}

impl OptimizationRecord {
    /// Stored signature, but only if it was computed in `mode`.
    ///
    /// A signature from another mode is never comparable and reads as absent.
    #[must_use]
    pub fn signature_in(&self, mode: CheckMode) -> Option<&ChangeSignature> {
        self.signature.as_ref().filter(|s| s.mode() == mode)
    }

    /// Whether `current` equals the stored signature of the same mode.
    #[must_use]
    pub fn is_unchanged(&self, current: &ChangeSignature) -> bool {
        self.signature_in(current.mode()) == Some(current)
    }
}
