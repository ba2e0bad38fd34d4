//! Fingerprint engine: file identifiers and change signatures.
//!
//! This module provides the two pieces of information the record cache is
//! keyed and validated by:
//!
//! - [`FileIdentifier`]: a stable key derived from a file's path relative to
//!   the configured root. It never looks at file content.
//! - [`ChangeSignature`]: a comparable summary of the file's current state,
//!   computed in the system-wide [`CheckMode`].
//!
//! # Architecture
//!
//! - [`hasher`]: Streaming MD5 / CRC-32 digests and modification times
//! - [`path_utils`]: Root prefix stripping and Unicode normalization
//!
//! # Example
//!
//! ```no_run
//! use optimage::fingerprint::{identifier_for, relative_path, signature_for, CheckMode};
//! use std::path::Path;
//!
//! let absolute = Path::new("/srv/shop/pub/media/a/b.jpg");
//! let relative = relative_path(Path::new("/srv/shop"), absolute);
//! assert_eq!(relative, "pub/media/a/b.jpg");
//!
//! let id = identifier_for(&relative);
//! let signature = signature_for(absolute, CheckMode::Md5)?;
//! println!("{id}: {signature:?}");
//! # Ok::<(), optimage::fingerprint::FingerprintError>(())
//! ```

pub mod hasher;
pub mod path_utils;

use std::fmt;
use std::path::PathBuf;

use clap::ValueEnum;
use md5::{Digest, Md5};
use serde::{Deserialize, Serialize};

pub use hasher::{signature_for, Hasher};
pub use path_utils::{normalize_lexically, normalize_path_str, relative_bytes, relative_path};

/// Change-detection mode, selected once for the whole deployment.
///
/// Switching modes makes every stored signature incomparable with freshly
/// computed ones, which forces exactly one re-optimization per file.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, ValueEnum,
)]
#[serde(rename_all = "snake_case")]
pub enum CheckMode {
    /// Never compare; optimize on every call and never write records.
    Disabled,
    /// Compare the file's last-modified time.
    #[default]
    ModifiedTime,
    /// Compare an MD5 digest of the file content.
    Md5,
    /// Compare a CRC-32 checksum of the file content.
    Crc32,
}

impl CheckMode {
    /// Whether records are read and written in this mode.
    #[must_use]
    pub fn is_enabled(self) -> bool {
        self != Self::Disabled
    }

    /// Name as used in configuration files and on the command line.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Disabled => "disabled",
            Self::ModifiedTime => "modified_time",
            Self::Md5 => "md5",
            Self::Crc32 => "crc32",
        }
    }
}

impl fmt::Display for CheckMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last-known state of a file, in exactly one representation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", content = "value", rename_all = "snake_case")]
pub enum ChangeSignature {
    /// Whole seconds since the Unix epoch.
    ModifiedTime(i64),
    /// Lowercase hex MD5 digest of the content.
    Md5(String),
    /// Lowercase, zero-padded hex CRC-32 of the content.
    Crc32(String),
}

impl ChangeSignature {
    /// The mode this signature was computed in.
    #[must_use]
    pub fn mode(&self) -> CheckMode {
        match self {
            Self::ModifiedTime(_) => CheckMode::ModifiedTime,
            Self::Md5(_) => CheckMode::Md5,
            Self::Crc32(_) => CheckMode::Crc32,
        }
    }
}

/// Stable key of a file, derived from its root-relative path.
///
/// Lowercase hex MD5 of the NFC-normalized relative path. Two identical
/// relative paths always produce the same identifier.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct FileIdentifier(String);

impl FileIdentifier {
    /// Wrap an already computed identifier, e.g. one read back from storage.
    #[must_use]
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// The hex representation.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `true` for the placeholder of a record that was created but not filled in.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for FileIdentifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Compute the identifier for a root-relative path.
///
/// Pure and deterministic; the path is normalized to NFC first so that the
/// same visual name yields the same key on macOS and Linux.
#[must_use]
pub fn identifier_for(relative_path: &str) -> FileIdentifier {
    md5_identifier(normalize_path_str(relative_path).as_bytes())
}

/// Compute the identifier for a root-relative path given as raw bytes
/// (see [`relative_bytes`]).
///
/// Valid UTF-8 is treated exactly like [`identifier_for`]. Anything else is
/// hashed as it is, so names differing only in undecodable bytes stay apart.
#[must_use]
pub fn identifier_for_bytes(relative_path: &[u8]) -> FileIdentifier {
    match std::str::from_utf8(relative_path) {
        Ok(s) => identifier_for(s),
        Err(_) => md5_identifier(relative_path),
    }
}

fn md5_identifier(bytes: &[u8]) -> FileIdentifier {
    let mut hasher = Md5::new();
    hasher.update(bytes);
    FileIdentifier(format!("{:x}", hasher.finalize()))
}

/// Errors that can occur while computing a change signature.
#[derive(thiserror::Error, Debug)]
pub enum FingerprintError {
    /// The file disappeared between the existence check and the read.
    #[error("File not found: {0}")]
    NotFound(PathBuf),

    /// Permission was denied when reading the file.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// An I/O error occurred while reading the file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

impl FingerprintError {
    pub(crate) fn from_io(path: &std::path::Path, error: std::io::Error) -> Self {
        use std::io::ErrorKind;

        match error.kind() {
            ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}
