//! Streaming signature computation.
//!
//! # Overview
//! This module provides the [`Hasher`] struct for computing change
//! signatures: file modification times, and MD5 / CRC-32 digests of file
//! contents read through a fixed-size buffer so large images are never
//! loaded into memory at once.

use std::fs::{self, File};
use std::io::{BufReader, Read};
use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use md5::{Digest, Md5};

use super::{ChangeSignature, CheckMode, FingerprintError};

/// Default read buffer size (64 KiB).
pub const BUFFER_SIZE: usize = 64 * 1024;

/// Signature calculator for files on disk.
#[derive(Debug, Clone)]
pub struct Hasher {
    buffer_size: usize,
}

impl Default for Hasher {
    fn default() -> Self {
        Self::new()
    }
}

impl Hasher {
    /// Create a hasher with the default buffer size.
    #[must_use]
    pub fn new() -> Self {
        Self {
            buffer_size: BUFFER_SIZE,
        }
    }

    /// Create a hasher with a custom read buffer size (minimum 1 byte).
    #[must_use]
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self {
            buffer_size: buffer_size.max(1),
        }
    }

    /// Compute the signature of `path` in `mode`.
    ///
    /// Returns `Ok(None)` for [`CheckMode::Disabled`] without touching the file.
    ///
    /// # Errors
    ///
    /// Returns a [`FingerprintError`] if the file is missing or unreadable.
    pub fn signature(
        &self,
        path: &Path,
        mode: CheckMode,
    ) -> Result<Option<ChangeSignature>, FingerprintError> {
        let signature = match mode {
            CheckMode::Disabled => return Ok(None),
            CheckMode::ModifiedTime => ChangeSignature::ModifiedTime(self.modified_time(path)?),
            CheckMode::Md5 => ChangeSignature::Md5(self.md5_hex(path)?),
            CheckMode::Crc32 => ChangeSignature::Crc32(self.crc32_hex(path)?),
        };
        Ok(Some(signature))
    }

    /// Last-modified time in whole seconds since the Unix epoch.
    ///
    /// # Errors
    ///
    /// Returns a [`FingerprintError`] if metadata cannot be read.
    pub fn modified_time(&self, path: &Path) -> Result<i64, FingerprintError> {
        let modified = fs::metadata(path)
            .and_then(|m| m.modified())
            .map_err(|e| FingerprintError::from_io(path, e))?;
        Ok(unix_seconds(modified))
    }

    /// Lowercase hex MD5 digest of the file content.
    ///
    /// # Errors
    ///
    /// Returns a [`FingerprintError`] if the file cannot be read.
    pub fn md5_hex(&self, path: &Path) -> Result<String, FingerprintError> {
        let mut hasher = Md5::new();
        self.stream(path, |chunk| hasher.update(chunk))?;
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Lowercase, zero-padded hex CRC-32 (IEEE) of the file content.
    ///
    /// # Errors
    ///
    /// Returns a [`FingerprintError`] if the file cannot be read.
    pub fn crc32_hex(&self, path: &Path) -> Result<String, FingerprintError> {
        let mut hasher = crc32fast::Hasher::new();
        self.stream(path, |chunk| hasher.update(chunk))?;
        Ok(format!("{:08x}", hasher.finalize()))
    }

    fn stream(&self, path: &Path, mut sink: impl FnMut(&[u8])) -> Result<(), FingerprintError> {
        let file = File::open(path).map_err(|e| FingerprintError::from_io(path, e))?;
        let mut reader = BufReader::with_capacity(self.buffer_size, file);
        let mut buffer = vec![0u8; self.buffer_size];

        loop {
            let read = match reader.read(&mut buffer) {
                Ok(0) => break,
                Ok(n) => n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(FingerprintError::from_io(path, e)),
            };
            sink(&buffer[..read]);
        }

        Ok(())
    }
}

/// Compute the signature of `path` in `mode` with a default [`Hasher`].
///
/// # Errors
///
/// Returns a [`FingerprintError`] if the file is missing or unreadable.
pub fn signature_for(
    path: &Path,
    mode: CheckMode,
) -> Result<Option<ChangeSignature>, FingerprintError> {
    Hasher::new().signature(path, mode)
}

fn unix_seconds(time: SystemTime) -> i64 {
    match time.duration_since(UNIX_EPOCH) {
        Ok(d) => i64::try_from(d.as_secs()).unwrap_or(i64::MAX),
        // Floor: half a second before the epoch is -1
        Err(e) => {
            let before = e.duration();
            let secs = i64::try_from(before.as_secs()).unwrap_or(i64::MAX);
            if before.subsec_nanos() > 0 {
                -secs - 1
            } else {
                -secs
            }
        }
    }
}
