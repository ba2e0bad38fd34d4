//! Scanner module: finds the image files a batch run should process.
//!
//! Paths given on the command line are either files, which are taken as they
//! are, or directories, which are walked in parallel with `jwalk` and
//! filtered down to image extensions.
//!
//! # Example
//!
//! ```no_run
//! use optimage::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("/var/www/shop/pub/media"), WalkerConfig::default());
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(image) => println!("{}: {} bytes", image.path.display(), image.size),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

pub mod walker;

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::config::ScanSettings;

pub use walker::Walker;

/// An image file found by the scanner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageEntry {
    /// Absolute path to the file
    pub path: PathBuf,
    /// File size in bytes at discovery time
    pub size: u64,
}

/// Configuration for directory walking.
#[derive(Debug, Clone)]
pub struct WalkerConfig {
    /// Follow symbolic links during traversal.
    pub follow_symlinks: bool,

    /// Skip hidden files and directories (names starting with `.`).
    pub skip_hidden: bool,

    /// Lowercase extensions, without the dot, that count as images.
    pub extensions: Vec<String>,

    /// Glob patterns to ignore (gitignore-style).
    pub ignore_patterns: Vec<String>,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self::from_settings(&ScanSettings::default())
    }
}

impl WalkerConfig {
    /// Walker configuration from the `[scan]` settings.
    #[must_use]
    pub fn from_settings(settings: &ScanSettings) -> Self {
        Self {
            follow_symlinks: settings.follow_symlinks,
            skip_hidden: settings.skip_hidden,
            extensions: settings
                .extensions
                .iter()
                .map(|e| e.trim_start_matches('.').to_lowercase())
                .collect(),
            ignore_patterns: settings.ignore_patterns.clone(),
        }
    }

    /// Whether `path` has one of the configured image extensions.
    #[must_use]
    pub fn is_image(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(str::to_lowercase)
            .is_some_and(|ext| self.extensions.iter().any(|known| *known == ext))
    }
}

/// Errors that can occur during directory scanning.
#[derive(thiserror::Error, Debug)]
pub enum ScanError {
    /// Permission was denied when accessing a file or directory.
    #[error("Permission denied: {0}")]
    PermissionDenied(PathBuf),

    /// The specified path was not found.
    #[error("Path not found: {0}")]
    NotFound(PathBuf),

    /// An I/O error occurred while accessing a file.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}

/// Result of expanding command-line paths into image files.
#[derive(Debug, Default)]
pub struct ScanResult {
    /// Files to process, in discovery order, without duplicates.
    pub files: Vec<PathBuf>,
    /// Problems encountered along the way.
    pub errors: Vec<ScanError>,
}

/// Expand `paths` into the list of files to process.
///
/// Explicit files are kept whatever their extension, so a single file can
/// always be forced through. Directories contribute every image file below
/// them. Missing paths are reported as [`ScanError::NotFound`].
#[must_use]
pub fn collect_images(
    paths: &[PathBuf],
    config: &WalkerConfig,
    shutdown_flag: Option<Arc<AtomicBool>>,
) -> ScanResult {
    let mut result = ScanResult::default();
    let mut seen = std::collections::HashSet::new();

    for path in paths {
        if shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
        {
            break;
        }

        if path.is_file() {
            if seen.insert(path.clone()) {
                result.files.push(path.clone());
            }
        } else if path.is_dir() {
            let mut walker = Walker::new(path, config.clone());
            if let Some(flag) = &shutdown_flag {
                walker = walker.with_shutdown_flag(Arc::clone(flag));
            }
            for entry in walker.walk() {
                match entry {
                    Ok(image) => {
                        if seen.insert(image.path.clone()) {
                            result.files.push(image.path);
                        }
                    }
                    Err(e) => result.errors.push(e),
                }
            }
        } else {
            log::warn!("Path not found: {}", path.display());
            result.errors.push(ScanError::NotFound(path.clone()));
        }
    }

    result
}
