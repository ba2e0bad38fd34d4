//! Directory walker implementation using jwalk for parallel traversal.
//!
//! # Features
//!
//! - Parallel directory traversal using the rayon thread pool
//! - Extension filtering (only image files are yielded)
//! - Gitignore-style `ignore_patterns` matched via the `ignore` crate;
//!   ignored directories are pruned, not descended into
//! - Hidden file filtering and optional symlink following
//! - Graceful shutdown via atomic flag

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use ignore::gitignore::{Gitignore, GitignoreBuilder};
use jwalk::WalkDir;

use super::{ImageEntry, ScanError, WalkerConfig};

/// Directory walker for parallel image discovery.
#[derive(Debug)]
pub struct Walker {
    /// Root path to walk
    root: PathBuf,
    /// Walker configuration
    config: WalkerConfig,
    /// Optional shutdown flag for graceful termination
    shutdown_flag: Option<Arc<AtomicBool>>,
}

impl Walker {
    /// Create a new walker for the given directory.
    #[must_use]
    pub fn new(path: &Path, config: WalkerConfig) -> Self {
        Self {
            root: path.to_path_buf(),
            config,
            shutdown_flag: None,
        }
    }

    /// Set the shutdown flag for graceful termination.
    ///
    /// When the flag becomes `true` the walker stops yielding entries.
    #[must_use]
    pub fn with_shutdown_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.shutdown_flag = Some(flag);
        self
    }

    fn is_shutdown_requested(&self) -> bool {
        self.shutdown_flag
            .as_ref()
            .is_some_and(|f| f.load(Ordering::SeqCst))
    }

    /// Build the matcher for the configured ignore patterns.
    ///
    /// `.gitignore` files in the tree are not consulted: media directories
    /// are commonly excluded from version control.
    fn build_gitignore(&self) -> Option<Gitignore> {
        let mut builder = GitignoreBuilder::new(&self.root);

        for pattern in &self.config.ignore_patterns {
            if let Err(e) = builder.add_line(None, pattern) {
                log::warn!("Invalid ignore pattern '{}': {}", pattern, e);
            }
        }

        match builder.build() {
            Ok(gitignore) if gitignore.is_empty() => None,
            Ok(gitignore) => Some(gitignore),
            Err(e) => {
                log::warn!("Failed to build ignore patterns: {}", e);
                None
            }
        }
    }

    /// Walk the directory tree, yielding image files.
    ///
    /// Errors are yielded as [`ScanError`] values rather than stopping
    /// iteration. Entries come out sorted by name within each directory.
    pub fn walk(&self) -> impl Iterator<Item = Result<ImageEntry, ScanError>> + '_ {
        let gitignore = self.build_gitignore();
        let prune_root = self.root.clone();
        let prune_rules = gitignore.clone();

        let walk_dir = WalkDir::new(&self.root)
            .follow_links(self.config.follow_symlinks)
            .skip_hidden(self.config.skip_hidden)
            .process_read_dir(move |_depth, _path, _read_dir_state, children| {
                children.sort_by(|a, b| match (a, b) {
                    (Ok(a), Ok(b)) => a.file_name().cmp(b.file_name()),
                    (Ok(_), Err(_)) => std::cmp::Ordering::Less,
                    (Err(_), Ok(_)) => std::cmp::Ordering::Greater,
                    (Err(_), Err(_)) => std::cmp::Ordering::Equal,
                });
                if let Some(rules) = &prune_rules {
                    children.retain(|child| match child {
                        Ok(entry) if entry.file_type().is_dir() => {
                            !is_ignored(rules, &prune_root, &entry.path(), true)
                        }
                        _ => true,
                    });
                }
            });

        walk_dir.into_iter().filter_map(move |entry_result| {
            if self.is_shutdown_requested() {
                log::debug!("Walker: Shutdown requested, stopping iteration");
                return None;
            }

            match entry_result {
                Ok(entry) => {
                    let path = entry.path();
                    let file_type = entry.file_type();

                    if file_type.is_dir() {
                        return None;
                    }

                    if let Some(rules) = &gitignore {
                        if is_ignored(rules, &self.root, &path, false) {
                            log::trace!("Ignoring file: {}", path.display());
                            return None;
                        }
                    }

                    if file_type.is_symlink() && !self.config.follow_symlinks {
                        log::trace!("Skipping symlink: {}", path.display());
                        return None;
                    }

                    if !self.config.is_image(&path) {
                        return None;
                    }

                    let metadata = match std::fs::metadata(&path) {
                        Ok(m) => m,
                        Err(e) => return Some(Self::handle_io_error(&path, e)),
                    };

                    if !metadata.is_file() {
                        return None;
                    }

                    Some(Ok(ImageEntry {
                        path,
                        size: metadata.len(),
                    }))
                }
                Err(e) => {
                    let path = e
                        .path()
                        .map_or_else(|| self.root.clone(), std::borrow::ToOwned::to_owned);
                    log::warn!("Walker error for {}: {}", path.display(), e);
                    Some(Err(ScanError::Io {
                        path,
                        source: std::io::Error::other(e.to_string()),
                    }))
                }
            }
        })
    }

    /// Handle I/O errors during file access.
    fn handle_io_error(path: &Path, error: std::io::Error) -> Result<ImageEntry, ScanError> {
        use std::io::ErrorKind;

        match error.kind() {
            ErrorKind::PermissionDenied => {
                log::warn!("Permission denied: {}", path.display());
                Err(ScanError::PermissionDenied(path.to_path_buf()))
            }
            ErrorKind::NotFound => {
                log::debug!("File not found (may have been deleted): {}", path.display());
                Err(ScanError::NotFound(path.to_path_buf()))
            }
            _ => {
                log::warn!("I/O error for {}: {}", path.display(), error);
                Err(ScanError::Io {
                    path: path.to_path_buf(),
                    source: error,
                })
            }
        }
    }
}

/// Gitignore matching on the root-relative path, with forward slashes.
fn is_ignored(rules: &Gitignore, root: &Path, path: &Path, is_dir: bool) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let relative = relative.to_string_lossy();
    let normalized = if cfg!(windows) {
        relative.replace('\\', "/")
    } else {
        relative.into_owned()
    };
    rules.matched(normalized, is_dir).is_ignore()
}
