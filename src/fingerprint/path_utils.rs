//! Path helpers for identifier derivation.
//!
//! Identifiers are computed from the path *relative to the configured root*,
//! as a plain string. Two details matter for stability:
//!
//! - The root prefix is stripped at most once, and only when it is an actual
//!   prefix. A path outside the root keeps its full absolute form, so it gets
//!   a different identifier than the same name below the root.
//! - The string is normalized to NFC before hashing. macOS reports file names
//!   in NFD, Linux and Windows usually in NFC, and the same visual name must
//!   map to the same record.
//! - Stripping works on the raw encoded bytes of the path. Names that are not
//!   valid UTF-8 keep their bytes for hashing ([`relative_bytes`]); only the
//!   display form ([`relative_path`]) is lossy.
//!
//! # Example
//!
//! ```
//! use optimage::fingerprint::path_utils::{normalize_path_str, relative_path};
//! use std::path::Path;
//!
//! let root = Path::new("/srv/shop");
//! assert_eq!(relative_path(root, Path::new("/srv/shop/a/b.jpg")), "a/b.jpg");
//! assert_eq!(relative_path(root, Path::new("/tmp/a/b.jpg")), "/tmp/a/b.jpg");
//!
//! assert_eq!(normalize_path_str("cafe\u{0301}.png"), "café.png");
//! ```

use std::borrow::Cow;
use std::path::{Component, Path, PathBuf, MAIN_SEPARATOR};

use unicode_normalization::UnicodeNormalization;

/// Normalize a path string to NFC (Composed) form.
///
/// Borrows the input when it is already NFC, which is the common case.
#[must_use]
pub fn normalize_path_str(s: &str) -> Cow<'_, str> {
    if unicode_normalization::is_nfc(s) {
        Cow::Borrowed(s)
    } else {
        Cow::Owned(s.nfc().collect())
    }
}

/// Strip the root prefix from `absolute`, once, if present.
///
/// The prefix is the root followed by the platform separator, so
/// `/srv/shop` is not a prefix of `/srv/shopping/a.jpg`. When the root is
/// not a prefix (or is empty) the path is returned unchanged.
///
/// Bytes that are not valid UTF-8 are replaced with U+FFFD; use
/// [`relative_bytes`] when the result feeds an identifier.
#[must_use]
pub fn relative_path(root: &Path, absolute: &Path) -> String {
    String::from_utf8_lossy(relative_bytes(root, absolute)).into_owned()
}

/// Same as [`relative_path`], on the raw encoded bytes of `absolute`.
#[must_use]
pub fn relative_bytes<'a>(root: &Path, absolute: &'a Path) -> &'a [u8] {
    let path = absolute.as_os_str().as_encoded_bytes();
    let root = root.as_os_str().as_encoded_bytes();
    if root.is_empty() {
        return path;
    }

    let Some(rest) = path.strip_prefix(root) else {
        return path;
    };
    if root.ends_with(&[SEPARATOR]) {
        return rest;
    }
    rest.strip_prefix(&[SEPARATOR]).unwrap_or(path)
}

/// Fold `.` and `..` components without touching the filesystem.
///
/// `..` removes the preceding normal component; at the root it is dropped.
/// Symlinks are not resolved, so `link/..` folds to the directory holding
/// `link`, not to the parent of its target.
#[must_use]
pub fn normalize_lexically(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if matches!(out.components().next_back(), Some(Component::Normal(_))) {
                    out.pop();
                } else if !out.has_root() {
                    out.push(component);
                }
            }
            other => out.push(other),
        }
    }
    out
}

/// Platform separator as a byte. Both separators are ASCII.
const SEPARATOR: u8 = MAIN_SEPARATOR as u8;
