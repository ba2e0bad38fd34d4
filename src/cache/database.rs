//! SQLite-backed record store.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{OptimizationRecord, RecordStore};
use crate::fingerprint::{ChangeSignature, FileIdentifier};

/// Errors that can occur while reading or writing records.
#[derive(thiserror::Error, Debug)]
pub enum CacheError {
    /// The database file could not be opened or is not a valid database.
    #[error("Failed to open record database at {path}: {source}")]
    Open {
        /// Database location
        path: PathBuf,
        /// The underlying SQLite error
        #[source]
        source: rusqlite::Error,
    },

    /// The directory for the database file could not be created.
    #[error("Failed to create database directory {path}: {source}")]
    CreateDir {
        /// Directory that could not be created
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// A query failed.
    #[error("Record database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// A record without an identifier was passed to `save`.
    #[error("Record has no identifier")]
    MissingIdentifier,

    /// Another thread panicked while holding the connection.
    #[error("Record database connection is poisoned")]
    Poisoned,
}

/// Result alias for record store operations.
pub type CacheResult<T> = Result<T, CacheError>;

const SCHEMA: &str = r#"
    CREATE TABLE IF NOT EXISTS optimized_images (
        hashed_path TEXT PRIMARY KEY,
        path TEXT NOT NULL,
        modify_time INTEGER,
        md5 TEXT,
        crc32 TEXT,
        optimized_at TEXT NOT NULL
    );
"#;

const SELECT_COLUMNS: &str = "hashed_path, path, modify_time, md5, crc32, optimized_at";

/// Persistent record store using SQLite.
///
/// One row per identifier. Only the column matching the stored signature's
/// mode is non-NULL.
pub struct SqliteRecordStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl std::fmt::Debug for SqliteRecordStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteRecordStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl SqliteRecordStore {
    /// Opens or creates a record database at the specified path.
    ///
    /// Missing parent directories are created.
    ///
    /// # Errors
    ///
    /// Returns [`CacheError::Open`] if the file is not a valid SQLite
    /// database (e.g. it is corrupted) or cannot be opened.
    pub fn open(path: &Path) -> CacheResult<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|source| CacheError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let open_err = |source| CacheError::Open {
            path: path.to_path_buf(),
            source,
        };

        let conn = Connection::open(path).map_err(open_err)?;
        conn.pragma_update(None, "journal_mode", "WAL")
            .map_err(open_err)?;
        conn.execute_batch(SCHEMA).map_err(open_err)?;

        log::debug!("Opened record database at {}", path.display());

        Ok(Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        })
    }

    /// Opens a private in-memory database. Records are lost on drop.
    ///
    /// # Errors
    ///
    /// Returns a [`CacheError`] if SQLite cannot allocate the database.
    pub fn open_in_memory() -> CacheResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
            path: None,
        })
    }

    /// Location of the database file, `None` for in-memory stores.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Number of stored records.
    ///
    /// # Errors
    ///
    /// Returns a [`CacheError`] if the query fails.
    pub fn count(&self) -> CacheResult<u64> {
        let conn = self.connection()?;
        let count: i64 =
            conn.query_row("SELECT COUNT(*) FROM optimized_images", [], |row| row.get(0))?;
        Ok(u64::try_from(count).unwrap_or(0))
    }

    /// Remove every record, forcing re-optimization of all files.
    ///
    /// # Errors
    ///
    /// Returns a [`CacheError`] if the delete fails.
    pub fn clear(&self) -> CacheResult<usize> {
        let conn = self.connection()?;
        let removed = conn.execute("DELETE FROM optimized_images", [])?;
        log::info!("Cleared {} optimization records", removed);
        Ok(removed)
    }

    /// Close the connection, flushing the WAL.
    ///
    /// # Errors
    ///
    /// Returns a [`CacheError`] if SQLite refuses to close.
    pub fn close(self) -> CacheResult<()> {
        let conn = self.conn.into_inner().map_err(|_| CacheError::Poisoned)?;
        conn.close().map_err(|(_, e)| CacheError::Sqlite(e))
    }

    fn connection(&self) -> CacheResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| CacheError::Poisoned)
    }
}

impl RecordStore for SqliteRecordStore {
    fn find_by_identifier(&self, id: &FileIdentifier) -> CacheResult<Option<OptimizationRecord>> {
        let conn = self.connection()?;
        let record = conn
            .query_row(
                &format!("SELECT {SELECT_COLUMNS} FROM optimized_images WHERE hashed_path = ?1"),
                params![id.as_str()],
                record_from_row,
            )
            .optional()?;
        Ok(record)
    }

    fn save(&self, record: &OptimizationRecord) -> CacheResult<()> {
        if record.identifier.is_empty() {
            return Err(CacheError::MissingIdentifier);
        }

        let (modify_time, md5, crc32) = match &record.signature {
            Some(ChangeSignature::ModifiedTime(t)) => (Some(*t), None, None),
            Some(ChangeSignature::Md5(h)) => (None, Some(h.as_str()), None),
            Some(ChangeSignature::Crc32(h)) => (None, None, Some(h.as_str())),
            None => (None, None, None),
        };
        let optimized_at = record.optimized_at.unwrap_or_else(Utc::now).to_rfc3339();

        let conn = self.connection()?;
        conn.execute(
            "INSERT INTO optimized_images (hashed_path, path, modify_time, md5, crc32, optimized_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT(hashed_path) DO UPDATE SET
                path = excluded.path,
                modify_time = excluded.modify_time,
                md5 = excluded.md5,
                crc32 = excluded.crc32,
                optimized_at = excluded.optimized_at",
            params![
                record.identifier.as_str(),
                record.relative_path,
                modify_time,
                md5,
                crc32,
                optimized_at
            ],
        )?;
        log::trace!("Saved record {} ({})", record.identifier, record.relative_path);
        Ok(())
    }

    fn delete(&self, record: &OptimizationRecord) -> CacheResult<()> {
        let conn = self.connection()?;
        let removed = conn.execute(
            "DELETE FROM optimized_images WHERE hashed_path = ?1",
            params![record.identifier.as_str()],
        )?;
        log::trace!("Deleted {} record(s) for {}", removed, record.identifier);
        Ok(())
    }
}

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<OptimizationRecord> {
    let identifier: String = row.get(0)?;
    let relative_path: String = row.get(1)?;
    let modify_time: Option<i64> = row.get(2)?;
    let md5: Option<String> = row.get(3)?;
    let crc32: Option<String> = row.get(4)?;
    let optimized_at: String = row.get(5)?;

    let signature = modify_time
        .map(ChangeSignature::ModifiedTime)
        .or_else(|| md5.map(ChangeSignature::Md5))
        .or_else(|| crc32.map(ChangeSignature::Crc32));

    let optimized_at = DateTime::parse_from_rfc3339(&optimized_at)
        .map(|t| t.with_timezone(&Utc))
        .ok();

    Ok(OptimizationRecord {
        identifier: FileIdentifier::from_hex(identifier),
        relative_path,
        signature,
        optimized_at,
    })
}
