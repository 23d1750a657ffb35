//! SQLite-backed catalog database.
//!
//! One [`Catalog`] owns one connection. Every component receives the same
//! `Arc<Catalog>`; access is serialized through an internal mutex so the
//! connection can be shared by the worker pool.

use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};

use super::{CatalogError, FileRecord};
use crate::scanner::Digest;

/// Default catalog file, relative to the working directory.
pub const DEFAULT_DATABASE_PATH: &str = "dedupe.db";

const PRAGMAS: &str = "
    PRAGMA page_size = 4096;
    PRAGMA cache_size = 5120;
    PRAGMA synchronous = NORMAL;
    PRAGMA temp_store = MEMORY;
    PRAGMA foreign_keys = ON;
";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS file_metadata (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        path          BLOB    NOT NULL UNIQUE,
        size          INTEGER NOT NULL,
        modified_time INTEGER NOT NULL,
        hash          BLOB    NOT NULL
    );
    CREATE INDEX IF NOT EXISTS file_metadata_size ON file_metadata (size);
    CREATE INDEX IF NOT EXISTS file_metadata_hash ON file_metadata (hash);

    CREATE TABLE IF NOT EXISTS file_link (
        id        INTEGER PRIMARY KEY AUTOINCREMENT,
        source_id INTEGER NOT NULL REFERENCES file_metadata (id) ON DELETE CASCADE,
        link_id   INTEGER NOT NULL UNIQUE REFERENCES file_metadata (id) ON DELETE CASCADE
    );
    CREATE INDEX IF NOT EXISTS file_link_source ON file_link (source_id);
";

/// Columns selected whenever a full record is read.
pub(crate) const RECORD_COLUMNS: &str = "id, path, size, modified_time, hash";

/// Persistent catalog of file metadata and links.
pub struct Catalog {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for Catalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Catalog").finish_non_exhaustive()
    }
}

impl Catalog {
    /// Open or create the catalog at `path`.
    ///
    /// Missing parent directories are created. The schema is bootstrapped
    /// if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be created or SQLite fails
    /// to open the file or apply the schema.
    pub fn open(path: &Path) -> Result<Self, CatalogError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|source| CatalogError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        log::debug!("Opening catalog at {}", path.display());
        Self::from_connection(Connection::open(path)?)
    }

    /// Open a throwaway catalog that lives in memory.
    ///
    /// # Errors
    ///
    /// Returns an error if the schema cannot be applied.
    pub fn in_memory() -> Result<Self, CatalogError> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self, CatalogError> {
        conn.execute_batch(PRAGMAS)?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Look up the record stored for `path`.
    ///
    /// # Errors
    ///
    /// Returns an error on SQLite failure or a corrupt digest column.
    pub fn record_for_path(&self, path: &Path) -> Result<Option<FileRecord>, CatalogError> {
        let conn = self.lock();
        let raw = conn
            .query_row(
                &format!("SELECT {RECORD_COLUMNS} FROM file_metadata WHERE path = ?1"),
                params![path_key(path)],
                RawRecord::from_row,
            )
            .optional()?;

        raw.map(RawRecord::decode).transpose()
    }

    /// Whether a record exists for `path`.
    ///
    /// # Errors
    ///
    /// Returns an error on SQLite failure.
    pub fn has_record(&self, path: &Path) -> Result<bool, CatalogError> {
        let conn = self.lock();
        let found = conn
            .query_row(
                "SELECT 1 FROM file_metadata WHERE path = ?1",
                params![path_key(path)],
                |_| Ok(()),
            )
            .optional()?;
        Ok(found.is_some())
    }

    /// Number of file records.
    ///
    /// # Errors
    ///
    /// Returns an error on SQLite failure.
    pub fn record_count(&self) -> Result<usize, CatalogError> {
        let conn = self.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM file_metadata", [], |row| {
            row.get(0)
        })?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Run `f` inside one transaction, committing on success.
    ///
    /// The transaction rolls back if `f` fails.
    pub(crate) fn with_transaction<T>(
        &self,
        f: impl FnOnce(&mut Transaction<'_>) -> Result<T, CatalogError>,
    ) -> Result<T, CatalogError> {
        let mut conn = self.lock();
        let mut tx = conn.transaction()?;
        let value = f(&mut tx)?;
        tx.commit()?;
        Ok(value)
    }

    pub(crate) fn lock(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The raw bytes under which `path` is stored.
///
/// Paths are keyed by their exact OS bytes so names that are not valid
/// UTF-8 never collide with each other.
#[cfg(unix)]
pub(crate) fn path_key(path: &Path) -> Vec<u8> {
    use std::os::unix::ffi::OsStrExt;
    path.as_os_str().as_bytes().to_vec()
}

#[cfg(not(unix))]
pub(crate) fn path_key(path: &Path) -> Vec<u8> {
    path.as_os_str().as_encoded_bytes().to_vec()
}

#[cfg(unix)]
fn path_from_key(key: Vec<u8>) -> PathBuf {
    use std::os::unix::ffi::OsStringExt;
    PathBuf::from(std::ffi::OsString::from_vec(key))
}

// Keys are compared as bytes; only the displayed path of an ill-formed
// name is approximated here.
#[cfg(not(unix))]
fn path_from_key(key: Vec<u8>) -> PathBuf {
    PathBuf::from(String::from_utf8_lossy(&key).into_owned())
}

/// Insert `record`, or refresh size, modification time and digest of the
/// row already stored under its path. The row id is preserved.
pub(crate) fn upsert_record(conn: &Connection, record: &FileRecord) -> Result<(), CatalogError> {
    conn.execute(
        "INSERT INTO file_metadata (path, size, modified_time, hash)
         VALUES (?1, ?2, ?3, ?4)
         ON CONFLICT (path) DO UPDATE SET
             size = excluded.size,
             modified_time = excluded.modified_time,
             hash = excluded.hash",
        params![
            path_key(&record.path),
            size_to_sql(record.size),
            record.modified,
            record.digest.as_slice()
        ],
    )?;
    Ok(())
}

/// Insert `record` as a new row. Fails if its path is already stored.
pub(crate) fn insert_record(conn: &Connection, record: &FileRecord) -> Result<(), CatalogError> {
    conn.execute(
        "INSERT INTO file_metadata (path, size, modified_time, hash) VALUES (?1, ?2, ?3, ?4)",
        params![
            path_key(&record.path),
            size_to_sql(record.size),
            record.modified,
            record.digest.as_slice()
        ],
    )?;
    Ok(())
}

/// Delete the row stored under `path`; links cascade. Returns whether a row
/// was removed.
pub(crate) fn delete_record(conn: &Connection, path: &Path) -> Result<bool, CatalogError> {
    let deleted = conn.execute(
        "DELETE FROM file_metadata WHERE path = ?1",
        params![path_key(path)],
    )?;
    Ok(deleted > 0)
}

/// Row id stored under `path`, if any.
pub(crate) fn record_id(conn: &Connection, path: &Path) -> Result<Option<i64>, CatalogError> {
    Ok(conn
        .query_row(
            "SELECT id FROM file_metadata WHERE path = ?1",
            params![path_key(path)],
            |row| row.get(0),
        )
        .optional()?)
}

fn size_to_sql(size: u64) -> i64 {
    i64::try_from(size).unwrap_or(i64::MAX)
}

/// A `file_metadata` row as SQLite returns it.
pub(crate) struct RawRecord {
    id: i64,
    path: Vec<u8>,
    size: i64,
    modified: i64,
    hash: Vec<u8>,
}

impl RawRecord {
    /// Read the [`RECORD_COLUMNS`] starting at column `offset`.
    pub(crate) fn from_row_at(row: &Row<'_>, offset: usize) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(offset)?,
            path: row.get(offset + 1)?,
            size: row.get(offset + 2)?,
            modified: row.get(offset + 3)?,
            hash: row.get(offset + 4)?,
        })
    }

    pub(crate) fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Self::from_row_at(row, 0)
    }

    pub(crate) fn decode(self) -> Result<FileRecord, CatalogError> {
        let path = path_from_key(self.path);
        let digest = Digest::try_from(self.hash.as_slice()).map_err(|_| {
            CatalogError::InvalidDigest {
                path: path.clone(),
                len: self.hash.len(),
            }
        })?;
        Ok(FileRecord {
            id: Some(self.id),
            path,
            size: u64::try_from(self.size).unwrap_or(0),
            modified: self.modified,
            digest,
        })
    }
}
