//! Persistent catalog of file metadata and hard links.
//!
//! The catalog remembers, per path, the size, modification time and content
//! digest seen on the last run so unchanged files are never hashed twice. It
//! also remembers which files were replaced by hard links to which source.
//!
//! # Architecture
//!
//! * [`database`]: SQLite connection, schema bootstrap and record lookup.
//! * [`record`]: The [`FileRecord`] and [`LinkRecord`] data models.
//! * [`writer`]: Batched, fault-tolerant upserts ([`BatchWriter`]).
//! * [`links`]: Link bookkeeping ([`LinkStore`]).
//!
//! # Staleness
//!
//! A record is trusted when its stored size and modification time both match
//! the file on disk. Otherwise the file is re-hashed, the record updated in
//! place and every link mentioning it dropped.

pub mod database;
pub mod links;
pub mod record;
pub mod writer;

use std::path::PathBuf;

pub use database::{Catalog, DEFAULT_DATABASE_PATH};
pub use links::LinkStore;
pub use record::{FileRecord, LinkRecord};
pub use writer::{BatchWriter, FlushStats, DEFAULT_FLUSH_INTERVAL};

/// Errors raised by catalog operations.
#[derive(thiserror::Error, Debug)]
pub enum CatalogError {
    /// The underlying SQLite call failed.
    #[error("Catalog database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// The writer was shut down and no longer accepts records.
    #[error("Catalog writer is closed")]
    WriterClosed,

    /// A link endpoint has no persisted record.
    #[error("No catalog record for {0}")]
    UnknownRecord(PathBuf),

    /// A file cannot be linked to itself.
    #[error("Refusing to link {0} to itself")]
    SelfLink(PathBuf),

    /// A stored digest has the wrong length.
    #[error("Corrupt digest for {path}: expected 32 bytes, found {len}")]
    InvalidDigest {
        /// Path of the corrupt record
        path: PathBuf,
        /// Length of the stored blob
        len: usize,
    },

    /// The catalog file or its directory could not be prepared.
    #[error("Catalog I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },
}
