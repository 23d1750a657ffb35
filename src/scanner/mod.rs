//! Scanner module for file discovery, metadata probing and content digests.
//!
//! This module provides functionality for:
//! - Parallel directory walking using jwalk with regex exclusions
//! - Content digests with BLAKE3
//! - Volume and storage identity checks used by the linker
//!
//! # Architecture
//!
//! The scanner is divided into submodules:
//! - [`walker`]: Directory traversal and candidate discovery
//! - [`hasher`]: BLAKE3 file digests (streaming)
//! - [`hardlink`]: Device/inode identity helpers
//!
//! # Example
//!
//! ```no_run
//! use dedupe::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let config = WalkerConfig::with_ignore_patterns(&[r".*\.tmp".to_string()]).unwrap();
//! let walker = Walker::new(Path::new("."), config).unwrap();
//! for entry in walker.walk() {
//!     match entry {
//!         Ok(path) => println!("{}", path.display()),
//!         Err(e) => eprintln!("Warning: {}", e),
//!     }
//! }
//! ```

pub mod hardlink;
pub mod hasher;
pub mod walker;

use std::fs::Metadata;
use std::path::{Path, PathBuf};
use std::time::UNIX_EPOCH;

use regex::Regex;

// Re-export main types
pub use hasher::{digest_to_hex, hex_to_digest, Digest, Hasher};
pub use walker::Walker;

/// The cheap staleness check stored next to every digest.
///
/// Two signatures are equal when both the byte length and the modification
/// time (milliseconds since the Unix epoch) match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature {
    /// File size in bytes
    pub size: u64,
    /// Last modification time in milliseconds since the Unix epoch
    pub modified: i64,
}

impl Signature {
    /// Build a signature from already fetched metadata.
    #[must_use]
    pub fn from_metadata(metadata: &Metadata) -> Self {
        Self {
            size: metadata.len(),
            modified: modified_millis(metadata),
        }
    }

    /// Read the signature of the file at `path`.
    ///
    /// # Errors
    ///
    /// Returns a [`HashError`] if the metadata cannot be read.
    pub fn read(path: &Path) -> Result<Self, HashError> {
        std::fs::metadata(path)
            .map(|m| Self::from_metadata(&m))
            .map_err(|e| HashError::from_io(path, e))
    }
}

/// Modification time of `metadata` in milliseconds since the Unix epoch.
///
/// Times before the epoch are negative. Platforms that cannot report a
/// modification time yield `0`.
#[must_use]
pub fn modified_millis(metadata: &Metadata) -> i64 {
    let Ok(modified) = metadata.modified() else {
        return 0;
    };
    match modified.duration_since(UNIX_EPOCH) {
        Ok(after) => i64::try_from(after.as_millis()).unwrap_or(i64::MAX),
        Err(before) => -i64::try_from(before.duration().as_millis()).unwrap_or(i64::MAX),
    }
}

/// Configuration for directory walking.
///
/// Exclusions are regular expressions matched against the whole path string.
#[derive(Debug, Clone, Default)]
pub struct WalkerConfig {
    /// Compiled exclusion patterns, anchored at both ends.
    pub ignore_patterns: Vec<Regex>,
}

impl WalkerConfig {
    /// Compile exclusion patterns.
    ///
    /// Each pattern must match the entire path for the path to be excluded,
    /// so `.*\.tmp` excludes every `.tmp` file while `\.tmp` excludes nothing.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::InvalidPattern`] for the first pattern that fails
    /// to compile.
    pub fn with_ignore_patterns(patterns: &[String]) -> Result<Self, ScanError> {
        let ignore_patterns = patterns
            .iter()
            .map(|pattern| {
                Regex::new(&format!("^(?:{pattern})$")).map_err(|source| {
                    ScanError::InvalidPattern {
                        pattern: pattern.clone(),
                        source,
                    }
                })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { ignore_patterns })
    }

    /// Check whether `path` matches any exclusion pattern.
    #[must_use]
    pub fn is_ignored(&self, path: &Path) -> bool {
        if self.ignore_patterns.is_empty() {
            return false;
        }
        let path_str = path.to_string_lossy();
        self.ignore_patterns.iter().any(|re| re.is_match(&path_str))
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

    /// The specified path is not a directory.
    #[error("Not a directory: {0}")]
    NotADirectory(PathBuf),

    /// An exclusion pattern is not a valid regular expression.
    #[error("Invalid ignore pattern '{pattern}': {source}")]
    InvalidPattern {
        /// The pattern as given by the user
        pattern: String,
        /// The regex compilation error
        #[source]
        source: regex::Error,
    },

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

/// Errors that can occur while probing metadata or hashing a file.
#[derive(thiserror::Error, Debug)]
pub enum HashError {
    /// The specified file was not found.
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

impl HashError {
    /// Classify an I/O error raised for `path`.
    #[must_use]
    pub fn from_io(path: &Path, error: std::io::Error) -> Self {
        match error.kind() {
            std::io::ErrorKind::NotFound => Self::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => Self::PermissionDenied(path.to_path_buf()),
            _ => Self::Io {
                path: path.to_path_buf(),
                source: error,
            },
        }
    }
}
