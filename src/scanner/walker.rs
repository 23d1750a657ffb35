//! Directory walker implementation using jwalk for parallel traversal.
//!
//! # Overview
//!
//! This module provides the [`Walker`] struct which supplies candidate file
//! paths to the duplicate detection pipeline. It yields only regular files,
//! never follows symbolic links, and drops every path matched by one of the
//! configured exclusion regexes.
//!
//! # Example
//!
//! ```no_run
//! use dedupe::scanner::{Walker, WalkerConfig};
//! use std::path::Path;
//!
//! let walker = Walker::new(Path::new("/srv/backups"), WalkerConfig::default()).unwrap();
//! let files: Vec<_> = walker.walk().filter_map(Result::ok).collect();
//! println!("Found {} files", files.len());
//! ```

use std::path::{Path, PathBuf};

use jwalk::WalkDir;

use super::{ScanError, WalkerConfig};

/// Directory walker for parallel file discovery.
#[derive(Debug)]
pub struct Walker {
    /// Canonical root path to walk
    root: PathBuf,
    /// Walker configuration
    config: WalkerConfig,
}

impl Walker {
    /// Create a new walker for the given directory.
    ///
    /// The root is canonicalized so the yielded paths are absolute and
    /// stable across runs started from different working directories.
    ///
    /// # Errors
    ///
    /// Returns [`ScanError::NotFound`], [`ScanError::PermissionDenied`] or
    /// [`ScanError::NotADirectory`] if the root is unusable.
    pub fn new(path: &Path, config: WalkerConfig) -> Result<Self, ScanError> {
        let root = std::fs::canonicalize(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ScanError::NotFound(path.to_path_buf()),
            std::io::ErrorKind::PermissionDenied => {
                ScanError::PermissionDenied(path.to_path_buf())
            }
            _ => ScanError::Io {
                path: path.to_path_buf(),
                source: e,
            },
        })?;

        if !root.is_dir() {
            return Err(ScanError::NotADirectory(path.to_path_buf()));
        }

        Ok(Self { root, config })
    }

    /// The canonical root this walker traverses.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the directory tree, yielding candidate file paths.
    ///
    /// Errors are yielded as [`ScanError`] values rather than stopping
    /// iteration. Output is sorted per directory for determinism.
    pub fn walk(&self) -> impl Iterator<Item = Result<PathBuf, ScanError>> + '_ {
        let walk_dir = WalkDir::new(&self.root)
            .follow_links(false)
            .skip_hidden(false)
            .sort(true);

        walk_dir
            .into_iter()
            .filter_map(move |entry_result| match entry_result {
                Ok(entry) => {
                    let path = entry.path();

                    if !entry.file_type().is_file() {
                        if entry.file_type().is_symlink() {
                            log::trace!("Skipping symlink: {}", path.display());
                        }
                        return None;
                    }

                    if self.config.is_ignored(&path) {
                        log::trace!("Ignoring file: {}", path.display());
                        return None;
                    }

                    Some(Ok(path))
                }
                Err(e) => {
                    let path = e
                        .path()
                        .map_or_else(|| self.root.clone(), std::borrow::ToOwned::to_owned);
                    Some(Err(self.handle_jwalk_error(path, e)))
                }
            })
    }

    /// Convert jwalk errors, keeping the I/O kind where available.
    fn handle_jwalk_error(&self, path: PathBuf, error: jwalk::Error) -> ScanError {
        log::warn!("Walker error for {}: {}", path.display(), error);
        match error.io_error().map(std::io::Error::kind) {
            Some(std::io::ErrorKind::PermissionDenied) => ScanError::PermissionDenied(path),
            Some(std::io::ErrorKind::NotFound) => ScanError::NotFound(path),
            _ => ScanError::Io {
                path,
                source: std::io::Error::other(error.to_string()),
            },
        }
    }
}

/// Walk every root and collect candidate paths.
///
/// Roots that cannot be opened and entries that fail mid-walk are logged
/// and counted; they never abort the collection. Returns the candidates and
/// the number of errors encountered.
#[must_use]
pub fn collect_candidates(roots: &[PathBuf], config: &WalkerConfig) -> (Vec<PathBuf>, usize) {
    let mut candidates = Vec::new();
    let mut errors = 0;

    for root in roots {
        let walker = match Walker::new(root, config.clone()) {
            Ok(w) => w,
            Err(e) => {
                log::error!("Failed to find files: {}", e);
                errors += 1;
                continue;
            }
        };

        for entry in walker.walk() {
            match entry {
                Ok(path) => candidates.push(path),
                Err(e) => {
                    log::debug!("Skipping unreadable entry: {}", e);
                    errors += 1;
                }
            }
        }
    }

    // Overlapping roots would otherwise yield the same file twice.
    candidates.sort();
    candidates.dedup();

    (candidates, errors)
}
