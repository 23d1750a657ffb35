//! Digest computation and catalog reconciliation (stage 2).
//!
//! # Overview
//!
//! Every path that survived size grouping is checked against the catalog:
//!
//! - **created**: no record yet; the file is hashed and a record queued.
//! - **existing**: the stored size and modification time match the disk;
//!   the stored digest is trusted without reading the file.
//! - **updated**: a record exists but is stale; the file is re-hashed, the
//!   record refreshed and every link mentioning it dropped. Updated files
//!   also count as existing.
//! - **error**: any I/O or catalog failure; the path is dropped.
//!
//! After a run `total == existing + created + errors` holds.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use rayon::prelude::*;

use crate::catalog::{BatchWriter, Catalog, CatalogError, FileRecord, LinkStore};
use crate::progress::{phase, ProgressCallback};
use crate::scanner::{HashError, Hasher, Signature};

/// How a path relates to what the catalog already knew.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Reconciliation {
    /// First time the path is seen
    Created,
    /// Stored record is still valid
    Existing,
    /// Stored record was stale and has been refreshed
    Updated,
}

/// Why a path could not be reconciled.
#[derive(thiserror::Error, Debug)]
pub enum ReconcileError {
    /// The file could not be read or hashed.
    #[error(transparent)]
    Hash(#[from] HashError),

    /// The catalog lookup or write failed.
    #[error(transparent)]
    Catalog(#[from] CatalogError),
}

/// Snapshot of the reconciliation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    /// Paths processed
    pub total: usize,
    /// Paths with a usable record (includes updated)
    pub existing: usize,
    /// Paths seen for the first time
    pub created: usize,
    /// Paths whose record was stale
    pub updated: usize,
    /// Paths dropped because of an error
    pub errors: usize,
}

/// Reconciles candidate paths with the catalog.
///
/// Counters accumulate over every call, so one reconciler covers one run.
pub struct Reconciler {
    catalog: Arc<Catalog>,
    writer: Arc<BatchWriter>,
    links: LinkStore,
    hasher: Hasher,
    total: AtomicUsize,
    existing: AtomicUsize,
    created: AtomicUsize,
    updated: AtomicUsize,
    errors: AtomicUsize,
}

impl Reconciler {
    /// Create a reconciler writing through `writer`.
    #[must_use]
    pub fn new(catalog: Arc<Catalog>, writer: Arc<BatchWriter>) -> Self {
        let links = LinkStore::new(Arc::clone(&catalog));
        Self {
            catalog,
            writer,
            links,
            hasher: Hasher::new(),
            total: AtomicUsize::new(0),
            existing: AtomicUsize::new(0),
            created: AtomicUsize::new(0),
            updated: AtomicUsize::new(0),
            errors: AtomicUsize::new(0),
        }
    }

    /// Determine the current record for `path`, hashing only when needed.
    ///
    /// Does not touch the counters.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or the catalog fails.
    pub fn classify(&self, path: &Path) -> Result<(FileRecord, Reconciliation), ReconcileError> {
        let on_disk = Signature::read(path)?;

        match self.catalog.record_for_path(path)? {
            None => {
                let record = FileRecord::from_file(path, &self.hasher)?;
                self.writer.add(record.clone())?;
                Ok((record, Reconciliation::Created))
            }
            Some(stored) if stored.matches(&on_disk) => Ok((stored, Reconciliation::Existing)),
            Some(stored) => {
                log::debug!("Stale record for {}, re-hashing", path.display());
                let mut record = FileRecord::from_file(path, &self.hasher)?;
                record.id = stored.id;
                self.writer.add(record.clone())?;
                let dropped = self.links.delete_links_with(&stored)?;
                if dropped > 0 {
                    log::debug!("Dropped {} link(s) of {}", dropped, path.display());
                }
                Ok((record, Reconciliation::Updated))
            }
        }
    }

    /// Classify `path` and count the outcome.
    ///
    /// Returns `None` on error after logging it.
    pub fn reconcile(&self, path: &Path) -> Option<FileRecord> {
        self.total.fetch_add(1, Ordering::Relaxed);
        match self.classify(path) {
            Ok((record, outcome)) => {
                match outcome {
                    Reconciliation::Created => {
                        self.created.fetch_add(1, Ordering::Relaxed);
                    }
                    Reconciliation::Existing => {
                        self.existing.fetch_add(1, Ordering::Relaxed);
                    }
                    Reconciliation::Updated => {
                        self.existing.fetch_add(1, Ordering::Relaxed);
                        self.updated.fetch_add(1, Ordering::Relaxed);
                    }
                }
                Some(record)
            }
            Err(e) => {
                log::warn!("Failed to process {}: {}", path.display(), e);
                self.errors.fetch_add(1, Ordering::Relaxed);
                None
            }
        }
    }

    /// Reconcile every path in parallel on the current rayon pool.
    #[must_use]
    pub fn reconcile_all(
        &self,
        paths: Vec<PathBuf>,
        progress: Option<&dyn ProgressCallback>,
    ) -> Vec<FileRecord> {
        if let Some(cb) = progress {
            cb.on_phase_start(phase::DIGESTING, paths.len());
        }
        let done = AtomicUsize::new(0);

        let records: Vec<FileRecord> = paths
            .into_par_iter()
            .filter_map(|path| {
                let record = self.reconcile(&path);
                if let Some(cb) = progress {
                    let current = done.fetch_add(1, Ordering::Relaxed) + 1;
                    cb.on_progress(current, &path.to_string_lossy());
                }
                record
            })
            .collect();

        if let Some(cb) = progress {
            cb.on_phase_end(phase::DIGESTING);
        }
        records
    }

    /// Current counter values.
    #[must_use]
    pub fn stats(&self) -> ReconcileStats {
        ReconcileStats {
            total: self.total.load(Ordering::Relaxed),
            existing: self.existing.load(Ordering::Relaxed),
            created: self.created.load(Ordering::Relaxed),
            updated: self.updated.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}
