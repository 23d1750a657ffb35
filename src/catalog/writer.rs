//! Batched catalog writer.
//!
//! # Overview
//!
//! Digest workers run in parallel but the catalog has one connection.
//! Instead of a transaction per file, workers queue records on the
//! [`BatchWriter`] and the writer persists everything queued in a single
//! transaction whenever the flush interval has elapsed, when the caller
//! asks for it, and once more at shutdown.
//!
//! # Failure handling
//!
//! A record that fails to write is logged and counted; the rest of the batch
//! still commits. If the transaction itself cannot be opened or committed the
//! whole batch is counted as failed. Nothing is retried.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, TryLockError};
use std::time::{Duration, Instant};

use super::database::{delete_record, insert_record, upsert_record};
use super::{Catalog, CatalogError, FileRecord};

/// Default time between opportunistic flushes.
pub const DEFAULT_FLUSH_INTERVAL: Duration = Duration::from_secs(60);

/// Outcome of one flush.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlushStats {
    /// Records upserted
    pub written: usize,
    /// Delete-then-create pairs applied
    pub replaced: usize,
    /// Records or pairs that could not be written
    pub failed: usize,
}

impl FlushStats {
    fn absorb(&mut self, other: Self) {
        self.written += other.written;
        self.replaced += other.replaced;
        self.failed += other.failed;
    }
}

/// Queues catalog mutations and persists them in batches.
///
/// Safe to share between threads; every method takes `&self`.
#[derive(Debug)]
pub struct BatchWriter {
    catalog: Arc<Catalog>,
    pending: Mutex<Vec<FileRecord>>,
    replacements: Mutex<Vec<(FileRecord, FileRecord)>>,
    interval: Duration,
    last_flush: Mutex<Instant>,
    flush_gate: Mutex<()>,
    closed: AtomicBool,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

impl BatchWriter {
    /// Create a writer with the default flush interval.
    #[must_use]
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self::with_interval(catalog, DEFAULT_FLUSH_INTERVAL)
    }

    /// Create a writer that flushes opportunistically every `interval`.
    #[must_use]
    pub fn with_interval(catalog: Arc<Catalog>, interval: Duration) -> Self {
        Self {
            catalog,
            pending: Mutex::new(Vec::new()),
            replacements: Mutex::new(Vec::new()),
            interval,
            last_flush: Mutex::new(Instant::now()),
            flush_gate: Mutex::new(()),
            closed: AtomicBool::new(false),
        }
    }

    /// Queue an upsert of `record`.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::WriterClosed`] after [`shutdown`](Self::shutdown).
    pub fn add(&self, record: FileRecord) -> Result<(), CatalogError> {
        {
            let mut pending = lock(&self.pending);
            if self.closed.load(Ordering::Acquire) {
                return Err(CatalogError::WriterClosed);
            }
            pending.push(record);
        }
        self.flush_check();
        Ok(())
    }

    /// Queue the replacement of `old` by `new`.
    ///
    /// Both halves are applied atomically: either `old` is gone and `new`
    /// stored, or nothing changed.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::WriterClosed`] after [`shutdown`](Self::shutdown).
    pub fn replace(&self, old: FileRecord, new: FileRecord) -> Result<(), CatalogError> {
        {
            let mut replacements = lock(&self.replacements);
            if self.closed.load(Ordering::Acquire) {
                return Err(CatalogError::WriterClosed);
            }
            replacements.push((old, new));
        }
        self.flush_check();
        Ok(())
    }

    /// Number of queued upserts plus replacements.
    #[must_use]
    pub fn pending(&self) -> usize {
        lock(&self.pending).len() + lock(&self.replacements).len()
    }

    /// Whether [`shutdown`](Self::shutdown) has been called.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Flush if the interval has elapsed since the last flush.
    pub fn flush_check(&self) {
        let due = lock(&self.last_flush).elapsed() >= self.interval;
        if due {
            self.flush();
        }
    }

    /// Persist everything queued.
    ///
    /// Returns `None` without doing anything if another flush is running.
    pub fn flush(&self) -> Option<FlushStats> {
        let _gate = match self.flush_gate.try_lock() {
            Ok(guard) => guard,
            Err(TryLockError::Poisoned(poisoned)) => poisoned.into_inner(),
            Err(TryLockError::WouldBlock) => {
                log::trace!("Flush already in progress, skipping");
                return None;
            }
        };
        Some(self.write_queued())
    }

    /// Close the writer and persist everything still queued.
    ///
    /// Waits for a running flush to finish first. Later calls to
    /// [`add`](Self::add) and [`replace`](Self::replace) fail.
    pub fn shutdown(&self) -> FlushStats {
        {
            let _pending = lock(&self.pending);
            let _replacements = lock(&self.replacements);
            self.closed.store(true, Ordering::Release);
        }
        let _gate = lock(&self.flush_gate);
        self.write_queued()
    }

    /// Drain both queues and write them. Caller holds the flush gate.
    fn write_queued(&self) -> FlushStats {
        let records = std::mem::take(&mut *lock(&self.pending));
        let pairs = std::mem::take(&mut *lock(&self.replacements));

        let mut stats = FlushStats::default();
        if !records.is_empty() {
            stats.absorb(self.write_records(&records));
        }
        if !pairs.is_empty() {
            stats.absorb(self.write_replacements(&pairs));
        }
        *lock(&self.last_flush) = Instant::now();

        if stats != FlushStats::default() {
            log::debug!(
                "Catalog flush: {} written, {} replaced, {} failed",
                stats.written,
                stats.replaced,
                stats.failed
            );
        }
        stats
    }

    fn write_records(&self, records: &[FileRecord]) -> FlushStats {
        let result = self.catalog.with_transaction(|tx| {
            let mut stats = FlushStats::default();
            for record in records {
                match upsert_record(tx, record) {
                    Ok(()) => stats.written += 1,
                    Err(e) => {
                        log::warn!("Failed to store {}: {}", record.path.display(), e);
                        stats.failed += 1;
                    }
                }
            }
            Ok(stats)
        });

        result.unwrap_or_else(|e| {
            log::warn!("Catalog batch of {} records failed: {}", records.len(), e);
            FlushStats {
                failed: records.len(),
                ..FlushStats::default()
            }
        })
    }

    fn write_replacements(&self, pairs: &[(FileRecord, FileRecord)]) -> FlushStats {
        let result = self.catalog.with_transaction(|tx| {
            let mut stats = FlushStats::default();
            for (old, new) in pairs {
                let applied = tx.savepoint().map_err(CatalogError::from).and_then(|sp| {
                    delete_record(&sp, &old.path)?;
                    insert_record(&sp, new)?;
                    sp.commit()?;
                    Ok(())
                });
                match applied {
                    Ok(()) => stats.replaced += 1,
                    Err(e) => {
                        log::warn!(
                            "Failed to replace {} with {}: {}",
                            old.path.display(),
                            new.path.display(),
                            e
                        );
                        stats.failed += 1;
                    }
                }
            }
            Ok(stats)
        });

        result.unwrap_or_else(|e| {
            log::warn!("Catalog batch of {} replacements failed: {}", pairs.len(), e);
            FlushStats {
                failed: pairs.len(),
                ..FlushStats::default()
            }
        })
    }
}

impl Drop for BatchWriter {
    fn drop(&mut self) {
        let left = self.pending();
        if left > 0 && !self.is_closed() {
            log::warn!("Catalog writer dropped with {} unflushed records", left);
        }
    }
}
