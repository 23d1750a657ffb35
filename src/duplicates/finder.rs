//! Pipeline orchestrator.
//!
//! # Overview
//!
//! The [`Deduplicator`] runs the detection stages and links the result:
//! 1. **Size grouping**: drop every path with a unique size
//! 2. **Digest + reconciliation**: reuse catalog digests, hash the rest
//! 3. **Digest grouping**: drop every file with a unique digest
//! 4. **Verification** (paranoid mode only): split groups by actual bytes
//! 5. **Linking**: skip known links, hard link the rest, record successes
//!
//! All parallel work runs on one rayon pool sized by `io_threads`.
//!
//! # Example
//!
//! ```no_run
//! use dedupe::catalog::Catalog;
//! use dedupe::duplicates::{DedupeConfig, Deduplicator};
//! use std::path::PathBuf;
//! use std::sync::Arc;
//!
//! let catalog = Arc::new(Catalog::open("dedupe.db".as_ref()).unwrap());
//! let config = DedupeConfig::default().with_io_threads(4).with_dry_run(true);
//! let dedupe = Deduplicator::new(config, catalog).unwrap();
//!
//! let (reports, summary) = dedupe.run(vec![PathBuf::from("/srv/a"), PathBuf::from("/srv/b")]);
//! println!("{} groups, {} targets linked", summary.groups, summary.linked);
//! ```

use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytesize::ByteSize;
use rayon::prelude::*;
use serde::Serialize;

use super::compare::verify_groups;
use super::groups::{group_by_digest, group_by_size, DuplicateGroup};
use super::reconcile::Reconciler;
use crate::actions::{GroupReport, LinkedFilter, Linker, TargetOutcome};
use crate::catalog::{BatchWriter, Catalog, FileRecord, LinkStore, DEFAULT_FLUSH_INTERVAL};
use crate::progress::{phase, ProgressCallback};
use crate::scanner::Signature;

/// Default number of I/O worker threads.
pub const DEFAULT_IO_THREADS: usize = 4;

/// Configuration for the deduplicator.
#[derive(Clone)]
pub struct DedupeConfig {
    /// Number of I/O threads for parallel hashing and linking.
    /// Default is 4 to prevent disk thrashing.
    pub io_threads: usize,
    /// Enable byte-by-byte verification after digest matching.
    pub paranoid: bool,
    /// Only log what would be linked.
    pub dry_run: bool,
    /// Time between opportunistic catalog flushes.
    pub flush_interval: Duration,
    /// Optional progress callback for reporting.
    pub progress_callback: Option<Arc<dyn ProgressCallback>>,
}

impl std::fmt::Debug for DedupeConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DedupeConfig")
            .field("io_threads", &self.io_threads)
            .field("paranoid", &self.paranoid)
            .field("dry_run", &self.dry_run)
            .field("flush_interval", &self.flush_interval)
            .field(
                "progress_callback",
                &self.progress_callback.as_ref().map(|_| "<callback>"),
            )
            .finish()
    }
}

impl Default for DedupeConfig {
    fn default() -> Self {
        Self {
            io_threads: DEFAULT_IO_THREADS,
            paranoid: false,
            dry_run: false,
            flush_interval: DEFAULT_FLUSH_INTERVAL,
            progress_callback: None,
        }
    }
}

impl DedupeConfig {
    /// Set the I/O thread count (minimum 1).
    #[must_use]
    pub fn with_io_threads(mut self, threads: usize) -> Self {
        self.io_threads = threads.max(1);
        self
    }

    /// Enable paranoid mode (byte-by-byte verification).
    #[must_use]
    pub fn with_paranoid(mut self, enabled: bool) -> Self {
        self.paranoid = enabled;
        self
    }

    /// Enable dry-run mode.
    #[must_use]
    pub fn with_dry_run(mut self, enabled: bool) -> Self {
        self.dry_run = enabled;
        self
    }

    /// Set the catalog flush interval.
    #[must_use]
    pub fn with_flush_interval(mut self, interval: Duration) -> Self {
        self.flush_interval = interval;
        self
    }

    /// Set the progress callback.
    #[must_use]
    pub fn with_progress_callback(mut self, callback: Arc<dyn ProgressCallback>) -> Self {
        self.progress_callback = Some(callback);
        self
    }
}

/// Counters describing one run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    /// Paths that entered the digest stage
    pub total: usize,
    /// Paths with a usable catalog record (includes updated)
    pub existing: usize,
    /// Paths recorded for the first time
    pub created: usize,
    /// Paths whose record was stale and refreshed
    pub updated: usize,
    /// Paths dropped during the digest stage
    pub errors: usize,
    /// Walk and size-lookup failures before the digest stage
    pub scan_errors: usize,
    /// Paths sharing their size with another path
    pub size_candidates: usize,
    /// Paths sharing their digest with another path
    pub hash_candidates: usize,
    /// Equivalence classes produced by detection
    pub groups: usize,
    /// Targets linked (in a dry run: that would be linked)
    pub linked: usize,
    /// Classes with nothing to do: singletons and fully linked groups
    pub skipped: usize,
    /// Targets that already shared the source's storage
    pub already_linked: usize,
    /// Targets that could not be linked
    pub failed: usize,
    /// Targets skipped because they live on another volume
    pub cross_device: usize,
    /// Catalog records that could not be written
    pub write_failures: usize,
    /// Bytes freed by linked targets (in a dry run: freeable)
    pub reclaimed_bytes: u64,
    /// Wall-clock time of the run
    #[serde(serialize_with = "serialize_duration")]
    pub duration: Duration,
}

fn serialize_duration<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_f64(d.as_secs_f64())
}

impl RunSummary {
    /// Whether any path, target or catalog write failed.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.errors > 0 || self.scan_errors > 0 || self.failed > 0 || self.write_failures > 0
    }

    /// Format reclaimed space as a human-readable string.
    #[must_use]
    pub fn reclaimed_display(&self) -> String {
        ByteSize::b(self.reclaimed_bytes).to_string()
    }
}

/// Errors that prevent a deduplicator from being built.
#[derive(thiserror::Error, Debug)]
pub enum FinderError {
    /// The worker pool could not be created.
    #[error("Failed to build worker pool: {0}")]
    ThreadPool(#[from] rayon::ThreadPoolBuildError),
}

enum GroupOutcome {
    Skipped,
    Processed { report: GroupReport, reclaimed: u64 },
}

/// Runs detection and linking against one catalog.
///
/// [`run`](Self::run) shuts the catalog writer down at the end; create a new
/// deduplicator for every run.
pub struct Deduplicator {
    config: DedupeConfig,
    catalog: Arc<Catalog>,
    writer: Arc<BatchWriter>,
    links: LinkStore,
    filter: LinkedFilter,
    linker: Linker,
    pool: rayon::ThreadPool,
}

impl Deduplicator {
    /// Create a deduplicator over `catalog`.
    ///
    /// # Errors
    ///
    /// Returns [`FinderError::ThreadPool`] if the worker pool cannot start.
    pub fn new(config: DedupeConfig, catalog: Arc<Catalog>) -> Result<Self, FinderError> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(config.io_threads.max(1))
            .thread_name(|i| format!("dedupe-io-{i}"))
            .build()?;
        let writer = Arc::new(BatchWriter::with_interval(
            Arc::clone(&catalog),
            config.flush_interval,
        ));
        let links = LinkStore::new(Arc::clone(&catalog));

        Ok(Self {
            filter: LinkedFilter::new(links.clone()),
            linker: Linker::from_dry_run(config.dry_run),
            config,
            catalog,
            writer,
            links,
            pool,
        })
    }

    /// The catalog writer used by this run.
    #[must_use]
    pub fn writer(&self) -> &Arc<BatchWriter> {
        &self.writer
    }

    fn progress(&self) -> Option<&dyn ProgressCallback> {
        self.config.progress_callback.as_deref()
    }

    /// Run detection stages 1 to 4 over candidate `paths`.
    ///
    /// Queued catalog records are flushed once digesting is done so the
    /// linking step can reference them.
    #[must_use]
    pub fn find_duplicates(&self, paths: Vec<PathBuf>) -> (Vec<DuplicateGroup>, RunSummary) {
        let start = Instant::now();
        let mut summary = RunSummary::default();
        let progress = self.progress();

        log::info!("Examining {} candidate files", paths.len());

        let groups = self.pool.install(|| {
            let (size_groups, size_stats) = group_by_size(paths, progress);
            summary.scan_errors += size_stats.errors;
            summary.size_candidates = size_stats.potential_duplicates;

            let candidates: Vec<PathBuf> = size_groups.into_values().flatten().collect();
            let reconciler = Reconciler::new(Arc::clone(&self.catalog), Arc::clone(&self.writer));
            let records = reconciler.reconcile_all(candidates, progress);

            let stats = reconciler.stats();
            summary.total = stats.total;
            summary.existing = stats.existing;
            summary.created = stats.created;
            summary.updated = stats.updated;
            summary.errors = stats.errors;
            log::info!(
                "Digest stage: {} existing ({} updated), {} created, {} errors",
                stats.existing,
                stats.updated,
                stats.created,
                stats.errors
            );

            if let Some(flushed) = self.writer.flush() {
                summary.write_failures += flushed.failed;
            }

            let groups = group_by_digest(records);
            summary.hash_candidates = groups.iter().map(DuplicateGroup::len).sum();

            if self.config.paranoid {
                verify_groups(groups, progress)
            } else {
                groups
            }
        });

        summary.groups = groups.len();
        summary.duration = start.elapsed();
        log::info!(
            "Detection complete: {} groups from {} candidates in {:.2?}",
            summary.groups,
            summary.hash_candidates,
            summary.duration
        );

        (groups, summary)
    }

    /// Link every group and record the successes.
    ///
    /// Groups are processed in parallel. Counters are added to `summary`.
    pub fn link_groups(
        &self,
        groups: &[DuplicateGroup],
        summary: &mut RunSummary,
    ) -> Vec<GroupReport> {
        let progress = self.progress();
        if let Some(cb) = progress {
            cb.on_phase_start(phase::LINKING, groups.len());
        }
        let done = AtomicUsize::new(0);

        let outcomes: Vec<GroupOutcome> = self.pool.install(|| {
            groups
                .par_iter()
                .map(|group| {
                    let outcome = self.link_group(group);
                    if let Some(cb) = progress {
                        let current = done.fetch_add(1, Ordering::Relaxed) + 1;
                        let label = group
                            .files
                            .first()
                            .map(|f| f.path.to_string_lossy().into_owned())
                            .unwrap_or_default();
                        cb.on_progress(current, &label);
                    }
                    outcome
                })
                .collect()
        });

        if let Some(cb) = progress {
            cb.on_phase_end(phase::LINKING);
        }

        let mut reports = Vec::new();
        for outcome in outcomes {
            match outcome {
                GroupOutcome::Skipped => summary.skipped += 1,
                GroupOutcome::Processed { report, reclaimed } => {
                    summary.linked +=
                        report.count(TargetOutcome::Linked) + report.count(TargetOutcome::WouldLink);
                    summary.already_linked += report.count(TargetOutcome::AlreadyLinked);
                    summary.failed += report.count(TargetOutcome::Failed);
                    summary.cross_device += report.count(TargetOutcome::CrossDevice);
                    summary.reclaimed_bytes += reclaimed;
                    reports.push(report);
                }
            }
        }
        reports
    }

    fn link_group(&self, group: &DuplicateGroup) -> GroupOutcome {
        if group.len() < 2 {
            return GroupOutcome::Skipped;
        }

        let source = group.source();
        let pending = self.filter.filter_linked(source, &group.files);
        if pending.is_empty() {
            log::debug!("All copies of {} already linked", source.path.display());
            return GroupOutcome::Skipped;
        }

        let target_paths: Vec<PathBuf> = pending.iter().map(|r| r.path.clone()).collect();
        let report = self.linker.link(&source.path, &target_paths);

        let reclaimed = report
            .targets
            .iter()
            .zip(&pending)
            .filter(|(t, _)| matches!(t.outcome, TargetOutcome::Linked | TargetOutcome::WouldLink))
            .map(|(_, r)| r.size)
            .sum();

        if report.success && self.linker.persists() {
            self.persist(source, &pending);
        }

        GroupOutcome::Processed { report, reclaimed }
    }

    /// Record links and refreshed target metadata for a successful group.
    fn persist(&self, source: &FileRecord, targets: &[FileRecord]) {
        for target in targets {
            if let Err(e) = self.links.link_files(source, target) {
                log::warn!(
                    "Failed to record link {} -> {}: {}",
                    target.path.display(),
                    source.path.display(),
                    e
                );
                continue;
            }

            let refreshed = match Signature::read(&target.path) {
                Ok(sig) => FileRecord::new(&target.path, sig.size, sig.modified, source.digest),
                Err(e) => {
                    log::warn!("Failed to refresh {}: {}", target.path.display(), e);
                    continue;
                }
            };
            if let Err(e) = self.writer.add(refreshed) {
                log::warn!("Failed to queue {}: {}", target.path.display(), e);
            }
        }
    }

    /// Detect, link and close the catalog writer.
    #[must_use]
    pub fn run(&self, paths: Vec<PathBuf>) -> (Vec<GroupReport>, RunSummary) {
        let start = Instant::now();
        let (groups, mut summary) = self.find_duplicates(paths);
        let reports = self.link_groups(&groups, &mut summary);

        let flushed = self.writer.shutdown();
        summary.write_failures += flushed.failed;
        summary.duration = start.elapsed();

        log::info!(
            "Run complete: {} linked, {} already linked, {} failed, {} reclaimed",
            summary.linked,
            summary.already_linked,
            summary.failed,
            summary.reclaimed_display()
        );
        (reports, summary)
    }
}
