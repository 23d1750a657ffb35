//! Crash-safe replacement of duplicates by hard links.
//!
//! # Overview
//!
//! A target is never deleted before its replacement exists. The linker
//! creates a hard link to the source under a temporary name next to the
//! target and renames it over the target. `rename` is atomic within a
//! directory, so at any instant the target path resolves either to its own
//! bytes or to the source's bytes.
//!
//! # Safety
//!
//! - Source and target must share a volume; otherwise the target is skipped.
//! - A target that already shares the source's inode is left alone.
//! - If the rename fails the temporary link is removed again.
//!
//! # Example
//!
//! ```no_run
//! use dedupe::actions::Linker;
//! use std::path::{Path, PathBuf};
//!
//! let linker = Linker::from_dry_run(false);
//! let report = linker.link(Path::new("/data/a.bin"), &[PathBuf::from("/data/b.bin")]);
//! assert!(report.success);
//! ```

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use rayon::prelude::*;
use serde::Serialize;
use thiserror::Error;

use crate::scanner::hardlink::{same_storage, same_volume};

/// Error type for a single link operation.
#[derive(Debug, Error)]
pub enum LinkError {
    /// Source and target live on different volumes.
    #[error("cannot link across volumes: {origin} -> {target}")]
    CrossDevice {
        /// File the link would point at
        origin: PathBuf,
        /// File that would be replaced
        target: PathBuf,
    },

    /// An I/O step failed.
    #[error("I/O error for {path}: {source}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: io::Error,
    },
}

impl LinkError {
    /// Get the path associated with this error.
    #[must_use]
    pub fn path(&self) -> &Path {
        match self {
            Self::CrossDevice { target, .. } => target,
            Self::Io { path, .. } => path,
        }
    }
}

/// What happened to one target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TargetOutcome {
    /// Replaced by a hard link to the source
    Linked,
    /// Already shared the source's storage
    AlreadyLinked,
    /// Dry run; would have been linked
    WouldLink,
    /// Skipped, source is on another volume
    CrossDevice,
    /// A step failed; the target is unchanged
    Failed,
}

impl TargetOutcome {
    /// Whether this outcome leaves the target sharing the source's content.
    #[must_use]
    pub fn is_success(self) -> bool {
        matches!(self, Self::Linked | Self::AlreadyLinked | Self::WouldLink)
    }
}

/// Result for one target of a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TargetReport {
    /// Target path
    pub path: PathBuf,
    /// Outcome
    pub outcome: TargetOutcome,
    /// Error text for failed targets
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of linking one group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GroupReport {
    /// The file all targets point at
    pub source: PathBuf,
    /// Per-target results, in input order
    pub targets: Vec<TargetReport>,
    /// True only if every target succeeded
    pub success: bool,
}

impl GroupReport {
    fn from_targets(source: &Path, targets: Vec<TargetReport>) -> Self {
        let success = targets.iter().all(|t| t.outcome.is_success());
        Self {
            source: source.to_path_buf(),
            targets,
            success,
        }
    }

    /// Number of targets with the given outcome.
    #[must_use]
    pub fn count(&self, outcome: TargetOutcome) -> usize {
        self.targets.iter().filter(|t| t.outcome == outcome).count()
    }
}

/// Linking strategy, chosen once per run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Linker {
    /// Replace targets with hard links
    HardLink,
    /// Only log what would be linked
    LogOnly,
}

impl Linker {
    /// `LogOnly` for a dry run, `HardLink` otherwise.
    #[must_use]
    pub fn from_dry_run(dry_run: bool) -> Self {
        if dry_run {
            Self::LogOnly
        } else {
            Self::HardLink
        }
    }

    /// Whether successful groups should be recorded in the catalog.
    #[must_use]
    pub fn persists(self) -> bool {
        matches!(self, Self::HardLink)
    }

    /// Link every target to `source`.
    ///
    /// Targets are processed in parallel on the current rayon pool. A
    /// failure on one target never stops the others.
    #[must_use]
    pub fn link(self, source: &Path, targets: &[PathBuf]) -> GroupReport {
        match self {
            Self::LogOnly => {
                log::info!("Would link to {}:", source.display());
                let reports = targets
                    .iter()
                    .map(|target| {
                        log::info!("    -> {}", target.display());
                        TargetReport {
                            path: target.clone(),
                            outcome: TargetOutcome::WouldLink,
                            error: None,
                        }
                    })
                    .collect();
                GroupReport::from_targets(source, reports)
            }
            Self::HardLink => {
                let reports = targets
                    .par_iter()
                    .map(|target| link_target(source, target))
                    .collect();
                GroupReport::from_targets(source, reports)
            }
        }
    }
}

fn link_target(source: &Path, target: &Path) -> TargetReport {
    let (outcome, error) = match replace_with_link(source, target) {
        Ok(outcome) => {
            log::debug!("{} -> {}", target.display(), source.display());
            (outcome, None)
        }
        Err(e @ LinkError::CrossDevice { .. }) => {
            log::warn!("Skipping {}: {}", target.display(), e);
            (TargetOutcome::CrossDevice, Some(e.to_string()))
        }
        Err(e) => {
            log::warn!("Failed to link {}: {}", target.display(), e);
            (TargetOutcome::Failed, Some(e.to_string()))
        }
    };
    TargetReport {
        path: target.to_path_buf(),
        outcome,
        error,
    }
}

/// Replace `target` with a hard link to `source`.
///
/// Returns [`TargetOutcome::Linked`] or [`TargetOutcome::AlreadyLinked`].
///
/// # Errors
///
/// Returns [`LinkError::CrossDevice`] if the files are on different volumes
/// and [`LinkError::Io`] if any filesystem step fails. The target is
/// unchanged in both cases.
pub fn replace_with_link(source: &Path, target: &Path) -> Result<TargetOutcome, LinkError> {
    let io_err = |path: &Path| {
        let path = path.to_path_buf();
        move |source: io::Error| LinkError::Io { path, source }
    };
    let cross_device = || LinkError::CrossDevice {
        origin: source.to_path_buf(),
        target: target.to_path_buf(),
    };

    if !same_volume(source, target).map_err(io_err(target))? {
        return Err(cross_device());
    }
    if same_storage(source, target).map_err(io_err(target))? {
        return Ok(TargetOutcome::AlreadyLinked);
    }

    let temp = temp_sibling(target);
    if let Err(e) = fs::hard_link(source, &temp) {
        return Err(if e.kind() == io::ErrorKind::CrossesDevices {
            cross_device()
        } else {
            io_err(&temp)(e)
        });
    }

    if let Err(e) = fs::rename(&temp, target) {
        if let Err(cleanup) = fs::remove_file(&temp) {
            log::error!(
                "Failed to remove temporary link {}: {}",
                temp.display(),
                cleanup
            );
        }
        return Err(io_err(target)(e));
    }

    Ok(TargetOutcome::Linked)
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A fresh name in the target's directory for the temporary link.
fn temp_sibling(target: &Path) -> PathBuf {
    let name = target
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let unique = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    target.with_file_name(format!(
        ".{}.dedupe-{}-{}.tmp",
        name,
        std::process::id(),
        unique
    ))
}
