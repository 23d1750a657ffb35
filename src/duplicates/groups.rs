//! Size grouping, digest grouping and the duplicate group type.
//!
//! # Overview
//!
//! Size grouping is the first stage of duplicate detection. Files with
//! different sizes cannot be duplicates, so every path whose size is unique
//! is dropped before any content is read.
//!
//! Digest grouping is the third stage: reconciled records are bucketed by
//! content digest and singleton buckets are discarded.
//!
//! Both stages fan out over the current rayon pool and collect into a
//! [`DashMap`], followed by a sequential filter pass.
//!
//! # Example
//!
//! ```
//! use dedupe::catalog::FileRecord;
//! use dedupe::duplicates::group_by_digest;
//!
//! let records = vec![
//!     FileRecord::new("/b.txt", 100, 0, [1; 32]),
//!     FileRecord::new("/a.txt", 100, 0, [1; 32]),
//!     FileRecord::new("/c.txt", 100, 0, [2; 32]),
//! ];
//!
//! let groups = group_by_digest(records);
//! assert_eq!(groups.len(), 1);
//! assert_eq!(groups[0].source().path.to_str(), Some("/a.txt"));
//! ```

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};

use dashmap::DashMap;
use rayon::prelude::*;
use serde::Serialize;

use crate::catalog::FileRecord;
use crate::progress::{phase, ProgressCallback};
use crate::scanner::{digest_to_hex, Digest};

/// Statistics from the size grouping stage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SizeGroupingStats {
    /// Number of candidate paths examined
    pub total_files: usize,
    /// Paths whose size could not be read
    pub errors: usize,
    /// Number of distinct sizes seen
    pub unique_sizes: usize,
    /// Paths dropped because nothing else shares their size
    pub eliminated_unique: usize,
    /// Paths that survive into the digest stage
    pub potential_duplicates: usize,
    /// Size classes with 2+ members
    pub duplicate_groups: usize,
}

impl SizeGroupingStats {
    /// Percentage of paths eliminated by size grouping.
    #[must_use]
    pub fn elimination_rate(&self) -> f64 {
        if self.total_files == 0 {
            0.0
        } else {
            (self.eliminated_unique as f64 / self.total_files as f64) * 100.0
        }
    }
}

/// Group candidate paths by on-disk size (stage 1).
///
/// Returns only size classes with at least two members. Paths whose metadata
/// cannot be read are logged and counted in [`SizeGroupingStats::errors`].
///
/// Runs on the current rayon pool; call it inside `ThreadPool::install` to
/// bound the I/O parallelism.
#[must_use]
pub fn group_by_size(
    paths: Vec<PathBuf>,
    progress: Option<&dyn ProgressCallback>,
) -> (HashMap<u64, Vec<PathBuf>>, SizeGroupingStats) {
    let total = paths.len();
    let by_size: DashMap<u64, Vec<PathBuf>> = DashMap::new();
    let errors = AtomicUsize::new(0);
    let done = AtomicUsize::new(0);

    if let Some(cb) = progress {
        cb.on_phase_start(phase::SIZING, total);
    }

    paths.into_par_iter().for_each(|path| {
        if let Some(cb) = progress {
            let current = done.fetch_add(1, Ordering::Relaxed) + 1;
            cb.on_progress(current, &path.to_string_lossy());
        }
        match std::fs::metadata(&path) {
            Ok(meta) => by_size.entry(meta.len()).or_default().push(path),
            Err(e) => {
                log::warn!("Failed to read size of {}: {}", path.display(), e);
                errors.fetch_add(1, Ordering::Relaxed);
            }
        }
    });

    if let Some(cb) = progress {
        cb.on_phase_end(phase::SIZING);
    }

    let mut stats = SizeGroupingStats {
        total_files: total,
        errors: errors.into_inner(),
        unique_sizes: by_size.len(),
        ..SizeGroupingStats::default()
    };

    let groups: HashMap<u64, Vec<PathBuf>> = by_size
        .into_iter()
        .filter(|(size, files)| {
            if files.len() < 2 {
                stats.eliminated_unique += files.len();
                log::trace!("Eliminated unique size {}", size);
                false
            } else {
                stats.potential_duplicates += files.len();
                stats.duplicate_groups += 1;
                true
            }
        })
        .collect();

    log::info!(
        "Size grouping: {} files -> {} candidates ({:.1}% eliminated)",
        stats.total_files,
        stats.potential_duplicates,
        stats.elimination_rate()
    );

    (groups, stats)
}

/// Group reconciled records by digest (stage 3).
///
/// Singleton digests are discarded. Groups and their members are sorted by
/// path.
#[must_use]
pub fn group_by_digest(records: Vec<FileRecord>) -> Vec<DuplicateGroup> {
    let by_digest: DashMap<Digest, Vec<FileRecord>> = DashMap::new();

    records.into_par_iter().for_each(|record| {
        by_digest.entry(record.digest).or_default().push(record);
    });

    let mut groups: Vec<DuplicateGroup> = by_digest
        .into_iter()
        .filter(|(_, files)| files.len() > 1)
        .map(|(digest, files)| DuplicateGroup::new(digest, files))
        .collect();
    sort_groups(&mut groups);
    groups
}

/// Sort groups by the path of their source.
pub fn sort_groups(groups: &mut [DuplicateGroup]) {
    groups.sort_by(|a, b| {
        let first = |g: &DuplicateGroup| g.files.first().map(|f| f.path.clone());
        first(a).cmp(&first(b))
    });
}

/// A class of files presumed identical.
///
/// Files are kept sorted by path; the first one is the source every other
/// member gets linked to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DuplicateGroup {
    /// Shared content digest
    #[serde(serialize_with = "serialize_digest")]
    pub digest: Digest,
    /// Size of each member in bytes
    pub size: u64,
    /// Members, sorted by path
    pub files: Vec<FileRecord>,
}

fn serialize_digest<S: serde::Serializer>(digest: &Digest, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&digest_to_hex(digest))
}

impl DuplicateGroup {
    /// Create a group, sorting `files` by path.
    #[must_use]
    pub fn new(digest: Digest, mut files: Vec<FileRecord>) -> Self {
        files.sort_by(|a, b| a.path.cmp(&b.path));
        let size = files.first().map_or(0, |f| f.size);
        Self {
            digest,
            size,
            files,
        }
    }

    /// Number of files in this group.
    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Check if this group is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// The member with the smallest path.
    ///
    /// # Panics
    ///
    /// Panics on an empty group; groups built by the pipeline never are.
    #[must_use]
    pub fn source(&self) -> &FileRecord {
        &self.files[0]
    }

    /// Every member except the source.
    #[must_use]
    pub fn targets(&self) -> &[FileRecord] {
        self.files.get(1..).unwrap_or_default()
    }

    /// Bytes freed once every target is a link to the source.
    #[must_use]
    pub fn wasted_space(&self) -> u64 {
        self.targets().iter().map(|f| f.size).sum()
    }

    /// Digest as hexadecimal string.
    #[must_use]
    pub fn digest_hex(&self) -> String {
        digest_to_hex(&self.digest)
    }

    /// Paths of all members.
    #[must_use]
    pub fn paths(&self) -> Vec<PathBuf> {
        self.files.iter().map(|f| f.path.clone()).collect()
    }
}
