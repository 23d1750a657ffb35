//! Byte-for-byte verification of hash groups (stage 4, paranoid mode).
//!
//! A matching digest is strong evidence but not proof. When verification is
//! enabled every hash group is split into maximal classes of files whose
//! bytes are actually identical.

use std::fs::File;
use std::io::{self, ErrorKind, Read};
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;

use super::groups::{sort_groups, DuplicateGroup};
use crate::catalog::FileRecord;
use crate::progress::{phase, ProgressCallback};

const COMPARE_BUFFER_SIZE: usize = 64 * 1024;

/// Compare the content of two files.
///
/// Files of different length are never equal. Reading stops at the first
/// differing chunk.
///
/// # Errors
///
/// Returns an error if either file cannot be opened or read.
pub fn files_equal(a: &Path, b: &Path) -> io::Result<bool> {
    let mut fa = File::open(a)?;
    let mut fb = File::open(b)?;
    if fa.metadata()?.len() != fb.metadata()?.len() {
        return Ok(false);
    }

    let mut buf_a = vec![0u8; COMPARE_BUFFER_SIZE];
    let mut buf_b = vec![0u8; COMPARE_BUFFER_SIZE];
    loop {
        let na = read_full(&mut fa, &mut buf_a)?;
        let nb = read_full(&mut fb, &mut buf_b)?;
        if na != nb || buf_a[..na] != buf_b[..nb] {
            return Ok(false);
        }
        if na == 0 {
            return Ok(true);
        }
    }
}

/// Fill `buf` as far as the reader allows; short only at end of file.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]) {
            Ok(0) => break,
            Ok(n) => filled += n,
            Err(e) if e.kind() == ErrorKind::Interrupted => {}
            Err(e) => return Err(e),
        }
    }
    Ok(filled)
}

/// Whether two records hold identical bytes, treating I/O errors as "no".
fn records_equal(a: &FileRecord, b: &FileRecord) -> bool {
    files_equal(&a.path, &b.path).unwrap_or_else(|e| {
        log::warn!(
            "Failed to compare {} with {}: {}",
            a.path.display(),
            b.path.display(),
            e
        );
        false
    })
}

/// Split one hash group into classes of byte-identical files.
///
/// Pivot partitioning: the first remaining file is compared with every other
/// remaining file, matches join its class and the rest are partitioned
/// again. Singleton classes are returned too.
#[must_use]
pub fn split_identical(group: DuplicateGroup) -> Vec<DuplicateGroup> {
    let digest = group.digest;
    let mut remaining = group.files;
    let mut classes = Vec::new();

    while !remaining.is_empty() {
        let pivot = remaining.remove(0);
        let (same, rest): (Vec<_>, Vec<_>) = remaining
            .into_iter()
            .partition(|candidate| records_equal(&pivot, candidate));

        let mut members = Vec::with_capacity(same.len() + 1);
        members.push(pivot);
        members.extend(same);
        if members.len() == 1 {
            log::info!(
                "Digest match not confirmed by content for {}",
                members[0].path.display()
            );
        }
        classes.push(DuplicateGroup::new(digest, members));
        remaining = rest;
    }

    classes
}

/// Verify every group in parallel on the current rayon pool.
#[must_use]
pub fn verify_groups(
    groups: Vec<DuplicateGroup>,
    progress: Option<&dyn ProgressCallback>,
) -> Vec<DuplicateGroup> {
    if let Some(cb) = progress {
        cb.on_phase_start(phase::VERIFYING, groups.len());
    }
    let done = AtomicUsize::new(0);

    let mut verified: Vec<DuplicateGroup> = groups
        .into_par_iter()
        .flat_map_iter(|group| {
            let label = group.source().path.to_string_lossy().into_owned();
            let classes = split_identical(group);
            if let Some(cb) = progress {
                let current = done.fetch_add(1, Ordering::Relaxed) + 1;
                cb.on_progress(current, &label);
            }
            classes
        })
        .collect();
    sort_groups(&mut verified);

    if let Some(cb) = progress {
        cb.on_phase_end(phase::VERIFYING);
    }
    verified
}
