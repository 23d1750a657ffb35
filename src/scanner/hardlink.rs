//! Storage identity helpers for hard linking.
//!
//! # Overview
//!
//! Hard links are multiple directory entries pointing to the same inode.
//! The linker needs two questions answered before it touches a target:
//!
//! - Do source and target live on the same volume? Hard links cannot cross
//!   devices.
//! - Does the target already share the source's storage? Then there is
//!   nothing left to do.
//!
//! # Platform Support
//!
//! - **Unix**: Uses (device_id, inode) pairs from file metadata
//! - **Other**: Identity is unknown; volume checks pass and the link
//!   syscall itself reports cross-device errors

use std::fs::Metadata;
use std::io;
use std::path::Path;

/// Platform-specific storage key.
///
/// On Unix, this is (device_id, inode).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StorageId {
    /// Device the file lives on
    pub dev: u64,
    /// Inode number on that device
    pub ino: u64,
}

impl StorageId {
    /// Create a storage key from file metadata.
    ///
    /// Returns `None` if the platform doesn't expose inode information.
    #[cfg(unix)]
    #[must_use]
    pub fn from_metadata(metadata: &Metadata) -> Option<Self> {
        use std::os::unix::fs::MetadataExt;
        Some(Self {
            dev: metadata.dev(),
            ino: metadata.ino(),
        })
    }

    #[cfg(not(unix))]
    #[must_use]
    pub fn from_metadata(_metadata: &Metadata) -> Option<Self> {
        None
    }
}

/// Check if storage identity is available on this platform.
#[must_use]
pub const fn is_supported() -> bool {
    cfg!(unix)
}

/// Check whether `a` and `b` are hard links to the same storage.
///
/// Always `false` where the platform cannot tell.
///
/// # Errors
///
/// Returns an error if either path's metadata cannot be read.
pub fn same_storage(a: &Path, b: &Path) -> io::Result<bool> {
    let meta_a = std::fs::metadata(a)?;
    let meta_b = std::fs::metadata(b)?;
    Ok(
        match (StorageId::from_metadata(&meta_a), StorageId::from_metadata(&meta_b)) {
            (Some(ka), Some(kb)) => ka == kb,
            _ => false,
        },
    )
}

/// Check whether a hard link to `source` could be created next to `target`.
///
/// Compares the device of `source` with the device of the directory that
/// holds `target`, since that is where the new link entry is created.
///
/// # Errors
///
/// Returns an error if the metadata of `source` or of the target's parent
/// directory cannot be read.
#[cfg(unix)]
pub fn same_volume(source: &Path, target: &Path) -> io::Result<bool> {
    use std::os::unix::fs::MetadataExt;

    let parent = match target.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let source_dev = std::fs::metadata(source)?.dev();
    let target_dev = std::fs::metadata(parent)?.dev();
    Ok(source_dev == target_dev)
}

#[cfg(not(unix))]
pub fn same_volume(source: &Path, target: &Path) -> io::Result<bool> {
    std::fs::metadata(source)?;
    std::fs::metadata(target)?;
    Ok(true)
}
