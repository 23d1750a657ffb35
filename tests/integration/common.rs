#![allow(dead_code)]

use dedupe::catalog::Catalog;
use dedupe::duplicates::{DedupeConfig, Deduplicator};
use filetime::FileTime;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Write `content` to `dir/name`, creating parent directories.
pub fn write_file(dir: &Path, name: &str, content: &[u8]) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(&path, content).unwrap();
    path
}

/// Pin the modification time so signatures are deterministic.
pub fn set_mtime(path: &Path, unix_secs: i64) {
    filetime::set_file_mtime(path, FileTime::from_unix_time(unix_secs, 0)).unwrap();
}

pub fn memory_catalog() -> Arc<Catalog> {
    Arc::new(Catalog::in_memory().unwrap())
}

/// A fresh deduplicator over a shared catalog.
pub fn deduplicator(catalog: &Arc<Catalog>, config: DedupeConfig) -> Deduplicator {
    Deduplicator::new(config.with_io_threads(2), Arc::clone(catalog)).unwrap()
}

#[cfg(unix)]
pub fn inode(path: &Path) -> (u64, u64) {
    use std::os::unix::fs::MetadataExt;
    let meta = std::fs::metadata(path).unwrap();
    (meta.dev(), meta.ino())
}
