//! Catalog data models.

use std::hash::Hash;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::scanner::{Digest, HashError, Hasher, Signature};

/// What the catalog knows about one file.
///
/// Identity is the path. The surrogate `id` is the SQLite rowid and takes no
/// part in equality or hashing: a record read back from the catalog equals
/// the record that was written.
#[derive(Debug, Clone, Serialize)]
pub struct FileRecord {
    /// Row id once persisted
    #[serde(skip)]
    pub id: Option<i64>,
    /// Absolute path of the file
    pub path: PathBuf,
    /// Size in bytes
    pub size: u64,
    /// Modification time in milliseconds since the Unix epoch
    pub modified: i64,
    /// Digest of the full content
    #[serde(serialize_with = "serialize_digest")]
    pub digest: Digest,
}

fn serialize_digest<S: serde::Serializer>(digest: &Digest, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_str(&crate::scanner::digest_to_hex(digest))
}

impl FileRecord {
    /// Create an unpersisted record.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>, size: u64, modified: i64, digest: Digest) -> Self {
        Self {
            id: None,
            path: path.into(),
            size,
            modified,
            digest,
        }
    }

    /// Probe and hash the file at `path`.
    ///
    /// The signature is read before the content so a write racing the hash
    /// leaves a stale signature behind, which the next run detects.
    ///
    /// # Errors
    ///
    /// Returns a [`HashError`] if the file cannot be read.
    pub fn from_file(path: &Path, hasher: &Hasher) -> Result<Self, HashError> {
        let signature = Signature::read(path)?;
        let digest = hasher.digest_file(path)?;
        Ok(Self::new(path, signature.size, signature.modified, digest))
    }

    /// The (size, modified time) pair stored with this record.
    #[must_use]
    pub fn signature(&self) -> Signature {
        Signature {
            size: self.size,
            modified: self.modified,
        }
    }

    /// Whether the stored signature still describes the file on disk.
    #[must_use]
    pub fn matches(&self, on_disk: &Signature) -> bool {
        self.signature() == *on_disk
    }
}

impl PartialEq for FileRecord {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
            && self.size == other.size
            && self.modified == other.modified
            && self.digest == other.digest
    }
}

impl Eq for FileRecord {}

impl Hash for FileRecord {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.path.hash(state);
        self.size.hash(state);
        self.modified.hash(state);
        self.digest.hash(state);
    }
}

/// A target file replaced by a hard link to a source file.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct LinkRecord {
    /// The file every target points at
    pub source: FileRecord,
    /// The file that was replaced
    pub target: FileRecord,
}
