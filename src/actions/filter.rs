//! Removal of group members that are already linked.

use std::collections::HashSet;

use crate::catalog::{FileRecord, LinkStore};

/// Drops candidates the catalog already records as links to a source.
#[derive(Debug, Clone)]
pub struct LinkedFilter {
    links: LinkStore,
}

impl LinkedFilter {
    /// Create a filter over `links`.
    #[must_use]
    pub fn new(links: LinkStore) -> Self {
        Self { links }
    }

    /// Return the candidates that still need linking to `source`.
    ///
    /// The source itself is removed, as is every candidate equal to a record
    /// linked to `source`. A stale link record no longer equals its
    /// candidate, so the candidate is kept. If the lookup fails the failure
    /// is logged and no links are assumed.
    #[must_use]
    pub fn filter_linked(&self, source: &FileRecord, candidates: &[FileRecord]) -> Vec<FileRecord> {
        let linked: HashSet<FileRecord> = match self.links.links_to(source) {
            Ok(records) => records.into_iter().collect(),
            Err(e) => {
                log::warn!(
                    "Failed to look up links of {}: {}",
                    source.path.display(),
                    e
                );
                HashSet::new()
            }
        };

        candidates
            .iter()
            .filter(|c| c.path != source.path && !linked.contains(*c))
            .cloned()
            .collect()
    }
}
