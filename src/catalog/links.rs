//! Link bookkeeping.
//!
//! Every target that was replaced by a hard link is recorded against its
//! source. A target has at most one source; linking it again moves it.

use std::sync::Arc;

use rusqlite::params;

use super::database::{path_key, record_id, RawRecord, RECORD_COLUMNS};
use super::{Catalog, CatalogError, FileRecord, LinkRecord};

/// Handle to the link table of a [`Catalog`].
#[derive(Debug, Clone)]
pub struct LinkStore {
    catalog: Arc<Catalog>,
}

impl LinkStore {
    /// Create a link store over `catalog`.
    #[must_use]
    pub fn new(catalog: Arc<Catalog>) -> Self {
        Self { catalog }
    }

    /// Record `target` as a hard link to `source`.
    ///
    /// Any previous link of `target` is replaced in the same transaction.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::UnknownRecord`] if either file has no stored
    /// record and [`CatalogError::SelfLink`] if both are the same path.
    pub fn link_files(&self, source: &FileRecord, target: &FileRecord) -> Result<(), CatalogError> {
        if source.path == target.path {
            return Err(CatalogError::SelfLink(source.path.clone()));
        }

        self.catalog.with_transaction(|tx| {
            let source_id = record_id(tx, &source.path)?
                .ok_or_else(|| CatalogError::UnknownRecord(source.path.clone()))?;
            let target_id = record_id(tx, &target.path)?
                .ok_or_else(|| CatalogError::UnknownRecord(target.path.clone()))?;

            tx.execute(
                "DELETE FROM file_link WHERE link_id = ?1",
                params![target_id],
            )?;
            tx.execute(
                "INSERT INTO file_link (source_id, link_id) VALUES (?1, ?2)",
                params![source_id, target_id],
            )?;
            Ok(())
        })
    }

    /// All records currently linked to `source`, ordered by path.
    ///
    /// # Errors
    ///
    /// Returns an error on SQLite failure or a corrupt digest column.
    pub fn links_to(&self, source: &FileRecord) -> Result<Vec<FileRecord>, CatalogError> {
        let conn = self.catalog.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {RECORD_COLUMNS} FROM file_metadata
             WHERE id IN (
                 SELECT l.link_id FROM file_link l
                 JOIN file_metadata s ON s.id = l.source_id
                 WHERE s.path = ?1
             )
             ORDER BY path"
        ))?;
        let rows = stmt.query_map(params![path_key(&source.path)], RawRecord::from_row)?;

        let records: Result<Vec<_>, CatalogError> = rows
            .map(|raw| raw.map_err(CatalogError::from).and_then(RawRecord::decode))
            .collect();
        records
    }

    /// Delete every link that has `record` as source or target.
    ///
    /// Returns the number of links removed.
    ///
    /// # Errors
    ///
    /// Returns an error on SQLite failure.
    pub fn delete_links_with(&self, record: &FileRecord) -> Result<usize, CatalogError> {
        let conn = self.catalog.lock();
        let deleted = conn.execute(
            "DELETE FROM file_link
             WHERE source_id IN (SELECT id FROM file_metadata WHERE path = ?1)
                OR link_id IN (SELECT id FROM file_metadata WHERE path = ?1)",
            params![path_key(&record.path)],
        )?;
        Ok(deleted)
    }

    /// Number of stored links.
    ///
    /// # Errors
    ///
    /// Returns an error on SQLite failure.
    pub fn link_count(&self) -> Result<usize, CatalogError> {
        let count: i64 = self
            .catalog
            .lock()
            .query_row("SELECT COUNT(*) FROM file_link", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    /// Every stored link, ordered by source then target path.
    ///
    /// # Errors
    ///
    /// Returns an error on SQLite failure or a corrupt digest column.
    pub fn all_links(&self) -> Result<Vec<LinkRecord>, CatalogError> {
        let conn = self.catalog.lock();
        let mut stmt = conn.prepare(
            "SELECT s.id, s.path, s.size, s.modified_time, s.hash,
                    t.id, t.path, t.size, t.modified_time, t.hash
             FROM file_link l
             JOIN file_metadata s ON s.id = l.source_id
             JOIN file_metadata t ON t.id = l.link_id
             ORDER BY s.path, t.path",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok((RawRecord::from_row_at(row, 0)?, RawRecord::from_row_at(row, 5)?))
        })?;

        let links: Result<Vec<_>, CatalogError> = rows
            .map(|pair| {
                let (source, target) = pair?;
                Ok(LinkRecord {
                    source: source.decode()?,
                    target: target.decode()?,
                })
            })
            .collect();
        links
    }
}
