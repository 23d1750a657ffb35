use super::common::{deduplicator, memory_catalog, set_mtime, write_file};
use dedupe::catalog::{BatchWriter, LinkStore};
use dedupe::duplicates::{DedupeConfig, Reconciler, Reconciliation};
use std::sync::Arc;
use tempfile::tempdir;

#[test]
fn test_modified_file_reclassified_and_unlinked() {
    let dir = tempdir().unwrap();
    let a = write_file(dir.path(), "a", b"original");
    let b = write_file(dir.path(), "b", b"original");
    set_mtime(&a, 1_600_000_000);
    set_mtime(&b, 1_600_000_000);

    let catalog = memory_catalog();
    let writer = Arc::new(BatchWriter::new(Arc::clone(&catalog)));
    let links = LinkStore::new(Arc::clone(&catalog));
    let reconciler = Reconciler::new(Arc::clone(&catalog), Arc::clone(&writer));

    let (rec_a, _) = reconciler.classify(&a).unwrap();
    let (rec_b, outcome) = reconciler.classify(&b).unwrap();
    assert_eq!(outcome, Reconciliation::Created);
    writer.flush().unwrap();
    let before = catalog.record_for_path(&b).unwrap().unwrap();
    assert!(before.id.is_some());
    links.link_files(&rec_a, &rec_b).unwrap();
    assert_eq!(links.link_count().unwrap(), 1);

    std::fs::write(&b, b"modified").unwrap();
    set_mtime(&b, 1_700_000_000);

    let (fresh, outcome) = reconciler.classify(&b).unwrap();
    assert_eq!(outcome, Reconciliation::Updated);
    assert_ne!(fresh.digest, rec_b.digest);
    assert_eq!(links.link_count().unwrap(), 0);

    writer.shutdown();
    let stored = catalog.record_for_path(&b).unwrap().unwrap();
    assert_eq!(stored, fresh);
    assert_eq!(stored.id, before.id);
}

#[test]
fn test_run_after_modification_counts_updated() {
    let dir = tempdir().unwrap();
    let a = write_file(dir.path(), "a", b"version1");
    let b = write_file(dir.path(), "b", b"version1");
    let c = write_file(dir.path(), "c", b"versionX");
    let catalog = memory_catalog();

    let (_, first) =
        deduplicator(&catalog, DedupeConfig::default()).run(vec![a.clone(), b.clone(), c.clone()]);
    assert_eq!(first.linked, 1);

    std::fs::write(&c, b"version2").unwrap();
    set_mtime(&c, 1_700_000_000);

    let (_, second) = deduplicator(&catalog, DedupeConfig::default()).run(vec![a, b, c]);

    assert_eq!(second.total, 3);
    assert_eq!(second.updated, 1);
    assert_eq!(second.existing, 3);
    assert_eq!(second.created, 0);
    assert_eq!(second.linked, 0);
}
