use super::common::{deduplicator, memory_catalog, write_file};
use dedupe::catalog::{Catalog, LinkStore};
use dedupe::duplicates::DedupeConfig;
use std::sync::Arc;
use tempfile::tempdir;

#[test]
fn test_second_run_changes_nothing() {
    let dir = tempdir().unwrap();
    let paths = vec![
        write_file(dir.path(), "a", b"idempotent"),
        write_file(dir.path(), "b", b"idempotent"),
        write_file(dir.path(), "c", b"idempotent"),
    ];
    let catalog = memory_catalog();
    let links = LinkStore::new(Arc::clone(&catalog));

    let (_, first) = deduplicator(&catalog, DedupeConfig::default()).run(paths.clone());
    assert_eq!(first.created, 3);
    assert_eq!(first.linked, 2);
    let links_after_first = links.all_links().unwrap();

    let (reports, second) = deduplicator(&catalog, DedupeConfig::default()).run(paths);

    assert!(reports.is_empty());
    assert_eq!(second.updated, 0);
    assert_eq!(second.created, 0);
    assert_eq!(second.existing, 3);
    assert_eq!(second.linked, 0);
    assert_eq!(links.all_links().unwrap(), links_after_first);
}

#[test]
fn test_catalog_survives_reopen() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("state").join("dedupe.db");
    let a = write_file(dir.path(), "data/a", b"persisted");
    let b = write_file(dir.path(), "data/b", b"persisted");

    {
        let catalog = Arc::new(Catalog::open(&db).unwrap());
        let (_, summary) = deduplicator(&catalog, DedupeConfig::default()).run(vec![a.clone(), b.clone()]);
        assert_eq!(summary.linked, 1);
    }

    let catalog = Arc::new(Catalog::open(&db).unwrap());
    assert_eq!(catalog.record_count().unwrap(), 2);
    let (reports, summary) = deduplicator(&catalog, DedupeConfig::default()).run(vec![a, b]);

    assert!(reports.is_empty());
    assert_eq!(summary.existing, 2);
    assert_eq!(summary.skipped, 1);
}
