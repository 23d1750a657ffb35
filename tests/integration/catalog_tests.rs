use dedupe::catalog::{BatchWriter, Catalog, CatalogError, FileRecord, LinkStore};
use std::sync::Arc;
use std::time::Duration;
use tempfile::tempdir;

#[test]
fn test_record_round_trip() {
    let catalog = Arc::new(Catalog::in_memory().unwrap());
    let writer = BatchWriter::new(Arc::clone(&catalog));
    let record = FileRecord::new("/data/photo.jpg", 123_456, 1_700_000_000_123, [0xab; 32]);

    writer.add(record.clone()).unwrap();
    writer.shutdown();

    let stored = catalog
        .record_for_path("/data/photo.jpg".as_ref())
        .unwrap()
        .unwrap();
    assert_eq!(stored, record);
    assert_eq!(stored.size, 123_456);
    assert_eq!(stored.modified, 1_700_000_000_123);
    assert_eq!(stored.digest, [0xab; 32]);
}

#[test]
fn test_writer_rejects_after_shutdown() {
    let catalog = Arc::new(Catalog::in_memory().unwrap());
    let writer = BatchWriter::new(catalog);
    writer.shutdown();

    let err = writer
        .add(FileRecord::new("/late", 1, 1, [0; 32]))
        .unwrap_err();
    assert!(matches!(err, CatalogError::WriterClosed));
}

#[test]
fn test_zero_interval_flushes_on_add() {
    let catalog = Arc::new(Catalog::in_memory().unwrap());
    let writer = BatchWriter::with_interval(Arc::clone(&catalog), Duration::ZERO);

    writer.add(FileRecord::new("/eager", 1, 1, [1; 32])).unwrap();

    assert_eq!(writer.pending(), 0);
    assert!(catalog.has_record("/eager".as_ref()).unwrap());
}

#[test]
fn test_links_persist_across_connections() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("catalog.db");
    let src = FileRecord::new("/s", 5, 5, [5; 32]);
    let dst = FileRecord::new("/t", 5, 5, [5; 32]);

    {
        let catalog = Arc::new(Catalog::open(&db).unwrap());
        let writer = BatchWriter::new(Arc::clone(&catalog));
        writer.add(src.clone()).unwrap();
        writer.add(dst.clone()).unwrap();
        writer.shutdown();
        LinkStore::new(catalog).link_files(&src, &dst).unwrap();
    }

    let links = LinkStore::new(Arc::new(Catalog::open(&db).unwrap()));
    assert_eq!(links.links_to(&src).unwrap(), vec![dst.clone()]);
    let all = links.all_links().unwrap();
    assert_eq!(all.len(), 1);
    assert_eq!(all[0].source, src);
    assert_eq!(all[0].target, dst);
}
