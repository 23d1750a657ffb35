use super::common::{deduplicator, memory_catalog, set_mtime, write_file};
use dedupe::actions::TargetOutcome;
use dedupe::catalog::{FileRecord, LinkStore};
use dedupe::duplicates::{verify_groups, DedupeConfig, DuplicateGroup};
use dedupe::progress::{phase, ProgressCallback};
use std::sync::{Arc, Mutex};
use tempfile::tempdir;

#[derive(Default)]
struct PhaseRecorder {
    phases: Mutex<Vec<String>>,
}

impl ProgressCallback for PhaseRecorder {
    fn on_phase_start(&self, phase: &str, _total: usize) {
        self.phases.lock().unwrap().push(phase.to_string());
    }
    fn on_progress(&self, _current: usize, _path: &str) {}
    fn on_phase_end(&self, _phase: &str) {}
}

#[test]
fn test_unique_size_never_digested() {
    let dir = tempdir().unwrap();
    let a = write_file(dir.path(), "a", b"0123456789");
    let b = write_file(dir.path(), "b", b"abcdefghij");
    let c = write_file(dir.path(), "c", b"01234567890123456789");

    let catalog = memory_catalog();
    let dedupe = deduplicator(&catalog, DedupeConfig::default());
    let (groups, summary) = dedupe.find_duplicates(vec![a.clone(), b.clone(), c.clone()]);

    assert_eq!(summary.size_candidates, 2);
    assert_eq!(summary.total, 2);
    assert!(catalog.has_record(&a).unwrap());
    assert!(catalog.has_record(&b).unwrap());
    assert!(!catalog.has_record(&c).unwrap());
    // a and b differ in content
    assert!(groups.is_empty());
}

#[test]
fn test_same_size_different_content_not_grouped() {
    let dir = tempdir().unwrap();
    let a = write_file(dir.path(), "a", b"left");
    let b = write_file(dir.path(), "b", b"rght");

    let catalog = memory_catalog();
    let dedupe = deduplicator(&catalog, DedupeConfig::default());
    let (reports, summary) = dedupe.run(vec![a, b]);

    assert_eq!(summary.total, 2);
    assert_eq!(summary.hash_candidates, 0);
    assert_eq!(summary.groups, 0);
    assert!(reports.is_empty());
    assert_eq!(LinkStore::new(catalog).link_count().unwrap(), 0);
}

#[test]
fn test_identical_files_grouped_without_verification() {
    let dir = tempdir().unwrap();
    let a = write_file(dir.path(), "a", b"same bytes");
    let b = write_file(dir.path(), "b", b"same bytes");

    let recorder = Arc::new(PhaseRecorder::default());
    let config = DedupeConfig::default().with_progress_callback(recorder.clone());
    let catalog = memory_catalog();
    let dedupe = deduplicator(&catalog, config);
    let (groups, _summary) = dedupe.find_duplicates(vec![a.clone(), b.clone()]);

    assert_eq!(groups.len(), 1);
    assert_eq!(groups[0].paths(), vec![a, b]);
    let phases = recorder.phases.lock().unwrap();
    assert!(!phases.iter().any(|p| p == phase::VERIFYING));
}

#[test]
fn test_colliding_digest_split_by_paranoid_check() {
    let dir = tempdir().unwrap();
    let a = write_file(dir.path(), "a", b"aaaa");
    let b = write_file(dir.path(), "b", b"bbbb");
    let digest = [9u8; 32];
    let group = DuplicateGroup::new(
        digest,
        vec![
            FileRecord::new(&a, 4, 0, digest),
            FileRecord::new(&b, 4, 0, digest),
        ],
    );

    let classes = verify_groups(vec![group], None);
    assert_eq!(classes.len(), 2);
    assert!(classes.iter().all(|c| c.len() == 1));

    let catalog = memory_catalog();
    let dedupe = deduplicator(&catalog, DedupeConfig::default().with_paranoid(true));
    let mut summary = Default::default();
    let reports = dedupe.link_groups(&classes, &mut summary);

    assert!(reports.is_empty());
    assert_eq!(summary.skipped, 2);
    assert_eq!(summary.linked, 0);
    assert_eq!(std::fs::read(&a).unwrap(), b"aaaa");
    assert_eq!(std::fs::read(&b).unwrap(), b"bbbb");
}

#[test]
fn test_known_link_skipped_on_next_run() {
    let dir = tempdir().unwrap();
    let a = write_file(dir.path(), "a", b"shared payload");
    let b = write_file(dir.path(), "b", b"shared payload");
    let catalog = memory_catalog();

    let (first, summary) =
        deduplicator(&catalog, DedupeConfig::default()).run(vec![a.clone(), b.clone()]);
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].targets[0].outcome, TargetOutcome::Linked);
    assert_eq!(summary.linked, 1);

    let (second, summary) =
        deduplicator(&catalog, DedupeConfig::default()).run(vec![a.clone(), b.clone()]);
    assert!(second.is_empty());
    assert_eq!(summary.skipped, 1);
    assert_eq!(summary.linked, 0);
    assert_eq!(summary.already_linked, 0);
}

#[test]
fn test_multiple_groups_and_singletons() {
    let dir = tempdir().unwrap();
    let paths = vec![
        write_file(dir.path(), "x/one", b"group one"),
        write_file(dir.path(), "y/one", b"group one"),
        write_file(dir.path(), "x/two", b"group two"),
        write_file(dir.path(), "y/two", b"group two"),
        write_file(dir.path(), "z/two", b"group two"),
        write_file(dir.path(), "lonely", b"group six"),
    ];

    let catalog = memory_catalog();
    let (reports, summary) = deduplicator(&catalog, DedupeConfig::default()).run(paths);

    assert_eq!(reports.len(), 2);
    assert!(reports.iter().all(|r| r.success));
    assert_eq!(summary.groups, 2);
    assert_eq!(summary.linked, 3);
    assert_eq!(summary.reclaimed_bytes, 27);
    assert_eq!(summary.total, summary.existing + summary.created + summary.errors);
    assert_eq!(LinkStore::new(catalog).link_count().unwrap(), 3);
}

#[test]
fn test_empty_files_are_linked() {
    let dir = tempdir().unwrap();
    let a = write_file(dir.path(), "a", b"");
    let b = write_file(dir.path(), "b", b"");

    let catalog = memory_catalog();
    let (reports, summary) =
        deduplicator(&catalog, DedupeConfig::default()).run(vec![a.clone(), b.clone()]);

    assert_eq!(summary.size_candidates, 2);
    assert_eq!(summary.total, 2);
    assert_eq!(summary.groups, 1);
    assert_eq!(summary.linked, 1);
    assert_eq!(summary.reclaimed_bytes, 0);
    assert_eq!(reports.len(), 1);
    assert_eq!(catalog.record_count().unwrap(), 2);
    assert_eq!(LinkStore::new(catalog).link_count().unwrap(), 1);
}

#[cfg(unix)]
#[test]
fn test_non_utf8_names_never_share_a_record() {
    use std::ffi::OsStr;
    use std::os::unix::ffi::OsStrExt;

    let dir = tempdir().unwrap();
    let a = dir.path().join(OsStr::from_bytes(b"f\xff"));
    let b = dir.path().join(OsStr::from_bytes(b"f\xfe"));
    std::fs::write(&a, b"AAAAAAAA").unwrap();
    std::fs::write(&b, b"BBBBBBBB").unwrap();
    set_mtime(&a, 1_600_000_000);
    set_mtime(&b, 1_600_000_000);

    let catalog = memory_catalog();
    for _ in 0..2 {
        let (reports, summary) =
            deduplicator(&catalog, DedupeConfig::default()).run(vec![a.clone(), b.clone()]);
        assert!(reports.is_empty());
        assert_eq!(summary.groups, 0);
        assert_eq!(summary.linked, 0);
    }

    assert_eq!(catalog.record_count().unwrap(), 2);
    assert_eq!(catalog.record_for_path(&a).unwrap().unwrap().path, a);
    assert_eq!(catalog.record_for_path(&b).unwrap().unwrap().path, b);
    assert_eq!(std::fs::read(&a).unwrap(), b"AAAAAAAA");
    assert_eq!(std::fs::read(&b).unwrap(), b"BBBBBBBB");
}
