use super::common::{deduplicator, memory_catalog, write_file};
use dedupe::actions::{replace_with_link, TargetOutcome};
use dedupe::catalog::LinkStore;
use dedupe::duplicates::DedupeConfig;
use dedupe::scanner::hardlink::same_storage;
use tempfile::tempdir;

#[test]
fn test_linked_files_share_storage_and_bytes() {
    let dir = tempdir().unwrap();
    let a = write_file(dir.path(), "a.bin", &[7u8; 4096]);
    let b = write_file(dir.path(), "nested/b.bin", &[7u8; 4096]);
    let catalog = memory_catalog();

    let (reports, summary) =
        deduplicator(&catalog, DedupeConfig::default()).run(vec![a.clone(), b.clone()]);

    assert!(reports[0].success);
    assert_eq!(summary.reclaimed_bytes, 4096);
    assert_eq!(std::fs::read(&a).unwrap(), std::fs::read(&b).unwrap());
    assert!(same_storage(&a, &b).unwrap());
    #[cfg(unix)]
    assert_eq!(super::common::inode(&a), super::common::inode(&b));
}

#[test]
fn test_no_temp_files_left_behind() {
    let dir = tempdir().unwrap();
    let a = write_file(dir.path(), "a", b"temp check");
    let b = write_file(dir.path(), "b", b"temp check");

    replace_with_link(&a, &b).unwrap();

    let mut names: Vec<String> = std::fs::read_dir(dir.path())
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    assert_eq!(names, vec!["a", "b"]);
}

#[test]
fn test_existing_hard_link_recorded_not_relinked() {
    let dir = tempdir().unwrap();
    let a = write_file(dir.path(), "a", b"pre-linked");
    let b = dir.path().join("b");
    std::fs::hard_link(&a, &b).unwrap();
    let catalog = memory_catalog();

    let (reports, summary) = deduplicator(&catalog, DedupeConfig::default()).run(vec![a, b]);

    assert_eq!(reports[0].targets[0].outcome, TargetOutcome::AlreadyLinked);
    assert_eq!(summary.already_linked, 1);
    assert_eq!(summary.linked, 0);
    assert_eq!(summary.reclaimed_bytes, 0);
    assert_eq!(LinkStore::new(catalog).link_count().unwrap(), 1);
}

#[test]
fn test_dry_run_leaves_files_alone() {
    let dir = tempdir().unwrap();
    let a = write_file(dir.path(), "a", b"dry run data");
    let b = write_file(dir.path(), "b", b"dry run data");
    let catalog = memory_catalog();

    let config = DedupeConfig::default().with_dry_run(true);
    let (reports, summary) = deduplicator(&catalog, config).run(vec![a.clone(), b.clone()]);

    assert_eq!(reports[0].targets[0].outcome, TargetOutcome::WouldLink);
    assert_eq!(summary.linked, 1);
    assert_eq!(summary.reclaimed_bytes, 12);
    assert!(!same_storage(&a, &b).unwrap());
    assert_eq!(LinkStore::new(catalog).link_count().unwrap(), 0);
}

#[cfg(unix)]
#[test]
fn test_unwritable_directory_fails_target_only() {
    use std::os::unix::fs::PermissionsExt;

    let dir = tempdir().unwrap();
    let a = write_file(dir.path(), "open/a", b"permission");
    let b = write_file(dir.path(), "z_locked/b", b"permission");
    let c = write_file(dir.path(), "open/c", b"permission");
    let locked = dir.path().join("z_locked");
    std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o555)).unwrap();

    // root ignores directory permissions
    if std::fs::write(locked.join("write-check"), b"x").is_ok() {
        std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();
        return;
    }

    let catalog = memory_catalog();
    let (reports, summary) =
        deduplicator(&catalog, DedupeConfig::default()).run(vec![a.clone(), b.clone(), c.clone()]);
    std::fs::set_permissions(&locked, std::fs::Permissions::from_mode(0o755)).unwrap();

    assert!(!reports[0].success);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.linked, 1);
    assert!(summary.has_errors());
    assert_eq!(std::fs::read(&b).unwrap(), b"permission");
    assert!(!same_storage(&a, &b).unwrap());
    // unsuccessful groups are not recorded
    assert_eq!(LinkStore::new(catalog).link_count().unwrap(), 0);
}
