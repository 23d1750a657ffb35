use super::common::write_file;
use clap::Parser;
use dedupe::catalog::{Catalog, LinkStore};
use dedupe::cli::Cli;
use dedupe::error::ExitCode;
use dedupe::scanner::hardlink::same_storage;
use std::sync::Arc;
use tempfile::tempdir;

fn run(args: &[&str]) -> anyhow::Result<ExitCode> {
    let cli = Cli::try_parse_from(args).unwrap();
    dedupe::run_app(cli)
}

#[test]
fn test_run_app_links_tree() {
    let dir = tempdir().unwrap();
    let data = dir.path().join("data");
    let a = write_file(&data, "a", b"cli payload");
    let b = write_file(&data, "sub/b", b"cli payload");
    write_file(&data, "skip.tmp", b"cli payload");
    let db = dir.path().join("dedupe.db");
    let config = dir.path().join("absent.toml");

    let code = run(&[
        "dedupe",
        "-q",
        "--db",
        db.to_str().unwrap(),
        "--config",
        config.to_str().unwrap(),
        "-i",
        r".*\.tmp",
        data.to_str().unwrap(),
    ])
    .unwrap();

    assert_eq!(code, ExitCode::Success);
    assert!(same_storage(&a, &b).unwrap());
    assert!(!same_storage(&a, &data.join("skip.tmp")).unwrap());

    let catalog = Arc::new(Catalog::open(&db).unwrap());
    assert_eq!(catalog.record_count().unwrap(), 2);
    assert_eq!(LinkStore::new(catalog).link_count().unwrap(), 1);

    // second run finds nothing left to do
    let code = run(&[
        "dedupe",
        "-q",
        "--db",
        db.to_str().unwrap(),
        "--config",
        config.to_str().unwrap(),
        "-i",
        r".*\.tmp",
        data.to_str().unwrap(),
    ])
    .unwrap();
    assert_eq!(code, ExitCode::NothingToLink);
}

#[test]
fn test_run_app_invalid_pattern_is_error() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("dedupe.db");
    let config = dir.path().join("absent.toml");

    let result = run(&[
        "dedupe",
        "-q",
        "--db",
        db.to_str().unwrap(),
        "--config",
        config.to_str().unwrap(),
        "-i",
        "(unclosed",
        dir.path().to_str().unwrap(),
    ]);

    assert!(result.is_err());
}

#[test]
fn test_run_app_missing_root_is_partial() {
    let dir = tempdir().unwrap();
    let db = dir.path().join("dedupe.db");
    let config = dir.path().join("absent.toml");
    let missing = dir.path().join("missing");

    let code = run(&[
        "dedupe",
        "-q",
        "--dry-run",
        "--db",
        db.to_str().unwrap(),
        "--config",
        config.to_str().unwrap(),
        missing.to_str().unwrap(),
    ])
    .unwrap();

    assert_eq!(code, ExitCode::PartialSuccess);
}
