use dedupe::cli::{Cli, OutputFormat};
use dedupe::config::Config;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use std::path::PathBuf;
use std::time::Duration;
use tempfile::tempdir;

#[test]
fn test_config_file_then_cli() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        r#"
db_path = "/srv/dedupe.db"
io_threads = 6
output = "json"
ignore_patterns = ['.*/\.git/.*']

[profile.nightly]
io_threads = 1
paranoid = true
"#,
    )
    .unwrap();

    let mut config = Config::load_from_path(path, Some("nightly"));
    assert_eq!(config.db_path, PathBuf::from("/srv/dedupe.db"));
    assert_eq!(config.io_threads, 1);
    assert!(config.paranoid);
    assert_eq!(config.output, OutputFormat::Json);
    assert_eq!(config.ignore_patterns, vec![r".*/\.git/.*"]);

    use clap::Parser;
    let cli = Cli::try_parse_from(["dedupe", "--output", "text", "--io-threads", "3", "/x"]).unwrap();
    config.merge_cli(&cli);

    assert_eq!(config.output, OutputFormat::Text);
    assert_eq!(config.io_threads, 3);
    assert!(config.paranoid);
    assert_eq!(config.db_path, PathBuf::from("/srv/dedupe.db"));
}

#[test]
fn test_env_layer() {
    std::env::set_var("DEDUPE_FLUSH_INTERVAL_SECS", "7");

    let config: Config = Figment::from(Serialized::defaults(Config::default()))
        .merge(Env::prefixed("DEDUPE_"))
        .extract()
        .unwrap();
    std::env::remove_var("DEDUPE_FLUSH_INTERVAL_SECS");

    assert_eq!(config.flush_interval_secs, 7);
    assert_eq!(config.dedupe_config().flush_interval, Duration::from_secs(7));
}

#[test]
fn test_invalid_toml_rejected_by_figment() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "io_threads = [").unwrap();

    let result: Result<Config, _> = Figment::from(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .extract();
    assert!(result.is_err());

    let config = Config::load_from_path(path, None);
    assert_eq!(config, Config::default());
}

#[test]
fn test_config_serializes_to_toml() {
    let config = Config {
        dry_run: true,
        ..Config::default()
    };
    let text = toml::to_string_pretty(&config).unwrap();
    assert!(text.contains("dry_run = true"));
    assert!(text.contains("db_path = \"dedupe.db\""));
    assert!(!text.contains("[profile"));
}
