//! Layered application configuration.
//!
//! Sources, lowest priority first:
//!
//! 1. Built-in defaults
//! 2. TOML file (`--config`, or `config.toml` in the platform config dir)
//! 3. `DEDUPE_*` environment variables
//! 4. The selected `[profile.<name>]` table
//! 5. Command-line flags ([`Config::merge_cli`])
//!
//! An unreadable or invalid file is reported and the defaults are used.

use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::catalog::DEFAULT_DATABASE_PATH;
use crate::cli::{Cli, OutputFormat};
use crate::duplicates::finder::DEFAULT_IO_THREADS;
use crate::duplicates::DedupeConfig;

/// Prefix of environment variables read into the configuration.
pub const ENV_PREFIX: &str = "DEDUPE_";

const KNOWN_KEYS: &[&str] = &[
    "db_path",
    "dry_run",
    "paranoid",
    "ignore_patterns",
    "io_threads",
    "flush_interval_secs",
    "output",
    "profile",
];

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Catalog database location.
    pub db_path: PathBuf,
    /// Only log what would be linked.
    pub dry_run: bool,
    /// Byte-for-byte verification of digest groups.
    pub paranoid: bool,
    /// Full-path regular expressions to skip.
    pub ignore_patterns: Vec<String>,
    /// Worker threads for hashing and linking.
    pub io_threads: usize,
    /// Seconds between opportunistic catalog flushes.
    pub flush_interval_secs: u64,
    /// Report format.
    pub output: OutputFormat,
    /// Named overrides selected with `--profile`.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub profile: BTreeMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DATABASE_PATH),
            dry_run: false,
            paranoid: false,
            ignore_patterns: Vec::new(),
            io_threads: DEFAULT_IO_THREADS,
            flush_interval_secs: 60,
            output: OutputFormat::Text,
            profile: BTreeMap::new(),
        }
    }
}

/// A `[profile.<name>]` table. Unset keys keep the base value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    /// Catalog database location.
    pub db_path: Option<PathBuf>,
    /// Only log what would be linked.
    pub dry_run: Option<bool>,
    /// Byte-for-byte verification of digest groups.
    pub paranoid: Option<bool>,
    /// Replaces the base ignore patterns entirely.
    pub ignore_patterns: Option<Vec<String>>,
    /// Worker threads for hashing and linking.
    pub io_threads: Option<usize>,
    /// Seconds between opportunistic catalog flushes.
    pub flush_interval_secs: Option<u64>,
    /// Report format.
    pub output: Option<OutputFormat>,
}

impl Profile {
    fn apply(&self, config: &mut Config) {
        if let Some(path) = &self.db_path {
            config.db_path.clone_from(path);
        }
        if let Some(dry_run) = self.dry_run {
            config.dry_run = dry_run;
        }
        if let Some(paranoid) = self.paranoid {
            config.paranoid = paranoid;
        }
        if let Some(patterns) = &self.ignore_patterns {
            config.ignore_patterns.clone_from(patterns);
        }
        if let Some(threads) = self.io_threads {
            config.io_threads = threads;
        }
        if let Some(secs) = self.flush_interval_secs {
            config.flush_interval_secs = secs;
        }
        if let Some(output) = self.output {
            config.output = output;
        }
    }
}

impl Config {
    /// Platform-specific default config file, if a home directory exists.
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("", "", "dedupe")
            .map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Load from `path` (or the default location) and apply `profile`.
    #[must_use]
    pub fn load(path: Option<&Path>, profile: Option<&str>) -> Self {
        match path.map(Path::to_path_buf).or_else(Self::default_path) {
            Some(path) => Self::load_from_path(path, profile),
            None => {
                log::debug!("No config directory available, using defaults");
                Self::default()
            }
        }
    }

    /// Load from a specific file and apply `profile`.
    ///
    /// A missing file is not an error. A malformed one is logged and the
    /// defaults are returned.
    #[must_use]
    pub fn load_from_path(path: PathBuf, profile: Option<&str>) -> Self {
        if path.exists() {
            warn_unknown_keys(&path);
        }

        let figment = Figment::from(Serialized::defaults(Config::default()))
            .merge(Toml::file(&path))
            .merge(Env::prefixed(ENV_PREFIX));

        let mut config: Config = match figment.extract() {
            Ok(config) => config,
            Err(e) => {
                log::warn!(
                    "Invalid configuration in {}, using defaults: {}",
                    path.display(),
                    e
                );
                return Self::default();
            }
        };

        if let Some(name) = profile {
            match config.profile.get(name).cloned() {
                Some(overrides) => {
                    log::debug!("Applying profile '{}'", name);
                    overrides.apply(&mut config);
                }
                None => log::warn!(
                    "Profile '{}' not found in {}, using base configuration",
                    name,
                    path.display()
                ),
            }
        }

        config
    }

    /// Override values with the flags given on the command line.
    pub fn merge_cli(&mut self, cli: &Cli) {
        if let Some(path) = &cli.db_path {
            self.db_path.clone_from(path);
        }
        if cli.dry_run {
            self.dry_run = true;
        }
        if cli.paranoid {
            self.paranoid = true;
        }
        if !cli.ignore_patterns.is_empty() {
            self.ignore_patterns.clone_from(&cli.ignore_patterns);
        }
        if let Some(threads) = cli.io_threads {
            self.io_threads = usize::try_from(threads).unwrap_or(usize::MAX);
        }
        if let Some(secs) = cli.flush_interval_secs {
            self.flush_interval_secs = secs;
        }
        if let Some(output) = cli.output {
            self.output = output;
        }
    }

    /// Deduplicator settings derived from this configuration.
    #[must_use]
    pub fn dedupe_config(&self) -> DedupeConfig {
        DedupeConfig::default()
            .with_io_threads(self.io_threads)
            .with_paranoid(self.paranoid)
            .with_dry_run(self.dry_run)
            .with_flush_interval(Duration::from_secs(self.flush_interval_secs))
    }
}

/// Log every top-level or profile key that is not recognized.
fn warn_unknown_keys(path: &Path) {
    let table = match std::fs::read_to_string(path)
        .ok()
        .and_then(|content| content.parse::<toml::Table>().ok())
    {
        Some(table) => table,
        None => return,
    };

    for key in unknown_keys(&table) {
        match suggest_key(&key) {
            Some(suggestion) => log::warn!(
                "Unknown config key '{}' in {} (did you mean '{}'?)",
                key,
                path.display(),
                suggestion
            ),
            None => log::warn!("Unknown config key '{}' in {}", key, path.display()),
        }
    }
}

fn unknown_keys(table: &toml::Table) -> Vec<String> {
    let mut unknown: Vec<String> = table
        .keys()
        .filter(|k| !KNOWN_KEYS.contains(&k.as_str()))
        .cloned()
        .collect();

    if let Some(toml::Value::Table(profiles)) = table.get("profile") {
        for profile in profiles.values() {
            if let toml::Value::Table(keys) = profile {
                unknown.extend(
                    keys.keys()
                        .filter(|k| *k != "profile" && !KNOWN_KEYS.contains(&k.as_str()))
                        .cloned(),
                );
            }
        }
    }
    unknown
}

/// Closest known key, if any is reasonably close.
#[must_use]
pub fn suggest_key(key: &str) -> Option<&'static str> {
    KNOWN_KEYS
        .iter()
        .map(|known| (*known, strsim::jaro_winkler(key, known)))
        .filter(|(_, score)| *score > 0.8)
        .max_by(|a, b| a.1.total_cmp(&b.1))
        .map(|(known, _)| known)
}
