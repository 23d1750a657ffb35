//! Command-line interface definitions for dedupe.
//!
//! Every option except the directories can also come from the config file or
//! `DEDUPE_*` environment variables; flags given here win.
//!
//! # Example
//!
//! ```bash
//! # Link duplicates under two trees, catalog in the working directory
//! dedupe /srv/photos /srv/backup
//!
//! # Show what would be linked, with byte-for-byte verification
//! dedupe --dry-run --paranoid ~/Downloads
//!
//! # JSON report, skipping VCS metadata
//! dedupe --output json -i '.*/\.git/.*' ~/src
//! ```

use clap::{Parser, ValueEnum};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Replace duplicate files with hard links.
///
/// dedupe finds files with identical content (BLAKE3), keeps the first copy
/// in path order and replaces every other copy with a hard link to it. File
/// digests and created links are remembered in a SQLite catalog so repeated
/// runs only hash what changed.
#[derive(Debug, Parser)]
#[command(name = "dedupe")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Directories to deduplicate
    #[arg(value_name = "DIR", required = true)]
    pub paths: Vec<PathBuf>,

    /// Path to the catalog database (default: dedupe.db)
    #[arg(short, long = "db", value_name = "PATH")]
    pub db_path: Option<PathBuf>,

    /// Only log what would be linked; change nothing
    #[arg(short = 'n', long)]
    pub dry_run: bool,

    /// Compare file contents byte by byte after digests match
    #[arg(short, long)]
    pub paranoid: bool,

    /// Regular expressions matched against full paths to skip
    ///
    /// Can be specified multiple times. A path is skipped only if the whole
    /// path matches.
    #[arg(short, long = "ignore", value_name = "REGEX")]
    pub ignore_patterns: Vec<String>,

    /// Number of I/O threads for hashing and linking (default: 4)
    #[arg(long, value_name = "N", value_parser = clap::value_parser!(u64).range(1..))]
    pub io_threads: Option<u64>,

    /// Seconds between opportunistic catalog flushes (default: 60)
    #[arg(long = "flush-interval", value_name = "SECS")]
    pub flush_interval_secs: Option<u64>,

    /// Report format
    #[arg(short, long, value_enum)]
    pub output: Option<OutputFormat>,

    /// Config file to load instead of the platform default
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Named profile from the config file to apply
    #[arg(long, value_name = "NAME")]
    pub profile: Option<String>,

    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable progress bars
    #[arg(long)]
    pub no_progress: bool,
}

impl Cli {
    /// Whether errors should be reported as JSON.
    #[must_use]
    pub fn json_errors(&self) -> bool {
        self.output == Some(OutputFormat::Json)
    }
}

/// Report format for a run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable summary
    #[default]
    Text,
    /// JSON document for scripting
    Json,
}

impl std::fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutputFormat::Text => write!(f, "text"),
            OutputFormat::Json => write!(f, "json"),
        }
    }
}
