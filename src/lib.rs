//! dedupe - duplicate file linker
//!
//! Finds files with identical content under one or more directories and
//! replaces every copy but one with a hard link to it. Digests and created
//! links are kept in a SQLite catalog so later runs skip unchanged files.

pub mod actions;
pub mod catalog;
pub mod cli;
pub mod config;
pub mod duplicates;
pub mod error;
pub mod logging;
pub mod output;
pub mod progress;
pub mod scanner;

use std::io;
use std::sync::Arc;

use anyhow::Context;

use crate::catalog::Catalog;
use crate::cli::{Cli, OutputFormat};
use crate::config::Config;
use crate::duplicates::Deduplicator;
use crate::error::ExitCode;
use crate::output::{JsonReport, TextReport};
use crate::progress::{phase, Progress, ProgressCallback};
use crate::scanner::walker::collect_candidates;
use crate::scanner::WalkerConfig;

/// Run the application for parsed command-line arguments.
///
/// Per-item failures are reported through the exit code; only setup
/// failures (config, catalog, worker pool, report output) are errors.
///
/// # Errors
///
/// Returns an error if the catalog cannot be opened, an ignore pattern is
/// invalid, the worker pool cannot start, or the report cannot be written.
pub fn run_app(cli: Cli) -> anyhow::Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);

    let mut config = Config::load(cli.config.as_deref(), cli.profile.as_deref());
    config.merge_cli(&cli);
    log::debug!("Effective configuration: {:?}", config);

    let walker_config = WalkerConfig::with_ignore_patterns(&config.ignore_patterns)
        .context("Invalid ignore pattern")?;

    let catalog = Arc::new(
        Catalog::open(&config.db_path)
            .with_context(|| format!("Failed to open catalog {}", config.db_path.display()))?,
    );

    let progress = Arc::new(Progress::new(cli.quiet || cli.no_progress));
    progress.on_phase_start(phase::WALKING, 0);
    let (candidates, walk_errors) = collect_candidates(&cli.paths, &walker_config);
    progress.on_phase_end(phase::WALKING);
    log::info!(
        "Found {} files under {} directories",
        candidates.len(),
        cli.paths.len()
    );

    let dedupe_config = config
        .dedupe_config()
        .with_progress_callback(Arc::clone(&progress) as Arc<dyn ProgressCallback>);
    let dedupe = Deduplicator::new(dedupe_config, catalog)?;

    let (reports, mut summary) = dedupe.run(candidates);
    summary.scan_errors += walk_errors;

    let exit_code = ExitCode::from_summary(&summary);
    let mut stdout = io::stdout().lock();
    match config.output {
        OutputFormat::Text => {
            if !cli.quiet {
                TextReport::new(&reports, &summary, config.dry_run).write_to(&mut stdout)?;
            }
        }
        OutputFormat::Json => {
            JsonReport::new(&reports, &summary, config.dry_run, exit_code)
                .write_to(&mut stdout, true)?;
        }
    }

    Ok(exit_code)
}
