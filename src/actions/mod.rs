//! File actions module.
//!
//! This module provides functionality for:
//! - Removing group members the catalog already knows are linked
//! - Replacing duplicates with hard links, crash-safely
//!
//! # Linking
//!
//! The [`Linker`] is chosen once per run: [`Linker::HardLink`] rewrites the
//! filesystem, [`Linker::LogOnly`] (dry run) only logs what it would do.
//!
//! ```no_run
//! use dedupe::actions::{Linker, TargetOutcome};
//! use std::path::{Path, PathBuf};
//!
//! let report = Linker::LogOnly.link(Path::new("/data/a"), &[PathBuf::from("/data/b")]);
//! assert_eq!(report.targets[0].outcome, TargetOutcome::WouldLink);
//! ```

pub mod filter;
pub mod link;

// Re-export commonly used types
pub use filter::LinkedFilter;
pub use link::{replace_with_link, GroupReport, LinkError, Linker, TargetOutcome, TargetReport};
