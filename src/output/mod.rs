//! Report formatters for a finished run.
//!
//! - Text for people
//! - JSON for automation and scripting
//!
//! # Example
//!
//! ```no_run
//! use dedupe::catalog::Catalog;
//! use dedupe::duplicates::{DedupeConfig, Deduplicator};
//! use dedupe::error::ExitCode;
//! use dedupe::output::JsonReport;
//! use std::sync::Arc;
//!
//! let catalog = Arc::new(Catalog::in_memory().unwrap());
//! let dedupe = Deduplicator::new(DedupeConfig::default(), catalog).unwrap();
//! let (groups, summary) = dedupe.run(vec!["./data".into()]);
//!
//! let report = JsonReport::new(&groups, &summary, false, ExitCode::from_summary(&summary));
//! println!("{}", report.to_json_pretty().unwrap());
//! ```

pub mod json;
pub mod text;

pub use json::{JsonOutputError, JsonReport};
pub use text::TextReport;
