//! JSON report of a run.
//!
//! # Output Schema
//!
//! ```json
//! {
//!   "groups": [
//!     {
//!       "source": "/data/a.bin",
//!       "targets": [
//!         { "path": "/data/b.bin", "outcome": "linked", "error": null }
//!       ],
//!       "success": true
//!     }
//!   ],
//!   "summary": {
//!     "total": 3,
//!     "linked": 1,
//!     "reclaimed_bytes": 1024,
//!     "duration": 0.12,
//!     "dry_run": false,
//!     "exit_code": 0,
//!     "exit_code_name": "DD000"
//!   }
//! }
//! ```
//!
//! The summary carries every [`RunSummary`] counter; only a few are shown.

use std::io::Write;

use serde::Serialize;

use crate::actions::GroupReport;
use crate::duplicates::RunSummary;
use crate::error::ExitCode;

/// Run summary plus run-level facts.
#[derive(Debug, Clone, Serialize)]
pub struct JsonSummary<'a> {
    #[serde(flatten)]
    pub counters: &'a RunSummary,
    /// Whether the run changed nothing on disk
    pub dry_run: bool,
    /// The exit code number
    pub exit_code: i32,
    /// The machine-readable exit code name (e.g., "DD000")
    pub exit_code_name: &'static str,
}

/// Complete JSON output structure.
#[derive(Debug, Clone, Serialize)]
pub struct JsonReport<'a> {
    /// Per-group linking results
    pub groups: &'a [GroupReport],
    /// Run summary
    pub summary: JsonSummary<'a>,
}

impl<'a> JsonReport<'a> {
    /// Assemble a report.
    ///
    /// ```
    /// use dedupe::duplicates::RunSummary;
    /// use dedupe::error::ExitCode;
    /// use dedupe::output::json::JsonReport;
    ///
    /// let summary = RunSummary::default();
    /// let report = JsonReport::new(&[], &summary, false, ExitCode::NothingToLink);
    /// assert!(report.to_json().unwrap().contains("\"exit_code\":2"));
    /// ```
    #[must_use]
    pub fn new(
        groups: &'a [GroupReport],
        summary: &'a RunSummary,
        dry_run: bool,
        exit_code: ExitCode,
    ) -> Self {
        Self {
            groups,
            summary: JsonSummary {
                counters: summary,
                dry_run,
                exit_code: exit_code.as_i32(),
                exit_code_name: exit_code.code_prefix(),
            },
        }
    }

    /// Serialize to compact JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty-printed JSON string.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write JSON to a writer, followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W, pretty: bool) -> Result<(), JsonOutputError> {
        let json = if pretty {
            self.to_json_pretty()?
        } else {
            self.to_json()?
        };
        writer.write_all(json.as_bytes())?;
        writer.write_all(b"\n")?;
        Ok(())
    }
}

/// Errors that can occur during JSON output.
#[derive(thiserror::Error, Debug)]
pub enum JsonOutputError {
    /// JSON serialization error
    #[error("JSON serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// I/O error during writing
    #[error("I/O error during JSON generation: {0}")]
    Io(#[from] std::io::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::{TargetOutcome, TargetReport};
    use std::path::PathBuf;
    use std::time::Duration;

    fn sample_groups() -> Vec<GroupReport> {
        vec![GroupReport {
            source: PathBuf::from("/data/a"),
            targets: vec![
                TargetReport {
                    path: PathBuf::from("/data/b"),
                    outcome: TargetOutcome::Linked,
                    error: None,
                },
                TargetReport {
                    path: PathBuf::from("/other/c"),
                    outcome: TargetOutcome::CrossDevice,
                    error: Some("different volume".into()),
                },
            ],
            success: false,
        }]
    }

    #[test]
    fn test_report_structure() {
        let groups = sample_groups();
        let summary = RunSummary {
            total: 3,
            linked: 1,
            cross_device: 1,
            reclaimed_bytes: 4096,
            duration: Duration::from_millis(1500),
            ..RunSummary::default()
        };
        let report = JsonReport::new(&groups, &summary, false, ExitCode::Success);

        let value: serde_json::Value = serde_json::from_str(&report.to_json().unwrap()).unwrap();

        assert_eq!(value["groups"][0]["source"], "/data/a");
        assert_eq!(value["groups"][0]["targets"][0]["outcome"], "linked");
        assert_eq!(value["groups"][0]["targets"][1]["outcome"], "cross_device");
        assert_eq!(value["groups"][0]["success"], false);
        assert_eq!(value["summary"]["total"], 3);
        assert_eq!(value["summary"]["reclaimed_bytes"], 4096);
        assert_eq!(value["summary"]["duration"], 1.5);
        assert_eq!(value["summary"]["dry_run"], false);
        assert_eq!(value["summary"]["exit_code_name"], "DD000");
    }

    #[test]
    fn test_write_to_appends_newline() {
        let summary = RunSummary::default();
        let report = JsonReport::new(&[], &summary, true, ExitCode::NothingToLink);

        let mut buf = Vec::new();
        report.write_to(&mut buf, true).unwrap();
        let text = String::from_utf8(buf).unwrap();

        assert!(text.ends_with("}\n"));
        assert!(text.contains("\"dry_run\": true"));
    }
}
