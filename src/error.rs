//! Structured error handling and exit codes.

use serde::Serialize;

use crate::duplicates::RunSummary;

/// Exit codes for the dedupe application.
///
/// - 0: Success (duplicates were linked, or would be in a dry run)
/// - 1: General error (unexpected failure)
/// - 2: Nothing to link (no duplicates, or all already linked)
/// - 3: Partial success (some paths, targets or catalog writes failed)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// Success: the run completed without per-item errors.
    Success = 0,
    /// General error: An unexpected error occurred.
    GeneralError = 1,
    /// Nothing to link: no target needed linking.
    NothingToLink = 2,
    /// Partial success: the run completed but some items failed.
    PartialSuccess = 3,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Get the machine-readable code prefix.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "DD000",
            Self::GeneralError => "DD001",
            Self::NothingToLink => "DD002",
            Self::PartialSuccess => "DD003",
        }
    }

    /// Exit code describing a finished run.
    #[must_use]
    pub fn from_summary(summary: &RunSummary) -> Self {
        if summary.has_errors() {
            Self::PartialSuccess
        } else if summary.linked == 0 {
            Self::NothingToLink
        } else {
            Self::Success
        }
    }
}

impl From<ExitCode> for std::process::ExitCode {
    fn from(code: ExitCode) -> Self {
        // all variants fit in a u8
        std::process::ExitCode::from(code.as_i32() as u8)
    }
}

/// Structured error information for JSON output.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "DD001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Human-readable error message, including its causes
    pub message: String,
}

impl StructuredError {
    /// Create a new structured error from an anyhow error and an exit code.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{err:#}"),
        }
    }
}
