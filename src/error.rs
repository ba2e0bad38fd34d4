//! Structured error handling and exit codes.

use serde::Serialize;

/// Process exit codes.
///
/// - 0: everything requested succeeded
/// - 1: unexpected failure (bad config, unreadable database, ...)
/// - 2: nothing to do (no image files found)
/// - 3: partial success (some files failed, or some records were missing)
/// - 130: interrupted by Ctrl+C
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExitCode {
    /// All files optimized, skipped or forgotten as requested.
    Success = 0,
    /// An unexpected error occurred.
    GeneralError = 1,
    /// No files matched.
    NothingToDo = 2,
    /// Completed, but at least one file failed.
    PartialSuccess = 3,
    /// Interrupted by the user.
    Interrupted = 130,
}

impl ExitCode {
    /// Get the numeric exit code.
    #[must_use]
    pub fn as_i32(self) -> i32 {
        self as i32
    }

    /// Machine-readable code printed in front of error messages.
    #[must_use]
    pub fn code_prefix(self) -> &'static str {
        match self {
            Self::Success => "OI000",
            Self::GeneralError => "OI001",
            Self::NothingToDo => "OI002",
            Self::PartialSuccess => "OI003",
            Self::Interrupted => "OI130",
        }
    }
}

/// Error report printed with `--json-errors`.
#[derive(Debug, Serialize)]
pub struct StructuredError {
    /// The error code (e.g., "OI001")
    pub code: String,
    /// The exit code number
    pub exit_code: i32,
    /// Error message including its causes
    pub message: String,
    /// Whether the operation was interrupted
    pub interrupted: bool,
}

impl StructuredError {
    /// Build the report for `err`.
    #[must_use]
    pub fn new(err: &anyhow::Error, exit_code: ExitCode) -> Self {
        Self {
            code: exit_code.code_prefix().to_string(),
            exit_code: exit_code.as_i32(),
            message: format!("{:#}", err),
            interrupted: exit_code == ExitCode::Interrupted,
        }
    }
}
