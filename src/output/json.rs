//! JSON output for batch runs.
//!
//! ```json
//! {
//!   "check_mode": "md5",
//!   "summary": {
//!     "total": 3,
//!     "optimized": 1,
//!     "skipped": 1,
//!     "failed": 1,
//!     "not_started": 0,
//!     "bytes_before": 20480,
//!     "bytes_after": 16384,
//!     "failures": [{ "path": "/srv/shop/pub/media/b.gif", "error": "..." }],
//!     "interrupted": false
//!   },
//!   "bytes_saved": 4096,
//!   "exit_code": 3,
//!   "code": "OI003"
//! }
//! ```

use std::io::Write;

use serde::Serialize;

use crate::batch::BatchSummary;
use crate::error::ExitCode;
use crate::fingerprint::CheckMode;

/// Complete JSON document for one run.
#[derive(Debug, Clone, Serialize)]
pub struct JsonOutput<'a> {
    /// Change-detection mode the run used
    pub check_mode: CheckMode,
    /// Per-run totals
    pub summary: &'a BatchSummary,
    /// Convenience copy of [`BatchSummary::bytes_saved`]
    pub bytes_saved: u64,
    /// Process exit code
    pub exit_code: i32,
    /// Machine-readable code
    pub code: &'static str,
}

impl<'a> JsonOutput<'a> {
    /// Wrap a summary.
    #[must_use]
    pub fn new(summary: &'a BatchSummary, check_mode: CheckMode, exit_code: ExitCode) -> Self {
        Self {
            check_mode,
            summary,
            bytes_saved: summary.bytes_saved(),
            exit_code: exit_code.as_i32(),
            code: exit_code.code_prefix(),
        }
    }

    /// Serialize to pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Write the document followed by a newline.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization or writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> Result<(), JsonOutputError> {
        let json = self.to_json_pretty()?;
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
    #[error("I/O error during JSON output: {0}")]
    Io(#[from] std::io::Error),
}
