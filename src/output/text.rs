//! Human-readable batch summary.

use std::io::{self, Write};

use bytesize::ByteSize;
use yansi::Paint;

use crate::batch::BatchSummary;

/// Renders a [`BatchSummary`] for the terminal.
#[derive(Debug)]
pub struct TextSummary<'a> {
    summary: &'a BatchSummary,
}

impl<'a> TextSummary<'a> {
    /// Wrap a summary.
    #[must_use]
    pub fn new(summary: &'a BatchSummary) -> Self {
        Self { summary }
    }

    /// Write the summary, one failure per line.
    ///
    /// # Errors
    ///
    /// Returns an error if writing fails.
    pub fn write_to<W: Write>(&self, writer: &mut W) -> io::Result<()> {
        let s = self.summary;

        if s.interrupted {
            writeln!(
                writer,
                "{} {} of {} files were not started",
                "Interrupted.".yellow().bold(),
                s.not_started,
                s.total
            )?;
        }

        writeln!(
            writer,
            "{} optimized, {} unchanged, {} failed",
            s.optimized.green().bold(),
            s.skipped.cyan(),
            if s.failed > 0 {
                s.failed.red().bold()
            } else {
                s.failed.primary()
            }
        )?;

        if s.optimized > 0 {
            writeln!(
                writer,
                "Saved {} ({} -> {})",
                ByteSize::b(s.bytes_saved()).to_string().green(),
                ByteSize::b(s.bytes_before),
                ByteSize::b(s.bytes_after)
            )?;
        }

        for failure in &s.failures {
            writeln!(
                writer,
                "  {} {}: {}",
                "✗".red(),
                failure.path.display(),
                failure.error
            )?;
        }

        Ok(())
    }
}
