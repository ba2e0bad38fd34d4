//! Progress reporting for batch runs using indicatif.

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

/// Receives progress updates from a batch run.
pub trait ProgressCallback: Send + Sync {
    /// A batch of `total` files starts.
    fn on_start(&self, total: usize);

    /// One file is done; `current` counts finished files (1-based).
    fn on_progress(&self, current: usize, path: &str);

    /// The batch finished or was interrupted.
    fn on_finish(&self);

    /// Free-form status line.
    fn on_message(&self, _message: &str) {}
}

/// Terminal progress bar.
pub struct Progress {
    bar: Mutex<Option<ProgressBar>>,
    quiet: bool,
}

impl Progress {
    /// Create a reporter; with `quiet` nothing is drawn.
    ///
    /// ```
    /// use optimage::progress::Progress;
    ///
    /// let progress = Progress::new(true);
    /// ```
    #[must_use]
    pub fn new(quiet: bool) -> Self {
        Self {
            bar: Mutex::new(None),
            quiet,
        }
    }

    /// Spinner shown while directories are being walked.
    #[must_use]
    pub fn scanning_spinner(&self) -> Option<ProgressBar> {
        if self.quiet {
            return None;
        }
        let spinner = ProgressBar::new_spinner();
        spinner.set_style(
            ProgressStyle::with_template("{spinner:.green} {msg} [{elapsed_precise}]")
                .unwrap_or_else(|_| ProgressStyle::default_spinner())
                .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ "),
        );
        spinner.set_message("Scanning for images");
        spinner.enable_steady_tick(Duration::from_millis(100));
        Some(spinner)
    }

    fn batch_style() -> ProgressStyle {
        ProgressStyle::with_template(
            "[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%) {msg} (ETA: {eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("█>-")
    }

    fn bar(&self) -> MutexGuard<'_, Option<ProgressBar>> {
        self.bar.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ProgressCallback for Progress {
    fn on_start(&self, total: usize) {
        if self.quiet {
            return;
        }
        let bar = ProgressBar::new(total as u64);
        bar.set_style(Self::batch_style());
        bar.set_message("Optimizing");
        *self.bar() = Some(bar);
    }

    fn on_progress(&self, current: usize, path: &str) {
        if let Some(bar) = self.bar().as_ref() {
            bar.set_position(current as u64);
            bar.set_message(truncate_path(path, 30));
        }
    }

    fn on_finish(&self) {
        if let Some(bar) = self.bar().take() {
            bar.finish_and_clear();
        }
    }

    fn on_message(&self, message: &str) {
        if let Some(bar) = self.bar().as_ref() {
            bar.set_message(message.to_string());
        }
    }
}

/// Shorten a path to its file name when it does not fit.
fn truncate_path(path: &str, max_len: usize) -> String {
    if path.chars().count() <= max_len {
        return path.to_string();
    }

    let file_name = std::path::Path::new(path)
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let chars: Vec<char> = file_name.chars().collect();
    if chars.len() + 4 > max_len {
        let tail: String = chars[chars.len().saturating_sub(max_len - 3)..].iter().collect();
        return format!("...{}", tail);
    }

    format!(".../{}", file_name)
}
