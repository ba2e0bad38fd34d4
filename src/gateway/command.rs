//! External command-line optimizers.
//!
//! Supported tools, by file type:
//!
//! | Extension      | Tools (in order)        | Mode     |
//! |----------------|-------------------------|----------|
//! | `jpg`, `jpeg`  | `jpegoptim`             | in place |
//! | `png`          | `pngquant`, `optipng`   | in place |
//! | `gif`          | `gifsicle`              | in place |
//!
//! A PNG is handled when at least one of its two tools is installed.

use std::ffi::OsStr;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::thread;
use std::time::{Duration, Instant};

use super::{GatewayError, ImageOptimizer};
use crate::config::OptimizerSettings;

const JPEGOPTIM: &str = "jpegoptim";
const PNGQUANT: &str = "pngquant";
const OPTIPNG: &str = "optipng";
const GIFSICLE: &str = "gifsicle";

/// pngquant: output would be larger than the input (`--skip-if-larger`).
const PNGQUANT_SKIPPED_LARGER: i32 = 98;
/// pngquant: requested quality could not be reached.
const PNGQUANT_QUALITY_TOO_LOW: i32 = 99;

const POLL_INTERVAL: Duration = Duration::from_millis(25);

/// Paths of the discovered binaries.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Binaries {
    /// `jpegoptim`, if found
    pub jpegoptim: Option<PathBuf>,
    /// `pngquant`, if found
    pub pngquant: Option<PathBuf>,
    /// `optipng`, if found
    pub optipng: Option<PathBuf>,
    /// `gifsicle`, if found
    pub gifsicle: Option<PathBuf>,
}

impl Binaries {
    /// Look every tool up in `dir`, or on `PATH` when `dir` is `None`.
    #[must_use]
    pub fn locate(dir: Option<&Path>) -> Self {
        Self {
            jpegoptim: find_binary(JPEGOPTIM, dir),
            pngquant: find_binary(PNGQUANT, dir),
            optipng: find_binary(OPTIPNG, dir),
            gifsicle: find_binary(GIFSICLE, dir),
        }
    }

    fn is_empty(&self) -> bool {
        self.jpegoptim.is_none()
            && self.pngquant.is_none()
            && self.optipng.is_none()
            && self.gifsicle.is_none()
    }

    fn names(&self) -> Vec<&'static str> {
        [
            (JPEGOPTIM, &self.jpegoptim),
            (PNGQUANT, &self.pngquant),
            (OPTIPNG, &self.optipng),
            (GIFSICLE, &self.gifsicle),
        ]
        .into_iter()
        .filter_map(|(name, path)| path.as_ref().map(|_| name))
        .collect()
    }
}

/// Optimizer that runs the external binaries found at construction time.
#[derive(Debug, Clone)]
pub struct CommandOptimizer {
    binaries: Binaries,
    settings: OptimizerSettings,
}

impl CommandOptimizer {
    /// Discover the installed tools.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NoBinaries`] if none of the supported tools
    /// is installed.
    pub fn discover(settings: &OptimizerSettings) -> Result<Self, GatewayError> {
        let binaries = Binaries::locate(settings.binary_dir.as_deref());
        Self::with_binaries(binaries, settings.clone())
    }

    /// Use explicitly given binaries.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::NoBinaries`] if `binaries` is empty.
    pub fn with_binaries(
        binaries: Binaries,
        settings: OptimizerSettings,
    ) -> Result<Self, GatewayError> {
        if binaries.is_empty() {
            return Err(GatewayError::NoBinaries(
                [JPEGOPTIM, PNGQUANT, OPTIPNG, GIFSICLE].join(", "),
            ));
        }
        Ok(Self { binaries, settings })
    }

    /// The discovered binaries.
    #[must_use]
    pub fn binaries(&self) -> &Binaries {
        &self.binaries
    }

    fn run(
        &self,
        tool: &'static str,
        binary: &Path,
        options: &[String],
        extra: &[&str],
        path: &Path,
        accepted: &[i32],
    ) -> Result<(), GatewayError> {
        let mut command = Command::new(binary);
        command
            .args(options)
            .args(extra)
            .arg(path)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());

        log::trace!("Running {} on {}", tool, path.display());

        let mut child = command.spawn().map_err(|source| GatewayError::Spawn {
            tool,
            path: path.to_path_buf(),
            source,
        })?;

        // Drain stderr on a separate thread so a chatty tool cannot block
        // on a full pipe while we wait for it.
        let stderr_reader = child.stderr.take().map(|mut stderr| {
            thread::spawn(move || {
                let mut buf = Vec::new();
                let _ = stderr.read_to_end(&mut buf);
                String::from_utf8_lossy(&buf).into_owned()
            })
        });

        let status = self.wait(&mut child, tool, path);
        let stderr = stderr_reader
            .and_then(|handle| handle.join().ok())
            .unwrap_or_default();
        let status = status?;

        match status.code() {
            Some(code) if status.success() || accepted.contains(&code) => {
                log::trace!("{} finished on {} (exit {})", tool, path.display(), code);
                Ok(())
            }
            _ => Err(GatewayError::CommandFailed {
                tool,
                path: path.to_path_buf(),
                status: status.to_string(),
                stderr: stderr.trim().to_string(),
            }),
        }
    }

    fn wait(
        &self,
        child: &mut Child,
        tool: &'static str,
        path: &Path,
    ) -> Result<ExitStatus, GatewayError> {
        let spawn_err = |source| GatewayError::Spawn {
            tool,
            path: path.to_path_buf(),
            source,
        };

        let Some(seconds) = self.settings.timeout_secs else {
            return child.wait().map_err(spawn_err);
        };

        let deadline = Instant::now() + Duration::from_secs(seconds);
        loop {
            if let Some(status) = child.try_wait().map_err(spawn_err)? {
                return Ok(status);
            }
            if Instant::now() >= deadline {
                let _ = child.kill();
                let _ = child.wait();
                log::warn!("{} killed after {}s on {}", tool, seconds, path.display());
                return Err(GatewayError::Timeout {
                    tool,
                    path: path.to_path_buf(),
                    seconds,
                });
            }
            thread::sleep(POLL_INTERVAL);
        }
    }

    fn optimize_png(&self, path: &Path) -> Result<(), GatewayError> {
        if let Some(pngquant) = &self.binaries.pngquant {
            self.run(
                PNGQUANT,
                pngquant,
                &self.settings.pngquant_options,
                &["--ext", ".png", "--skip-if-larger"],
                path,
                &[PNGQUANT_SKIPPED_LARGER, PNGQUANT_QUALITY_TOO_LOW],
            )?;
        }
        if let Some(optipng) = &self.binaries.optipng {
            self.run(
                OPTIPNG,
                optipng,
                &self.settings.optipng_options,
                &[],
                path,
                &[],
            )?;
        }
        Ok(())
    }
}

impl ImageOptimizer for CommandOptimizer {
    fn optimize(&self, path: &Path) -> Result<(), GatewayError> {
        let unsupported = || GatewayError::Unsupported(path.to_path_buf());

        match extension_of(path).as_deref() {
            Some("jpg" | "jpeg") => {
                let binary = self.binaries.jpegoptim.as_ref().ok_or_else(unsupported)?;
                self.run(
                    JPEGOPTIM,
                    binary,
                    &self.settings.jpegoptim_options,
                    &[],
                    path,
                    &[],
                )
            }
            Some("png") if self.binaries.pngquant.is_some() || self.binaries.optipng.is_some() => {
                self.optimize_png(path)
            }
            Some("gif") => {
                let binary = self.binaries.gifsicle.as_ref().ok_or_else(unsupported)?;
                self.run(
                    GIFSICLE,
                    binary,
                    &self.settings.gifsicle_options,
                    &[],
                    path,
                    &[],
                )
            }
            _ => Err(unsupported()),
        }
    }

    fn describe(&self) -> String {
        self.binaries.names().join(", ")
    }
}

/// Lowercased file extension.
pub(crate) fn extension_of(path: &Path) -> Option<String> {
    path.extension()
        .and_then(OsStr::to_str)
        .map(str::to_ascii_lowercase)
}

fn find_binary(name: &str, dir: Option<&Path>) -> Option<PathBuf> {
    let file_name = if cfg!(windows) {
        format!("{name}.exe")
    } else {
        name.to_string()
    };

    let candidate = |dir: &Path| {
        let path = dir.join(&file_name);
        path.is_file().then_some(path)
    };

    match dir {
        Some(dir) => candidate(dir),
        None => std::env::var_os("PATH")
            .and_then(|paths| std::env::split_paths(&paths).find_map(|d| candidate(&d))),
    }
}
