//! Application configuration management.
//!
//! Settings are layered with `figment`, later layers winning:
//!
//! 1. Built-in defaults ([`Config::default`])
//! 2. TOML file (`--config PATH`, or `config.toml` in the platform config dir)
//! 3. `OPTIMAGE_*` environment variables, nested with `__`
//!    (e.g. `OPTIMAGE_OPTIMIZER__TIMEOUT_SECS=30`)
//! 4. CLI flags, applied by the caller after loading
//!
//! # Example
//!
//! ```toml
//! enabled = true
//! logging = true
//! check_mode = "md5"
//! root = "/var/www/shop"
//! jobs = 8
//!
//! [optimizer]
//! jpegoptim_options = ["--strip-all", "--all-progressive", "-m85"]
//! timeout_secs = 60
//!
//! [scan]
//! extensions = ["jpg", "jpeg", "png"]
//! ignore_patterns = ["cache/"]
//! ```

use anyhow::{Context, Result};
use directories::ProjectDirs;
use figment::providers::{Env, Format, Serialized, Toml};
use figment::Figment;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::fingerprint::CheckMode;

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "OPTIMAGE_";

/// Application configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Master switch. When off the optimizer is never initialized and every
    /// optimize request fails immediately.
    pub enabled: bool,
    /// Emit per-file diagnostics from the orchestrator.
    pub logging: bool,
    /// Change-detection mode for the whole deployment.
    pub check_mode: CheckMode,
    /// Root that relative paths (and therefore identifiers) are derived from.
    /// Defaults to the current directory.
    pub root: Option<PathBuf>,
    /// Record database location. Defaults to the platform data directory.
    pub database: Option<PathBuf>,
    /// Number of files optimized in parallel by batch runs.
    pub jobs: usize,
    /// External optimizer settings.
    pub optimizer: OptimizerSettings,
    /// Directory scanning settings.
    pub scan: ScanSettings,
}

/// Options passed to the external optimizer binaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OptimizerSettings {
    /// Arguments for `jpegoptim` (JPEG, in place).
    pub jpegoptim_options: Vec<String>,
    /// Arguments for `pngquant` (PNG, lossy, written in place).
    pub pngquant_options: Vec<String>,
    /// Arguments for `optipng` (PNG, lossless, in place).
    pub optipng_options: Vec<String>,
    /// Arguments for `gifsicle` (GIF, in place).
    pub gifsicle_options: Vec<String>,
    /// Look for the binaries only in this directory instead of `PATH`.
    pub binary_dir: Option<PathBuf>,
    /// Kill a single optimizer run after this many seconds.
    pub timeout_secs: Option<u64>,
}

/// Which files a batch run picks up below a directory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanSettings {
    /// Lowercase file extensions treated as images.
    pub extensions: Vec<String>,
    /// Skip hidden files and directories.
    pub skip_hidden: bool,
    /// Follow symbolic links while walking.
    pub follow_symlinks: bool,
    /// Gitignore-style patterns to skip.
    pub ignore_patterns: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            enabled: true,
            logging: true,
            check_mode: CheckMode::ModifiedTime,
            root: None,
            database: None,
            jobs: 4,
            optimizer: OptimizerSettings::default(),
            scan: ScanSettings::default(),
        }
    }
}

impl Default for OptimizerSettings {
    fn default() -> Self {
        let args = |list: &[&str]| -> Vec<String> {
            list.iter().map(|s| (*s).to_string()).collect()
        };
        Self {
            jpegoptim_options: args(&["--strip-all", "--all-progressive", "-m85"]),
            pngquant_options: args(&["--force", "-Q85"]),
            optipng_options: args(&["-o2", "-quiet"]),
            gifsicle_options: args(&["-b", "-O3"]),
            binary_dir: None,
            timeout_secs: None,
        }
    }
}

impl Default for ScanSettings {
    fn default() -> Self {
        Self {
            extensions: ["jpg", "jpeg", "png", "gif"]
                .iter()
                .map(|s| (*s).to_string())
                .collect(),
            skip_hidden: true,
            follow_symlinks: false,
            ignore_patterns: Vec::new(),
        }
    }
}

impl Config {
    /// Load the configuration from `explicit`, or from the default
    /// platform-specific path when `None`.
    ///
    /// Never fails: problems are logged and defaults are used instead.
    pub fn load(explicit: Option<&Path>) -> Self {
        let path = match explicit {
            Some(p) => Some(p.to_path_buf()),
            None => match Self::default_config_path() {
                Ok(p) => Some(p),
                Err(e) => {
                    log::debug!("No default config location: {}", e);
                    None
                }
            },
        };

        match path {
            Some(p) => Self::load_from_path(p),
            None => Self::from_figment(Self::layered(None)).unwrap_or_default(),
        }
    }

    /// Load the configuration from a specific TOML file plus environment.
    ///
    /// A missing file is not an error; invalid files fall back to defaults.
    pub fn load_from_path(path: impl AsRef<Path>) -> Self {
        match Self::try_load_from_path(path.as_ref()) {
            Ok(config) => config,
            Err(e) => {
                log::debug!("Failed to load config, using defaults: {:#}", e);
                Self::default()
            }
        }
    }

    /// Like [`Config::load_from_path`], but reports errors.
    ///
    /// # Errors
    ///
    /// Returns an error if the file or environment contains invalid values.
    pub fn try_load_from_path(path: &Path) -> Result<Self> {
        let config = Self::from_figment(Self::layered(Some(path)))
            .with_context(|| format!("Invalid configuration in {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    fn layered(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    fn from_figment(figment: Figment) -> Result<Self> {
        figment.extract().context("Failed to extract configuration")
    }

    /// Check value ranges that serde cannot express.
    ///
    /// # Errors
    ///
    /// Returns an error describing the first invalid setting.
    pub fn validate(&self) -> Result<()> {
        if self.jobs == 0 {
            anyhow::bail!("jobs must be at least 1");
        }
        if self.scan.extensions.is_empty() {
            anyhow::bail!("scan.extensions must not be empty");
        }
        if self.optimizer.timeout_secs == Some(0) {
            anyhow::bail!("optimizer.timeout_secs must be at least 1 when set");
        }
        Ok(())
    }

    /// Root for relative paths: the configured one or the current directory.
    ///
    /// # Errors
    ///
    /// Returns an error if the current directory cannot be determined.
    pub fn resolved_root(&self) -> Result<PathBuf> {
        match &self.root {
            Some(root) => Ok(root.clone()),
            None => std::env::current_dir().context("Failed to determine current directory"),
        }
    }

    /// Record database path: the configured one or the platform default.
    ///
    /// # Errors
    ///
    /// Returns an error if no platform data directory exists.
    pub fn resolved_database(&self) -> Result<PathBuf> {
        match &self.database {
            Some(path) => Ok(path.clone()),
            None => Self::default_database_path(),
        }
    }

    /// Get the default platform-specific configuration path.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform directories cannot be determined.
    pub fn default_config_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.config_dir().join("config.toml"))
    }

    /// Get the default platform-specific record database path.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform directories cannot be determined.
    pub fn default_database_path() -> Result<PathBuf> {
        Ok(Self::project_dirs()?.data_dir().join("records.db"))
    }

    fn project_dirs() -> Result<ProjectDirs> {
        ProjectDirs::from("com", "optimage", "optimage")
            .ok_or_else(|| anyhow::anyhow!("Failed to determine project directories"))
    }
}
