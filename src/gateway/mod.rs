//! Optimizer gateway: the boundary to the actual compression tools.
//!
//! The orchestrator never compresses anything itself. It asks a [`Gateway`]
//! to optimize a file in place, and the gateway forwards the request to an
//! [`ImageOptimizer`] implementation, normally a [`CommandOptimizer`] that
//! runs `jpegoptim`, `pngquant`, `optipng` or `gifsicle`.
//!
//! # Availability
//!
//! Finding the optimizer binaries is done once. If it fails, or the module is
//! disabled in the configuration, the gateway is *unavailable* for the rest of
//! the process and every request fails without touching the file. There is no
//! second attempt.
//!
//! ```no_run
//! use optimage::config::Config;
//! use optimage::gateway::Gateway;
//! use std::path::Path;
//!
//! let gateway = Gateway::shared(&Config::default());
//! if gateway.is_available() {
//!     gateway.optimize(Path::new("/srv/shop/pub/media/a.jpg"))?;
//! }
//! # Ok::<(), optimage::gateway::GatewayError>(())
//! ```

pub mod command;

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::{Arc, OnceLock};

use crate::config::Config;

pub use command::CommandOptimizer;

/// Something that can optimize an image file in place.
pub trait ImageOptimizer: Send + Sync {
    /// Compress `path` in place.
    ///
    /// # Errors
    ///
    /// Returns a [`GatewayError`] if the file could not be optimized. The file
    /// is expected to be left intact in that case.
    fn optimize(&self, path: &Path) -> Result<(), GatewayError>;

    /// Short description for logs.
    fn describe(&self) -> String {
        "custom optimizer".to_string()
    }
}

/// Errors reported by the gateway.
#[derive(thiserror::Error, Debug)]
pub enum GatewayError {
    /// The gateway was never initialized, or initialization failed.
    #[error("Image optimizer is not available")]
    Unavailable,

    /// None of the supported optimizer binaries could be found.
    #[error("No image optimizer binaries found (looked for {0})")]
    NoBinaries(String),

    /// No installed tool handles this file type.
    #[error("Unsupported image type: {0}")]
    Unsupported(PathBuf),

    /// The tool could not be started.
    #[error("Failed to run {tool} on {path}: {source}")]
    Spawn {
        /// Tool name
        tool: &'static str,
        /// File being optimized
        path: PathBuf,
        /// The underlying I/O error
        #[source]
        source: std::io::Error,
    },

    /// The tool exited unsuccessfully.
    #[error("{tool} failed on {path} ({status}): {stderr}")]
    CommandFailed {
        /// Tool name
        tool: &'static str,
        /// File being optimized
        path: PathBuf,
        /// Exit status as reported by the OS
        status: String,
        /// Captured standard error, trimmed
        stderr: String,
    },

    /// The tool ran longer than the configured timeout and was killed.
    #[error("{tool} timed out after {seconds}s on {path}")]
    Timeout {
        /// Tool name
        tool: &'static str,
        /// File being optimized
        path: PathBuf,
        /// Configured limit
        seconds: u64,
    },

    /// A custom optimizer failed.
    #[error("Optimizer failed on {path}: {message}")]
    Failed {
        /// File being optimized
        path: PathBuf,
        /// Reason
        message: String,
    },
}

/// Initialized-once handle to the image optimizer.
///
/// Immutable after construction, so it can be shared freely between threads.
#[derive(Clone)]
pub struct Gateway {
    optimizer: Option<Arc<dyn ImageOptimizer>>,
}

impl fmt::Debug for Gateway {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gateway")
            .field(
                "optimizer",
                &self.optimizer.as_ref().map(|o| o.describe()),
            )
            .finish()
    }
}

static SHARED: OnceLock<Arc<Gateway>> = OnceLock::new();

impl Gateway {
    /// A gateway that rejects every request.
    #[must_use]
    pub fn unavailable() -> Self {
        Self { optimizer: None }
    }

    /// A gateway backed by the given optimizer.
    #[must_use]
    pub fn with_optimizer(optimizer: Arc<dyn ImageOptimizer>) -> Self {
        Self {
            optimizer: Some(optimizer),
        }
    }

    /// Build a gateway from configuration.
    ///
    /// With `enabled = false` no discovery happens at all. Otherwise the
    /// optimizer binaries are looked up once; failure yields an unavailable
    /// gateway.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        if !config.enabled {
            log::debug!("Image optimization is disabled, gateway not initialized");
            return Self::unavailable();
        }

        match CommandOptimizer::discover(&config.optimizer) {
            Ok(optimizer) => {
                if config.logging {
                    log::info!("Image optimizer initialized ({})", optimizer.describe());
                }
                Self::with_optimizer(Arc::new(optimizer))
            }
            Err(e) => {
                if config.logging {
                    log::error!("Image optimizer could not be initialized: {}", e);
                }
                Self::unavailable()
            }
        }
    }

    /// The process-wide gateway.
    ///
    /// The first call initializes it from `config`; every later call returns
    /// the same instance regardless of its argument, including when that
    /// first initialization failed.
    #[must_use]
    pub fn shared(config: &Config) -> Arc<Self> {
        Arc::clone(SHARED.get_or_init(|| Arc::new(Self::from_config(config))))
    }

    /// Whether optimize requests can succeed at all.
    #[must_use]
    pub fn is_available(&self) -> bool {
        self.optimizer.is_some()
    }

    /// Optimize `path` in place.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Unavailable`] for an unavailable gateway,
    /// otherwise whatever the optimizer reports.
    pub fn optimize(&self, path: &Path) -> Result<(), GatewayError> {
        match &self.optimizer {
            Some(optimizer) => optimizer.optimize(path),
            None => Err(GatewayError::Unavailable),
        }
    }
}
