//! Command-line interface definitions for optimage.
//!
//! # Example
//!
//! ```bash
//! # Optimize everything below the media directory, 8 files at a time
//! optimage optimize pub/media --root /var/www/shop --jobs 8
//!
//! # Switch to content hashing for change detection
//! optimage optimize pub/media --check-mode md5
//!
//! # Force re-optimization of one file on the next run
//! optimage forget pub/media/catalog/a.jpg
//!
//! # Show the record key of a file
//! optimage id pub/media/catalog/a.jpg --root /var/www/shop
//! ```

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

use crate::fingerprint::CheckMode;

/// Image optimizer with change detection.
///
/// Runs jpegoptim, pngquant, optipng and gifsicle over image files and
/// remembers what it has already optimized, so unchanged files are skipped
/// on the next run.
#[derive(Debug, Parser)]
#[command(name = "optimage")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Increase verbosity level (-v for debug, -vv for trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress all output except errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Disable colored output
    #[arg(long, global = true, env = "NO_COLOR")]
    pub no_color: bool,

    /// Configuration file (default: platform config dir, config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Print errors as JSON on stderr
    #[arg(long, global = true)]
    pub json_errors: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands.
#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Optimize image files, skipping those unchanged since last time
    Optimize(OptimizeArgs),
    /// Drop the records of files so they are optimized again
    Forget(ForgetArgs),
    /// Print the record identifier of a file
    Id(IdArgs),
    /// Inspect or clear the record database
    Cache(CacheArgs),
}

/// Options shared by commands that touch records.
#[derive(Debug, Args, Clone, Default)]
pub struct StoreArgs {
    /// Root directory that relative paths are computed from
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,

    /// Record database location
    #[arg(long, value_name = "PATH")]
    pub database: Option<PathBuf>,
}

/// Arguments for the optimize subcommand.
#[derive(Debug, Args)]
pub struct OptimizeArgs {
    /// Files or directories to optimize
    #[arg(value_name = "PATH", required = true)]
    pub paths: Vec<PathBuf>,

    /// Change-detection mode (overrides the configuration)
    #[arg(long, value_enum, value_name = "MODE")]
    pub check_mode: Option<CheckMode>,

    #[command(flatten)]
    pub store: StoreArgs,

    /// Number of files optimized in parallel
    #[arg(short, long, value_name = "N")]
    pub jobs: Option<usize>,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments for the forget subcommand.
#[derive(Debug, Args)]
pub struct ForgetArgs {
    /// Files whose records should be dropped
    #[arg(value_name = "PATH", required = true)]
    pub paths: Vec<PathBuf>,

    #[command(flatten)]
    pub store: StoreArgs,
}

/// Arguments for the id subcommand.
#[derive(Debug, Args)]
pub struct IdArgs {
    /// File to identify (does not need to exist)
    #[arg(value_name = "PATH")]
    pub path: PathBuf,

    /// Root directory that relative paths are computed from
    #[arg(long, value_name = "DIR")]
    pub root: Option<PathBuf>,
}

/// Arguments for the cache subcommand.
#[derive(Debug, Args)]
pub struct CacheArgs {
    /// Record database location
    #[arg(long, global = true, value_name = "PATH")]
    pub database: Option<PathBuf>,

    #[command(subcommand)]
    pub action: CacheAction,
}

/// Record database maintenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum CacheAction {
    /// Show the database location and record count
    Stats,
    /// Delete every record
    Clear,
}
