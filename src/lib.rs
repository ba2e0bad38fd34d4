//! optimage - image optimization with change detection
//!
//! Optimizes image files in place through external tools and remembers, per
//! file, what the file looked like right after its last optimization. Files
//! that have not changed since are skipped.
//!
//! The pieces, leaf first:
//!
//! - [`fingerprint`]: path-derived identifiers and change signatures
//! - [`cache`]: the optimization record store (SQLite)
//! - [`gateway`]: the optimizer, initialized once per process
//! - [`orchestrator`]: the skip / optimize / record decision
//! - [`scanner`] and [`batch`]: directory walking and parallel runs

pub mod batch;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod fingerprint;
pub mod gateway;
pub mod logging;
pub mod orchestrator;
pub mod output;
pub mod progress;
pub mod scanner;
pub mod signal;

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};

use crate::batch::BatchRunner;
use crate::cache::SqliteRecordStore;
use crate::cli::{CacheAction, CacheArgs, Cli, Commands, ForgetArgs, IdArgs, OptimizeArgs, StoreArgs};
use crate::config::Config;
use crate::error::ExitCode;
use crate::gateway::Gateway;
use crate::orchestrator::{OptimizeError, Orchestrator, OrchestratorSettings};
use crate::output::{JsonOutput, TextSummary};
use crate::progress::Progress;
use crate::scanner::WalkerConfig;

/// Run the command described by `cli`.
///
/// # Errors
///
/// Returns an error for failures that stop the whole command (invalid
/// configuration, unusable database, no optimizer). Per-file failures are
/// reported in the output and through the returned [`ExitCode`].
pub fn run_app(cli: Cli) -> Result<ExitCode> {
    logging::init_logging(cli.verbose, cli.quiet);
    if cli.no_color {
        yansi::disable();
    }

    let mut config = Config::load(cli.config.as_deref());
    log::debug!("Log level: {}", logging::current_level_name());

    match cli.command {
        Commands::Optimize(args) => run_optimize(&mut config, args, cli.quiet),
        Commands::Forget(args) => run_forget(&mut config, args, cli.quiet),
        Commands::Id(args) => run_id(&config, &args),
        Commands::Cache(args) => run_cache(&mut config, &args),
    }
}

fn apply_store_args(config: &mut Config, args: &StoreArgs) {
    if let Some(root) = &args.root {
        config.root = Some(root.clone());
    }
    if let Some(database) = &args.database {
        config.database = Some(database.clone());
    }
}

fn open_store(config: &Config) -> Result<SqliteRecordStore> {
    let path = config.resolved_database()?;
    SqliteRecordStore::open(&path)
        .with_context(|| format!("Failed to open record database {}", path.display()))
}

/// Orchestrator settings with an absolute root, so relative command-line
/// paths and the root strip consistently.
fn settings_for(config: &Config) -> Result<OrchestratorSettings> {
    let mut settings = OrchestratorSettings::from_config(config)?;
    settings.root = absolute(&settings.root)?;
    Ok(settings)
}

/// Absolute form of `path` with `.` and `..` folded away, so
/// `../shop/pub/a.jpg` strips against the root like `/srv/shop/pub/a.jpg`.
fn absolute(path: &Path) -> Result<PathBuf> {
    let absolute = std::path::absolute(path)
        .with_context(|| format!("Failed to resolve path {}", path.display()))?;
    Ok(fingerprint::normalize_lexically(&absolute))
}

fn absolute_all(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    paths.iter().map(|p| absolute(p)).collect()
}

fn run_optimize(config: &mut Config, args: OptimizeArgs, quiet: bool) -> Result<ExitCode> {
    apply_store_args(config, &args.store);
    if let Some(mode) = args.check_mode {
        config.check_mode = mode;
    }
    if let Some(jobs) = args.jobs {
        config.jobs = jobs;
    }
    config.validate()?;

    let gateway = Gateway::shared(config);
    if !gateway.is_available() {
        anyhow::bail!(
            "Image optimizer is not available (enabled = {}); install jpegoptim, pngquant, \
             optipng or gifsicle, or set optimizer.binary_dir",
            config.enabled
        );
    }

    let handler = signal::install_handler()?;
    let store = open_store(config)?;
    let orchestrator = Orchestrator::new(gateway, store, settings_for(config)?);

    let progress = Arc::new(Progress::new(quiet || args.json));
    let spinner = progress.scanning_spinner();
    let scan = scanner::collect_images(
        &absolute_all(&args.paths)?,
        &WalkerConfig::from_settings(&config.scan),
        Some(handler.get_flag()),
    );
    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }
    for error in &scan.errors {
        log::warn!("{}", error);
    }

    if handler.is_shutdown_requested() {
        return Ok(ExitCode::Interrupted);
    }
    if scan.files.is_empty() {
        if !quiet {
            eprintln!("No image files found");
        }
        return Ok(ExitCode::NothingToDo);
    }
    log::info!(
        "Optimizing {} files with {} jobs (check mode: {})",
        scan.files.len(),
        config.jobs,
        config.check_mode
    );

    let summary = BatchRunner::new(&orchestrator, config.jobs)
        .with_shutdown_flag(handler.get_flag())
        .with_progress(progress)
        .run(&scan.files);

    let code = if summary.interrupted {
        ExitCode::Interrupted
    } else if !summary.is_clean() {
        ExitCode::PartialSuccess
    } else {
        ExitCode::Success
    };

    let mut stdout = std::io::stdout().lock();
    if args.json {
        JsonOutput::new(&summary, config.check_mode, code).write_to(&mut stdout)?;
    } else if !quiet {
        TextSummary::new(&summary).write_to(&mut stdout)?;
    }

    Ok(code)
}

fn run_forget(config: &mut Config, args: ForgetArgs, quiet: bool) -> Result<ExitCode> {
    apply_store_args(config, &args.store);

    // Deleting records never needs the optimizer
    let orchestrator = Orchestrator::new(
        Arc::new(Gateway::unavailable()),
        open_store(config)?,
        settings_for(config)?,
    );

    let mut stdout = std::io::stdout().lock();
    let mut missing = 0usize;
    for path in absolute_all(&args.paths)? {
        match orchestrator.forget(&path) {
            Ok(()) => {
                if !quiet {
                    writeln!(stdout, "Forgot {}", path.display())?;
                }
            }
            Err(OptimizeError::RecordNotFound(_)) => {
                missing += 1;
                if !quiet {
                    writeln!(stdout, "No record for {}", path.display())?;
                }
            }
            Err(e) => return Err(e).context("Failed to delete record"),
        }
    }

    Ok(if missing > 0 {
        ExitCode::PartialSuccess
    } else {
        ExitCode::Success
    })
}

fn run_id(config: &Config, args: &IdArgs) -> Result<ExitCode> {
    let root = match &args.root {
        Some(root) => root.clone(),
        None => config.resolved_root()?,
    };
    let root = absolute(&root)?;
    let path = absolute(&args.path)?;

    let relative = fingerprint::relative_path(&root, &path);
    let identifier =
        fingerprint::identifier_for_bytes(fingerprint::relative_bytes(&root, &path));
    println!("{}  {}", identifier, relative);

    Ok(ExitCode::Success)
}

fn run_cache(config: &mut Config, args: &CacheArgs) -> Result<ExitCode> {
    if let Some(database) = &args.database {
        config.database = Some(database.clone());
    }
    let store = open_store(config)?;

    match args.action {
        CacheAction::Stats => {
            let location = store
                .path()
                .map_or_else(|| "(in memory)".to_string(), |p| p.display().to_string());
            println!("Database: {}", location);
            println!("Records:  {}", store.count()?);
            println!("Mode:     {}", config.check_mode);
        }
        CacheAction::Clear => {
            let removed = store.clear()?;
            println!("Removed {} records", removed);
        }
    }

    store.close()?;
    Ok(ExitCode::Success)
}
