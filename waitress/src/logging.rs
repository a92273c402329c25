//! Console + per-run log file tracing setup.

use anyhow::{Context, Result};
use chrono::Local;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use waitress_core::export::file_timestamp;

/// Install the global subscriber: one console layer and one plain-text layer writing to
/// `<log_dir>/logs_<timestamp>.log`. `RUST_LOG` overrides the level chosen by `verbose`.
///
/// Returns the path of the log file.
pub fn init(verbose: bool, log_dir: &Path) -> Result<PathBuf> {
    std::fs::create_dir_all(log_dir)
        .with_context(|| format!("cannot create log directory {}", log_dir.display()))?;
    let path = log_dir.join(format!("logs_{}.log", file_timestamp(Local::now())));
    let file = File::create(&path)
        .with_context(|| format!("cannot create log file {}", path.display()))?;

    let level = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("warn,waitress={level},waitress_core={level}")));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false))
        .with(fmt::layer().with_ansi(false).with_writer(Mutex::new(file)))
        .try_init()
        .context("tracing subscriber already installed")?;
    Ok(path)
}
