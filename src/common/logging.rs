//! Tracing setup: human-readable stderr output plus an optional plain-text
//! log file (`manage_externals.log`) in the root of the tree being managed.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Name of the log file written next to the top-level description.
pub const LOG_FILE_NAME: &str = "manage_externals.log";

/// Logging options derived from the command line.
#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    /// Number of `-v` flags.
    pub verbosity: u8,
    /// Directory that receives the log file; `None` disables file logging.
    pub log_dir: Option<PathBuf>,
}

impl LoggingConfig {
    pub fn new(verbosity: u8) -> Self {
        Self {
            verbosity,
            log_dir: None,
        }
    }

    pub fn with_log_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.log_dir = Some(dir.into());
        self
    }

    /// Default filter directive when `RUST_LOG` is not set.
    pub fn default_directive(&self) -> &'static str {
        match self.verbosity {
            0 => "warn",
            1 => "info",
            _ => "debug",
        }
    }

    fn env_filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.default_directive()))
    }
}

/// Initialize the global subscriber.
///
/// The returned [`WorkerGuard`] must be held until the program exits so the
/// file writer gets flushed.
pub fn init_tracing(config: &LoggingConfig) -> Result<Option<WorkerGuard>> {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_filter(config.env_filter());

    match &config.log_dir {
        Some(dir) => {
            let (writer, guard) = open_log_writer(dir)?;
            let file_layer = tracing_subscriber::fmt::layer()
                .with_ansi(false)
                .with_writer(writer)
                .with_filter(EnvFilter::new("debug"));
            tracing_subscriber::registry()
                .with(stderr_layer)
                .with(file_layer)
                .try_init()
                .context("failed to install tracing subscriber")?;
            Ok(Some(guard))
        }
        None => {
            tracing_subscriber::registry()
                .with(stderr_layer)
                .try_init()
                .context("failed to install tracing subscriber")?;
            Ok(None)
        }
    }
}

/// Truncate and open the log file, returning a non-blocking writer and guard.
fn open_log_writer(dir: &Path) -> Result<(tracing_appender::non_blocking::NonBlocking, WorkerGuard)> {
    let log_path = log_file_path(dir);
    let log_file = fs::File::create(&log_path)
        .with_context(|| format!("failed to create log file: {}", log_path.display()))?;
    Ok(tracing_appender::non_blocking(log_file))
}

pub fn log_file_path(dir: &Path) -> PathBuf {
    dir.join(LOG_FILE_NAME)
}
