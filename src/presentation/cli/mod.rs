pub mod commands;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use colored::Colorize;

use crate::application::use_cases::ReconcileConfig;
use crate::common::logging::{init_tracing, LoggingConfig};
use crate::infrastructure::filesystem::DEFAULT_DESCRIPTION_FILE;
use crate::presentation::ui::StatusReporter;
pub use commands::OutputFormat;
use commands::{StatusCommand, SyncCommand};

/// Exit code for configuration and other fatal errors
pub const EXIT_FATAL: i32 = 2;

const VERSION: &str = concat!(
    env!("CARGO_PKG_VERSION"),
    " (",
    env!("GIT_HASH"),
    " ",
    env!("BUILD_DATE"),
    ")"
);

/// checkout_externals - bring a source tree in line with its externals description
#[derive(Debug, Parser)]
#[command(name = "checkout_externals")]
#[command(about = "Check out or report on the external repositories of a source tree")]
#[command(long_about = "Reads the externals description at the root of a source tree and \
clones or switches every external to the declared tag, branch or hash. Externals with local \
changes are never touched; they are reported so they can be resolved with git or svn.")]
#[command(version = VERSION)]
#[command(propagate_version = true)]
#[command(subcommand_precedence_over_arg = true)]
pub struct Cli {
    /// Externals description file, relative to the root directory
    #[arg(short = 'e', long = "externals", env = "EXTERNALS_FILE", global = true,
          default_value = DEFAULT_DESCRIPTION_FILE)]
    pub externals: PathBuf,

    /// Also process externals marked as optional
    #[arg(short, long, global = true)]
    pub optional: bool,

    /// Externals to process in parallel per level (0 = number of CPUs)
    #[arg(short, long, env = "EXTERNALS_JOBS", global = true, default_value_t = 1)]
    pub jobs: usize,

    /// Timeout in seconds for each git/svn command (0 = no timeout)
    #[arg(long, env = "EXTERNALS_TIMEOUT", global = true, default_value_t = 300)]
    pub timeout: u64,

    /// Treat duplicate local paths in one description file as an error
    #[arg(long, global = true)]
    pub strict: bool,

    /// Do not update anything if any external is dirty or unmanaged
    #[arg(long, global = true)]
    pub all_or_nothing: bool,

    /// Pass --ignore-ancestry to svn switch
    #[arg(long, global = true)]
    pub svn_ignore_ancestry: bool,

    /// Increase output verbosity (-v info, -vv debug); also shows raw VCS status
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Do not write manage_externals.log
    #[arg(long, global = true)]
    pub no_logging: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Root of the source tree (defaults to current directory)
    #[arg(short = 'C', long, global = true)]
    pub directory: Option<PathBuf>,

    /// Output format
    #[arg(long, value_enum, global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Externals of the top-level description to process (default: all)
    ///
    /// Naming an optional external processes it without -o.
    #[arg(value_name = "COMPONENT")]
    pub components: Vec<String>,

    /// Externals of the top-level description to leave alone
    #[arg(short = 'x', long, value_name = "COMPONENT", global = true)]
    pub exclude: Vec<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Subcommand)]
pub enum Commands {
    /// Clone or switch externals to the declared references (default)
    Sync,

    /// Report the state of every external without changing anything
    Status,
}

impl Cli {
    /// Root directory of the source tree
    pub fn root_dir(&self) -> Result<PathBuf> {
        match &self.directory {
            Some(dir) => Ok(dir.clone()),
            None => std::env::current_dir().context("cannot determine current directory"),
        }
    }

    /// Effective number of parallel jobs
    pub fn effective_jobs(&self) -> usize {
        if self.jobs == 0 {
            num_cpus::get()
        } else {
            self.jobs
        }
    }

    /// Only sync writes manage_externals.log; status leaves the tree untouched.
    pub fn writes_log_file(&self) -> bool {
        !self.no_logging && self.command != Some(Commands::Status)
    }

    /// Build the reconciliation settings from the flags
    pub fn reconcile_config(&self) -> Result<ReconcileConfig> {
        let timeout = (self.timeout > 0).then(|| Duration::from_secs(self.timeout));
        Ok(ReconcileConfig::new(self.root_dir()?)
            .with_description_file(&self.externals)
            .with_include_optional(self.optional)
            .with_jobs(self.effective_jobs())
            .with_timeout(timeout)
            .with_strict(self.strict)
            .with_all_or_nothing(self.all_or_nothing)
            .with_svn_ignore_ancestry(self.svn_ignore_ancestry)
            .with_components(self.components.clone())
            .with_exclude(self.exclude.clone()))
    }
}

/// CLI application runner
pub struct CliApp {
    cli: Cli,
}

impl CliApp {
    pub fn new() -> Self {
        Self { cli: Cli::parse() }
    }

    pub fn from_cli(cli: Cli) -> Self {
        Self { cli }
    }

    /// Run the selected command and return the process exit code.
    pub async fn run(self) -> i32 {
        colored::control::set_override(!self.cli.no_color);

        // The guard flushes the log file when dropped at the end of this function
        let _guard = self.init_logging();

        match self.handle_command().await {
            Ok(code) => code,
            Err(e) => {
                tracing::error!(error = %e, "checkout_externals failed");
                eprintln!("{} {:#}", "Error:".red().bold(), e);
                EXIT_FATAL
            }
        }
    }

    fn init_logging(&self) -> Option<tracing_appender::non_blocking::WorkerGuard> {
        let mut config = LoggingConfig::new(self.cli.verbose);
        if self.cli.writes_log_file() {
            if let Ok(root) = self.cli.root_dir() {
                config = config.with_log_dir(root);
            }
        }
        match init_tracing(&config) {
            Ok(guard) => guard,
            Err(e) => {
                eprintln!("{} {:#}; logging to stderr only", "Warning:".yellow().bold(), e);
                init_tracing(&LoggingConfig::new(self.cli.verbose)).ok().flatten()
            }
        }
    }

    async fn handle_command(&self) -> Result<i32> {
        let config = self.cli.reconcile_config()?;
        let reporter = StatusReporter::new(self.cli.verbose > 0, !self.cli.no_color);
        tracing::info!(
            version = VERSION,
            root = %config.root_dir.display(),
            "starting checkout_externals"
        );

        match self.cli.command.unwrap_or(Commands::Sync) {
            Commands::Sync => {
                SyncCommand::new(config, reporter, self.cli.format)
                    .execute()
                    .await
            }
            Commands::Status => {
                StatusCommand::new(config, reporter, self.cli.format)
                    .execute()
                    .await
            }
        }
    }
}
