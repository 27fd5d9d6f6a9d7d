pub mod status;
pub mod sync;

pub use status::StatusCommand;
pub use sync::SyncCommand;

use anyhow::{Context, Result};
use clap::ValueEnum;

use crate::application::use_cases::ReconcileReport;
use crate::presentation::ui::StatusReporter;

/// Output format options for reports
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output (default)
    #[default]
    Text,
    /// JSON output
    Json,
}

/// Print a report to stdout in the requested format.
pub(crate) fn print_report(
    reporter: &StatusReporter,
    format: OutputFormat,
    report: &ReconcileReport,
) -> Result<()> {
    match format {
        OutputFormat::Text => print!("{}", reporter.render(report)),
        OutputFormat::Json => {
            let json = reporter
                .render_json(report)
                .context("failed to serialize report")?;
            println!("{json}");
        }
    }
    Ok(())
}
