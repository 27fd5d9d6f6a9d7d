use anyhow::Result;
use colored::Colorize;

use super::{print_report, OutputFormat};
use crate::application::use_cases::reconcile_externals::{
    ReconcileConfig, ReconcileExternalsUseCase, ReconcileMode,
};
use crate::presentation::ui::StatusReporter;

/// Handler for the sync command
pub struct SyncCommand {
    pub config: ReconcileConfig,
    pub reporter: StatusReporter,
    pub format: OutputFormat,
}

impl SyncCommand {
    pub fn new(config: ReconcileConfig, reporter: StatusReporter, format: OutputFormat) -> Self {
        Self {
            config: config.with_mode(ReconcileMode::Sync),
            reporter,
            format,
        }
    }

    /// Run the sync and return the process exit code.
    pub async fn execute(&self) -> Result<i32> {
        let use_case = ReconcileExternalsUseCase::new(self.config.clone());

        if self.format == OutputFormat::Text {
            eprintln!(
                "{} Checking out externals from {}",
                "::".blue().bold(),
                self.config.description_path().display()
            );
        }

        let report = use_case.execute().await?;
        print_report(&self.reporter, self.format, &report)?;

        if self.format == OutputFormat::Text {
            if report.is_success() {
                eprintln!(
                    "{} {} external(s) updated",
                    "✓".green().bold(),
                    report.mutation_count()
                );
            } else {
                eprintln!("{} Some externals are not in sync", "⚠".yellow().bold());
            }
        }
        Ok(report.exit_code())
    }
}
