use anyhow::Result;

use super::{print_report, OutputFormat};
use crate::application::use_cases::reconcile_externals::{
    ReconcileConfig, ReconcileExternalsUseCase, ReconcileMode,
};
use crate::presentation::ui::StatusReporter;

/// Handler for the status command
///
/// Never modifies the working tree.
pub struct StatusCommand {
    pub config: ReconcileConfig,
    pub reporter: StatusReporter,
    pub format: OutputFormat,
}

impl StatusCommand {
    pub fn new(config: ReconcileConfig, reporter: StatusReporter, format: OutputFormat) -> Self {
        Self {
            config: config.with_mode(ReconcileMode::Status),
            reporter,
            format,
        }
    }

    pub async fn execute(&self) -> Result<i32> {
        let report = ReconcileExternalsUseCase::new(self.config.clone())
            .execute()
            .await?;
        print_report(&self.reporter, self.format, &report)?;
        Ok(report.exit_code())
    }
}
