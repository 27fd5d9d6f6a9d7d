//! Rendering of a reconciliation report for the terminal.
//!
//! Each entity gets a three-character code followed by its path:
//! column 1 is the sync state, column 2 the working copy state and
//! column 3 marks optional entries.

use std::fmt::Write as _;

use colored::{Color, Colorize};

use crate::application::use_cases::reconcile_externals::{
    EntityReport, ReconcileMode, ReconcileReport,
};
use crate::domain::entities::external::{ActionTaken, ExternalStatus};

/// Width of the separator lines around guidance text
const RULE_WIDTH: usize = 70;

/// Renders a [`ReconcileReport`] as text or JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct StatusReporter {
    verbose: bool,
    use_color: bool,
}

impl StatusReporter {
    pub fn new(verbose: bool, use_color: bool) -> Self {
        Self { verbose, use_color }
    }

    /// Sync state column: blank, `s`, `e`, `?` or `!`.
    pub fn sync_code(entity: &EntityReport) -> char {
        match entity.status {
            ExternalStatus::InSync => ' ',
            ExternalStatus::Modified => 's',
            ExternalStatus::Empty => 'e',
            ExternalStatus::Unmanaged => '?',
            ExternalStatus::Error => '!',
            ExternalStatus::Dirty if entity.ref_differs => 's',
            ExternalStatus::Dirty => ' ',
        }
    }

    /// Working copy column: `M` when dirty, `-` when there is nothing to inspect.
    pub fn clean_code(entity: &EntityReport) -> char {
        match entity.status {
            ExternalStatus::Dirty => 'M',
            ExternalStatus::Empty | ExternalStatus::Unmanaged | ExternalStatus::Error => '-',
            ExternalStatus::InSync | ExternalStatus::Modified => ' ',
        }
    }

    pub fn required_code(entity: &EntityReport) -> char {
        if entity.required {
            ' '
        } else {
            'o'
        }
    }

    /// The three-column code for one entity.
    pub fn status_code(entity: &EntityReport) -> String {
        [
            Self::sync_code(entity),
            Self::clean_code(entity),
            Self::required_code(entity),
        ]
        .iter()
        .collect()
    }

    /// Human-readable report.
    pub fn render(&self, report: &ReconcileReport) -> String {
        let mut out = String::new();

        for entity in report.reported() {
            let _ = write!(out, "{} {}", self.status_code_colored(entity), entity.local_path);
            if report.mode == ReconcileMode::Sync && entity.action != ActionTaken::None {
                let _ = write!(out, " ({})", entity.action);
            }
            out.push('\n');

            if self.verbose {
                if let Some(status_output) = verbose_output(entity) {
                    for line in status_output.lines() {
                        let _ = writeln!(out, "    {line}");
                    }
                }
            }
        }

        let errors: Vec<&EntityReport> = report.reported().filter(|e| e.error.is_some()).collect();
        if !errors.is_empty() || !report.problems.is_empty() {
            out.push('\n');
        }
        for entity in errors {
            if let Some(error) = &entity.error {
                let label = format!("{} error", error.category);
                let _ = writeln!(
                    out,
                    "{} at {}: {}",
                    self.paint(&label, Color::Red),
                    entity.local_path,
                    error.message
                );
            }
        }
        for problem in &report.problems {
            let label = format!("{} error", problem.category);
            let _ = writeln!(
                out,
                "{} at {} ('{}' in {}): {}",
                self.paint(&label, Color::Red),
                problem.local_path,
                problem.name,
                problem.description_file.display(),
                problem.message
            );
        }

        if report.aborted || (report.mode == ReconcileMode::Sync && report.needs_attention().next().is_some()) {
            out.push_str(&self.guidance(report));
        }
        out
    }

    /// Machine-readable report.
    pub fn render_json(&self, report: &ReconcileReport) -> serde_json::Result<String> {
        serde_json::to_string_pretty(report)
    }

    fn guidance(&self, report: &ReconcileReport) -> String {
        let rule = "-".repeat(RULE_WIDTH);
        let mut out = String::new();
        let _ = writeln!(out, "\n{rule}");
        if report.aborted {
            let _ = writeln!(
                out,
                "Nothing was updated because some externals are not in a clean state."
            );
        } else {
            let _ = writeln!(out, "Some externals were left untouched because they need attention.");
        }
        let _ = writeln!(
            out,
            "\nExternals marked 'M' have local changes: inspect them with 'git status'\n\
             or 'svn status', then commit, stash or revert the changes and run again.\n\
             Externals marked '?' exist but are not checkouts of the declared repository:\n\
             move them aside and run again to get a fresh checkout.\n\
             Out-of-date externals (marked 's') can also be updated by hand as declared\n\
             in the externals description."
        );
        let _ = writeln!(out, "{rule}");
        out
    }

    fn status_code_colored(&self, entity: &EntityReport) -> String {
        let code = Self::status_code(entity);
        let color = match entity.status {
            ExternalStatus::InSync => return code,
            ExternalStatus::Modified | ExternalStatus::Empty => Color::Yellow,
            ExternalStatus::Dirty | ExternalStatus::Unmanaged | ExternalStatus::Error => Color::Red,
        };
        self.paint(&code, color)
    }

    fn paint(&self, text: &str, color: Color) -> String {
        if self.use_color {
            text.color(color).bold().to_string()
        } else {
            text.to_string()
        }
    }
}

fn verbose_output(entity: &EntityReport) -> Option<&str> {
    match entity.status {
        ExternalStatus::Dirty | ExternalStatus::Unmanaged => entity
            .status_output
            .as_deref()
            .filter(|s| !s.trim().is_empty()),
        _ => None,
    }
}
