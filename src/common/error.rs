use std::fmt;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;

use crate::infrastructure::scm::scm_interface::{ScmError, ScmErrorKind};

/// A malformed or unsupported externals description.
///
/// Always fatal when raised for the top-level description: the run stops
/// before any VCS interaction.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{}{}: {message}", .file.display(), line_suffix(.line))]
pub struct ConfigError {
    pub file: PathBuf,
    pub line: Option<usize>,
    pub message: String,
}

impl ConfigError {
    pub fn new(file: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self {
            file: file.as_ref().to_path_buf(),
            line: None,
            message: message.into(),
        }
    }

    pub fn at_line(file: impl AsRef<Path>, line: usize, message: impl Into<String>) -> Self {
        Self {
            file: file.as_ref().to_path_buf(),
            line: Some(line),
            message: message.into(),
        }
    }

    /// Attach a line number when the dialect could attribute one.
    pub fn with_line(mut self, line: Option<usize>) -> Self {
        if line.is_some() {
            self.line = line;
        }
        self
    }
}

fn line_suffix(line: &Option<usize>) -> String {
    line.map(|line| format!(":{line}")).unwrap_or_default()
}

/// Error categories surfaced in reconciliation reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCategory {
    Config,
    Adapter,
    Precondition,
    Collision,
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorCategory::Config => "config",
            ErrorCategory::Adapter => "adapter",
            ErrorCategory::Precondition => "precondition",
            ErrorCategory::Collision => "collision",
        };
        f.write_str(name)
    }
}

#[derive(Error, Debug)]
pub enum ExternalsError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Repository operation failed for {local_path}: {source}")]
    Adapter {
        local_path: String,
        #[source]
        source: ScmError,
    },

    #[error("Could not inspect {local_path}: {message}")]
    ProbeFailed { local_path: String, message: String },

    #[error("Refusing to touch {local_path}: {message}")]
    Precondition {
        local_path: String,
        message: String,
        status_output: Option<String>,
    },

    #[error("Path {local_path} is already claimed by {owner}")]
    Collision { local_path: String, owner: String },

    #[error("File system operation failed: {message}")]
    FileSystemError {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    #[error("Internal error: {message}")]
    InternalError { message: String },
}

impl ExternalsError {
    /// Wrap an adapter failure, promoting precondition failures to their own category.
    pub fn from_scm(local_path: impl Into<String>, source: ScmError) -> Self {
        let local_path = local_path.into();
        match source.kind() {
            ScmErrorKind::Precondition => Self::Precondition {
                local_path,
                message: source.to_string(),
                status_output: source.status_output().map(str::to_string),
            },
            ScmErrorKind::Tool => Self::Adapter { local_path, source },
        }
    }

    pub fn probe_failed(local_path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ProbeFailed {
            local_path: local_path.into(),
            message: message.into(),
        }
    }

    pub fn precondition(
        local_path: impl Into<String>,
        message: impl Into<String>,
        status_output: Option<String>,
    ) -> Self {
        Self::Precondition {
            local_path: local_path.into(),
            message: message.into(),
            status_output,
        }
    }

    pub fn collision(local_path: impl Into<String>, owner: impl Into<String>) -> Self {
        Self::Collision {
            local_path: local_path.into(),
            owner: owner.into(),
        }
    }

    pub fn filesystem_error_with_source(
        message: impl Into<String>,
        path: Option<PathBuf>,
        source: std::io::Error,
    ) -> Self {
        Self::FileSystemError {
            message: message.into(),
            path,
            source: Some(source),
        }
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::InternalError {
            message: message.into(),
        }
    }

    /// Reporting category. File system and internal failures count as adapter failures.
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Config(_) => ErrorCategory::Config,
            Self::Adapter { .. }
            | Self::ProbeFailed { .. }
            | Self::FileSystemError { .. }
            | Self::InternalError { .. } => ErrorCategory::Adapter,
            Self::Precondition { .. } => ErrorCategory::Precondition,
            Self::Collision { .. } => ErrorCategory::Collision,
        }
    }

    /// Raw VCS status text captured when a precondition failed.
    pub fn status_output(&self) -> Option<&str> {
        match self {
            Self::Precondition { status_output, .. } => status_output.as_deref(),
            _ => None,
        }
    }

    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Config(_))
    }
}
