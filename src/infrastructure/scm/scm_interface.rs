use crate::domain::entities::repository_state::RepositoryState;
use crate::domain::value_objects::protocol::Protocol;
use crate::domain::value_objects::repo_ref::{CheckoutTarget, RefDescriptor};
use crate::infrastructure::process::CommandExecutorError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};

/// Common interface for the version control systems an external can use.
///
/// Implementors provide the plumbing; `probe` and `checkout` hold the shared
/// rules: look without side effects, and act only on a clean working copy.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ScmOperations: Send + Sync {
    /// Get the protocol this implementation handles
    fn protocol(&self) -> Protocol;

    /// Check if a directory carries this VCS's metadata
    fn is_repository(&self, path: &Path) -> bool;

    /// True when there are no local modifications and no untracked files
    async fn is_clean(&self, path: &Path) -> Result<bool, ScmError>;

    /// Identity of the checked-out revision
    async fn current_ref(&self, path: &Path) -> Result<RefDescriptor, ScmError>;

    /// Whether `current` is what `target` asks for
    async fn ref_matches(
        &self,
        path: &Path,
        target: &CheckoutTarget,
        current: &RefDescriptor,
    ) -> Result<bool, ScmError>;

    /// Move an existing clean working copy to `target`
    async fn switch_to(&self, path: &Path, target: &CheckoutTarget) -> Result<(), ScmError>;

    /// Create a new working copy of `target` at `path`
    async fn clone_repository(&self, target: &CheckoutTarget, path: &Path)
        -> Result<(), ScmError>;

    /// Raw, human-readable status text
    async fn verbose_status(&self, path: &Path) -> Result<String, ScmError>;

    /// Observe `path` without modifying it.
    ///
    /// Absence is reported through the returned state, never as an error.
    async fn probe(&self, path: &Path, target: &CheckoutTarget) -> RepositoryState {
        if !path.exists() {
            return RepositoryState::absent();
        }
        if !self.is_repository(path) {
            return RepositoryState::unmanaged(format!(
                "{} exists but is not a {} working copy",
                path.display(),
                self.protocol()
            ));
        }
        let clean = match self.is_clean(path).await {
            Ok(clean) => clean,
            Err(e) => return RepositoryState::failed(true, true, e.to_string()),
        };
        let current = match self.current_ref(path).await {
            Ok(current) => current,
            Err(e) => return RepositoryState::failed(true, true, e.to_string()),
        };
        let matches = match self.ref_matches(path, target, &current).await {
            Ok(matches) => matches,
            Err(e) => return RepositoryState::failed(true, true, e.to_string()),
        };
        let state = RepositoryState::managed(clean, current, matches);
        if clean {
            return state;
        }
        match self.verbose_status(path).await {
            Ok(output) => state.with_status_output(output),
            Err(_) => state,
        }
    }

    /// Bring `path` to `target`: clone when absent, otherwise switch.
    ///
    /// Cleanliness is re-checked right before switching; nothing is ever forced.
    async fn checkout(&self, path: &Path, target: &CheckoutTarget) -> Result<(), ScmError> {
        if !path.exists() {
            return self.clone_repository(target, path).await;
        }
        if !self.is_repository(path) {
            return Err(ScmError::NotARepository {
                path: path.to_path_buf(),
                protocol: self.protocol(),
            });
        }
        if !self.is_clean(path).await? {
            let status_output = self.verbose_status(path).await.unwrap_or_default();
            return Err(ScmError::NotClean {
                path: path.to_path_buf(),
                status_output,
            });
        }
        self.switch_to(path, target).await
    }
}

/// Broad failure classes for adapter errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScmErrorKind {
    /// The VCS tool failed, was missing, or timed out
    Tool,
    /// The working copy is not in a state that allows the operation
    Precondition,
}

/// Errors that can occur during SCM operations
#[derive(Debug, thiserror::Error)]
pub enum ScmError {
    #[error("SCM executable not found: {executable}")]
    ExecutableNotFound { executable: String },

    #[error("Command execution failed: {command}, exit code: {exit_code}, stderr: {stderr}")]
    CommandFailed {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("'{command}' timed out after {timeout_seconds} seconds")]
    Timeout {
        command: String,
        timeout_seconds: u64,
    },

    #[error("{} exists but is not a {protocol} working copy", path.display())]
    NotARepository { path: PathBuf, protocol: Protocol },

    #[error("{} has local modifications or untracked files", path.display())]
    NotClean {
        path: PathBuf,
        status_output: String,
    },

    #[error("destination {} exists and is not empty", path.display())]
    DestinationNotEmpty { path: PathBuf },

    #[error("no remote of {} points at {url}; add one manually", path.display())]
    NoMatchingRemote { path: PathBuf, url: String },

    #[error("reference '{reference}' does not exist in {}", path.display())]
    UnknownReference { path: PathBuf, reference: String },

    #[error("Invalid checkout target: {message}")]
    InvalidTarget { message: String },

    #[error("IO error: {source}")]
    IoError {
        #[from]
        source: std::io::Error,
    },
}

impl ScmError {
    /// Create a command failed error
    pub fn command_failed(command: impl Into<String>, exit_code: i32, stderr: impl Into<String>) -> Self {
        Self::CommandFailed {
            command: command.into(),
            exit_code,
            stderr: stderr.into(),
        }
    }

    /// Create an invalid target error
    pub fn invalid_target(message: impl Into<String>) -> Self {
        Self::InvalidTarget {
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ScmErrorKind {
        match self {
            ScmError::NotARepository { .. }
            | ScmError::NotClean { .. }
            | ScmError::DestinationNotEmpty { .. }
            | ScmError::NoMatchingRemote { .. }
            | ScmError::UnknownReference { .. }
            | ScmError::InvalidTarget { .. } => ScmErrorKind::Precondition,
            ScmError::ExecutableNotFound { .. }
            | ScmError::CommandFailed { .. }
            | ScmError::Timeout { .. }
            | ScmError::IoError { .. } => ScmErrorKind::Tool,
        }
    }

    /// Raw status text captured alongside a cleanliness failure.
    pub fn status_output(&self) -> Option<&str> {
        match self {
            ScmError::NotClean { status_output, .. } if !status_output.is_empty() => {
                Some(status_output)
            }
            _ => None,
        }
    }
}

impl From<CommandExecutorError> for ScmError {
    fn from(error: CommandExecutorError) -> Self {
        match error {
            CommandExecutorError::NotFound { program } => ScmError::ExecutableNotFound {
                executable: program,
            },
            CommandExecutorError::Timeout {
                command,
                timeout_seconds,
            } => ScmError::Timeout {
                command,
                timeout_seconds,
            },
            CommandExecutorError::SpawnFailed { source, .. } => ScmError::IoError { source },
            CommandExecutorError::MissingWorkingDirectory(path) => ScmError::IoError {
                source: std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("working directory {} does not exist", path.display()),
                ),
            },
        }
    }
}

/// A destination a clone may write into: absent, or an empty directory.
pub fn is_clone_destination(path: &Path) -> bool {
    match std::fs::read_dir(path) {
        Ok(mut entries) => entries.next().is_none(),
        Err(_) => !path.exists(),
    }
}

/// Whether an untracked directory is itself a working copy (a nested external).
pub fn is_nested_checkout(path: &Path) -> bool {
    crate::domain::value_objects::protocol::METADATA_DIRS
        .iter()
        .any(|dir| path.join(dir).exists())
}
