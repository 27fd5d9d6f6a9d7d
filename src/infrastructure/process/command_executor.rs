use std::collections::HashMap;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::process::Command as TokioCommand;
use tokio::time::timeout;

/// Default per-subprocess timeout.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Command executor errors
#[derive(Debug, Error)]
pub enum CommandExecutorError {
    #[error("Executable not found: {program}")]
    NotFound { program: String },

    #[error("'{command}' timed out after {timeout_seconds} seconds")]
    Timeout {
        command: String,
        timeout_seconds: u64,
    },

    #[error("Process spawn failed for '{command}': {source}")]
    SpawnFailed {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Working directory does not exist: {}", .0.display())]
    MissingWorkingDirectory(PathBuf),
}

/// Configuration for command execution
#[derive(Debug, Clone)]
pub struct ExecutionConfig {
    /// Working directory for command execution
    pub working_directory: Option<PathBuf>,

    /// Environment variables to set for the process
    pub environment_variables: HashMap<String, String>,

    /// Upper bound on wall-clock time; the child is killed when it expires
    pub timeout: Option<Duration>,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        Self {
            working_directory: None,
            environment_variables: HashMap::new(),
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }
}

impl ExecutionConfig {
    /// Create a new execution config
    pub fn new() -> Self {
        Self::default()
    }

    /// Set working directory
    pub fn with_working_directory<P: AsRef<Path>>(mut self, dir: P) -> Self {
        self.working_directory = Some(dir.as_ref().to_path_buf());
        self
    }

    /// Add environment variable
    pub fn with_environment_variable(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.environment_variables.insert(key.into(), value.into());
        self
    }

    /// Set timeout
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Result of command execution
#[derive(Debug, Clone)]
pub struct ExecutionResult {
    /// Exit code of the process (-1 when killed by a signal)
    pub exit_code: i32,

    /// Standard output
    pub stdout: String,

    /// Standard error output
    pub stderr: String,

    /// Execution time in milliseconds
    pub execution_time_ms: u64,

    /// Whether the command was successful (exit code 0)
    pub success: bool,
}

impl ExecutionResult {
    /// Create a new execution result
    pub fn new(exit_code: i32, stdout: String, stderr: String, execution_time_ms: u64) -> Self {
        Self {
            exit_code,
            stdout,
            stderr,
            execution_time_ms,
            success: exit_code == 0,
        }
    }
}

/// Command executor for running external processes
pub struct CommandExecutor;

impl CommandExecutor {
    /// Run `program` with `args` and capture its output.
    ///
    /// A non-zero exit is not an error here; callers decide what it means.
    pub async fn execute<I, S>(
        program: &str,
        args: I,
        config: &ExecutionConfig,
    ) -> Result<ExecutionResult, CommandExecutorError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let start_time = Instant::now();
        let args: Vec<std::ffi::OsString> = args.into_iter().map(|a| a.as_ref().to_owned()).collect();
        let command_line = Self::display_command(program, &args);

        let mut cmd = TokioCommand::new(program);
        cmd.args(&args);

        if let Some(working_dir) = &config.working_directory {
            if !working_dir.is_dir() {
                return Err(CommandExecutorError::MissingWorkingDirectory(
                    working_dir.clone(),
                ));
            }
            cmd.current_dir(working_dir);
        }
        for (key, value) in &config.environment_variables {
            cmd.env(key, value);
        }

        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());
        cmd.stdin(Stdio::null());
        cmd.kill_on_drop(true);

        tracing::debug!(
            command = %command_line,
            cwd = ?config.working_directory,
            "running subprocess"
        );

        let child = cmd.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CommandExecutorError::NotFound {
                    program: program.to_string(),
                }
            } else {
                CommandExecutorError::SpawnFailed {
                    command: command_line.clone(),
                    source: e,
                }
            }
        })?;

        let output = match config.timeout {
            Some(limit) => match timeout(limit, child.wait_with_output()).await {
                Ok(output) => output,
                Err(_) => {
                    // Dropping the future drops the child, which kills it.
                    tracing::warn!(command = %command_line, "subprocess timed out");
                    return Err(CommandExecutorError::Timeout {
                        command: command_line,
                        timeout_seconds: limit.as_secs(),
                    });
                }
            },
            None => child.wait_with_output().await,
        }
        .map_err(|e| CommandExecutorError::SpawnFailed {
            command: command_line.clone(),
            source: e,
        })?;

        let execution_time = start_time.elapsed().as_millis() as u64;
        let result = ExecutionResult::new(
            output.status.code().unwrap_or(-1),
            String::from_utf8_lossy(&output.stdout).into_owned(),
            String::from_utf8_lossy(&output.stderr).into_owned(),
            execution_time,
        );
        tracing::debug!(
            command = %command_line,
            exit_code = result.exit_code,
            elapsed_ms = execution_time,
            "subprocess finished"
        );
        Ok(result)
    }

    /// Human-readable command line for logs and error messages.
    pub fn display_command(program: &str, args: &[std::ffi::OsString]) -> String {
        let mut line = program.to_string();
        for arg in args {
            line.push(' ');
            line.push_str(&arg.to_string_lossy());
        }
        line
    }
}
