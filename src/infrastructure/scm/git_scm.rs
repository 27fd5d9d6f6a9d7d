use super::scm_interface::{is_clone_destination, is_nested_checkout, ScmError, ScmOperations};
use crate::domain::value_objects::protocol::Protocol;
use crate::domain::value_objects::repo_ref::{CheckoutTarget, RefDescriptor, RepoRef};
use crate::infrastructure::process::{CommandExecutor, ExecutionConfig, ExecutionResult, DEFAULT_TIMEOUT};
use async_trait::async_trait;
use std::ffi::OsStr;
use std::path::Path;
use std::time::Duration;

/// Git implementation of SCM operations, driving the `git` executable.
#[derive(Debug, Clone)]
pub struct GitScm {
    git_executable: String,
    timeout: Option<Duration>,
}

impl Default for GitScm {
    fn default() -> Self {
        Self {
            git_executable: "git".to_string(),
            timeout: Some(DEFAULT_TIMEOUT),
        }
    }
}

impl GitScm {
    /// Create a new Git SCM instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom executable path
    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.git_executable = executable.into();
        self
    }

    /// Per-command timeout
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    fn config_for(&self, working_dir: &Path) -> ExecutionConfig {
        ExecutionConfig::new()
            .with_working_directory(working_dir)
            .with_timeout(self.timeout)
            .with_environment_variable("GIT_TERMINAL_PROMPT", "0")
    }

    /// Execute a git command in the given directory
    async fn execute_git_command<S: AsRef<OsStr>>(
        &self,
        args: &[S],
        working_dir: &Path,
    ) -> Result<ExecutionResult, ScmError> {
        let result =
            CommandExecutor::execute(&self.git_executable, args, &self.config_for(working_dir))
                .await?;
        Ok(result)
    }

    /// Execute a git command and check for success
    async fn execute_git_command_checked<S: AsRef<OsStr>>(
        &self,
        args: &[S],
        working_dir: &Path,
    ) -> Result<String, ScmError> {
        let result = self.execute_git_command(args, working_dir).await?;
        if !result.success {
            return Err(ScmError::command_failed(
                self.describe(args),
                result.exit_code,
                result.stderr.trim(),
            ));
        }
        Ok(result.stdout.trim().to_string())
    }

    fn describe<S: AsRef<OsStr>>(&self, args: &[S]) -> String {
        let args: Vec<_> = args.iter().map(|a| a.as_ref().to_owned()).collect();
        CommandExecutor::display_command(&self.git_executable, &args)
    }

    /// Resolve `spec` to a commit hash; `None` if it does not name a commit.
    async fn resolve_commit(&self, path: &Path, spec: &str) -> Result<Option<String>, ScmError> {
        let peeled = format!("{spec}^{{commit}}");
        let result = self
            .execute_git_command(&["rev-parse", "--verify", "--quiet", peeled.as_str()], path)
            .await?;
        if result.success {
            Ok(Some(result.stdout.trim().to_string()))
        } else {
            Ok(None)
        }
    }

    /// Name of the remote whose URL is `url`.
    async fn remote_for_url(&self, path: &Path, url: &str) -> Result<Option<String>, ScmError> {
        let result = self
            .execute_git_command(&["config", "--get-regexp", r"^remote\..*\.url$"], path)
            .await?;
        // exit code 1: no remotes configured
        if !result.success {
            if result.exit_code == 1 {
                return Ok(None);
            }
            return Err(ScmError::command_failed(
                "git config --get-regexp remote urls",
                result.exit_code,
                result.stderr.trim(),
            ));
        }
        Ok(parse_remote_urls(&result.stdout)
            .into_iter()
            .find(|(_, remote_url)| same_url(remote_url, url))
            .map(|(name, _)| name))
    }

    async fn require_remote(&self, path: &Path, url: &str) -> Result<String, ScmError> {
        self.remote_for_url(path, url)
            .await?
            .ok_or_else(|| ScmError::NoMatchingRemote {
                path: path.to_path_buf(),
                url: url.to_string(),
            })
    }

    /// Commit `reference` resolves to after any fetch, or the local branch to check out.
    async fn resolve_target(
        &self,
        path: &Path,
        reference: &RepoRef,
        remote: Option<&str>,
    ) -> Result<Resolved, ScmError> {
        let unknown = || ScmError::UnknownReference {
            path: path.to_path_buf(),
            reference: reference.to_string(),
        };
        match reference {
            RepoRef::Tag(tag) => self
                .resolve_commit(path, &format!("refs/tags/{tag}"))
                .await?
                .map(Resolved::Detached)
                .ok_or_else(unknown),
            RepoRef::Hash(hash) => self
                .resolve_commit(path, hash)
                .await?
                .map(Resolved::Detached)
                .ok_or_else(unknown),
            RepoRef::Branch(branch) => {
                // the fetched remote-tracking ref wins over a possibly stale local branch
                if let Some(remote) = remote {
                    if let Some(commit) = self
                        .resolve_commit(path, &format!("refs/remotes/{remote}/{branch}"))
                        .await?
                    {
                        return Ok(Resolved::Detached(commit));
                    }
                }
                self.resolve_commit(path, &format!("refs/heads/{branch}"))
                    .await?
                    .map(|_| Resolved::LocalBranch(branch.clone()))
                    .ok_or_else(unknown)
            }
        }
    }
}

enum Resolved {
    LocalBranch(String),
    Detached(String),
}

#[async_trait]
impl ScmOperations for GitScm {
    fn protocol(&self) -> Protocol {
        Protocol::Git
    }

    fn is_repository(&self, path: &Path) -> bool {
        path.join(".git").exists()
    }

    async fn is_clean(&self, path: &Path) -> Result<bool, ScmError> {
        let output = self
            .execute_git_command_checked(
                &["status", "--porcelain=v1", "-z", "--untracked-files=all"],
                path,
            )
            .await?;
        Ok(porcelain_is_clean(&output, path))
    }

    async fn current_ref(&self, path: &Path) -> Result<RefDescriptor, ScmError> {
        let revision = self
            .execute_git_command_checked(&["rev-parse", "--verify", "HEAD"], path)
            .await?;
        let branch = self
            .execute_git_command(&["symbolic-ref", "--quiet", "--short", "HEAD"], path)
            .await?;
        let descriptor = RefDescriptor::at_revision(revision);
        if branch.success {
            Ok(descriptor.with_branch(branch.stdout.trim()))
        } else {
            Ok(descriptor)
        }
    }

    async fn ref_matches(
        &self,
        path: &Path,
        target: &CheckoutTarget,
        current: &RefDescriptor,
    ) -> Result<bool, ScmError> {
        let expected = match &target.reference {
            RepoRef::Tag(tag) => self.resolve_commit(path, &format!("refs/tags/{tag}")).await?,
            RepoRef::Hash(hash) => self.resolve_commit(path, hash).await?,
            RepoRef::Branch(branch) => {
                if current.branch.as_deref() == Some(branch.as_str()) {
                    return Ok(true);
                }
                if current.branch.is_some() || target.is_local_only() {
                    return Ok(false);
                }
                match self.remote_for_url(path, &target.url).await? {
                    Some(remote) => {
                        self.resolve_commit(path, &format!("refs/remotes/{remote}/{branch}"))
                            .await?
                    }
                    None => None,
                }
            }
        };
        Ok(expected.as_deref() == Some(current.revision.as_str()))
    }

    async fn switch_to(&self, path: &Path, target: &CheckoutTarget) -> Result<(), ScmError> {
        let remote = if target.is_local_only() {
            None
        } else {
            let remote = self.require_remote(path, &target.url).await?;
            tracing::info!(path = %path.display(), remote = %remote, "fetching");
            self.execute_git_command_checked(&["fetch", "--tags", remote.as_str()], path)
                .await?;
            Some(remote)
        };

        match self
            .resolve_target(path, &target.reference, remote.as_deref())
            .await?
        {
            Resolved::LocalBranch(branch) => {
                self.execute_git_command_checked(&["checkout", branch.as_str(), "--"], path)
                    .await?;
            }
            Resolved::Detached(commit) => {
                self.execute_git_command_checked(
                    &["checkout", "--detach", commit.as_str(), "--"],
                    path,
                )
                .await?;
            }
        }
        Ok(())
    }

    async fn clone_repository(&self, target: &CheckoutTarget, path: &Path) -> Result<(), ScmError> {
        if target.is_local_only() {
            return Err(ScmError::invalid_target(format!(
                "cannot clone {} from '.', the repository must already exist",
                path.display()
            )));
        }
        if !is_clone_destination(path) {
            return Err(ScmError::DestinationNotEmpty {
                path: path.to_path_buf(),
            });
        }
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        tokio::fs::create_dir_all(parent).await?;

        let mut args: Vec<&OsStr> = vec![OsStr::new("clone")];
        match &target.reference {
            RepoRef::Tag(name) | RepoRef::Branch(name) => {
                args.push(OsStr::new("--branch"));
                args.push(OsStr::new(name));
            }
            RepoRef::Hash(_) => {}
        }
        args.push(OsStr::new(&target.url));
        args.push(path.as_os_str());

        tracing::info!(url = %target.url, path = %path.display(), "cloning");
        self.execute_git_command_checked(&args, parent).await?;

        if let RepoRef::Hash(hash) = &target.reference {
            let commit = self
                .resolve_target(path, &target.reference, None)
                .await
                .map_err(|_| ScmError::UnknownReference {
                    path: path.to_path_buf(),
                    reference: format!("hash {hash}"),
                })?;
            if let Resolved::Detached(commit) = commit {
                self.execute_git_command_checked(
                    &["checkout", "--detach", commit.as_str(), "--"],
                    path,
                )
                .await?;
            }
        }
        Ok(())
    }

    async fn verbose_status(&self, path: &Path) -> Result<String, ScmError> {
        self.execute_git_command_checked(&["status"], path).await
    }
}

/// Parse `git config --get-regexp` output into `(remote, url)` pairs.
fn parse_remote_urls(output: &str) -> Vec<(String, String)> {
    output
        .lines()
        .filter_map(|line| {
            let (key, url) = line.split_once(char::is_whitespace)?;
            let name = key.strip_prefix("remote.")?.strip_suffix(".url")?;
            Some((name.to_string(), url.trim().to_string()))
        })
        .collect()
}

fn same_url(a: &str, b: &str) -> bool {
    a.trim().trim_end_matches('/') == b.trim().trim_end_matches('/')
}

/// Evaluate `git status --porcelain=v1 -z` output.
///
/// Untracked directories that are working copies of their own are nested
/// externals and do not count.
fn porcelain_is_clean(output: &str, repo: &Path) -> bool {
    let mut records = output.split('\0').filter(|r| !r.is_empty());
    while let Some(record) = records.next() {
        if record.len() < 4 {
            return false;
        }
        let (code, file) = record.split_at(3);
        let xy = &code[..2];
        if xy.starts_with('R') || xy.starts_with('C') {
            // rename/copy records carry the original path as a second field
            records.next();
        }
        if xy == "??" && file.ends_with('/') && is_nested_checkout(&repo.join(file)) {
            continue;
        }
        return false;
    }
    true
}
