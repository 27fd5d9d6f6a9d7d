use super::git_scm::GitScm;
use super::scm_interface::{ScmError, ScmOperations};
use super::svn_scm::SvnScm;
use crate::domain::value_objects::protocol::Protocol;
use crate::domain::value_objects::repo_ref::{CheckoutTarget, RefDescriptor};
use crate::infrastructure::process::DEFAULT_TIMEOUT;
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

/// The concrete adapters, selected by protocol.
#[derive(Debug, Clone)]
pub enum Scm {
    Git(GitScm),
    Svn(SvnScm),
}

#[async_trait]
impl ScmOperations for Scm {
    fn protocol(&self) -> Protocol {
        match self {
            Scm::Git(git) => git.protocol(),
            Scm::Svn(svn) => svn.protocol(),
        }
    }

    fn is_repository(&self, path: &Path) -> bool {
        match self {
            Scm::Git(git) => git.is_repository(path),
            Scm::Svn(svn) => svn.is_repository(path),
        }
    }

    async fn is_clean(&self, path: &Path) -> Result<bool, ScmError> {
        match self {
            Scm::Git(git) => git.is_clean(path).await,
            Scm::Svn(svn) => svn.is_clean(path).await,
        }
    }

    async fn current_ref(&self, path: &Path) -> Result<RefDescriptor, ScmError> {
        match self {
            Scm::Git(git) => git.current_ref(path).await,
            Scm::Svn(svn) => svn.current_ref(path).await,
        }
    }

    async fn ref_matches(
        &self,
        path: &Path,
        target: &CheckoutTarget,
        current: &RefDescriptor,
    ) -> Result<bool, ScmError> {
        match self {
            Scm::Git(git) => git.ref_matches(path, target, current).await,
            Scm::Svn(svn) => svn.ref_matches(path, target, current).await,
        }
    }

    async fn switch_to(&self, path: &Path, target: &CheckoutTarget) -> Result<(), ScmError> {
        match self {
            Scm::Git(git) => git.switch_to(path, target).await,
            Scm::Svn(svn) => svn.switch_to(path, target).await,
        }
    }

    async fn clone_repository(&self, target: &CheckoutTarget, path: &Path) -> Result<(), ScmError> {
        match self {
            Scm::Git(git) => git.clone_repository(target, path).await,
            Scm::Svn(svn) => svn.clone_repository(target, path).await,
        }
    }

    async fn verbose_status(&self, path: &Path) -> Result<String, ScmError> {
        match self {
            Scm::Git(git) => git.verbose_status(path).await,
            Scm::Svn(svn) => svn.verbose_status(path).await,
        }
    }
}

/// Source of adapters for the application layer.
pub trait ScmProvider: Send + Sync {
    /// Adapter for `protocol`; `None` for protocols without a repository.
    fn scm_for(&self, protocol: Protocol) -> Option<Arc<dyn ScmOperations>>;
}

/// Options shared by every adapter the factory builds.
#[derive(Debug, Clone)]
pub struct ScmOptions {
    pub git_executable: String,
    pub svn_executable: String,
    pub timeout: Option<Duration>,
    pub svn_ignore_ancestry: bool,
}

impl Default for ScmOptions {
    fn default() -> Self {
        Self {
            git_executable: "git".to_string(),
            svn_executable: "svn".to_string(),
            timeout: Some(DEFAULT_TIMEOUT),
            svn_ignore_ancestry: false,
        }
    }
}

impl ScmOptions {
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_svn_ignore_ancestry(mut self, ignore: bool) -> Self {
        self.svn_ignore_ancestry = ignore;
        self
    }
}

/// Factory for creating SCM implementation instances
#[derive(Debug, Clone, Default)]
pub struct ScmFactory {
    options: ScmOptions,
}

impl ScmFactory {
    pub fn new(options: ScmOptions) -> Self {
        Self { options }
    }

    /// Create the adapter for the given protocol
    pub fn create_scm(&self, protocol: Protocol) -> Option<Scm> {
        match protocol {
            Protocol::Git => Some(Scm::Git(
                GitScm::new()
                    .with_executable(&self.options.git_executable)
                    .with_timeout(self.options.timeout),
            )),
            Protocol::Svn => Some(Scm::Svn(
                SvnScm::new()
                    .with_executable(&self.options.svn_executable)
                    .with_timeout(self.options.timeout)
                    .with_ignore_ancestry(self.options.svn_ignore_ancestry),
            )),
            Protocol::ExternalsOnly => None,
        }
    }

    /// Detect the protocol of an existing working copy
    pub fn detect_protocol(path: &Path) -> Option<Protocol> {
        [Protocol::Git, Protocol::Svn].into_iter().find(|protocol| {
            protocol
                .metadata_dir()
                .map(|dir| path.join(dir).exists())
                .unwrap_or(false)
        })
    }
}

impl ScmProvider for ScmFactory {
    fn scm_for(&self, protocol: Protocol) -> Option<Arc<dyn ScmOperations>> {
        self.create_scm(protocol)
            .map(|scm| Arc::new(scm) as Arc<dyn ScmOperations>)
    }
}
