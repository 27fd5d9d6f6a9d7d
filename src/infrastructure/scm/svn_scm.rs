use super::scm_interface::{is_clone_destination, is_nested_checkout, ScmError, ScmOperations};
use crate::domain::value_objects::protocol::Protocol;
use crate::domain::value_objects::repo_ref::{CheckoutTarget, RefDescriptor, RepoRef};
use crate::infrastructure::process::{CommandExecutor, ExecutionConfig, DEFAULT_TIMEOUT};
use async_trait::async_trait;
use regex::Regex;
use std::ffi::OsStr;
use std::path::Path;
use std::sync::OnceLock;
use std::time::Duration;

/// SVN implementation of SCM operations
#[derive(Debug, Clone)]
pub struct SvnScm {
    svn_executable: String,
    timeout: Option<Duration>,
    ignore_ancestry: bool,
}

impl Default for SvnScm {
    fn default() -> Self {
        Self {
            svn_executable: "svn".to_string(),
            timeout: Some(DEFAULT_TIMEOUT),
            ignore_ancestry: false,
        }
    }
}

impl SvnScm {
    /// Create a new SVN SCM instance
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a custom executable path
    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.svn_executable = executable.into();
        self
    }

    /// Per-command timeout
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    /// Pass `--ignore-ancestry` to `svn switch`
    pub fn with_ignore_ancestry(mut self, ignore_ancestry: bool) -> Self {
        self.ignore_ancestry = ignore_ancestry;
        self
    }

    /// Execute an svn command and check for success
    async fn execute_svn_command_checked(
        &self,
        args: &[&OsStr],
        working_dir: &Path,
    ) -> Result<String, ScmError> {
        // --non-interactive keeps svn from prompting for credentials
        let mut full_args: Vec<&OsStr> = args.to_vec();
        full_args.push(OsStr::new("--non-interactive"));
        let config = ExecutionConfig::new()
            .with_working_directory(working_dir)
            .with_timeout(self.timeout);
        let result = CommandExecutor::execute(&self.svn_executable, &full_args, &config).await?;
        if !result.success {
            let owned: Vec<_> = full_args.iter().map(|a| a.to_os_string()).collect();
            return Err(ScmError::command_failed(
                CommandExecutor::display_command(&self.svn_executable, &owned),
                result.exit_code,
                result.stderr.trim(),
            ));
        }
        Ok(result.stdout)
    }

    async fn info_item(&self, path: &Path, item: &str) -> Result<String, ScmError> {
        let out = self
            .execute_svn_command_checked(
                &[OsStr::new("info"), OsStr::new("--show-item"), OsStr::new(item), OsStr::new(".")],
                path,
            )
            .await?;
        Ok(out.trim().to_string())
    }
}

/// `repo_url/<branch or tag>`; svn has no notion of a bare hash.
pub fn target_url(target: &CheckoutTarget) -> Result<String, ScmError> {
    match &target.reference {
        RepoRef::Branch(name) | RepoRef::Tag(name) => Ok(format!(
            "{}/{}",
            target.url.trim_end_matches('/'),
            name.trim_start_matches('/')
        )),
        RepoRef::Hash(hash) => Err(ScmError::invalid_target(format!(
            "svn externals cannot be pinned to hash '{hash}'"
        ))),
    }
}

#[async_trait]
impl ScmOperations for SvnScm {
    fn protocol(&self) -> Protocol {
        Protocol::Svn
    }

    fn is_repository(&self, path: &Path) -> bool {
        path.join(".svn").exists()
    }

    async fn is_clean(&self, path: &Path) -> Result<bool, ScmError> {
        let xml = self
            .execute_svn_command_checked(&[OsStr::new("status"), OsStr::new("--xml"), OsStr::new(".")], path)
            .await?;
        Ok(status_xml_is_clean(&xml, path))
    }

    async fn current_ref(&self, path: &Path) -> Result<RefDescriptor, ScmError> {
        let url = self.info_item(path, "url").await?;
        let revision = self.info_item(path, "revision").await?;
        Ok(RefDescriptor::at_revision(revision).with_url(url))
    }

    async fn ref_matches(
        &self,
        _path: &Path,
        target: &CheckoutTarget,
        current: &RefDescriptor,
    ) -> Result<bool, ScmError> {
        let expected = target_url(target)?;
        Ok(current
            .url
            .as_deref()
            .map(|url| url.trim_end_matches('/') == expected.trim_end_matches('/'))
            .unwrap_or(false))
    }

    async fn switch_to(&self, path: &Path, target: &CheckoutTarget) -> Result<(), ScmError> {
        let url = target_url(target)?;
        let mut args = vec![OsStr::new("switch")];
        if self.ignore_ancestry {
            args.push(OsStr::new("--ignore-ancestry"));
        }
        args.push(OsStr::new(&url));
        args.push(OsStr::new("."));
        tracing::info!(path = %path.display(), url = %url, "switching");
        self.execute_svn_command_checked(&args, path).await?;
        Ok(())
    }

    async fn clone_repository(&self, target: &CheckoutTarget, path: &Path) -> Result<(), ScmError> {
        let url = target_url(target)?;
        if !is_clone_destination(path) {
            return Err(ScmError::DestinationNotEmpty {
                path: path.to_path_buf(),
            });
        }
        let parent = path.parent().unwrap_or_else(|| Path::new("."));
        tokio::fs::create_dir_all(parent).await?;
        tracing::info!(url = %url, path = %path.display(), "checking out");
        self.execute_svn_command_checked(
            &[OsStr::new("checkout"), OsStr::new(&url), path.as_os_str()],
            parent,
        )
        .await?;
        Ok(())
    }

    async fn verbose_status(&self, path: &Path) -> Result<String, ScmError> {
        self.execute_svn_command_checked(&[OsStr::new("status"), OsStr::new(".")], path)
            .await
    }
}

fn entry_regex() -> Option<&'static Regex> {
    static ENTRY: OnceLock<Option<Regex>> = OnceLock::new();
    ENTRY
        .get_or_init(|| Regex::new(r#"(?s)<entry\s+path="([^"]*)"\s*>\s*<wc-status([^>]*)>"#).ok())
        .as_ref()
}

fn attribute_regex() -> Option<&'static Regex> {
    static ATTRIBUTE: OnceLock<Option<Regex>> = OnceLock::new();
    ATTRIBUTE
        .get_or_init(|| Regex::new(r#"([\w-]+)="([^"]*)""#).ok())
        .as_ref()
}

/// Evaluate `svn status --xml` output.
///
/// Any reported change to contents or properties is dirty. Externals and
/// nested working copies do not make the parent dirty.
fn status_xml_is_clean(xml: &str, wc_root: &Path) -> bool {
    let (Some(entry), Some(attribute)) = (entry_regex(), attribute_regex()) else {
        return false;
    };
    for caps in entry.captures_iter(xml) {
        let entry_path = &caps[1];
        let mut item = "none";
        let mut props = "none";
        for attr in attribute.captures_iter(caps.get(2).map_or("", |m| m.as_str())) {
            match attr.get(1).map(|m| m.as_str()) {
                Some("item") => item = attr.get(2).map_or("none", |m| m.as_str()),
                Some("props") => props = attr.get(2).map_or("none", |m| m.as_str()),
                _ => {}
            }
        }
        if !matches!(props, "none" | "normal") {
            return false;
        }
        match item {
            "external" | "normal" | "none" => continue,
            "unversioned" if is_nested_checkout(&wc_root.join(entry_path)) => continue,
            _ => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    const CLEAN_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<status>
<target path=".">
<entry path="ext">
<wc-status props="none" item="external">
</wc-status>
</entry>
</target>
</status>"#;

    const DIRTY_XML: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<status>
<target path=".">
<entry path="README">
<wc-status props="none" item="modified" revision="7">
<commit revision="7"><author>dev</author></commit>
</wc-status>
</entry>
</target>
</status>"#;

    #[test]
    fn test_status_xml() {
        let root = Path::new("/nonexistent-wc");
        assert!(status_xml_is_clean(CLEAN_XML, root));
        assert!(!status_xml_is_clean(DIRTY_XML, root));
        assert!(status_xml_is_clean("<status><target path=\".\"></target></status>", root));
    }

    #[test]
    fn test_property_change_is_dirty() {
        let root = Path::new("/nonexistent-wc");
        let props_modified = r#"<status><target path=".">
<entry path="src">
<wc-status props="modified" item="normal" revision="7">
</wc-status>
</entry>
</target></status>"#;
        assert!(!status_xml_is_clean(props_modified, root));
        let props_conflicted = r#"<status><target path="."><entry path="src"><wc-status item="normal" props="conflicted"></wc-status></entry></target></status>"#;
        assert!(!status_xml_is_clean(props_conflicted, root));
        let external = r#"<status><target path="."><entry path="ext"><wc-status item="external" props="none"></wc-status></entry></target></status>"#;
        assert!(status_xml_is_clean(external, root));
    }

    #[test]
    fn test_unversioned_nested_checkout_is_ignored() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("leaf").join(".git")).unwrap();
        let xml = r#"<status><target path="."><entry path="leaf"><wc-status props="none" item="unversioned"></wc-status></entry>
<entry path="notes.txt"><wc-status props="none" item="unversioned"></wc-status></entry></target></status>"#;
        assert!(!status_xml_is_clean(xml, tmp.path()));
        let only_leaf = r#"<status><target path="."><entry path="leaf"><wc-status props="none" item="unversioned"></wc-status></entry></target></status>"#;
        assert!(status_xml_is_clean(only_leaf, tmp.path()));
    }

    #[test]
    fn test_target_url() {
        let tag = CheckoutTarget::new("https://svn.example.org/lib/", RepoRef::Tag("tags/v1".into()));
        assert_eq!(target_url(&tag).unwrap(), "https://svn.example.org/lib/tags/v1");
        let hash = CheckoutTarget::new("https://svn.example.org/lib", RepoRef::Hash("abc".into()));
        assert!(target_url(&hash).is_err());
    }

    #[tokio::test]
    async fn test_ref_matches_compares_urls() {
        let target = CheckoutTarget::new("https://svn.example.org/lib", RepoRef::Branch("trunk".into()));
        let current = RefDescriptor::at_revision("12").with_url("https://svn.example.org/lib/trunk/");
        assert!(SvnScm::new()
            .ref_matches(Path::new("."), &target, &current)
            .await
            .unwrap());
        let other = RefDescriptor::at_revision("12").with_url("https://svn.example.org/lib/tags/v1");
        assert!(!SvnScm::new()
            .ref_matches(Path::new("."), &target, &other)
            .await
            .unwrap());
    }
}
