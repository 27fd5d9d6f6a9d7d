//! In-memory version control fake.
//!
//! Remote repositories live in memory as a set of files per reference.
//! Working copies are real directories holding a `.git/FAKE_HEAD` file, so
//! the provided `probe`/`checkout` logic of `ScmOperations` runs unchanged.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use manage_externals::domain::value_objects::{CheckoutTarget, Protocol, RefDescriptor, RepoRef};
use manage_externals::infrastructure::scm::scm_interface::{is_clone_destination, is_nested_checkout};
use manage_externals::infrastructure::scm::{ScmError, ScmOperations, ScmProvider};

const HEAD_FILE: &str = "FAKE_HEAD";

type Files = BTreeMap<String, String>;

/// Fake adapter shared by every protocol
#[derive(Clone, Default)]
pub struct FakeScm {
    remotes: Arc<Mutex<HashMap<String, HashMap<RepoRef, Files>>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl FakeScm {
    pub fn new() -> Self {
        Self::default()
    }

    /// Publish `files` as the content of `url` at `reference`.
    pub fn publish(&self, url: &str, reference: RepoRef, files: &[(&str, &str)]) -> &Self {
        let files = files
            .iter()
            .map(|(path, content)| (path.to_string(), content.to_string()))
            .collect();
        self.remotes
            .lock()
            .unwrap()
            .entry(url.to_string())
            .or_default()
            .insert(reference, files);
        self
    }

    /// Recorded mutating calls, e.g. `clone /tmp/x/lib tag v1`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn mutation_count(&self) -> usize {
        self.calls().len()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap().clear();
    }

    pub fn provider(&self) -> Arc<dyn ScmProvider> {
        Arc::new(FakeProvider(self.clone()))
    }

    fn files_for(&self, target: &CheckoutTarget) -> Result<Files, ScmError> {
        let remotes = self.remotes.lock().unwrap();
        let refs = remotes.get(&target.url).ok_or_else(|| {
            ScmError::command_failed(format!("fake clone {}", target.url), 128, "repository not found")
        })?;
        refs.get(&target.reference).cloned().ok_or_else(|| ScmError::UnknownReference {
            path: PathBuf::from(&target.url),
            reference: target.reference.to_string(),
        })
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

/// Reads the recorded head of a fake working copy
pub fn read_head(path: &Path) -> Option<(String, RepoRef)> {
    let text = std::fs::read_to_string(path.join(".git").join(HEAD_FILE)).ok()?;
    let mut lines = text.lines();
    let url = lines.next()?.to_string();
    let kind = lines.next()?;
    let name = lines.next()?.to_string();
    let reference = match kind {
        "tag" => RepoRef::Tag(name),
        "branch" => RepoRef::Branch(name),
        _ => RepoRef::Hash(name),
    };
    Some((url, reference))
}

fn write_checkout(path: &Path, target: &CheckoutTarget, files: &Files) -> std::io::Result<()> {
    std::fs::create_dir_all(path.join(".git"))?;
    for (rel, content) in files {
        let file = path.join(rel);
        if let Some(parent) = file.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(file, content)?;
    }
    let tracked: Vec<&str> = files.keys().map(String::as_str).collect();
    std::fs::write(
        path.join(".git").join(HEAD_FILE),
        format!(
            "{}\n{}\n{}\n{}\n",
            target.url,
            target.reference.kind(),
            target.reference.name(),
            tracked.join("\n")
        ),
    )
}

fn tracked_files(path: &Path) -> Vec<String> {
    std::fs::read_to_string(path.join(".git").join(HEAD_FILE))
        .map(|text| text.lines().skip(3).map(str::to_string).collect())
        .unwrap_or_default()
}

/// Files under `dir` that are not tracked, skipping metadata and nested checkouts.
fn untracked(root: &Path, dir: &Path, tracked: &[String], out: &mut Vec<String>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if entry.file_name() == ".git" || entry.file_name() == ".svn" {
            continue;
        }
        if path.is_dir() {
            if !is_nested_checkout(&path) {
                untracked(root, &path, tracked, out);
            }
            continue;
        }
        let rel = path
            .strip_prefix(root)
            .map(|p| p.to_string_lossy().replace('\\', "/"))
            .unwrap_or_default();
        if !tracked.contains(&rel) {
            out.push(rel);
        }
    }
}

#[async_trait]
impl ScmOperations for FakeScm {
    fn protocol(&self) -> Protocol {
        Protocol::Git
    }

    fn is_repository(&self, path: &Path) -> bool {
        path.join(".git").join(HEAD_FILE).exists()
    }

    async fn is_clean(&self, path: &Path) -> Result<bool, ScmError> {
        Ok(self.verbose_status(path).await?.is_empty())
    }

    async fn current_ref(&self, path: &Path) -> Result<RefDescriptor, ScmError> {
        let (url, reference) = read_head(path).ok_or_else(|| {
            ScmError::command_failed("fake rev-parse", 128, "no HEAD")
        })?;
        let descriptor = RefDescriptor::at_revision(format!("{}-{}", reference.kind(), reference.name()))
            .with_url(url);
        Ok(match reference {
            RepoRef::Branch(name) => descriptor.with_branch(name),
            _ => descriptor,
        })
    }

    async fn ref_matches(
        &self,
        path: &Path,
        target: &CheckoutTarget,
        _current: &RefDescriptor,
    ) -> Result<bool, ScmError> {
        Ok(read_head(path)
            .map(|(url, reference)| url == target.url && reference == target.reference)
            .unwrap_or(false))
    }

    async fn switch_to(&self, path: &Path, target: &CheckoutTarget) -> Result<(), ScmError> {
        let files = self.files_for(target)?;
        self.record(format!("switch {} {}", path.display(), target.reference));
        for old in tracked_files(path) {
            if !files.contains_key(&old) {
                let _ = std::fs::remove_file(path.join(old));
            }
        }
        write_checkout(path, target, &files)?;
        Ok(())
    }

    async fn clone_repository(&self, target: &CheckoutTarget, path: &Path) -> Result<(), ScmError> {
        if !is_clone_destination(path) {
            return Err(ScmError::DestinationNotEmpty {
                path: path.to_path_buf(),
            });
        }
        let files = self.files_for(target)?;
        self.record(format!("clone {} {}", path.display(), target.reference));
        write_checkout(path, target, &files)?;
        Ok(())
    }

    async fn verbose_status(&self, path: &Path) -> Result<String, ScmError> {
        let tracked = tracked_files(path);
        let mut lines = Vec::new();
        for rel in &tracked {
            if !path.join(rel).exists() {
                lines.push(format!(" D {rel}"));
            }
        }
        let mut extra = Vec::new();
        untracked(path, path, &tracked, &mut extra);
        extra.sort();
        lines.extend(extra.into_iter().map(|rel| format!("?? {rel}")));
        Ok(lines.join("\n"))
    }
}

struct FakeProvider(FakeScm);

impl ScmProvider for FakeProvider {
    fn scm_for(&self, protocol: Protocol) -> Option<Arc<dyn ScmOperations>> {
        protocol
            .has_repository()
            .then(|| Arc::new(self.0.clone()) as Arc<dyn ScmOperations>)
    }
}
