//! Source tree fixtures
//!
//! Helpers to write externals descriptions into temporary directories and
//! to run the reconciliation use case against the in-memory fake.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use manage_externals::application::use_cases::reconcile_externals::{
    ReconcileConfig, ReconcileExternalsError, ReconcileExternalsUseCase, ReconcileMode,
    ReconcileReport,
};
use tempfile::TempDir;

use super::fake_scm::FakeScm;

pub const HEADER: &str = "[externals_description]\nschema_version = 1.1.0\n";

/// One git entry in cfg syntax. `reference` is e.g. `tag = v1.0`.
pub fn git_entry(name: &str, local_path: &str, url: &str, reference: &str, required: bool) -> String {
    format!(
        "\n[{name}]\nprotocol = git\nrepo_url = {url}\n{reference}\nlocal_path = {local_path}\nrequired = {}\n",
        if required { "True" } else { "False" }
    )
}

/// A git entry that declares a nested description.
pub fn git_entry_with_externals(
    name: &str,
    local_path: &str,
    url: &str,
    reference: &str,
    externals: &str,
) -> String {
    format!("{}externals = {externals}\n", git_entry(name, local_path, url, reference, true))
}

/// A complete description built from entries
pub fn description(entries: &[String]) -> String {
    let mut text = HEADER.to_string();
    for entry in entries {
        text.push_str(entry);
    }
    text
}

/// A temporary source tree with a top-level `Externals.cfg`
pub struct SourceTreeFixture {
    pub dir: TempDir,
}

impl SourceTreeFixture {
    pub fn new(description: &str) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        std::fs::write(dir.path().join("Externals.cfg"), description)
            .expect("Failed to write description");
        Self { dir }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn join(&self, rel: &str) -> PathBuf {
        self.dir.path().join(rel)
    }

    pub fn write(&self, rel: &str, content: &str) {
        let path = self.join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create directory");
        }
        std::fs::write(path, content).expect("Failed to write file");
    }

    pub fn config(&self, mode: ReconcileMode) -> ReconcileConfig {
        ReconcileConfig::new(self.path()).with_mode(mode)
    }

    pub async fn run(&self, fake: &FakeScm, mode: ReconcileMode) -> ReconcileReport {
        self.run_with(fake, self.config(mode))
            .await
            .expect("reconciliation should not fail with a config error")
    }

    pub async fn run_with(
        &self,
        fake: &FakeScm,
        config: ReconcileConfig,
    ) -> Result<ReconcileReport, ReconcileExternalsError> {
        ReconcileExternalsUseCase::new(config)
            .with_provider(fake.provider())
            .execute()
            .await
    }

    /// Every file below the root with its content, for before/after comparisons.
    pub fn snapshot(&self) -> BTreeMap<String, String> {
        let mut files = BTreeMap::new();
        collect(self.path(), self.path(), &mut files);
        files
    }
}

fn collect(root: &Path, dir: &Path, out: &mut BTreeMap<String, String>) {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return;
    };
    for entry in entries.flatten() {
        let path = entry.path();
        if path.is_dir() {
            out.insert(format!("{}/", rel(root, &path)), String::new());
            collect(root, &path, out);
        } else {
            let content = std::fs::read_to_string(&path).unwrap_or_default();
            out.insert(rel(root, &path), content);
        }
    }
}

fn rel(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .map(|p| p.to_string_lossy().to_string())
        .unwrap_or_default()
}
