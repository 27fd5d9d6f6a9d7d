use serde::{Serialize, Serializer};
use std::fmt;
use std::path::{Component, Path, PathBuf};
use thiserror::Error;

use super::protocol::METADATA_DIRS;

/// A validated `local_path`: relative, inside its description's directory,
/// and not pointing into VCS metadata.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LocalPath {
    raw: String,
    normalized: PathBuf,
}

impl LocalPath {
    pub fn parse(raw: &str) -> Result<Self, LocalPathError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(LocalPathError::Empty);
        }
        let path = Path::new(trimmed);
        if path.has_root() || path.is_absolute() {
            return Err(LocalPathError::Absolute(trimmed.to_string()));
        }
        let normalized = normalize(path);
        if normalized.starts_with("..") {
            return Err(LocalPathError::Escapes(trimmed.to_string()));
        }
        let in_metadata = normalized.components().any(|c| match c {
            Component::Normal(name) => METADATA_DIRS.iter().any(|m| name == *m),
            _ => false,
        });
        if in_metadata {
            return Err(LocalPathError::Metadata(trimmed.to_string()));
        }
        Ok(Self {
            raw: trimmed.to_string(),
            normalized,
        })
    }

    /// The path as written in the description.
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Lexically normalised form; empty for `.`.
    pub fn normalized(&self) -> &Path {
        &self.normalized
    }

    /// `.`: the description's own directory.
    pub fn is_standalone(&self) -> bool {
        self.normalized.as_os_str().is_empty()
    }

    pub fn resolve(&self, base: &Path) -> PathBuf {
        if self.is_standalone() {
            normalize(base)
        } else {
            normalize(&base.join(&self.normalized))
        }
    }
}

impl fmt::Display for LocalPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl Serialize for LocalPath {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LocalPathError {
    #[error("local_path must not be empty")]
    Empty,
    #[error("local_path '{0}' must be relative to the description file")]
    Absolute(String),
    #[error("local_path '{0}' points outside the directory of the description file")]
    Escapes(String),
    #[error("local_path '{0}' points into version control metadata")]
    Metadata(String),
}

/// Resolve `.` and `..` without touching the file system.
///
/// Leading `..` components that cannot be resolved are kept.
pub fn normalize(path: &Path) -> PathBuf {
    let mut out: Vec<Component<'_>> = Vec::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => match out.last() {
                Some(Component::Normal(_)) => {
                    out.pop();
                }
                Some(Component::RootDir) | Some(Component::Prefix(_)) => {}
                _ => out.push(component),
            },
            other => out.push(other),
        }
    }
    out.iter().collect()
}

/// Render `path` relative to `root` in `./a/b` form for reports.
pub fn display_relative(path: &Path, root: &Path) -> String {
    match pathdiff::diff_paths(path, root) {
        Some(rel) if rel.as_os_str().is_empty() => ".".to_string(),
        Some(rel) if rel.starts_with("..") => rel.display().to_string(),
        Some(rel) => format!("./{}", rel.display()),
        None => path.display().to_string(),
    }
}
