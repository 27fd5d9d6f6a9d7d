use serde::Serialize;
use std::fmt;

/// The single reference an entry is pinned to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", content = "name", rename_all = "lowercase")]
pub enum RepoRef {
    Tag(String),
    Branch(String),
    Hash(String),
}

impl RepoRef {
    pub fn name(&self) -> &str {
        match self {
            RepoRef::Tag(name) | RepoRef::Branch(name) | RepoRef::Hash(name) => name,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RepoRef::Tag(_) => "tag",
            RepoRef::Branch(_) => "branch",
            RepoRef::Hash(_) => "hash",
        }
    }
}

impl fmt::Display for RepoRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.name())
    }
}

/// Where a repository should be and at which reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutTarget {
    /// Repository URL as written in the description (after local expansion).
    pub url: String,
    pub reference: RepoRef,
}

impl CheckoutTarget {
    pub fn new(url: impl Into<String>, reference: RepoRef) -> Self {
        Self {
            url: url.into(),
            reference,
        }
    }

    /// `.` designates the enclosing repository itself: nothing to fetch.
    pub fn is_local_only(&self) -> bool {
        self.url.trim() == "."
    }
}

/// Observed identity of a working copy's HEAD.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize)]
pub struct RefDescriptor {
    /// Commit hash (git) or revision number (svn).
    pub revision: String,
    /// Local branch HEAD is attached to, if any.
    pub branch: Option<String>,
    /// Repository URL of the working copy (svn).
    pub url: Option<String>,
}

impl RefDescriptor {
    pub fn at_revision(revision: impl Into<String>) -> Self {
        Self {
            revision: revision.into(),
            ..Default::default()
        }
    }

    pub fn with_branch(mut self, branch: impl Into<String>) -> Self {
        self.branch = Some(branch.into());
        self
    }

    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }
}

impl fmt::Display for RefDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.branch, &self.url) {
            (Some(branch), _) => write!(f, "{} ({})", branch, short(&self.revision)),
            (None, Some(url)) => write!(f, "{}@{}", url, self.revision),
            (None, None) => write!(f, "{}", short(&self.revision)),
        }
    }
}

fn short(revision: &str) -> &str {
    if revision.len() > 12 && revision.chars().all(|c| c.is_ascii_hexdigit()) {
        &revision[..12]
    } else {
        revision
    }
}
