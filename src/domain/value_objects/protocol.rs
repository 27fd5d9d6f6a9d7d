use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// How an external is obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Protocol {
    /// Git working tree
    Git,
    /// Subversion working copy
    Svn,
    /// No repository of its own; only carries a nested description
    ExternalsOnly,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Git => write!(f, "git"),
            Protocol::Svn => write!(f, "svn"),
            Protocol::ExternalsOnly => write!(f, "externals_only"),
        }
    }
}

impl FromStr for Protocol {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "git" => Ok(Protocol::Git),
            "svn" => Ok(Protocol::Svn),
            "externals_only" => Ok(Protocol::ExternalsOnly),
            _ => Err(ProtocolError::Unsupported(s.to_string())),
        }
    }
}

impl Protocol {
    /// Whether entries of this protocol point at a repository.
    pub fn has_repository(&self) -> bool {
        !matches!(self, Protocol::ExternalsOnly)
    }

    /// Whether a bare commit hash is a valid reference for this protocol.
    pub fn supports_hash(&self) -> bool {
        matches!(self, Protocol::Git)
    }

    /// Get the metadata directory name for this protocol
    pub fn metadata_dir(&self) -> Option<&'static str> {
        match self {
            Protocol::Git => Some(".git"),
            Protocol::Svn => Some(".svn"),
            Protocol::ExternalsOnly => None,
        }
    }

    /// Get the standard executable name for this protocol
    pub fn executable_name(&self) -> Option<&'static str> {
        match self {
            Protocol::Git => Some("git"),
            Protocol::Svn => Some("svn"),
            Protocol::ExternalsOnly => None,
        }
    }
}

/// Names of every VCS metadata directory this tool knows about.
pub const METADATA_DIRS: [&str; 2] = [".git", ".svn"];

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("unknown repository protocol '{0}', expected one of: git, svn, externals_only")]
    Unsupported(String),
}
