use semver::Version;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Version of the description file format.
///
/// Pre-release and build metadata are accepted on input and dropped.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct SchemaVersion(Version);

impl SchemaVersion {
    /// Newest format this build understands.
    pub const CURRENT: SchemaVersion = SchemaVersion(Version::new(1, 1, 0));
    /// Oldest format accepted (and upgraded in memory).
    pub const OLDEST: SchemaVersion = SchemaVersion(Version::new(1, 0, 0));

    pub fn new(major: u64, minor: u64, patch: u64) -> Self {
        Self(Version::new(major, minor, patch))
    }

    pub fn major(&self) -> u64 {
        self.0.major
    }

    pub fn minor(&self) -> u64 {
        self.0.minor
    }

    /// Reject versions from another major line or a newer minor.
    pub fn check_supported(&self) -> Result<(), SchemaVersionError> {
        if self.0.major != Self::CURRENT.0.major {
            return Err(SchemaVersionError::UnsupportedMajor {
                found: self.clone(),
            });
        }
        if self.0.minor > Self::CURRENT.0.minor {
            return Err(SchemaVersionError::TooNew {
                found: self.clone(),
            });
        }
        Ok(())
    }

    /// Whether the in-memory model must be upgraded from this version.
    pub fn needs_upgrade(&self) -> bool {
        self.0.major == Self::CURRENT.0.major && self.0.minor < Self::CURRENT.0.minor
    }

    /// Schema 1.1 introduced pinning to a bare commit hash.
    pub fn supports_hash(&self) -> bool {
        self.0.major > 1 || self.0.minor >= 1
    }
}

impl FromStr for SchemaVersion {
    type Err = SchemaVersionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parsed = Version::parse(s.trim())
            .map_err(|_| SchemaVersionError::Malformed(s.trim().to_string()))?;
        Ok(Self::new(parsed.major, parsed.minor, parsed.patch))
    }
}

impl fmt::Display for SchemaVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl Serialize for SchemaVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SchemaVersionError {
    #[error("schema_version '{0}' is not of the form MAJOR.MINOR.PATCH")]
    Malformed(String),
    #[error(
        "schema_version {} is not supported, this tool reads major version {}",
        .found,
        SchemaVersion::CURRENT.major()
    )]
    UnsupportedMajor { found: SchemaVersion },
    #[error(
        "schema_version {} is newer than the newest supported version {}, upgrade this tool",
        .found,
        SchemaVersion::CURRENT
    )]
    TooNew { found: SchemaVersion },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_strips_metadata() {
        let v: SchemaVersion = "1.0.0-alpha+build.5".parse().unwrap();
        assert_eq!(v, SchemaVersion::new(1, 0, 0));
        assert_eq!(v.to_string(), "1.0.0");
    }

    #[test]
    fn test_error_messages_name_the_supported_version() {
        let err = SchemaVersionError::TooNew {
            found: SchemaVersion::new(1, 9, 0),
        };
        assert_eq!(
            err.to_string(),
            format!(
                "schema_version 1.9.0 is newer than the newest supported version {}, upgrade this tool",
                SchemaVersion::CURRENT
            )
        );
        let err = SchemaVersionError::UnsupportedMajor {
            found: SchemaVersion::new(2, 0, 0),
        };
        assert!(err.to_string().ends_with("reads major version 1"));
    }

    #[test]
    fn test_parse_rejects_partial_versions() {
        assert!(matches!(
            "1.0".parse::<SchemaVersion>(),
            Err(SchemaVersionError::Malformed(_))
        ));
        assert!("one.two.three".parse::<SchemaVersion>().is_err());
    }

    #[test]
    fn test_supported_range() {
        assert!(SchemaVersion::new(1, 0, 0).check_supported().is_ok());
        assert!(SchemaVersion::new(1, 1, 7).check_supported().is_ok());
        assert!(matches!(
            SchemaVersion::new(1, 2, 0).check_supported(),
            Err(SchemaVersionError::TooNew { .. })
        ));
        assert!(matches!(
            SchemaVersion::new(2, 0, 0).check_supported(),
            Err(SchemaVersionError::UnsupportedMajor { .. })
        ));
        assert!(SchemaVersion::new(0, 9, 0).check_supported().is_err());
    }

    #[test]
    fn test_upgrade_and_hash_support() {
        assert!(SchemaVersion::new(1, 0, 3).needs_upgrade());
        assert!(!SchemaVersion::CURRENT.needs_upgrade());
        assert!(!SchemaVersion::OLDEST.supports_hash());
        assert!(SchemaVersion::CURRENT.supports_hash());
    }
}
