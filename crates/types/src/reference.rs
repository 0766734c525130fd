//! Package references (`name/version`)

use crate::UpstreamVersion;
use crucible_errors::ConfigError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// A package pinned to an exact upstream version
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageRef {
    pub name: String,
    pub version: UpstreamVersion,
}

impl PackageRef {
    /// Create a reference from parts
    ///
    /// # Errors
    ///
    /// Returns an error if the version cannot be parsed.
    pub fn new(name: impl Into<String>, version: &str) -> Result<Self, ConfigError> {
        Ok(Self {
            name: name.into(),
            version: UpstreamVersion::parse(version)?,
        })
    }

    /// Parse `name/version`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidReference` if the string is not of the
    /// form `name/version`.
    pub fn parse(reference: &str) -> Result<Self, ConfigError> {
        let invalid = || ConfigError::InvalidReference {
            reference: reference.to_string(),
        };

        let (name, version) = reference.trim().split_once('/').ok_or_else(invalid)?;
        if name.is_empty()
            || !name
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
        {
            return Err(invalid());
        }
        let version = UpstreamVersion::parse(version).map_err(|_| invalid())?;

        Ok(Self {
            name: name.to_string(),
            version,
        })
    }
}

impl fmt::Display for PackageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.name, self.version)
    }
}

impl FromStr for PackageRef {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for PackageRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for PackageRef {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_reference() {
        let r = PackageRef::parse("zstd/1.3.8").unwrap();
        assert_eq!(r.name, "zstd");
        assert_eq!(r.version.as_str(), "1.3.8");
        assert_eq!(r.to_string(), "zstd/1.3.8");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        assert!(PackageRef::parse("zstd").is_err());
        assert!(PackageRef::parse("/1.0").is_err());
        assert!(PackageRef::parse("zstd/").is_err());
        assert!(PackageRef::parse("a b/1.0").is_err());
    }
}
