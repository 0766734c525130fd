//! Loose upstream version numbers
//!
//! Upstream projects do not follow semver (`11.5`, `2019_u9`, `1.1.1g`), so
//! versions are compared component by component. Components are split on
//! `.`, `-` and `_`; numeric components compare numerically, anything else
//! lexically, and missing trailing components count as zero (`12 == 12.0`).

use crucible_errors::ConfigError;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Component {
    Number(u64),
    Text(String),
}

impl Component {
    fn parse(raw: &str) -> Self {
        raw.parse::<u64>()
            .map_or_else(|_| Self::Text(raw.to_ascii_lowercase()), Self::Number)
    }

    fn compare(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Self::Number(a), Self::Number(b)) => a.cmp(b),
            (Self::Text(a), Self::Text(b)) => a.cmp(b),
            // 1.1.1 sorts before 1.1.1g
            (Self::Number(_), Self::Text(_)) => Ordering::Less,
            (Self::Text(_), Self::Number(_)) => Ordering::Greater,
        }
    }
}

const ZERO: Component = Component::Number(0);

/// An upstream release version as written in the source tables
#[derive(Debug, Clone)]
pub struct UpstreamVersion {
    raw: String,
    components: Vec<Component>,
}

impl UpstreamVersion {
    /// Parse a version string
    ///
    /// # Errors
    ///
    /// Returns an error if the string is empty or contains whitespace or `/`.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.chars().any(|c| c.is_whitespace() || c == '/') {
            return Err(ConfigError::InvalidValue {
                field: "version".to_string(),
                value: raw.to_string(),
            });
        }

        let components = trimmed
            .split(['.', '-', '_'])
            .filter(|part| !part.is_empty())
            .flat_map(split_alpha_suffix)
            .collect();

        Ok(Self {
            raw: trimmed.to_string(),
            components,
        })
    }

    /// The version exactly as written
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// Leading numeric component, if any (`11` for `11.5`)
    #[must_use]
    pub fn major(&self) -> Option<u64> {
        match self.components.first() {
            Some(Component::Number(n)) => Some(*n),
            _ => None,
        }
    }

    /// Compare against a version literal, e.g. `v.at_least("12")`
    ///
    /// Unparsable literals never match.
    #[must_use]
    pub fn at_least(&self, other: &str) -> bool {
        Self::parse(other).is_ok_and(|o| *self >= o)
    }

    /// Strictly lower than a version literal
    #[must_use]
    pub fn below(&self, other: &str) -> bool {
        Self::parse(other).is_ok_and(|o| *self < o)
    }
}

/// `1g` becomes `[1, "g"]` so that `1.1.1g` orders after `1.1.1`.
fn split_alpha_suffix(part: &str) -> Vec<Component> {
    let digits = part.chars().take_while(char::is_ascii_digit).count();
    if digits == 0 || digits == part.len() {
        vec![Component::parse(part)]
    } else {
        vec![
            Component::parse(&part[..digits]),
            Component::parse(&part[digits..]),
        ]
    }
}

impl Ord for UpstreamVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        let len = self.components.len().max(other.components.len());
        for i in 0..len {
            let a = self.components.get(i).unwrap_or(&ZERO);
            let b = other.components.get(i).unwrap_or(&ZERO);
            match a.compare(b) {
                Ordering::Equal => {}
                ord => return ord,
            }
        }
        Ordering::Equal
    }
}

impl PartialOrd for UpstreamVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl PartialEq for UpstreamVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for UpstreamVersion {}

impl fmt::Display for UpstreamVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for UpstreamVersion {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for UpstreamVersion {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for UpstreamVersion {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}
