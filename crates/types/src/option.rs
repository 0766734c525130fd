//! Option values and domains

use crucible_errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A concrete option value
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OptionValue {
    Bool(bool),
    Choice(String),
}

impl OptionValue {
    /// The boolean value, `None` for choices
    #[must_use]
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            Self::Choice(_) => None,
        }
    }

    /// Truthiness; choices are never true
    #[must_use]
    pub fn is_true(&self) -> bool {
        self.as_bool().unwrap_or(false)
    }
}

impl From<bool> for OptionValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for OptionValue {
    fn from(value: &str) -> Self {
        Self::Choice(value.to_string())
    }
}

impl fmt::Display for OptionValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            // Rendered the way recipe authors write them
            Self::Bool(true) => write!(f, "True"),
            Self::Bool(false) => write!(f, "False"),
            Self::Choice(choice) => write!(f, "{choice}"),
        }
    }
}

/// Set of values an option accepts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase", tag = "kind", content = "values")]
pub enum OptionDomain {
    Bool,
    Choice(Vec<String>),
}

impl OptionDomain {
    /// Parse a user-supplied string against this domain
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` if the string is not part of the
    /// domain.
    pub fn parse(&self, option: &str, raw: &str) -> Result<OptionValue, ConfigError> {
        let invalid = || ConfigError::InvalidValue {
            field: option.to_string(),
            value: raw.to_string(),
        };

        match self {
            Self::Bool => match raw.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" | "on" => Ok(OptionValue::Bool(true)),
                "false" | "0" | "no" | "off" => Ok(OptionValue::Bool(false)),
                _ => Err(invalid()),
            },
            Self::Choice(choices) => choices
                .iter()
                .find(|c| c.as_str() == raw.trim())
                .map(|c| OptionValue::Choice(c.clone()))
                .ok_or_else(invalid),
        }
    }

    /// Whether a value belongs to this domain
    #[must_use]
    pub fn accepts(&self, value: &OptionValue) -> bool {
        match (self, value) {
            (Self::Bool, OptionValue::Bool(_)) => true,
            (Self::Choice(choices), OptionValue::Choice(c)) => choices.contains(c),
            _ => false,
        }
    }
}

impl fmt::Display for OptionDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool => write!(f, "[True, False]"),
            Self::Choice(choices) => write!(f, "[{}]", choices.join(", ")),
        }
    }
}
