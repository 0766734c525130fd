//! Configuration error types
//!
//! Everything in here is raised before any download, patch or native build
//! has started.

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    NotFound { path: String },

    #[error("parse error: {message}")]
    ParseError { message: String },

    #[error("invalid value for {field}: {value}")]
    InvalidValue { field: String, value: String },

    #[error("unknown recipe: {name}")]
    UnknownRecipe { name: String },

    #[error("invalid package reference: {reference}")]
    InvalidReference { reference: String },

    #[error("{recipe} has no option named {option}")]
    UnknownOption { recipe: String, option: String },

    #[error("unsupported configuration for {recipe}: {reason}")]
    UnsupportedConfiguration { recipe: String, reason: String },

    #[error("dependency conflict: {message}")]
    DependencyConflict { message: String },

    #[error("dependency {name} of {recipe} is not available: {reason}")]
    MissingDependency {
        recipe: String,
        name: String,
        reason: String,
    },
}

impl UserFacingError for ConfigError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::NotFound { .. } => Some("Create the configuration file or drop --config."),
            Self::ParseError { .. } | Self::InvalidValue { .. } => {
                Some("Fix the configuration value and retry the command.")
            }
            Self::UnknownRecipe { .. } => Some("Run `crucible list` to see the built-in recipes."),
            Self::InvalidReference { .. } => Some("References are written as <name>/<version>."),
            Self::UnknownOption { .. } => {
                Some("Run `crucible options <recipe>` for the options available on this platform.")
            }
            Self::UnsupportedConfiguration { .. } => {
                Some("Pick a different platform or disable the unsupported option.")
            }
            Self::DependencyConflict { .. } => {
                Some("Align the versions or coerced options of the conflicting dependencies.")
            }
            Self::MissingDependency { .. } => {
                Some("Create the dependency first or point at it with --dep <name>=<path>.")
            }
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::NotFound { .. } => "config.not_found",
            Self::ParseError { .. } => "config.parse_error",
            Self::InvalidValue { .. } => "config.invalid_value",
            Self::UnknownRecipe { .. } => "config.unknown_recipe",
            Self::InvalidReference { .. } => "config.invalid_reference",
            Self::UnknownOption { .. } => "config.unknown_option",
            Self::UnsupportedConfiguration { .. } => "config.unsupported_configuration",
            Self::DependencyConflict { .. } => "config.dependency_conflict",
            Self::MissingDependency { .. } => "config.missing_dependency",
        };
        Some(code)
    }
}
