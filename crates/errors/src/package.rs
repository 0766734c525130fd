//! Packaging error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum PackageError {
    #[error("expected artifact not found after install: {pattern}")]
    MissingArtifact { pattern: String },

    #[error("invalid artifact pattern {pattern}: {message}")]
    InvalidPattern { pattern: String, message: String },

    #[error("failed to publish package to {path}: {message}")]
    PublishFailed { path: String, message: String },

    #[error("no packaged {name} found under {path}")]
    NotPackaged { name: String, path: String },
}

impl UserFacingError for PackageError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::MissingArtifact { .. } => {
                Some("The install step produced a different layout than the recipe expects.")
            }
            Self::NotPackaged { .. } => Some("Run `crucible create` for this reference first."),
            Self::InvalidPattern { .. } | Self::PublishFailed { .. } => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::MissingArtifact { .. } => "package.missing_artifact",
            Self::InvalidPattern { .. } => "package.invalid_pattern",
            Self::PublishFailed { .. } => "package.publish_failed",
            Self::NotPackaged { .. } => "package.not_packaged",
        };
        Some(code)
    }
}
