//! Source acquisition error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum SourceError {
    #[error("no source registered for {recipe}/{version}")]
    UnknownVersion { recipe: String, version: String },

    #[error("invalid URL: {url}")]
    InvalidUrl { url: String },

    #[error("fetch failed for {url}: {message}")]
    FetchFailed { url: String, message: String },

    #[error("HTTP {status} while fetching {url}")]
    HttpStatus { url: String, status: u16 },

    #[error("network access disabled, cannot fetch {url}")]
    NetworkDisabled { url: String },

    #[error("checksum mismatch for {file}: expected {expected}, got {actual}")]
    ChecksumMismatch {
        file: String,
        expected: String,
        actual: String,
    },

    #[error("unsupported archive format: {file}")]
    UnsupportedArchive { file: String },

    #[error("extraction failed: {message}")]
    ExtractionFailed { message: String },
}

impl UserFacingError for SourceError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::UnknownVersion { .. } => {
                Some("Add the version to the recipe's source table or pick a listed version.")
            }
            Self::ChecksumMismatch { .. } => {
                Some("The upstream archive changed; verify it and update the source table.")
            }
            Self::NetworkDisabled { .. } => {
                Some("Enable network access or place the archive in the download cache.")
            }
            Self::FetchFailed { .. } | Self::HttpStatus { .. } | Self::InvalidUrl { .. } => {
                Some("Check the URL in the source table and your network connection.")
            }
            Self::UnsupportedArchive { .. } | Self::ExtractionFailed { .. } => None,
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::UnknownVersion { .. } => "source.unknown_version",
            Self::InvalidUrl { .. } => "source.invalid_url",
            Self::FetchFailed { .. } => "source.fetch_failed",
            Self::HttpStatus { .. } => "source.http_status",
            Self::NetworkDisabled { .. } => "source.network_disabled",
            Self::ChecksumMismatch { .. } => "source.checksum_mismatch",
            Self::UnsupportedArchive { .. } => "source.unsupported_archive",
            Self::ExtractionFailed { .. } => "source.extraction_failed",
        };
        Some(code)
    }
}
