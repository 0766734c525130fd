//! Build error types

use std::borrow::Cow;

use crate::UserFacingError;
use thiserror::Error;

#[derive(Debug, Clone, Error)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[non_exhaustive]
pub enum BuildError {
    #[error("required tool not found on PATH: {tool}")]
    MissingTool { tool: String },

    #[error("patch failed: {patch} - {message}")]
    PatchFailed { patch: String, message: String },

    #[error("configure failed: {message}")]
    ConfigureFailed { message: String },

    #[error("compile failed: {message}")]
    CompileFailed { message: String },

    #[error("install failed: {message}")]
    InstallFailed { message: String },

    #[error("failed to launch {program}: {message}")]
    SpawnFailed { program: String, message: String },

    #[error("source tree missing at {path}; fetch the source first")]
    SourceMissing { path: String },
}

impl UserFacingError for BuildError {
    fn user_message(&self) -> Cow<'_, str> {
        Cow::Owned(self.to_string())
    }

    fn user_hint(&self) -> Option<&'static str> {
        match self {
            Self::MissingTool { .. } | Self::SpawnFailed { .. } => {
                Some("Install the native build tool and make sure it is on PATH.")
            }
            Self::PatchFailed { .. } => {
                Some("Update the patch or substitution so it applies to the current sources.")
            }
            Self::SourceMissing { .. } => Some("Run the full `crucible create` flow."),
            Self::ConfigureFailed { .. } | Self::CompileFailed { .. } | Self::InstallFailed { .. } => {
                Some("Re-run with --debug to see the native build output.")
            }
        }
    }

    fn user_code(&self) -> Option<&'static str> {
        let code = match self {
            Self::MissingTool { .. } => "build.missing_tool",
            Self::PatchFailed { .. } => "build.patch_failed",
            Self::ConfigureFailed { .. } => "build.configure_failed",
            Self::CompileFailed { .. } => "build.compile_failed",
            Self::InstallFailed { .. } => "build.install_failed",
            Self::SpawnFailed { .. } => "build.spawn_failed",
            Self::SourceMissing { .. } => "build.source_missing",
        };
        Some(code)
    }
}
