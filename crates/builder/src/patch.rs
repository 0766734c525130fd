//! Patch layer: source patches and literal text substitutions
//!
//! Both run once on a freshly extracted tree, before configure. A
//! substitution whose search text is absent fails the build instead of
//! silently doing nothing, so upstream changes surface immediately.

use crate::layout::WorkLayout;
use crate::runner::{CommandRunner, NativeCommand};
use crucible_config::SourceTable;
use crucible_errors::{BuildError, Error};
use crucible_types::UpstreamVersion;
use serde::Serialize;
use std::path::Path;
use tokio::fs;

/// Replace one literal string in a source file
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TextSubstitution {
    /// Relative to the source tree
    pub file: String,
    pub search: String,
    pub replace: String,
}

impl TextSubstitution {
    #[must_use]
    pub fn new(
        file: impl Into<String>,
        search: impl Into<String>,
        replace: impl Into<String>,
    ) -> Self {
        Self {
            file: file.into(),
            search: search.into(),
            replace: replace.into(),
        }
    }
}

/// Apply the registered patches for a version
///
/// # Errors
///
/// Returns `BuildError::PatchFailed` when a patch file is missing or `patch`
/// exits non-zero.
pub async fn apply_patches(
    runner: &dyn CommandRunner,
    table: &SourceTable,
    version: &UpstreamVersion,
    layout: &WorkLayout,
) -> Result<usize, Error> {
    let patches = table.patches(version);

    for entry in patches {
        let patch_file = table.patch_path(entry);
        let patch_display = patch_file.display().to_string();
        if !fs::try_exists(&patch_file).await.unwrap_or(false) {
            return Err(BuildError::PatchFailed {
                patch: patch_display,
                message: "patch file not found".to_string(),
            }
            .into());
        }

        let cwd = layout.root.join(&entry.base_path);
        let cmd = NativeCommand::new("patch", cwd)
            .arg(format!("-p{}", entry.strip))
            .arg("-i")
            .arg(patch_display.clone());

        tracing::info!(recipe = table.recipe(), patch = %patch_display, "applying patch");
        let result = runner.run(&cmd).await?;
        if !result.success {
            return Err(BuildError::PatchFailed {
                patch: patch_display,
                message: result.tail(10),
            }
            .into());
        }
    }

    Ok(patches.len())
}

/// Apply literal substitutions in order
///
/// # Errors
///
/// Returns `BuildError::PatchFailed` when a file cannot be read or the
/// search text does not occur in it.
pub async fn apply_substitutions(
    source_dir: &Path,
    substitutions: &[TextSubstitution],
) -> Result<(), Error> {
    for sub in substitutions {
        let path = source_dir.join(&sub.file);
        let contents = fs::read_to_string(&path)
            .await
            .map_err(|e| BuildError::PatchFailed {
                patch: sub.file.clone(),
                message: e.to_string(),
            })?;

        if !contents.contains(&sub.search) {
            return Err(BuildError::PatchFailed {
                patch: sub.file.clone(),
                message: format!("search text not found: {:?}", sub.search),
            }
            .into());
        }

        tracing::debug!(file = %sub.file, "replacing {:?}", sub.search);
        fs::write(&path, contents.replace(&sub.search, &sub.replace))
            .await
            .map_err(|e| Error::io_with_path(&e, &path))?;
    }
    Ok(())
}
