//! Version to source archive and patch list mapping
//!
//! Each recipe ships a TOML table:
//!
//! ```toml
//! [sources."6.8.1"]
//! url = "https://github.com/facebook/rocksdb/archive/v6.8.1.tar.gz"
//! sha256 = "ca192a06ed3bcb9f09060add7e9d0daee1ae7a8705a3d5ecbe41867c5e2796a2"
//!
//! [[patches."2.1.27"]]
//! patch_file = "patches/0001-fix-gssapi.patch"
//! base_path = "source_subfolder"
//! strip = 1
//! ```

use crucible_errors::{ConfigError, Error, SourceError};
use crucible_types::UpstreamVersion;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Where to download one version from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEntry {
    pub url: String,
    pub sha256: String,
    /// Cache file name; defaults to the last URL segment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filename: Option<String>,
}

impl SourceEntry {
    /// File name used in the download cache
    #[must_use]
    pub fn file_name(&self) -> String {
        if let Some(name) = &self.filename {
            return name.clone();
        }
        self.url
            .trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|segment| !segment.is_empty())
            .unwrap_or("source.tar.gz")
            .to_string()
    }
}

/// One patch to apply before configuring
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchEntry {
    /// Relative to the recipe data directory
    pub patch_file: PathBuf,
    /// Relative to the work directory
    #[serde(default = "default_base_path")]
    pub base_path: String,
    #[serde(default = "default_strip")]
    pub strip: u32,
}

fn default_base_path() -> String {
    "source_subfolder".to_string()
}

fn default_strip() -> u32 {
    1
}

/// Source and patch data for one recipe
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceTable {
    #[serde(skip)]
    recipe: String,
    #[serde(default)]
    sources: BTreeMap<String, SourceEntry>,
    #[serde(default)]
    patches: BTreeMap<String, Vec<PatchEntry>>,
    /// Directory patch files are resolved against
    #[serde(skip)]
    patch_dir: Option<PathBuf>,
}

impl SourceTable {
    /// Parse a table from TOML text
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::ParseError` on malformed TOML or unparsable
    /// version keys.
    pub fn from_toml(recipe: &str, contents: &str) -> Result<Self, Error> {
        let mut table: Self = toml::from_str(contents).map_err(|e| ConfigError::ParseError {
            message: format!("{recipe} source table: {e}"),
        })?;
        for key in table.sources.keys().chain(table.patches.keys()) {
            UpstreamVersion::parse(key).map_err(|_| ConfigError::ParseError {
                message: format!("{recipe} source table: invalid version key {key:?}"),
            })?;
        }
        table.recipe = recipe.to_string();
        Ok(table)
    }

    /// Load `<data_dir>/<recipe>.toml` if it exists
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub async fn load_override(data_dir: &Path, recipe: &str) -> Result<Option<Self>, Error> {
        let path = data_dir.join(format!("{recipe}.toml"));
        if !tokio::fs::try_exists(&path).await.unwrap_or(false) {
            return Ok(None);
        }
        tracing::debug!(recipe, path = %path.display(), "using source table override");
        let contents = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| Error::io_with_path(&e, &path))?;
        let mut table = Self::from_toml(recipe, &contents)?;
        table.patch_dir = Some(data_dir.join(recipe));
        Ok(Some(table))
    }

    /// Recipe this table belongs to
    #[must_use]
    pub fn recipe(&self) -> &str {
        &self.recipe
    }

    /// Source entry for a version
    ///
    /// # Errors
    ///
    /// Returns `SourceError::UnknownVersion` if the version is not listed.
    pub fn source(&self, version: &UpstreamVersion) -> Result<&SourceEntry, SourceError> {
        self.sources
            .iter()
            .find(|(key, _)| UpstreamVersion::parse(key).is_ok_and(|k| &k == version))
            .map(|(_, entry)| entry)
            .ok_or_else(|| SourceError::UnknownVersion {
                recipe: self.recipe.clone(),
                version: version.to_string(),
            })
    }

    /// Patches registered for a version, in application order
    #[must_use]
    pub fn patches(&self, version: &UpstreamVersion) -> &[PatchEntry] {
        self.patches
            .iter()
            .find(|(key, _)| UpstreamVersion::parse(key).is_ok_and(|k| &k == version))
            .map_or(&[], |(_, patches)| patches.as_slice())
    }

    /// Absolute location of a patch file
    ///
    /// Override tables resolve patches against `<data_dir>/<recipe>/`.
    #[must_use]
    pub fn patch_path(&self, entry: &PatchEntry) -> PathBuf {
        match &self.patch_dir {
            Some(dir) => dir.join(&entry.patch_file),
            None => entry.patch_file.clone(),
        }
    }

    /// Known versions, oldest first
    #[must_use]
    pub fn versions(&self) -> Vec<UpstreamVersion> {
        let mut versions: Vec<_> = self
            .sources
            .keys()
            .filter_map(|key| UpstreamVersion::parse(key).ok())
            .collect();
        versions.sort();
        versions
    }

    /// Newest known version
    #[must_use]
    pub fn latest(&self) -> Option<UpstreamVersion> {
        self.versions().pop()
    }
}
