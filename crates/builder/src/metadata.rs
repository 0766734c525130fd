//! Consumption metadata published with every package

use crucible_errors::Error;
use crucible_types::{Platform, UpstreamVersion};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tokio::fs;

/// File written at the root of every published package
pub const METADATA_FILE: &str = "crucible-package.json";

/// Named part of a package with its own link requirements
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Component {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub libs: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub system_libs: Vec<String>,
    /// Other components of this package, or `package::component` edges
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requires: Vec<String>,
}

/// What a package provides to its consumers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConsumptionMetadata {
    pub name: String,
    pub version: UpstreamVersion,
    pub package_id: String,
    pub platform: Platform,
    pub options: BTreeMap<String, String>,
    /// Generator name → name consumers look the package up by
    #[serde(default)]
    pub names: BTreeMap<String, String>,
    #[serde(default)]
    pub libs: Vec<String>,
    #[serde(default)]
    pub system_libs: Vec<String>,
    #[serde(default)]
    pub defines: Vec<String>,
    #[serde(default)]
    pub build_modules: Vec<String>,
    #[serde(default)]
    pub requires: Vec<String>,
    #[serde(default)]
    pub components: BTreeMap<String, Component>,
    /// Environment consumers should set, relative values resolved against
    /// the package root
    #[serde(default)]
    pub env: BTreeMap<String, String>,
}

impl ConsumptionMetadata {
    #[must_use]
    pub fn new(
        name: &str,
        version: UpstreamVersion,
        package_id: &str,
        platform: Platform,
        options: BTreeMap<String, String>,
    ) -> Self {
        Self {
            name: name.to_string(),
            version,
            package_id: package_id.to_string(),
            platform,
            options,
            names: BTreeMap::new(),
            libs: Vec::new(),
            system_libs: Vec::new(),
            defines: Vec::new(),
            build_modules: Vec::new(),
            requires: Vec::new(),
            components: BTreeMap::new(),
            env: BTreeMap::new(),
        }
    }

    /// Register the same lookup name for the `CMake` find-package generators
    pub fn set_cmake_name(&mut self, name: &str) {
        for generator in ["cmake_find_package", "cmake_find_package_multi"] {
            self.names.insert(generator.to_string(), name.to_string());
        }
    }

    /// Component by name, created on first use
    pub fn component(&mut self, name: &str) -> &mut Component {
        self.components.entry(name.to_string()).or_default()
    }

    /// Pretty JSON rendering
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_json(&self) -> Result<String, Error> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Write `crucible-package.json` into a package tree
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub async fn write_to(&self, package_dir: &Path) -> Result<(), Error> {
        let path = package_dir.join(METADATA_FILE);
        fs::write(&path, self.to_json()?)
            .await
            .map_err(|e| Error::io_with_path(&e, &path))
    }

    /// Read the metadata of a published package
    ///
    /// # Errors
    ///
    /// Returns an error if the file is missing or malformed.
    pub async fn read_from(package_dir: &Path) -> Result<Self, Error> {
        let path = package_dir.join(METADATA_FILE);
        let contents = fs::read_to_string(&path)
            .await
            .map_err(|e| Error::io_with_path(&e, &path))?;
        Ok(serde_json::from_str(&contents)?)
    }
}

/// Link library names found in a package's `lib/` and `bin/`
///
/// `lib<name>.a`, `lib<name>.so`, `lib<name>[.N].dylib` and
/// `lib<name>.dll.a` yield `<name>`; `<name>.lib` yields `<name>` unchanged.
/// Versioned `.so.N` files are skipped in favor of their unversioned link.
#[must_use]
pub fn collect_libs(package_dir: &Path) -> Vec<String> {
    let mut libs = Vec::new();
    for dir in ["lib", "bin"] {
        let Ok(entries) = std::fs::read_dir(package_dir.join(dir)) else {
            continue;
        };
        for entry in entries.filter_map(Result::ok) {
            if entry.file_type().map(|t| t.is_dir()).unwrap_or(true) {
                continue;
            }
            if let Some(name) = library_name(&entry.file_name().to_string_lossy()) {
                libs.push(name);
            }
        }
    }
    libs.sort();
    libs.dedup();
    libs
}

fn library_name(file: &str) -> Option<String> {
    if let Some(stem) = file.strip_suffix(".lib") {
        return Some(stem.to_string());
    }

    let stem = file
        .strip_suffix(".dll.a")
        .or_else(|| file.strip_suffix(".a"))
        .or_else(|| file.strip_suffix(".so"))
        .or_else(|| file.strip_suffix(".dylib"))?;
    let name = stem.strip_prefix("lib").unwrap_or(stem);

    // libpq.5.dylib
    let name = match name.split_once('.') {
        Some((base, suffix)) if suffix.chars().all(|c| c.is_ascii_digit() || c == '.') => base,
        _ => name,
    };
    (!name.is_empty()).then(|| name.to_string())
}
