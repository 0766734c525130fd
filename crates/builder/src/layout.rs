//! Directory layout of one build and of its dependencies

use crate::dependencies::{same_option_value, DependencyEdge};
use crate::metadata::{ConsumptionMetadata, METADATA_FILE};
use crucible_errors::{ConfigError, Error};
use crucible_types::Platform;
use serde::Serialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Fixed name the extracted source tree is normalized to
pub const SOURCE_SUBFOLDER: &str = "source_subfolder";
/// Out-of-source build directory for CMake recipes
pub const BUILD_SUBFOLDER: &str = "build_subfolder";
/// Staging directory the install step writes into
pub const PACKAGE_SUBFOLDER: &str = "package";

/// Work directory of one build
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WorkLayout {
    pub root: PathBuf,
}

impl WorkLayout {
    /// `<work_root>/<name>/<version>/<package_id>`
    #[must_use]
    pub fn new(work_root: &Path, name: &str, version: &str, package_id: &str) -> Self {
        Self {
            root: work_root.join(name).join(version).join(package_id),
        }
    }

    #[must_use]
    pub fn source_dir(&self) -> PathBuf {
        self.root.join(SOURCE_SUBFOLDER)
    }

    #[must_use]
    pub fn build_dir(&self) -> PathBuf {
        self.root.join(BUILD_SUBFOLDER)
    }

    #[must_use]
    pub fn package_dir(&self) -> PathBuf {
        self.root.join(PACKAGE_SUBFOLDER)
    }

    /// Path relative to the source tree
    #[must_use]
    pub fn source_path(&self, relative: &str) -> PathBuf {
        self.source_dir().join(relative)
    }
}

/// Where a dependency's headers and libraries can be found
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DependencyLayout {
    pub root: PathBuf,
}

impl DependencyLayout {
    #[must_use]
    pub fn include_dir(&self) -> PathBuf {
        self.root.join("include")
    }

    #[must_use]
    pub fn lib_dir(&self) -> PathBuf {
        self.root.join("lib")
    }

    /// Root with forward slashes, as MSVC perl scripts expect
    #[must_use]
    pub fn root_forward_slashes(&self) -> String {
        self.root.display().to_string().replace('\\', "/")
    }
}

/// Known dependency locations, keyed by package name
///
/// Dependencies that were never packaged are taken from the system.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct DependencyLayouts {
    layouts: BTreeMap<String, DependencyLayout>,
}

impl DependencyLayouts {
    /// Locate every edge: explicit paths first, then published packages
    ///
    /// A published package is only taken when its recorded platform equals
    /// `platform` and its options satisfy every coercion of the edge. Among
    /// several such packages the lowest package id wins.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingDependency` when an explicit path does not
    /// exist, or when packages of the dependency are published but none of
    /// them fits.
    pub fn locate(
        recipe: &str,
        platform: &Platform,
        edges: &[DependencyEdge],
        explicit: &BTreeMap<String, PathBuf>,
        package_root: &Path,
    ) -> Result<Self, Error> {
        let mut layouts = BTreeMap::new();

        for edge in edges {
            let name = edge.name();
            if let Some(path) = explicit.get(name) {
                if !path.is_dir() {
                    return Err(ConfigError::MissingDependency {
                        recipe: recipe.to_string(),
                        name: name.to_string(),
                        reason: format!("{} is not a directory", path.display()),
                    }
                    .into());
                }
                layouts.insert(name.to_string(), DependencyLayout { root: path.clone() });
                continue;
            }

            let published = package_root
                .join(name)
                .join(edge.reference.version.as_str());
            let candidates = package_dirs(&published);
            if candidates.is_empty() {
                tracing::warn!(
                    recipe,
                    dependency = %edge.reference,
                    "dependency not packaged, relying on the system copy"
                );
                continue;
            }

            let mut matching = candidates
                .iter()
                .filter(|dir| fits(dir, platform, &edge.coercions));
            let Some(root) = matching.next() else {
                return Err(ConfigError::MissingDependency {
                    recipe: recipe.to_string(),
                    name: name.to_string(),
                    reason: format!(
                        "none of the {} packages under {} matches the platform and options",
                        candidates.len(),
                        published.display()
                    ),
                }
                .into());
            };
            let others = matching.count();
            if others > 0 {
                tracing::warn!(
                    recipe,
                    dependency = %edge.reference,
                    chosen = %root.display(),
                    others,
                    "several published packages fit, taking the lowest package id"
                );
            }
            layouts.insert(name.to_string(), DependencyLayout { root: root.clone() });
        }

        Ok(Self { layouts })
    }

    /// Insert a known location
    pub fn insert(&mut self, name: impl Into<String>, root: PathBuf) {
        self.layouts.insert(name.into(), DependencyLayout { root });
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&DependencyLayout> {
        self.layouts.get(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &DependencyLayout)> {
        self.layouts.iter().map(|(n, l)| (n.as_str(), l))
    }
}

/// Package directories under a version directory, sorted by package id
fn package_dirs(dir: &Path) -> Vec<PathBuf> {
    let Ok(entries) = std::fs::read_dir(dir) else {
        return Vec::new();
    };
    let mut dirs: Vec<PathBuf> = entries
        .filter_map(Result::ok)
        .map(|e| e.path())
        .filter(|p| p.is_dir())
        .collect();
    dirs.sort();
    dirs
}

/// Whether a published package was built for `platform` with options that
/// satisfy `coercions`
fn fits(dir: &Path, platform: &Platform, coercions: &BTreeMap<String, String>) -> bool {
    let metadata = match read_metadata(dir) {
        Ok(metadata) => metadata,
        Err(e) => {
            tracing::debug!(path = %dir.display(), error = %e, "skipping unreadable package");
            return false;
        }
    };
    &metadata.platform == platform
        && coercions.iter().all(|(option, value)| {
            metadata
                .options
                .get(option)
                .is_some_and(|built| same_option_value(built, value))
        })
}

fn read_metadata(dir: &Path) -> Result<ConsumptionMetadata, Error> {
    let path = dir.join(METADATA_FILE);
    let contents = std::fs::read_to_string(&path).map_err(|e| Error::io_with_path(&e, &path))?;
    Ok(serde_json::from_str(&contents)?)
}
