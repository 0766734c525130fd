//! Packaging: staging filters, artifact checks, publication
//!
//! The staging directory receives the install output (or recipe copies for
//! builds without an install target). It is then pruned of build-system
//! metadata and of the artifacts of the unwanted linkage, checked against the
//! recipe's expected patterns, and only then moved into the package root.
//! Any failure removes the staging directory so nothing partial is published.

use crate::layout::WorkLayout;
use crate::options::ResolvedOptions;
use crucible_errors::{Error, PackageError};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Build-system metadata that never ships
const METADATA_PATTERNS: &[&str] = &[
    "lib/pkgconfig",
    "share/pkgconfig",
    "lib/cmake",
    "**/CMakeFiles",
    "**/*.pc",
    "**/*.la",
    "**/CMakeCache.txt",
    "**/cmake_install.cmake",
];

const SHARED_LIBRARY_PATTERNS: &[&str] = &["**/*.so", "**/*.so.*", "**/*.dylib", "**/*.dll"];
const STATIC_LIBRARY_PATTERNS: &[&str] = &["**/*.a"];

/// Copy files matching a pattern from the work tree into the staging tree
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CopyRule {
    /// Glob matched against paths relative to `src`; `*` crosses directories
    pub pattern: String,
    /// Relative to the work directory
    pub src: String,
    /// Relative to the staging directory
    pub dst: String,
    /// Keep the path below `src`, or flatten to the file name
    pub keep_path: bool,
}

impl CopyRule {
    #[must_use]
    pub fn new(pattern: &str, src: &str, dst: &str) -> Self {
        Self {
            pattern: pattern.to_string(),
            src: src.to_string(),
            dst: dst.to_string(),
            keep_path: true,
        }
    }

    /// Copy into `dst` by file name only
    #[must_use]
    pub fn flat(mut self) -> Self {
        self.keep_path = false;
        self
    }
}

/// What a recipe contributes to packaging
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PackagePlan {
    pub copies: Vec<CopyRule>,
    /// Paths relative to the staging directory removed after copying
    pub remove: Vec<String>,
    /// Globs that must each match at least one packaged file
    pub expected: Vec<String>,
}

impl PackagePlan {
    #[must_use]
    pub fn copy(mut self, rule: CopyRule) -> Self {
        self.copies.push(rule);
        self
    }

    #[must_use]
    pub fn remove(mut self, path: &str) -> Self {
        self.remove.push(path.to_string());
        self
    }

    #[must_use]
    pub fn expect(mut self, pattern: &str) -> Self {
        self.expected.push(pattern.to_string());
        self
    }
}

/// Which library flavor a package keeps
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Linkage {
    Static,
    Shared,
}

impl Linkage {
    /// Linkage implied by the `shared` option, if the recipe has one
    #[must_use]
    pub fn from_options(options: &ResolvedOptions) -> Option<Self> {
        options.get("shared").map(|value| {
            if value.is_true() {
                Self::Shared
            } else {
                Self::Static
            }
        })
    }

    fn unwanted(self) -> &'static [&'static str] {
        match self {
            Self::Static => SHARED_LIBRARY_PATTERNS,
            Self::Shared => STATIC_LIBRARY_PATTERNS,
        }
    }
}

/// Files of a finished staging tree, relative and sorted
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ArtifactSet {
    pub files: Vec<String>,
}

impl ArtifactSet {
    /// List every file under `root`
    #[must_use]
    pub fn collect(root: &Path) -> Self {
        let mut files: Vec<String> = walk(root)
            .into_iter()
            .filter(|(_, is_dir)| !is_dir)
            .filter_map(|(path, _)| relative(root, &path))
            .collect();
        files.sort();
        Self { files }
    }

    #[must_use]
    pub fn contains(&self, path: &str) -> bool {
        self.files.iter().any(|f| f == path)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.files.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

/// Run every packaging step on the staging tree
///
/// On error the staging directory is removed.
///
/// # Errors
///
/// Returns `PackageError::MissingArtifact` when an expected pattern matches
/// nothing, `PackageError::InvalidPattern` for a malformed glob, or an I/O
/// error from copying or pruning.
pub fn finalize_staging(
    layout: &WorkLayout,
    plan: &PackagePlan,
    linkage: Option<Linkage>,
) -> Result<ArtifactSet, Error> {
    let staging = layout.package_dir();
    let result = finalize_inner(layout, &staging, plan, linkage);
    if result.is_err() {
        discard_staging(&staging);
    }
    result
}

fn finalize_inner(
    layout: &WorkLayout,
    staging: &Path,
    plan: &PackagePlan,
    linkage: Option<Linkage>,
) -> Result<ArtifactSet, Error> {
    std::fs::create_dir_all(staging).map_err(|e| Error::io_with_path(&e, staging))?;

    for rule in &plan.copies {
        let copied = apply_copy_rule(&layout.root, staging, rule)?;
        tracing::debug!(pattern = %rule.pattern, dst = %rule.dst, copied, "copy rule applied");
    }

    for path in &plan.remove {
        remove_path(&staging.join(path))?;
    }

    let pruned = prune_metadata(staging)?;
    if pruned > 0 {
        tracing::debug!(pruned, "removed build-system metadata");
    }

    if let Some(linkage) = linkage {
        let removed = filter_linkage(staging, linkage)?;
        if removed > 0 {
            tracing::debug!(?linkage, removed, "removed libraries of the other linkage");
        }
    }

    check_expected(staging, &plan.expected)?;
    Ok(ArtifactSet::collect(staging))
}

/// Remove a staging tree, logging instead of failing
pub fn discard_staging(staging: &Path) {
    if staging.exists() {
        if let Err(e) = std::fs::remove_dir_all(staging) {
            tracing::warn!(path = %staging.display(), "failed to remove staging directory: {e}");
        }
    }
}

/// Copy matching files; returns how many were copied
///
/// # Errors
///
/// Returns `PackageError::InvalidPattern` for a malformed glob or an I/O
/// error while copying.
pub fn apply_copy_rule(work_root: &Path, staging: &Path, rule: &CopyRule) -> Result<usize, Error> {
    let base = work_root.join(&rule.src);
    let matcher = GlobBuilder::new(&rule.pattern)
        .literal_separator(false)
        .build()
        .map_err(|e| invalid_pattern(&rule.pattern, &e))?
        .compile_matcher();
    let dst_root = staging.join(&rule.dst);

    let mut copied = 0;
    for (path, is_dir) in walk(&base) {
        if is_dir {
            continue;
        }
        let Some(rel) = relative(&base, &path) else {
            continue;
        };
        if !matcher.is_match(&rel) {
            continue;
        }

        let target = if rule.keep_path {
            dst_root.join(&rel)
        } else {
            match path.file_name() {
                Some(name) => dst_root.join(name),
                None => continue,
            }
        };
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|e| Error::io_with_path(&e, parent))?;
        }
        std::fs::copy(&path, &target).map_err(|e| Error::io_with_path(&e, &target))?;
        copied += 1;
    }
    Ok(copied)
}

/// Remove pkg-config, libtool and `CMake` metadata; returns removed entries
///
/// # Errors
///
/// Returns an I/O error if a matched entry cannot be removed.
pub fn prune_metadata(staging: &Path) -> Result<usize, Error> {
    remove_matching(staging, &build_set(METADATA_PATTERNS)?)
}

/// Remove the libraries of the linkage not built; returns removed entries
///
/// # Errors
///
/// Returns an I/O error if a matched file cannot be removed.
pub fn filter_linkage(staging: &Path, linkage: Linkage) -> Result<usize, Error> {
    remove_matching(staging, &build_set(linkage.unwanted())?)
}

/// Fail unless every pattern matches at least one file
///
/// # Errors
///
/// Returns `PackageError::MissingArtifact` for the first unmatched pattern.
pub fn check_expected(staging: &Path, patterns: &[String]) -> Result<(), Error> {
    let files = ArtifactSet::collect(staging);
    for pattern in patterns {
        let matcher = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| invalid_pattern(pattern, &e))?
            .compile_matcher();
        if !files.files.iter().any(|f| matcher.is_match(f)) {
            return Err(PackageError::MissingArtifact {
                pattern: pattern.clone(),
            }
            .into());
        }
    }
    Ok(())
}

/// Move a finished staging tree to its published location
///
/// The tree is first assembled in a scratch directory next to `dest` and
/// only then renamed into place, so `dest` holds either the previous package
/// or the complete new one.
///
/// # Errors
///
/// Returns `PackageError::PublishFailed` if the tree cannot be moved.
pub fn publish(staging: &Path, dest: &Path) -> Result<(), Error> {
    publish_with(staging, dest, |from, to| std::fs::rename(from, to))
}

fn publish_with(
    staging: &Path,
    dest: &Path,
    move_tree: fn(&Path, &Path) -> std::io::Result<()>,
) -> Result<(), Error> {
    let publish_failed = |message: String| PackageError::PublishFailed {
        path: dest.display().to_string(),
        message,
    };

    let parent = dest
        .parent()
        .ok_or_else(|| publish_failed("destination has no parent directory".to_string()))?;
    std::fs::create_dir_all(parent).map_err(|e| publish_failed(e.to_string()))?;

    // Removed with everything left in it when dropped
    let scratch = tempfile::Builder::new()
        .prefix(".publish-")
        .tempdir_in(parent)
        .map_err(|e| publish_failed(e.to_string()))?;
    let incoming = scratch.path().join("incoming");
    let previous = scratch.path().join("previous");

    if move_tree(staging, &incoming).is_err() {
        copy_tree(staging, &incoming).map_err(|e| publish_failed(e.to_string()))?;
    }

    let replacing = dest.exists();
    if replacing {
        std::fs::rename(dest, &previous).map_err(|e| publish_failed(e.to_string()))?;
    }
    if let Err(e) = std::fs::rename(&incoming, dest) {
        if replacing {
            if let Err(restore) = std::fs::rename(&previous, dest) {
                tracing::error!(path = %dest.display(), "failed to restore previous package: {restore}");
            }
        }
        return Err(publish_failed(e.to_string()).into());
    }

    discard_staging(staging);
    tracing::info!(path = %dest.display(), replaced = replacing, "package published");
    Ok(())
}

fn copy_tree(src: &Path, dst: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dst)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let target = dst.join(entry.file_name());
        if entry.file_type()?.is_dir() {
            copy_tree(&entry.path(), &target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
        }
    }
    Ok(())
}

fn build_set(patterns: &[&str]) -> Result<GlobSet, Error> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        let glob = GlobBuilder::new(pattern)
            .literal_separator(true)
            .build()
            .map_err(|e| invalid_pattern(pattern, &e))?;
        builder.add(glob);
    }
    builder
        .build()
        .map_err(|e| invalid_pattern(&patterns.join(","), &e).into())
}

fn remove_matching(root: &Path, set: &GlobSet) -> Result<usize, Error> {
    let mut removed = 0;
    for (path, _) in walk(root) {
        let Some(rel) = relative(root, &path) else {
            continue;
        };
        if set.is_match(&rel) && path.symlink_metadata().is_ok() {
            remove_path(&path)?;
            removed += 1;
        }
    }
    Ok(removed)
}

fn remove_path(path: &Path) -> Result<(), Error> {
    let Ok(meta) = path.symlink_metadata() else {
        return Ok(());
    };
    let result = if meta.is_dir() {
        std::fs::remove_dir_all(path)
    } else {
        std::fs::remove_file(path)
    };
    result.map_err(|e| Error::io_with_path(&e, path))
}

/// Every entry below `root` with whether it is a directory, parents first
fn walk(root: &Path) -> Vec<(PathBuf, bool)> {
    if !root.exists() {
        return Vec::new();
    }
    ignore::WalkBuilder::new(root)
        .standard_filters(false)
        .hidden(false)
        .parents(false)
        .sort_by_file_name(|a, b| a.cmp(b))
        .build()
        .filter_map(Result::ok)
        .filter(|entry| entry.depth() > 0)
        .map(|entry| {
            let is_dir = entry.file_type().is_some_and(|t| t.is_dir());
            (entry.into_path(), is_dir)
        })
        .collect()
}

/// Relative path with forward slashes
fn relative(root: &Path, path: &Path) -> Option<String> {
    let rel = path.strip_prefix(root).ok()?;
    Some(
        rel.components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/"),
    )
}

fn invalid_pattern(pattern: &str, err: &globset::Error) -> PackageError {
    PackageError::InvalidPattern {
        pattern: pattern.to_string(),
        message: err.to_string(),
    }
}
