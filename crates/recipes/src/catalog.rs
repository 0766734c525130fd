//! Built-in recipe catalog
//!
//! Owns the five recipes and their bundled source tables. A data directory
//! can replace the bundled table of any recipe (`<data_dir>/<recipe>.toml`).

use crate::graph::{resolve_graph, DependencyGraph};
use crate::{CyrusSasl, Libpq, Librdkafka, RocksDb, Soci};
use crucible_builder::{resolve, Overrides, Recipe, ResolvedRecipe};
use crucible_config::SourceTable;
use crucible_errors::{ConfigError, Error};
use crucible_types::{PackageRef, Platform, UpstreamVersion};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The recipes crucible knows how to build
#[derive(Debug, Clone)]
pub struct Catalog {
    recipes: Vec<Arc<dyn Recipe>>,
    data_dir: Option<PathBuf>,
}

impl Catalog {
    /// Catalog of the built-in recipes with bundled source tables
    #[must_use]
    pub fn builtin() -> Self {
        Self {
            recipes: vec![
                Arc::new(CyrusSasl),
                Arc::new(Libpq),
                Arc::new(Librdkafka),
                Arc::new(RocksDb),
                Arc::new(Soci),
            ],
            data_dir: None,
        }
    }

    /// Look for source table overrides in a data directory
    #[must_use]
    pub fn with_data_dir(mut self, data_dir: Option<&Path>) -> Self {
        self.data_dir = data_dir.map(Path::to_path_buf);
        self
    }

    /// Recipe names in catalog order
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.recipes.iter().map(|r| r.name()).collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<dyn Recipe>> {
        self.recipes.iter()
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.recipes.iter().any(|r| r.name() == name)
    }

    /// Recipe by name
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnknownRecipe` if no built-in recipe has that name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Recipe>, ConfigError> {
        self.recipes
            .iter()
            .find(|r| r.name() == name)
            .cloned()
            .ok_or_else(|| ConfigError::UnknownRecipe {
                name: name.to_string(),
            })
    }

    /// Source table of a recipe, preferring the data directory override
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown recipe or a malformed table.
    pub async fn source_table(&self, name: &str) -> Result<SourceTable, Error> {
        let recipe = self.get(name)?;
        if let Some(dir) = &self.data_dir {
            if let Some(table) = SourceTable::load_override(dir, name).await? {
                return Ok(table);
            }
        }
        SourceTable::from_toml(name, recipe.source_table())
    }

    /// Known versions of a recipe, oldest first
    ///
    /// # Errors
    ///
    /// Returns an error for an unknown recipe or a malformed table.
    pub async fn versions(&self, name: &str) -> Result<Vec<UpstreamVersion>, Error> {
        Ok(self.source_table(name).await?.versions())
    }

    /// Resolve one recipe without looking at its dependencies
    ///
    /// # Errors
    ///
    /// Returns any configuration error of the recipe, or
    /// `SourceError::UnknownVersion` when the version has no source.
    pub async fn resolve(
        &self,
        reference: &PackageRef,
        platform: &Platform,
        overrides: &Overrides,
    ) -> Result<ResolvedRecipe, Error> {
        let recipe = self.get(&reference.name)?;
        let table = self.source_table(&reference.name).await?;
        resolve(recipe.as_ref(), &table, &reference.version, platform, overrides)
    }

    /// Resolve a recipe together with every built-in recipe it depends on
    ///
    /// # Errors
    ///
    /// See [`resolve_graph`](crate::resolve_graph).
    pub async fn resolve_graph(
        &self,
        root: &PackageRef,
        platform: &Platform,
        overrides: &Overrides,
    ) -> Result<DependencyGraph, Error> {
        resolve_graph(self, root, platform, overrides).await
    }
}
