//! Recipe context fixture for unit tests

use crucible_builder::{
    translate, BuildConfiguration, DependencyLayouts, Overrides, Recipe, RecipeContext,
    ResolvedOptions, WorkLayout,
};
use crucible_types::{Platform, UpstreamVersion};
use std::path::{Path, PathBuf};

/// Owns everything a [`RecipeContext`] borrows
pub(crate) struct Bound {
    pub name: &'static str,
    pub version: UpstreamVersion,
    pub platform: Platform,
    pub options: ResolvedOptions,
    pub dependencies: DependencyLayouts,
    pub layout: WorkLayout,
}

impl Bound {
    pub fn new(
        recipe: &dyn Recipe,
        version: &str,
        platform: Platform,
        overrides: &[(&str, &str)],
    ) -> Self {
        let overrides: Overrides = overrides
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        let options = recipe
            .options()
            .select(&platform)
            .resolve(recipe.name(), &overrides)
            .unwrap();
        Self {
            name: recipe.name(),
            version: UpstreamVersion::parse(version).unwrap(),
            platform,
            options,
            dependencies: DependencyLayouts::default(),
            layout: WorkLayout::new(Path::new("/w"), recipe.name(), version, "id"),
        }
    }

    pub fn with_dependency(mut self, name: &str, root: &str) -> Self {
        self.dependencies.insert(name, PathBuf::from(root));
        self
    }

    pub fn ctx(&self) -> RecipeContext<'_> {
        RecipeContext {
            name: self.name,
            version: &self.version,
            platform: &self.platform,
            options: &self.options,
            dependencies: &self.dependencies,
            layout: &self.layout,
        }
    }

    pub fn configuration(&self, recipe: &dyn Recipe) -> BuildConfiguration {
        let system = recipe.build_system(&self.platform);
        translate(system, &recipe.arg_rules(system), &self.ctx())
    }
}
