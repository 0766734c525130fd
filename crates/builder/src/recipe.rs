//! The recipe trait
//!
//! A recipe is a set of declarative tables (options, dependencies, argument
//! rules, packaging plan) plus a few hooks that read the resolved
//! configuration. Nothing in a recipe performs I/O; the session drives every
//! side effect.

use crate::build_systems::{BuildPlan, BuildSystemKind};
use crate::dependencies::Requirement;
use crate::layout::{DependencyLayouts, WorkLayout};
use crate::metadata::ConsumptionMetadata;
use crate::options::{OptionSchema, ResolvedOptions};
use crate::packaging::PackagePlan;
use crate::patch::TextSubstitution;
use crate::translate::ArgRule;
use crucible_errors::ConfigError;
use crucible_types::{Platform, UpstreamVersion};

/// Everything a recipe hook may read
#[derive(Debug, Clone, Copy)]
pub struct RecipeContext<'a> {
    pub name: &'a str,
    pub version: &'a UpstreamVersion,
    pub platform: &'a Platform,
    pub options: &'a ResolvedOptions,
    pub dependencies: &'a DependencyLayouts,
    pub layout: &'a WorkLayout,
}

impl RecipeContext<'_> {
    /// Whether a boolean option is on; absent options read as off
    #[must_use]
    pub fn enabled(&self, option: &str) -> bool {
        self.options.enabled(option)
    }

    /// Root of a located dependency, if it was found
    #[must_use]
    pub fn dependency_root(&self, name: &str) -> Option<String> {
        self.dependencies
            .get(name)
            .map(|layout| layout.root.display().to_string())
    }
}

/// Descriptor for building one upstream library
pub trait Recipe: std::fmt::Debug + Send + Sync {
    fn name(&self) -> &'static str;

    fn description(&self) -> &'static str;

    fn homepage(&self) -> &'static str;

    fn license(&self) -> &'static str;

    /// Bundled version → source/patch table (TOML)
    fn source_table(&self) -> &'static str;

    /// Option table and its platform variants
    fn options(&self) -> OptionSchema;

    /// Reject unsupported platform and option combinations
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::UnsupportedConfiguration` for combinations the
    /// recipe cannot build.
    fn validate(&self, _platform: &Platform, _options: &ResolvedOptions) -> Result<(), ConfigError> {
        Ok(())
    }

    /// Library dependencies
    fn requirements(&self) -> Vec<Requirement>;

    /// Tool packages needed on the build machine
    fn build_requirements(&self, _platform: &Platform) -> Vec<&'static str> {
        Vec::new()
    }

    fn build_system(&self, platform: &Platform) -> BuildSystemKind;

    /// Option → native argument table for a build system
    fn arg_rules(&self, system: BuildSystemKind) -> Vec<ArgRule>;

    /// Literal source edits applied after patches
    fn substitutions(&self, _ctx: &RecipeContext<'_>) -> Vec<TextSubstitution> {
        Vec::new()
    }

    fn build_plan(&self, _ctx: &RecipeContext<'_>) -> BuildPlan {
        BuildPlan::default()
    }

    fn package_plan(&self, ctx: &RecipeContext<'_>) -> PackagePlan;

    /// Fill in recipe-specific consumption metadata
    fn package_info(&self, ctx: &RecipeContext<'_>, metadata: &mut ConsumptionMetadata);
}
