#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]
//! Recipe engine for crucible
//!
//! This crate resolves a recipe's options and dependencies, acquires and
//! patches its source, drives the native build system and packages the
//! result together with its consumption metadata.

mod build_systems;
mod dependencies;
mod layout;
mod metadata;
mod options;
mod packaging;
mod patch;
mod recipe;
mod runner;
mod session;
mod source;
mod translate;

pub use build_systems::{
    AutotoolsBuildSystem, BuildPlan, BuildSystem, BuildSystemContext, BuildSystemKind,
    CMakeBuildSystem, ProjectFileBuildSystem, Step,
};
pub use dependencies::{merge_coercions, resolve_requirements, Condition, DependencyEdge, Requirement};
pub use layout::{
    DependencyLayout, DependencyLayouts, WorkLayout, BUILD_SUBFOLDER, PACKAGE_SUBFOLDER,
    SOURCE_SUBFOLDER,
};
pub use metadata::{collect_libs, Component, ConsumptionMetadata, METADATA_FILE};
pub use options::{
    EffectiveSchema, OptionDecl, OptionSchema, Overrides, ResolvedOptions, SchemaVariant,
};
pub use packaging::{
    apply_copy_rule, check_expected, discard_staging, filter_linkage, finalize_staging,
    prune_metadata, publish, ArtifactSet, CopyRule, Linkage, PackagePlan,
};
pub use patch::{apply_patches, apply_substitutions, TextSubstitution};
pub use recipe::{Recipe, RecipeContext};
pub use runner::{CommandOutput, CommandRunner, NativeCommand, RecordingRunner, SystemRunner};
pub use session::{
    package_id, published_dir, resolve, BuildSession, PackageOutcome, ResolvedRecipe,
    SessionSettings,
};
pub use source::{extract_source, sha256_file, ArchiveFormat, SourceFetcher};
pub use translate::{translate, ArgFragment, ArgRule, BuildConfiguration};
