//! Resolution and build session
//!
//! [`resolve`] runs every configuration check of a recipe without touching
//! the filesystem or the network. A [`BuildSession`] then drives the side
//! effects in order (fetch, patch, configure, build, package) and memoizes
//! the configured build so packaging never configures a second time.

use crate::build_systems::{BuildPlan, BuildSystem, BuildSystemContext, BuildSystemKind};
use crate::dependencies::{resolve_requirements, DependencyEdge};
use crate::layout::{DependencyLayouts, WorkLayout};
use crate::metadata::{collect_libs, ConsumptionMetadata};
use crate::options::{Overrides, ResolvedOptions};
use crate::packaging::{discard_staging, finalize_staging, publish, ArtifactSet, Linkage};
use crate::patch::{apply_patches, apply_substitutions};
use crate::recipe::{Recipe, RecipeContext};
use crate::runner::CommandRunner;
use crate::source::{extract_source, SourceFetcher};
use crate::translate::{translate, BuildConfiguration};
use crucible_config::{PatchEntry, SourceEntry, SourceTable};
use crucible_errors::{BuildError, Error};
use crucible_types::{PackageRef, Platform, UpstreamVersion};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::OnceCell;

/// A recipe bound to a version, platform and option values
#[derive(Debug, Clone, Serialize)]
pub struct ResolvedRecipe {
    pub name: String,
    pub version: UpstreamVersion,
    pub platform: Platform,
    /// Schema variant the option table came from
    pub variant: &'static str,
    pub options: ResolvedOptions,
    pub dependencies: Vec<DependencyEdge>,
    pub build_requirements: Vec<PackageRef>,
    pub build_system: BuildSystemKind,
    pub source: SourceEntry,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub patches: Vec<PatchEntry>,
    pub package_id: String,
}

impl ResolvedRecipe {
    #[must_use]
    pub fn reference(&self) -> PackageRef {
        PackageRef {
            name: self.name.clone(),
            version: self.version.clone(),
        }
    }
}

/// Resolve options, validate, resolve dependencies and look up the source
///
/// Performs no I/O, so every configuration error surfaces before any
/// download or build starts.
///
/// # Errors
///
/// Returns `ConfigError` for unknown options, invalid values, unsupported
/// combinations and dependency conflicts, and `SourceError::UnknownVersion`
/// when the table has no entry for the version.
pub fn resolve(
    recipe: &dyn Recipe,
    table: &SourceTable,
    version: &UpstreamVersion,
    platform: &Platform,
    overrides: &Overrides,
) -> Result<ResolvedRecipe, Error> {
    let name = recipe.name();
    let schema = recipe.options().select(platform);
    let options = schema.resolve(name, overrides)?;
    recipe.validate(platform, &options)?;

    let dependencies = resolve_requirements(name, &recipe.requirements(), &options, platform)?;
    let build_requirements = recipe
        .build_requirements(platform)
        .into_iter()
        .map(PackageRef::parse)
        .collect::<Result<Vec<_>, _>>()?;

    let source = table.source(version)?.clone();
    let patches = table.patches(version).to_vec();
    let package_id = package_id(name, version, &options, platform);

    tracing::debug!(
        recipe = name,
        version = %version,
        variant = schema.variant,
        package_id = %package_id,
        "recipe resolved"
    );

    Ok(ResolvedRecipe {
        name: name.to_string(),
        version: version.clone(),
        platform: platform.clone(),
        variant: schema.variant,
        options,
        dependencies,
        build_requirements,
        build_system: recipe.build_system(platform),
        source,
        patches,
        package_id,
    })
}

/// Digest of everything that identifies one binary package
#[must_use]
pub fn package_id(
    name: &str,
    version: &UpstreamVersion,
    options: &ResolvedOptions,
    platform: &Platform,
) -> String {
    let mut hasher = Sha256::new();
    hasher.update(format!("{name}/{version}\n").as_bytes());
    hasher.update(options.canonical().as_bytes());
    hasher.update(b"\n");
    hasher.update(platform.fingerprint().as_bytes());
    let digest = hex::encode(hasher.finalize());
    digest[..16].to_string()
}

/// Directories and limits a session works with
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub work_root: PathBuf,
    pub package_root: PathBuf,
    pub jobs: usize,
    /// Explicit dependency locations, overriding published packages
    pub dependency_paths: BTreeMap<String, PathBuf>,
}

/// Result of a successful packaging step
#[derive(Debug, Clone, Serialize)]
pub struct PackageOutcome {
    pub path: PathBuf,
    pub artifacts: ArtifactSet,
    pub metadata: ConsumptionMetadata,
}

/// Build system handle after configure
struct ConfiguredBuild {
    system: Box<dyn BuildSystem>,
    ctx: BuildSystemContext,
    plan: BuildPlan,
}

/// Drives the side effects of one resolved recipe
pub struct BuildSession {
    recipe: Arc<dyn Recipe>,
    resolved: ResolvedRecipe,
    table: SourceTable,
    layout: WorkLayout,
    dependencies: DependencyLayouts,
    package_root: PathBuf,
    jobs: usize,
    runner: Arc<dyn CommandRunner>,
    configured: OnceCell<ConfiguredBuild>,
}

impl BuildSession {
    /// Create a session and locate dependencies
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingDependency` when an explicit dependency
    /// path does not exist or no published package of a dependency fits.
    pub fn new(
        recipe: Arc<dyn Recipe>,
        resolved: ResolvedRecipe,
        table: SourceTable,
        settings: &SessionSettings,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self, Error> {
        let layout = WorkLayout::new(
            &settings.work_root,
            &resolved.name,
            resolved.version.as_str(),
            &resolved.package_id,
        );
        let dependencies = DependencyLayouts::locate(
            &resolved.name,
            &resolved.platform,
            &resolved.dependencies,
            &settings.dependency_paths,
            &settings.package_root,
        )?;

        Ok(Self {
            recipe,
            resolved,
            table,
            layout,
            dependencies,
            package_root: settings.package_root.clone(),
            jobs: settings.jobs,
            runner,
            configured: OnceCell::new(),
        })
    }

    #[must_use]
    pub fn resolved(&self) -> &ResolvedRecipe {
        &self.resolved
    }

    #[must_use]
    pub fn layout(&self) -> &WorkLayout {
        &self.layout
    }

    /// Where the package is published
    #[must_use]
    pub fn package_dir(&self) -> PathBuf {
        published_dir(
            &self.package_root,
            &self.resolved.name,
            &self.resolved.version,
            &self.resolved.package_id,
        )
    }

    fn context(&self) -> RecipeContext<'_> {
        RecipeContext {
            name: &self.resolved.name,
            version: &self.resolved.version,
            platform: &self.resolved.platform,
            options: &self.resolved.options,
            dependencies: &self.dependencies,
            layout: &self.layout,
        }
    }

    /// Translated native arguments; no side effects
    #[must_use]
    pub fn configuration(&self) -> BuildConfiguration {
        let system = self.resolved.build_system;
        translate(system, &self.recipe.arg_rules(system), &self.context())
    }

    /// Check that every required tool is on `PATH`
    ///
    /// # Errors
    ///
    /// Returns `BuildError::MissingTool` for the first missing tool.
    pub fn preflight(&self) -> Result<(), Error> {
        let system = self.resolved.build_system.instantiate();
        let plan = self.recipe.build_plan(&self.context());
        let patch_tool = (!self.resolved.patches.is_empty()).then_some("patch");

        for tool in system
            .required_tools()
            .iter()
            .copied()
            .chain(plan.tools.iter().copied())
            .chain(patch_tool)
        {
            if !self.runner.has_tool(tool) {
                return Err(BuildError::MissingTool {
                    tool: tool.to_string(),
                }
                .into());
            }
        }
        Ok(())
    }

    /// Download (or reuse) and extract the source archive
    ///
    /// # Errors
    ///
    /// Returns source acquisition errors from the fetcher or extraction.
    pub async fn fetch_source(&self, fetcher: &SourceFetcher) -> Result<PathBuf, Error> {
        let archive = fetcher.fetch(&self.resolved.name, &self.resolved.source).await?;
        extract_source(&archive, &self.layout).await
    }

    /// Apply registered patches, then the recipe's substitutions
    ///
    /// # Errors
    ///
    /// Returns `BuildError::PatchFailed` when a patch or substitution does not
    /// apply.
    pub async fn apply_patches(&self) -> Result<(), Error> {
        self.ensure_source()?;
        let applied = apply_patches(
            self.runner.as_ref(),
            &self.table,
            &self.resolved.version,
            &self.layout,
        )
        .await?;
        let substitutions = self.recipe.substitutions(&self.context());
        apply_substitutions(&self.layout.source_dir(), &substitutions).await?;

        tracing::debug!(
            recipe = %self.resolved.name,
            patches = applied,
            substitutions = substitutions.len(),
            "source patched"
        );
        Ok(())
    }

    fn ensure_source(&self) -> Result<(), Error> {
        let source = self.layout.source_dir();
        if source.is_dir() {
            Ok(())
        } else {
            Err(BuildError::SourceMissing {
                path: source.display().to_string(),
            }
            .into())
        }
    }

    /// Configure once; later calls return the same handle
    async fn configured(&self) -> Result<&ConfiguredBuild, Error> {
        self.configured
            .get_or_try_init(|| self.run_configure())
            .await
    }

    async fn run_configure(&self) -> Result<ConfiguredBuild, Error> {
        self.ensure_source()?;
        let config = self.configuration();
        let plan = self.recipe.build_plan(&self.context());
        let system = self.resolved.build_system.instantiate();

        let mut ctx = BuildSystemContext::new(
            &self.layout,
            self.jobs,
            self.resolved.platform.build_type,
            Arc::clone(&self.runner),
        )
        .with_env(&config.env);
        if system.prefers_out_of_source_build() {
            ctx = ctx.with_build_dir(self.layout.build_dir());
        }

        for cmd in &plan.bootstrap {
            let result = self.runner.run(cmd).await?;
            if !result.success {
                return Err(BuildError::ConfigureFailed {
                    message: format!("{cmd} failed: {}", result.tail(20)),
                }
                .into());
            }
        }

        tracing::info!(
            recipe = %self.resolved.name,
            build_system = system.name(),
            "configuring"
        );
        system.configure(&ctx, &config).await?;

        Ok(ConfiguredBuild { system, ctx, plan })
    }

    /// Configure if needed, then compile
    ///
    /// # Errors
    ///
    /// Returns `BuildError::ConfigureFailed` or `BuildError::CompileFailed`.
    pub async fn build(&self) -> Result<(), Error> {
        let configured = self.configured().await?;
        tracing::info!(recipe = %self.resolved.name, "building");
        configured
            .system
            .build(&configured.ctx, &configured.plan.build)
            .await
    }

    /// Install into staging, filter, check and publish
    ///
    /// Reuses the configured build. Nothing is published unless every step
    /// succeeds.
    ///
    /// # Errors
    ///
    /// Returns `BuildError::InstallFailed` or a `PackageError`.
    pub async fn package(&self) -> Result<PackageOutcome, Error> {
        let configured = self.configured().await?;
        let staging = self.layout.package_dir();
        discard_staging(&staging);

        let staged = self.stage(configured).await;
        let (artifacts, metadata) = match staged {
            Ok(staged) => staged,
            Err(e) => {
                discard_staging(&staging);
                return Err(e);
            }
        };

        let dest = self.package_dir();
        if let Err(e) = publish(&staging, &dest) {
            discard_staging(&staging);
            return Err(e);
        }
        Ok(PackageOutcome {
            path: dest,
            artifacts,
            metadata,
        })
    }

    async fn stage(
        &self,
        configured: &ConfiguredBuild,
    ) -> Result<(ArtifactSet, ConsumptionMetadata), Error> {
        let staging = self.layout.package_dir();
        tokio::fs::create_dir_all(&staging)
            .await
            .map_err(|e| Error::io_with_path(&e, &staging))?;

        configured
            .system
            .install(&configured.ctx, &configured.plan.install)
            .await?;

        let plan = self.recipe.package_plan(&self.context());
        let artifacts =
            finalize_staging(&self.layout, &plan, Linkage::from_options(&self.resolved.options))?;

        let metadata = self.metadata(&staging);
        metadata.write_to(&staging).await?;
        Ok((artifacts, metadata))
    }

    /// Consumption metadata for a packaged tree
    #[must_use]
    pub fn metadata(&self, package_dir: &Path) -> ConsumptionMetadata {
        let mut metadata = ConsumptionMetadata::new(
            &self.resolved.name,
            self.resolved.version.clone(),
            &self.resolved.package_id,
            self.resolved.platform.clone(),
            self.resolved.options.to_string_map(),
        );
        metadata.libs = collect_libs(package_dir);
        self.recipe.package_info(&self.context(), &mut metadata);
        metadata
    }

    /// Fetch, patch, build and package
    ///
    /// # Errors
    ///
    /// Returns the first error of any step.
    pub async fn create(&self, fetcher: &SourceFetcher) -> Result<PackageOutcome, Error> {
        self.preflight()?;
        self.fetch_source(fetcher).await?;
        self.apply_patches().await?;
        self.build().await?;
        self.package().await
    }
}

/// `<package_root>/<name>/<version>/<package_id>`
#[must_use]
pub fn published_dir(
    package_root: &Path,
    name: &str,
    version: &UpstreamVersion,
    package_id: &str,
) -> PathBuf {
    package_root
        .join(name)
        .join(version.as_str())
        .join(package_id)
}
