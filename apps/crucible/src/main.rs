//! crucible - recipe engine for native C and C++ libraries
//!
//! Command line front end over the recipe catalog and the build engine.

mod cli;
mod display;
mod error;
mod logging;

use crate::cli::{Cli, Commands, DependencyArgs, TargetArgs};
use crate::display::{OptionsReport, OutputRenderer, RecipeSummary, Report};
use crate::error::CliError;
use clap::Parser;
use crucible_builder::{
    published_dir, BuildSession, ConsumptionMetadata, SessionSettings, SourceFetcher,
    SystemRunner,
};
use crucible_config::Config;
use crucible_net::{NetClient, NetConfig};
use crucible_recipes::Catalog;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process;
use std::sync::Arc;
use tracing::{debug, error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    let json_mode = cli.global.json;

    logging::init_tracing(json_mode, cli.global.verbose, cli.global.debug);

    if let Err(e) = run(cli).await {
        error!(code = ?e.code(), "command failed: {e}");
        if json_mode {
            let body = serde_json::json!({
                "error": e.to_string(),
                "code": e.code(),
            });
            println!("{body}");
        } else {
            eprintln!("Error: {e}");
        }
        process::exit(1);
    }
}

/// Main application logic
async fn run(cli: Cli) -> Result<(), CliError> {
    debug!("starting crucible v{}", env!("CARGO_PKG_VERSION"));

    // File config (or defaults), then environment, then CLI flags
    let mut config = Config::load_or_default(cli.global.config.as_deref()).await?;
    config.merge_env()?;
    apply_cli_config(&mut config, &cli.command);

    let catalog = Catalog::builtin().with_data_dir(config.data_dir());
    let report = execute_command(cli.command, &config, &catalog).await?;

    OutputRenderer::new(cli.global.json).render(&report)?;
    Ok(())
}

/// Execute the specified command
async fn execute_command(
    command: Commands,
    config: &Config,
    catalog: &Catalog,
) -> Result<Report, CliError> {
    match command {
        Commands::List => {
            let mut recipes = Vec::new();
            for recipe in catalog.iter() {
                recipes.push(RecipeSummary {
                    name: recipe.name(),
                    description: recipe.description(),
                    license: recipe.license(),
                    homepage: recipe.homepage(),
                    versions: catalog
                        .versions(recipe.name())
                        .await?
                        .iter()
                        .map(ToString::to_string)
                        .collect(),
                });
            }
            Ok(Report::RecipeList(recipes))
        }

        Commands::Options { recipe, platform } => {
            let platform = platform.platform()?;
            let schema = catalog.get(&recipe)?.options().select(&platform);
            Ok(Report::Options(OptionsReport {
                recipe,
                platform,
                schema,
            }))
        }

        Commands::Resolve { target, graph } => {
            let reference = target.reference()?;
            let platform = target.platform.platform()?;
            let overrides = target.overrides()?;
            if graph {
                let graph = catalog.resolve_graph(&reference, &platform, &overrides).await?;
                Ok(Report::Graph(graph))
            } else {
                let resolved = catalog.resolve(&reference, &platform, &overrides).await?;
                Ok(Report::Resolved(Box::new(resolved)))
            }
        }

        Commands::Args { target, deps } => {
            let session = open_session(catalog, config, &target, &deps).await?;
            Ok(Report::Configuration(session.configuration()))
        }

        Commands::Create {
            target,
            deps,
            offline,
            ..
        } => {
            let session = open_session(catalog, config, &target, &deps).await?;
            let client = NetClient::new(&NetConfig::with_timeout_secs(config.network.timeout))?;
            let fetcher = SourceFetcher::new(client, config.cache_dir())
                .with_network_access(config.network.access && !offline);

            info!(
                recipe = %session.resolved().name,
                version = %session.resolved().version,
                package_id = %session.resolved().package_id,
                "creating package"
            );
            let outcome = session.create(&fetcher).await?;
            Ok(Report::Package(Box::new(outcome)))
        }

        Commands::Info { target } => {
            let reference = target.reference()?;
            let platform = target.platform.platform()?;
            let resolved = catalog
                .resolve(&reference, &platform, &target.overrides()?)
                .await?;
            let dir = published_dir(
                &config.package_root(),
                &resolved.name,
                &resolved.version,
                &resolved.package_id,
            );
            let metadata = ConsumptionMetadata::read_from(&dir).await?;
            Ok(Report::Metadata(Box::new(metadata)))
        }
    }
}

/// Resolve a target and bind it to the configured directories
async fn open_session(
    catalog: &Catalog,
    config: &Config,
    target: &TargetArgs,
    deps: &DependencyArgs,
) -> Result<BuildSession, CliError> {
    let reference = target.reference()?;
    let platform = target.platform.platform()?;
    let resolved = catalog
        .resolve(&reference, &platform, &target.overrides()?)
        .await?;

    let settings = session_settings(config, deps.paths()?);
    let session = BuildSession::new(
        catalog.get(&reference.name)?,
        resolved,
        catalog.source_table(&reference.name).await?,
        &settings,
        Arc::new(SystemRunner),
    )?;
    Ok(session)
}

fn session_settings(config: &Config, dependency_paths: BTreeMap<String, PathBuf>) -> SessionSettings {
    SessionSettings {
        work_root: config.work_root(),
        package_root: config.package_root(),
        jobs: config.build_jobs(),
        dependency_paths,
    }
}

/// Apply CLI configuration overrides (highest precedence)
fn apply_cli_config(config: &mut Config, command: &Commands) {
    if let Commands::Create {
        jobs: Some(job_count),
        ..
    } = command
    {
        config.build.build_jobs = *job_count;
    }
}
