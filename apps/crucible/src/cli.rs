//! Command line interface definition

use crate::error::CliError;
use clap::{Args, Parser, Subcommand};
use crucible_builder::Overrides;
use crucible_types::{
    Arch, BuildType, Compiler, CompilerKind, Os, PackageRef, Platform, Runtime, UpstreamVersion,
};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// crucible - recipe engine for native C and C++ libraries
#[derive(Parser)]
#[command(name = "crucible")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Recipe engine for native C and C++ libraries")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Global arguments available for all commands
#[derive(Parser)]
pub struct GlobalArgs {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Log progress to stderr
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Enable debug logging
    #[arg(long, global = true)]
    pub debug: bool,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// List built-in recipes and their known versions
    #[command(alias = "ls")]
    List,

    /// Show the option table of a recipe for a platform
    Options {
        /// Recipe name
        recipe: String,

        #[command(flatten)]
        platform: PlatformArgs,
    },

    /// Resolve options, dependencies and build requirements
    Resolve {
        #[command(flatten)]
        target: TargetArgs,

        /// Resolve every built-in dependency as well
        #[arg(long)]
        graph: bool,
    },

    /// Show the translated build configuration without building
    Args {
        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        deps: DependencyArgs,
    },

    /// Fetch, patch, build and package a recipe
    Create {
        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        deps: DependencyArgs,

        /// Number of parallel build jobs (0=auto)
        #[arg(short, long)]
        jobs: Option<usize>,

        /// Only use cached source archives
        #[arg(long)]
        offline: bool,
    },

    /// Show the consumption metadata of a packaged recipe
    Info {
        #[command(flatten)]
        target: TargetArgs,
    },
}

/// Recipe reference with option overrides and platform
#[derive(Args)]
pub struct TargetArgs {
    /// Recipe reference (name/version)
    pub reference: String,

    /// Option override (name=value), repeatable
    #[arg(short = 'o', long = "option", value_name = "NAME=VALUE")]
    pub options: Vec<String>,

    #[command(flatten)]
    pub platform: PlatformArgs,
}

impl TargetArgs {
    /// Parsed package reference
    ///
    /// # Errors
    ///
    /// Returns an error if the reference is not `name/version`.
    pub fn reference(&self) -> Result<PackageRef, CliError> {
        Ok(PackageRef::parse(&self.reference)?)
    }

    /// Option overrides keyed by option name
    ///
    /// # Errors
    ///
    /// Returns an error for an entry without `=`.
    pub fn overrides(&self) -> Result<Overrides, CliError> {
        parse_pairs("option", &self.options)
    }
}

/// Explicit dependency locations
#[derive(Args)]
pub struct DependencyArgs {
    /// Package directory of a dependency (name=path), repeatable
    #[arg(long = "dep", value_name = "NAME=PATH")]
    pub deps: Vec<String>,
}

impl DependencyArgs {
    /// Dependency paths keyed by package name
    ///
    /// # Errors
    ///
    /// Returns an error for an entry without `=`.
    pub fn paths(&self) -> Result<BTreeMap<String, PathBuf>, CliError> {
        Ok(parse_pairs("dep", &self.deps)?
            .into_iter()
            .map(|(name, path)| (name, PathBuf::from(path)))
            .collect())
    }
}

/// Target description; unset flags describe the host
#[derive(Args)]
pub struct PlatformArgs {
    /// Target operating system
    #[arg(long, value_enum)]
    pub os: Option<Os>,

    /// Target architecture
    #[arg(long, value_enum)]
    pub arch: Option<Arch>,

    /// Compiler family
    #[arg(long, value_enum)]
    pub compiler: Option<CompilerKind>,

    /// Compiler version
    #[arg(long, requires = "compiler")]
    pub compiler_version: Option<String>,

    /// MSVC runtime
    #[arg(long, value_enum)]
    pub runtime: Option<Runtime>,

    /// C++ standard
    #[arg(long)]
    pub cppstd: Option<String>,

    /// Build type
    #[arg(long, value_enum, default_value = "Release")]
    pub build_type: BuildType,

    /// Operating system of the build machine
    #[arg(long, value_enum)]
    pub build_os: Option<Os>,
}

impl PlatformArgs {
    /// Platform described by the flags
    ///
    /// # Errors
    ///
    /// Returns an error if the compiler version cannot be parsed or a
    /// compiler family is given without a version.
    pub fn platform(&self) -> Result<Platform, CliError> {
        let os = self.os.unwrap_or_else(Os::host);
        let arch = self.arch.unwrap_or_else(Arch::host);
        let mut platform = Platform::new(os, arch).with_build_type(self.build_type);

        if let Some(kind) = self.compiler {
            let raw = self.compiler_version.as_deref().ok_or_else(|| {
                CliError::InvalidArguments("--compiler requires --compiler-version".to_string())
            })?;
            let mut compiler = Compiler::new(kind, UpstreamVersion::parse(raw)?);
            compiler.runtime = platform.compiler.runtime.filter(|_| kind == CompilerKind::Msvc);
            platform = platform.with_compiler(compiler);
        }
        if let Some(runtime) = self.runtime {
            platform.compiler.runtime = Some(runtime);
        }
        if let Some(cppstd) = &self.cppstd {
            platform.compiler.cppstd = Some(cppstd.clone());
        }
        if let Some(build_os) = self.build_os {
            platform = platform.with_build_machine(build_os, arch);
        }
        Ok(platform)
    }
}

fn parse_pairs(flag: &str, entries: &[String]) -> Result<BTreeMap<String, String>, CliError> {
    entries
        .iter()
        .map(|entry| {
            entry
                .split_once('=')
                .filter(|(name, _)| !name.trim().is_empty())
                .map(|(name, value)| (name.trim().to_string(), value.trim().to_string()))
                .ok_or_else(|| {
                    CliError::InvalidArguments(format!("--{flag} expects NAME=VALUE, got '{entry}'"))
                })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("crucible").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_resolve_with_overrides() {
        let cli = parse(&["resolve", "rocksdb/6.8.1", "-o", "shared=False", "-o", "with_zstd=True"]);
        let Commands::Resolve { target, graph } = cli.command else {
            panic!("expected resolve");
        };
        assert!(!graph);
        assert_eq!(target.reference().unwrap().to_string(), "rocksdb/6.8.1");
        let overrides = target.overrides().unwrap();
        assert_eq!(overrides.get("shared").map(String::as_str), Some("False"));
        assert_eq!(overrides.get("with_zstd").map(String::as_str), Some("True"));
    }

    #[test]
    fn test_malformed_override() {
        let cli = parse(&["resolve", "soci/4.0.0", "-o", "shared"]);
        let Commands::Resolve { target, .. } = cli.command else {
            panic!("expected resolve");
        };
        assert!(matches!(target.overrides(), Err(CliError::InvalidArguments(_))));
    }

    #[test]
    fn test_platform_flags() {
        let cli = parse(&[
            "args",
            "libpq/12.2",
            "--os",
            "windows",
            "--arch",
            "x86_64",
            "--runtime",
            "MT",
            "--build-type",
            "Debug",
            "--dep",
            "zlib=/pkgs/zlib",
        ]);
        let Commands::Args { target, deps } = cli.command else {
            panic!("expected args");
        };
        let platform = target.platform.platform().unwrap();
        assert!(platform.is_msvc());
        assert_eq!(platform.compiler.runtime, Some(Runtime::MT));
        assert_eq!(platform.build_type, BuildType::Debug);
        assert!(!platform.is_cross_building());
        assert_eq!(
            deps.paths().unwrap().get("zlib"),
            Some(&PathBuf::from("/pkgs/zlib"))
        );
    }

    #[test]
    fn test_gcc_on_windows_drops_runtime() {
        let cli = parse(&[
            "options",
            "libpq",
            "--os",
            "windows",
            "--compiler",
            "gcc",
            "--compiler-version",
            "9",
            "--build-os",
            "linux",
        ]);
        let Commands::Options { platform, .. } = cli.command else {
            panic!("expected options");
        };
        let platform = platform.platform().unwrap();
        assert!(platform.is_mingw());
        assert_eq!(platform.compiler.runtime, None);
        assert!(platform.is_cross_building());
    }
}
