#![deny(clippy::pedantic, unsafe_code)]
#![allow(clippy::module_name_repetitions)]

//! Settings for crucible
//!
//! Values are layered: built-in defaults, then `<config_dir>/crucible/config.toml`,
//! then `CRUCIBLE_*` environment variables, then command line flags applied
//! by the caller.
//!
//! It also owns the external data tables that map recipe versions to source
//! archives and patch lists (see [`sources`]).

pub mod sources;

pub use sources::{PatchEntry, SourceEntry, SourceTable};

use crucible_errors::{ConfigError, Error};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::fs;

/// Layered crucible settings
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub paths: PathConfig,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub network: NetworkConfig,
}

/// Path configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct PathConfig {
    /// Scratch area holding one work directory per build
    pub work_root: Option<PathBuf>,
    /// Where finished packages are published
    pub package_root: Option<PathBuf>,
    /// Download cache for source archives
    pub cache_dir: Option<PathBuf>,
    /// Optional directory with per-recipe source table overrides
    pub data_dir: Option<PathBuf>,
}

/// Build configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    #[serde(default = "default_build_jobs")]
    /// `0` picks a value from the CPU count
    pub build_jobs: usize,
}

/// Network configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NetworkConfig {
    #[serde(default = "default_network_access")]
    pub access: bool,
    #[serde(default = "default_timeout")]
    pub timeout: u64, // seconds
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self { build_jobs: 0 }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            access: true,
            timeout: 300, // 5 minutes
        }
    }
}

fn default_build_jobs() -> usize {
    0 // 0 = auto-detect
}

fn default_network_access() -> bool {
    true
}

fn default_timeout() -> u64 {
    300
}

fn parse_bool(field: &str, value: String) -> Result<bool, Error> {
    match value.as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            field: field.to_string(),
            value,
        }
        .into()),
    }
}

fn app_dir(base: Option<PathBuf>) -> PathBuf {
    base.unwrap_or_else(|| PathBuf::from(".")).join("crucible")
}

impl Config {
    /// `<config_dir>/crucible/config.toml`
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` when the platform has no config directory.
    pub fn default_path() -> Result<PathBuf, Error> {
        dirs::config_dir()
            .map(|dir| app_dir(Some(dir)).join("config.toml"))
            .ok_or_else(|| {
                ConfigError::NotFound {
                    path: "platform config directory".to_string(),
                }
                .into()
            })
    }

    /// Read one TOML settings file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` for an unreadable file and
    /// `ConfigError::ParseError` for malformed TOML.
    pub async fn load_from_file(path: &Path) -> Result<Self, Error> {
        let contents = fs::read_to_string(path)
            .await
            .map_err(|_| ConfigError::NotFound {
                path: path.display().to_string(),
            })?;

        toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError {
                message: e.to_string(),
            })
            .map_err(Into::into)
    }

    /// Settings from the default location, or defaults when there is no file
    ///
    /// # Errors
    ///
    /// Returns an error for an existing but unreadable or malformed file.
    pub async fn load() -> Result<Self, Error> {
        let Ok(config_path) = Self::default_path() else {
            return Ok(Self::default());
        };

        if config_path.exists() {
            tracing::debug!(path = %config_path.display(), "loading configuration");
            Self::load_from_file(&config_path).await
        } else {
            Ok(Self::default())
        }
    }

    /// Settings from an explicit `--config` path, or the default location
    ///
    /// # Errors
    ///
    /// Returns an error if the chosen file cannot be read or parsed
    pub async fn load_or_default(path: Option<&Path>) -> Result<Self, Error> {
        match path {
            Some(config_path) => Self::load_from_file(config_path).await,
            None => Self::load().await,
        }
    }

    /// Apply `CRUCIBLE_*` environment overrides
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidValue` for a job count or network flag
    /// that does not parse.
    pub fn merge_env(&mut self) -> Result<(), Error> {
        if let Ok(path) = std::env::var("CRUCIBLE_WORK_ROOT") {
            self.paths.work_root = Some(PathBuf::from(path));
        }

        if let Ok(path) = std::env::var("CRUCIBLE_PACKAGE_ROOT") {
            self.paths.package_root = Some(PathBuf::from(path));
        }

        if let Ok(path) = std::env::var("CRUCIBLE_CACHE_DIR") {
            self.paths.cache_dir = Some(PathBuf::from(path));
        }

        if let Ok(path) = std::env::var("CRUCIBLE_DATA_DIR") {
            self.paths.data_dir = Some(PathBuf::from(path));
        }

        if let Ok(jobs) = std::env::var("CRUCIBLE_BUILD_JOBS") {
            self.build.build_jobs = jobs.parse().map_err(|_| ConfigError::InvalidValue {
                field: "CRUCIBLE_BUILD_JOBS".to_string(),
                value: jobs,
            })?;
        }

        if let Ok(network) = std::env::var("CRUCIBLE_NETWORK_ACCESS") {
            self.network.access = parse_bool("CRUCIBLE_NETWORK_ACCESS", network)?;
        }

        Ok(())
    }

    /// Get the work root (with default)
    #[must_use]
    pub fn work_root(&self) -> PathBuf {
        self.paths
            .work_root
            .clone()
            .unwrap_or_else(|| app_dir(dirs::cache_dir()).join("work"))
    }

    /// Get the package root (with default)
    #[must_use]
    pub fn package_root(&self) -> PathBuf {
        self.paths
            .package_root
            .clone()
            .unwrap_or_else(|| app_dir(dirs::data_local_dir()).join("packages"))
    }

    /// Get the download cache (with default)
    #[must_use]
    pub fn cache_dir(&self) -> PathBuf {
        self.paths
            .cache_dir
            .clone()
            .unwrap_or_else(|| app_dir(dirs::cache_dir()).join("downloads"))
    }

    /// Directory holding source table overrides, if configured
    #[must_use]
    pub fn data_dir(&self) -> Option<&Path> {
        self.paths.data_dir.as_deref()
    }

    /// Effective number of parallel build jobs
    #[must_use]
    pub fn build_jobs(&self) -> usize {
        calculate_build_jobs(self.build.build_jobs)
    }
}

/// Job count for a configured value; `0` picks 75 % of the CPUs
#[must_use]
pub fn calculate_build_jobs(config_value: usize) -> usize {
    if config_value > 0 {
        config_value // User override
    } else {
        let cpus = num_cpus::get();
        (cpus * 3 / 4).max(1)
    }
}
