//! Build system abstraction and implementations
//!
//! This module provides a trait-based abstraction over the native build
//! systems the recipes drive: an autotools flow, a CMake flow, and the perl
//! project-file flow PostgreSQL uses for MSVC. Which one runs is a pure
//! function of the recipe and the platform, decided once per session.

use crate::translate::BuildConfiguration;
use async_trait::async_trait;
use crucible_errors::Error;
use serde::Serialize;
use std::fmt;

mod autotools;
mod cmake;
mod core;
mod project_file;

pub use autotools::AutotoolsBuildSystem;
pub use cmake::CMakeBuildSystem;
pub use core::{BuildPlan, BuildSystemContext, Step};
pub use project_file::ProjectFileBuildSystem;

/// Trait for build system implementations
#[async_trait]
pub trait BuildSystem: Send + Sync {
    /// Get build system name
    fn name(&self) -> &'static str;

    /// Tools that must be on `PATH` before anything runs
    fn required_tools(&self) -> &'static [&'static str];

    /// Configure phase
    async fn configure(
        &self,
        ctx: &BuildSystemContext,
        config: &BuildConfiguration,
    ) -> Result<(), Error>;

    /// Build phase
    async fn build(&self, ctx: &BuildSystemContext, steps: &[Step]) -> Result<(), Error>;

    /// Install phase, writing into the staging prefix
    async fn install(&self, ctx: &BuildSystemContext, steps: &[Step]) -> Result<(), Error>;

    /// Check if out-of-source build is preferred
    fn prefers_out_of_source_build(&self) -> bool {
        false
    }
}

/// Which build system a recipe uses on a platform
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildSystemKind {
    Autotools,
    #[serde(rename = "cmake")]
    CMake,
    ProjectFile,
}

impl BuildSystemKind {
    /// Instantiate the implementation
    #[must_use]
    pub fn instantiate(self) -> Box<dyn BuildSystem> {
        match self {
            Self::Autotools => Box::new(AutotoolsBuildSystem::new()),
            Self::CMake => Box::new(CMakeBuildSystem::new()),
            Self::ProjectFile => Box::new(ProjectFileBuildSystem::new()),
        }
    }
}

impl fmt::Display for BuildSystemKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Autotools => write!(f, "autotools"),
            Self::CMake => write!(f, "cmake"),
            Self::ProjectFile => write!(f, "project-file"),
        }
    }
}
