//! Core types and utilities for build systems

use crate::layout::WorkLayout;
use crate::runner::{CommandOutput, CommandRunner, NativeCommand};
use crucible_errors::Error;
use crucible_types::BuildType;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Build system context containing all necessary information for building
#[derive(Clone)]
pub struct BuildSystemContext {
    /// Source directory
    pub source_dir: PathBuf,
    /// Build directory (same as source for in-source builds)
    pub build_dir: PathBuf,
    /// Installation prefix (the staging directory)
    pub prefix: PathBuf,
    /// Number of parallel jobs
    pub jobs: usize,
    pub build_type: BuildType,
    /// Environment applied to every native command
    pub env: BTreeMap<String, String>,
    runner: Arc<dyn CommandRunner>,
}

impl BuildSystemContext {
    /// Create a new build context for a work layout
    #[must_use]
    pub fn new(
        layout: &WorkLayout,
        jobs: usize,
        build_type: BuildType,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            source_dir: layout.source_dir(),
            build_dir: layout.source_dir(),
            prefix: layout.package_dir(),
            jobs: jobs.max(1),
            build_type,
            env: BTreeMap::new(),
            runner,
        }
    }

    /// Set build directory for out-of-source builds
    #[must_use]
    pub fn with_build_dir(mut self, build_dir: PathBuf) -> Self {
        self.build_dir = build_dir;
        self
    }

    /// Add extra environment variables
    #[must_use]
    pub fn with_env(mut self, env: &BTreeMap<String, String>) -> Self {
        self.env
            .extend(env.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }

    /// Command preloaded with the context environment
    #[must_use]
    pub fn command(&self, program: &str, cwd: &Path) -> NativeCommand {
        NativeCommand::new(program, cwd).envs(&self.env)
    }

    /// Execute a command in the build context
    ///
    /// # Errors
    ///
    /// Returns an error if the command cannot be launched.
    pub async fn execute(&self, command: &NativeCommand) -> Result<CommandOutput, Error> {
        self.runner.run(command).await
    }

    #[must_use]
    pub fn runner(&self) -> &Arc<dyn CommandRunner> {
        &self.runner
    }
}

impl std::fmt::Debug for BuildSystemContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildSystemContext")
            .field("source_dir", &self.source_dir)
            .field("build_dir", &self.build_dir)
            .field("prefix", &self.prefix)
            .field("jobs", &self.jobs)
            .field("build_type", &self.build_type)
            .field("env", &self.env)
            .finish_non_exhaustive()
    }
}

/// One invocation of the build tool
///
/// `dir` is relative to the source tree; `target` is the make target (or the
/// project name for the project-file flow).
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Step {
    pub dir: String,
    pub target: Option<String>,
}

impl Step {
    /// Default target at the top of the tree
    #[must_use]
    pub fn root() -> Self {
        Self::default()
    }

    /// Named target at the top of the tree
    #[must_use]
    pub fn target(target: &str) -> Self {
        Self {
            dir: String::new(),
            target: Some(target.to_string()),
        }
    }

    /// Default target in a subdirectory
    #[must_use]
    pub fn in_dir(dir: &str) -> Self {
        Self {
            dir: dir.to_string(),
            target: None,
        }
    }

    /// Named target in a subdirectory
    #[must_use]
    pub fn in_dir_target(dir: &str, target: &str) -> Self {
        Self {
            dir: dir.to_string(),
            target: Some(target.to_string()),
        }
    }

    pub(crate) fn cwd(&self, base: &Path) -> PathBuf {
        if self.dir.is_empty() {
            base.to_path_buf()
        } else {
            base.join(&self.dir)
        }
    }
}

/// What a recipe asks the build system to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildPlan {
    /// Extra tools beyond the build system's own
    pub tools: Vec<&'static str>,
    /// Commands run once before configure (e.g. `autogen.sh`)
    pub bootstrap: Vec<NativeCommand>,
    pub build: Vec<Step>,
    pub install: Vec<Step>,
}

impl Default for BuildPlan {
    fn default() -> Self {
        Self {
            tools: Vec::new(),
            bootstrap: Vec::new(),
            build: vec![Step::root()],
            install: vec![Step::target("install")],
        }
    }
}
