//! GNU Autotools build system implementation

use super::{BuildSystem, BuildSystemContext, Step};
use crate::translate::BuildConfiguration;
use async_trait::async_trait;
use crucible_errors::{BuildError, Error};

/// GNU Autotools build system
///
/// Configures in-source, then runs `make` once per build step and
/// `make install` once per install step.
#[derive(Debug, Default, Clone, Copy)]
pub struct AutotoolsBuildSystem;

impl AutotoolsBuildSystem {
    /// Create a new Autotools build system instance
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Get configure arguments including compiler flags
    fn configure_args(config: &BuildConfiguration) -> Vec<String> {
        let mut args = config.args.clone();

        if !config.cflags.is_empty() {
            let cflags = config.cflags.join(" ");
            args.push(format!("CFLAGS={cflags}"));
            args.push(format!("CXXFLAGS={cflags}"));
        }
        if !config.ldflags.is_empty() {
            args.push(format!("LDFLAGS={}", config.ldflags.join(" ")));
        }

        args
    }

    fn make_args(ctx: &BuildSystemContext, step: &Step) -> Vec<String> {
        let mut args = Vec::new();
        if ctx.jobs > 1 {
            args.push(format!("-j{}", ctx.jobs));
        }
        if let Some(target) = &step.target {
            args.push(target.clone());
        }
        args
    }
}

#[async_trait]
impl BuildSystem for AutotoolsBuildSystem {
    fn name(&self) -> &'static str {
        "autotools"
    }

    fn required_tools(&self) -> &'static [&'static str] {
        &["sh", "make"]
    }

    async fn configure(
        &self,
        ctx: &BuildSystemContext,
        config: &BuildConfiguration,
    ) -> Result<(), Error> {
        let cmd = ctx
            .command("sh", &ctx.build_dir)
            .arg("./configure")
            .args(Self::configure_args(config));

        let result = ctx.execute(&cmd).await?;
        if !result.success {
            return Err(BuildError::ConfigureFailed {
                message: format!("configure failed: {}", result.tail(20)),
            }
            .into());
        }

        Ok(())
    }

    async fn build(&self, ctx: &BuildSystemContext, steps: &[Step]) -> Result<(), Error> {
        for step in steps {
            let cmd = ctx
                .command("make", &step.cwd(&ctx.build_dir))
                .args(Self::make_args(ctx, step));

            let result = ctx.execute(&cmd).await?;
            if !result.success {
                return Err(BuildError::CompileFailed {
                    message: format!("{cmd} failed: {}", result.tail(20)),
                }
                .into());
            }
        }
        Ok(())
    }

    async fn install(&self, ctx: &BuildSystemContext, steps: &[Step]) -> Result<(), Error> {
        for step in steps {
            let target = step.target.as_deref().unwrap_or("install");
            let cmd = ctx
                .command("make", &step.cwd(&ctx.build_dir))
                .arg(target);

            let result = ctx.execute(&cmd).await?;
            if !result.success {
                return Err(BuildError::InstallFailed {
                    message: format!("{cmd} failed: {}", result.tail(20)),
                }
                .into());
            }
        }
        Ok(())
    }
}
