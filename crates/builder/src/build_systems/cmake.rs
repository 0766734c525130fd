//! `CMake` build system implementation

use super::{BuildSystem, BuildSystemContext, Step};
use crate::translate::BuildConfiguration;
use async_trait::async_trait;
use crucible_errors::{BuildError, Error};
use tokio::fs;

/// `CMake` build system
#[derive(Debug, Default, Clone, Copy)]
pub struct CMakeBuildSystem;

impl CMakeBuildSystem {
    /// Create a new `CMake` build system instance
    #[must_use]
    pub fn new() -> Self {
        Self
    }

    /// Get `CMake` configuration arguments
    fn configure_args(ctx: &BuildSystemContext, config: &BuildConfiguration) -> Vec<String> {
        let mut args = vec![
            "-S".to_string(),
            ctx.source_dir.display().to_string(),
            "-B".to_string(),
            ctx.build_dir.display().to_string(),
        ];
        args.extend(config.args.iter().cloned());

        if !config.cflags.is_empty() {
            let cflags = config.cflags.join(" ");
            args.push(format!("-DCMAKE_C_FLAGS={cflags}"));
            args.push(format!("-DCMAKE_CXX_FLAGS={cflags}"));
        }
        if !config.ldflags.is_empty() {
            let ldflags = config.ldflags.join(" ");
            args.push(format!("-DCMAKE_EXE_LINKER_FLAGS={ldflags}"));
            args.push(format!("-DCMAKE_SHARED_LINKER_FLAGS={ldflags}"));
        }

        args
    }
}

#[async_trait]
impl BuildSystem for CMakeBuildSystem {
    fn name(&self) -> &'static str {
        "cmake"
    }

    fn required_tools(&self) -> &'static [&'static str] {
        &["cmake"]
    }

    async fn configure(
        &self,
        ctx: &BuildSystemContext,
        config: &BuildConfiguration,
    ) -> Result<(), Error> {
        fs::create_dir_all(&ctx.build_dir)
            .await
            .map_err(|e| Error::io_with_path(&e, &ctx.build_dir))?;

        let cmd = ctx
            .command("cmake", &ctx.build_dir)
            .args(Self::configure_args(ctx, config));

        let result = ctx.execute(&cmd).await?;
        if !result.success {
            return Err(BuildError::ConfigureFailed {
                message: format!("cmake configuration failed: {}", result.tail(20)),
            }
            .into());
        }

        Ok(())
    }

    async fn build(&self, ctx: &BuildSystemContext, steps: &[Step]) -> Result<(), Error> {
        for step in steps {
            let mut cmd = ctx
                .command("cmake", &ctx.build_dir)
                .args(["--build", &ctx.build_dir.display().to_string()])
                .args(["--config", &ctx.build_type.to_string()]);
            if let Some(target) = &step.target {
                cmd = cmd.args(["--target", target]);
            }
            if ctx.jobs > 1 {
                cmd = cmd.args(["--parallel", &ctx.jobs.to_string()]);
            }

            let result = ctx.execute(&cmd).await?;
            if !result.success {
                return Err(BuildError::CompileFailed {
                    message: format!("cmake build failed: {}", result.tail(20)),
                }
                .into());
            }
        }
        Ok(())
    }

    async fn install(&self, ctx: &BuildSystemContext, _steps: &[Step]) -> Result<(), Error> {
        let cmd = ctx
            .command("cmake", &ctx.build_dir)
            .args(["--install", &ctx.build_dir.display().to_string()])
            .args(["--config", &ctx.build_type.to_string()]);

        let result = ctx.execute(&cmd).await?;
        if !result.success {
            return Err(BuildError::InstallFailed {
                message: format!("cmake install failed: {}", result.tail(20)),
            }
            .into());
        }

        Ok(())
    }

    fn prefers_out_of_source_build(&self) -> bool {
        true
    }
}
