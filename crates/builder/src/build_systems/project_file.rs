//! Perl project-file build system (PostgreSQL's MSVC tooling)
//!
//! The solution files are generated and built by `build.pl` inside the
//! source tree; any edits to the generator scripts are made by text
//! substitutions before configure. There is no install target, so packaging
//! copies artifacts out of the tree directly.

use super::{BuildSystem, BuildSystemContext, Step};
use crate::translate::BuildConfiguration;
use async_trait::async_trait;
use crucible_errors::{BuildError, Error};

#[derive(Debug, Default, Clone, Copy)]
pub struct ProjectFileBuildSystem;

impl ProjectFileBuildSystem {
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BuildSystem for ProjectFileBuildSystem {
    fn name(&self) -> &'static str {
        "project-file"
    }

    fn required_tools(&self) -> &'static [&'static str] {
        &["perl"]
    }

    async fn configure(
        &self,
        _ctx: &BuildSystemContext,
        _config: &BuildConfiguration,
    ) -> Result<(), Error> {
        Ok(())
    }

    async fn build(&self, ctx: &BuildSystemContext, steps: &[Step]) -> Result<(), Error> {
        for step in steps {
            let mut cmd = ctx
                .command("perl", &step.cwd(&ctx.source_dir))
                .arg("build.pl");
            if let Some(target) = &step.target {
                cmd = cmd.arg(target.clone());
            }

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

    async fn install(&self, _ctx: &BuildSystemContext, _steps: &[Step]) -> Result<(), Error> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::WorkLayout;
    use crate::runner::RecordingRunner;
    use crucible_types::BuildType;
    use std::collections::BTreeMap;
    use std::path::Path;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_runs_build_pl_with_env() {
        let runner = Arc::new(RecordingRunner::new());
        let layout = WorkLayout::new(Path::new("/w"), "libpq", "12.2", "id");
        let env = BTreeMap::from([("CONFIG".to_string(), "RELEASE".to_string())]);
        let ctx = BuildSystemContext::new(&layout, 1, BuildType::Release, runner.clone())
            .with_env(&env);

        ProjectFileBuildSystem::new()
            .build(
                &ctx,
                &[
                    Step::in_dir_target("src/tools/msvc", "libpq"),
                    Step::in_dir_target("src/tools/msvc", "libpgport"),
                ],
            )
            .await
            .unwrap();

        let commands = runner.commands_for("perl");
        assert_eq!(commands.len(), 2);
        assert_eq!(commands[0].args, vec!["build.pl", "libpq"]);
        assert_eq!(commands[1].args, vec!["build.pl", "libpgport"]);
        assert_eq!(commands[0].env.get("CONFIG").map(String::as_str), Some("RELEASE"));
        assert!(commands[0].cwd.ends_with("src/tools/msvc"));
    }
}
