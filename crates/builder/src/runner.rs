//! Native command execution
//!
//! Every native command (patch, autogen, configure, make, cmake, perl) goes
//! through a [`CommandRunner`]. [`SystemRunner`] spawns real processes;
//! [`RecordingRunner`] records invocations and lets tests simulate them.

use async_trait::async_trait;
use crucible_errors::{BuildError, Error};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Mutex;

/// A fully specified native command
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NativeCommand {
    pub program: String,
    pub args: Vec<String>,
    pub env: BTreeMap<String, String>,
    pub cwd: PathBuf,
}

impl NativeCommand {
    #[must_use]
    pub fn new(program: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: BTreeMap::new(),
            cwd: cwd.into(),
        }
    }

    #[must_use]
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    #[must_use]
    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    #[must_use]
    pub fn env(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(name.into(), value.into());
        self
    }

    #[must_use]
    pub fn envs(mut self, vars: &BTreeMap<String, String>) -> Self {
        self.env
            .extend(vars.iter().map(|(k, v)| (k.clone(), v.clone())));
        self
    }
}

impl fmt::Display for NativeCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        Ok(())
    }
}

/// Result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    #[must_use]
    pub fn ok() -> Self {
        Self {
            success: true,
            exit_code: Some(0),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn failed(code: i32, stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            exit_code: Some(code),
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }

    /// Last lines of stderr (or stdout when stderr is empty) for error messages
    #[must_use]
    pub fn tail(&self, lines: usize) -> String {
        let text = if self.stderr.trim().is_empty() {
            &self.stdout
        } else {
            &self.stderr
        };
        let all: Vec<&str> = text.lines().collect();
        all[all.len().saturating_sub(lines)..].join("\n")
    }
}

/// Seam for running native commands
#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Run a command to completion
    ///
    /// A non-zero exit is reported through [`CommandOutput::success`], not as
    /// an error; only a failure to launch is an error.
    async fn run(&self, command: &NativeCommand) -> Result<CommandOutput, Error>;

    /// Whether a tool is available
    fn has_tool(&self, tool: &str) -> bool {
        which::which(tool).is_ok()
    }
}

/// Runs commands as child processes
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

#[async_trait]
impl CommandRunner for SystemRunner {
    async fn run(&self, command: &NativeCommand) -> Result<CommandOutput, Error> {
        tracing::debug!(cwd = %command.cwd.display(), "executing: {command}");

        let output = tokio::process::Command::new(&command.program)
            .args(&command.args)
            .envs(&command.env)
            .current_dir(&command.cwd)
            .output()
            .await
            .map_err(|e| BuildError::SpawnFailed {
                program: command.program.clone(),
                message: e.to_string(),
            })?;

        let result = CommandOutput {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };

        if !result.success {
            tracing::debug!(exit_code = ?result.exit_code, "command failed: {command}");
        }

        Ok(result)
    }
}

type Handler = Box<dyn Fn(&NativeCommand) -> CommandOutput + Send + Sync>;

/// Records commands instead of running them
///
/// An optional handler decides the outcome of each command and may touch the
/// filesystem to simulate what the real tool would produce.
pub struct RecordingRunner {
    commands: Mutex<Vec<NativeCommand>>,
    handler: Option<Handler>,
    tools: Option<Vec<String>>,
}

impl RecordingRunner {
    /// Every command succeeds and every tool exists
    #[must_use]
    pub fn new() -> Self {
        Self {
            commands: Mutex::new(Vec::new()),
            handler: None,
            tools: None,
        }
    }

    /// Decide command outcomes with a handler
    #[must_use]
    pub fn with_handler(
        handler: impl Fn(&NativeCommand) -> CommandOutput + Send + Sync + 'static,
    ) -> Self {
        Self {
            handler: Some(Box::new(handler)),
            ..Self::new()
        }
    }

    /// Restrict the set of tools reported as available
    #[must_use]
    pub fn with_tools(mut self, tools: &[&str]) -> Self {
        self.tools = Some(tools.iter().map(ToString::to_string).collect());
        self
    }

    /// Commands run so far
    #[must_use]
    pub fn commands(&self) -> Vec<NativeCommand> {
        self.commands
            .lock()
            .map(|c| c.clone())
            .unwrap_or_default()
    }

    /// Commands whose program matches
    #[must_use]
    pub fn commands_for(&self, program: &str) -> Vec<NativeCommand> {
        self.commands()
            .into_iter()
            .filter(|c| c.program == program)
            .collect()
    }
}

impl Default for RecordingRunner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CommandRunner for RecordingRunner {
    async fn run(&self, command: &NativeCommand) -> Result<CommandOutput, Error> {
        if let Ok(mut commands) = self.commands.lock() {
            commands.push(command.clone());
        }
        Ok(self
            .handler
            .as_ref()
            .map_or_else(CommandOutput::ok, |handler| handler(command)))
    }

    fn has_tool(&self, tool: &str) -> bool {
        self.tools
            .as_ref()
            .is_none_or(|tools| tools.iter().any(|t| t == tool))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recording_runner_records() {
        let runner = RecordingRunner::new().with_tools(&["make"]);
        let cmd = NativeCommand::new("make", "/tmp").arg("-j4");
        let out = runner.run(&cmd).await.unwrap();
        assert!(out.success);
        assert_eq!(runner.commands_for("make").len(), 1);
        assert!(runner.has_tool("make"));
        assert!(!runner.has_tool("cmake"));
    }

    #[tokio::test]
    async fn test_system_runner_reports_exit_status() {
        let runner = SystemRunner;
        let ok = runner
            .run(&NativeCommand::new("sh", "/").args(["-c", "exit 0"]))
            .await
            .unwrap();
        assert!(ok.success);

        let failed = runner
            .run(&NativeCommand::new("sh", "/").args(["-c", "echo boom >&2; exit 3"]))
            .await
            .unwrap();
        assert!(!failed.success);
        assert_eq!(failed.exit_code, Some(3));
        assert_eq!(failed.tail(5), "boom");
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let err = SystemRunner
            .run(&NativeCommand::new("crucible-no-such-program", "/"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Build(BuildError::SpawnFailed { .. })
        ));
    }

    #[test]
    fn test_display() {
        let cmd = NativeCommand::new("cmake", "/tmp").args(["--build", "."]);
        assert_eq!(cmd.to_string(), "cmake --build .");
    }
}
