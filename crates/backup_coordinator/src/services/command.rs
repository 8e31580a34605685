//! External process invocation for the dump and restore binaries

use async_trait::async_trait;
use std::process::Stdio;
use tokio::process::Command;
use tracing::{debug, instrument};

use crate::models::error::CommandError;

/// Program and arguments, passed to the OS without a shell.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    /// Value of a `--name=value` argument.
    pub fn flag_value(&self, name: &str) -> Option<&str> {
        let prefix = format!("--{}=", name);
        self.args.iter().find_map(|a| a.strip_prefix(prefix.as_str()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` when the process was terminated by a signal.
    pub status: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.status == Some(0)
    }

    /// Diagnostic text for error reports: stderr, or stdout when stderr is empty.
    pub fn diagnostics(&self) -> String {
        let stderr = self.stderr.trim();
        let text = if stderr.is_empty() { self.stdout.trim() } else { stderr };
        match self.status {
            Some(code) if text.is_empty() => format!("exited with status {}", code),
            Some(code) => format!("exited with status {}: {}", code, text),
            None if text.is_empty() => "terminated by signal".to_string(),
            None => format!("terminated by signal: {}", text),
        }
    }
}

#[async_trait]
pub trait CommandRunner: Send + Sync {
    /// Runs the command to completion. Only a failure to start is an `Err`.
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError>;
}

pub struct TokioCommandRunner;

#[async_trait]
impl CommandRunner for TokioCommandRunner {
    #[instrument(skip(self, spec), fields(program = %spec.program))]
    async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        let output = Command::new(&spec.program)
            .args(&spec.args)
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(|source| CommandError::Spawn {
                program: spec.program.clone(),
                source,
            })?;

        let output = CommandOutput {
            status: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        };
        debug!(status = ?output.status, stderr = %output.stderr.trim(), "Command finished");

        Ok(output)
    }
}
