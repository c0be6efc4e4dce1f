//! Shell command execution.
//!
//! Every external tool (`ifconfig`, `ccm`, `cqlsh`) is invoked through a
//! [`CommandRunner`] so the lifecycle logic can be exercised with a stub.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::process::Stdio;
use tokio::process::Command;

/// A command line executed through `sh -c`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ShellCommand(String);

impl ShellCommand {
    /// Creates a command from a full shell command line.
    pub fn new(line: impl Into<String>) -> Self {
        Self(line.into())
    }

    /// Returns the command line.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ShellCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Where a command's stdout/stderr go.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Collected into [`CommandOutput`].
    Captured,

    /// Passed through to this process's stdout/stderr.
    Inherited,
}

/// Result of a finished command.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    /// Exit code, `None` if the process was killed by a signal.
    pub code: Option<i32>,

    /// Captured stdout (empty when inherited).
    pub stdout: String,

    /// Captured stderr (empty when inherited).
    pub stderr: String,
}

impl CommandOutput {
    /// Output of a command that exited with `code` and printed nothing.
    pub fn exited(code: i32) -> Self {
        Self {
            code: Some(code),
            ..Self::default()
        }
    }

    /// Returns true if the command exited with code 0.
    pub fn success(&self) -> bool {
        self.code == Some(0)
    }
}

/// Runs shell commands to completion.
///
/// Implementations must not impose a timeout: `ccm` can legitimately take
/// minutes to bring a cluster up.
#[allow(async_fn_in_trait)]
pub trait CommandRunner {
    /// Runs `command` and waits for it to exit.
    ///
    /// Returns `Err` only when the process could not be spawned or waited on;
    /// a nonzero exit is reported through [`CommandOutput::code`].
    async fn run(&self, command: &ShellCommand, mode: OutputMode) -> Result<CommandOutput>;
}

/// Runs commands on the host with `tokio::process`.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    async fn run(&self, command: &ShellCommand, mode: OutputMode) -> Result<CommandOutput> {
        let mut child = Command::new("sh");
        child.arg("-c").arg(command.as_str()).stdin(Stdio::null());

        match mode {
            OutputMode::Captured => {
                child.stdout(Stdio::piped()).stderr(Stdio::piped());
            }
            OutputMode::Inherited => {
                child.stdout(Stdio::inherit()).stderr(Stdio::inherit());
            }
        }

        let output = child
            .output()
            .await
            .map_err(|e| Error::SpawnError(format!("{command}: {e}")))?;

        Ok(CommandOutput {
            code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
