//! Invocations of the `ccm` cluster manager.

use crate::runner::{CommandRunner, OutputMode, ShellCommand};
use crate::{ClusterConfig, Error, Result};
use std::io::{self, Write};
use tracing::{error, info};

/// Exit code reported when `ccm` could not be spawned or died from a signal.
const ABNORMAL_EXIT_CODE: i32 = 1;

/// Builds `ccm` command lines for one configuration.
#[derive(Debug, Clone)]
pub struct Ccm {
    binary: String,
    version: String,
    node_count: usize,
    ip_prefix: String,
    debug: bool,
}

impl Ccm {
    /// Creates a command builder from the cluster configuration.
    pub fn new(config: &ClusterConfig) -> Self {
        Self {
            binary: config.ccm_binary.clone(),
            version: config.cassandra_version.clone(),
            node_count: config.node_count,
            ip_prefix: config.ip_prefix.clone(),
            debug: config.debug,
        }
    }

    /// `ccm create` starting all nodes without making the cluster current.
    pub fn create_command(&self, name: &str) -> ShellCommand {
        ShellCommand::new(format!(
            "{} create {} --nodes {} -v {} -i '{}' --start --no-switch",
            self.binary, name, self.node_count, self.version, self.ip_prefix
        ))
    }

    /// `ccm remove` for the named cluster.
    pub fn remove_command(&self, name: &str) -> ShellCommand {
        ShellCommand::new(format!("{} remove {}", self.binary, name))
    }

    /// Creates and starts the cluster.
    ///
    /// Any failure is [`Error::ClusterCommandFailed`]: the captured output has
    /// already been written to the terminal and the error carries the exit
    /// code the test run should terminate with.
    pub async fn create<R: CommandRunner>(&self, runner: &R, name: &str) -> Result<()> {
        if name.is_empty() {
            return Err(Error::NameRequired);
        }

        let command = self.create_command(name);
        info!(%command, "Creating cluster");

        let (code, stdout, stderr) = match runner.run(&command, OutputMode::Captured).await {
            Ok(output) if output.success() => return Ok(()),
            Ok(output) => (
                output.code.unwrap_or(ABNORMAL_EXIT_CODE),
                output.stdout,
                output.stderr,
            ),
            Err(e) => {
                error!(error = %e, "Exception waiting for sub-process");
                (ABNORMAL_EXIT_CODE, String::new(), e.to_string())
            }
        };

        report_output(&stdout, &stderr);

        Err(Error::ClusterCommandFailed {
            command,
            code,
            stdout,
            stderr,
        })
    }

    /// Removes the cluster. Output goes to the terminal in debug mode.
    pub async fn remove<R: CommandRunner>(&self, runner: &R, name: &str) -> Result<()> {
        let command = self.remove_command(name);
        info!(%command, "Removing cluster");

        let mode = if self.debug {
            OutputMode::Inherited
        } else {
            OutputMode::Captured
        };

        let output = runner.run(&command, mode).await?;
        if !output.success() {
            return Err(Error::RemoveFailed {
                name: name.to_string(),
                code: output.code,
            });
        }

        Ok(())
    }
}

fn report_output(stdout: &str, stderr: &str) {
    // Best effort: the run is about to be aborted anyway.
    let mut out = io::stdout().lock();
    let _ = out.write_all(stdout.as_bytes());
    let _ = out.flush();

    let mut err = io::stderr().lock();
    let _ = err.write_all(stderr.as_bytes());
    let _ = err.flush();
}
