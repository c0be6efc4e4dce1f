//! Host-specific loopback alias commands.

use crate::runner::{CommandRunner, OutputMode, ShellCommand};
use crate::{Error, Result};
use tracing::info;

/// Interface every BSD-style alias is added to.
pub const BSD_LOOPBACK: &str = "lo0";

/// Label prefix for Linux loopback aliases; node N uses `lo:ccm{N}`.
pub const LINUX_ALIAS_PREFIX: &str = "lo:ccm";

/// How loopback aliases are added and removed on this host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Platform {
    /// macOS and the BSDs: all addresses are aliases on one interface.
    Bsd { interface: String },

    /// Linux: one labelled alias interface per node.
    Linux { prefix: String },
}

impl Platform {
    /// Selects the adapter for the running host.
    ///
    /// `interface_prefix` overrides the default interface (BSD) or label
    /// prefix (Linux).
    pub fn detect(interface_prefix: Option<&str>) -> Result<Self> {
        Self::for_os(std::env::consts::OS, interface_prefix)
    }

    /// Selects the adapter for an OS identifier as reported by
    /// `std::env::consts::OS`.
    pub fn for_os(os: &str, interface_prefix: Option<&str>) -> Result<Self> {
        match os {
            "macos" | "freebsd" | "openbsd" | "netbsd" | "dragonfly" => Ok(Platform::Bsd {
                interface: interface_prefix.unwrap_or(BSD_LOOPBACK).to_string(),
            }),
            "linux" => Ok(Platform::Linux {
                prefix: interface_prefix.unwrap_or(LINUX_ALIAS_PREFIX).to_string(),
            }),
            other => Err(Error::UnsupportedPlatform(other.to_string())),
        }
    }

    /// Interface that carries the address of `node`.
    pub fn interface_for(&self, node: usize) -> String {
        match self {
            Platform::Bsd { interface } => interface.clone(),
            Platform::Linux { prefix } => format!("{prefix}{node}"),
        }
    }

    /// Command that binds `address` to `interface`.
    pub fn add_alias_command(&self, interface: &str, address: &str) -> ShellCommand {
        match self {
            Platform::Bsd { .. } => {
                ShellCommand::new(format!("sudo ifconfig {interface} alias {address}"))
            }
            Platform::Linux { .. } => ShellCommand::new(format!(
                "sudo ifconfig {interface} {address} netmask 255.0.0.0 up"
            )),
        }
    }

    /// Command that unbinds `address` from `interface`.
    pub fn remove_alias_command(&self, interface: &str, address: &str) -> ShellCommand {
        match self {
            Platform::Bsd { .. } => {
                ShellCommand::new(format!("sudo ifconfig {interface} -alias {address}"))
            }
            // Taking the labelled alias down releases its address.
            Platform::Linux { .. } => ShellCommand::new(format!("sudo ifconfig {interface} down")),
        }
    }

    /// Adds the alias. A nonzero exit aborts; there are no retries.
    pub async fn add_alias<R: CommandRunner>(
        &self,
        runner: &R,
        interface: &str,
        address: &str,
    ) -> Result<()> {
        run_alias_command(runner, self.add_alias_command(interface, address)).await
    }

    /// Removes the alias.
    pub async fn remove_alias<R: CommandRunner>(
        &self,
        runner: &R,
        interface: &str,
        address: &str,
    ) -> Result<()> {
        run_alias_command(runner, self.remove_alias_command(interface, address)).await
    }
}

async fn run_alias_command<R: CommandRunner>(runner: &R, command: ShellCommand) -> Result<()> {
    info!(%command, "Running interface command");

    // sudo may prompt for a password, so the terminal stays attached.
    let output = runner.run(&command, OutputMode::Inherited).await?;
    if !output.success() {
        return Err(Error::AliasCommandFailed {
            command,
            code: output.code,
        });
    }

    Ok(())
}
