//! Error types for cluster provisioning.

use crate::interfaces::InterfaceBinding;
use crate::runner::ShellCommand;
use thiserror::Error;

/// Cluster provisioning errors.
#[derive(Error, Debug)]
pub enum Error {
    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Configuration sources could not be merged or deserialized.
    #[error("Failed to load configuration: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    /// Invalid node count.
    #[error("Invalid node count: {0} (must be >= 1)")]
    InvalidNodeCount(usize),

    /// No platform adapter exists for this host.
    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    /// Cluster creation was attempted without a name.
    #[error("Set a cluster name before creating the cluster")]
    NameRequired,

    /// An interface alias command exited nonzero.
    #[error("Interface command `{command}` failed with exit code {code:?}")]
    AliasCommandFailed {
        command: ShellCommand,
        code: Option<i32>,
    },

    /// Required loopback addresses are missing and interface management is off.
    #[error("Missing network addresses ({} commands needed)", .remediation.len())]
    MissingBindings { remediation: Vec<ShellCommand> },

    /// Loopback addresses are still missing after trying to add them.
    #[error("Missing network addresses: {}", format_bindings(.0))]
    BindingsStillMissing(Vec<InterfaceBinding>),

    /// The `ccm create` invocation failed.
    #[error("Cluster command `{command}` failed with exit code {code}")]
    ClusterCommandFailed {
        command: ShellCommand,
        code: i32,
        stdout: String,
        stderr: String,
    },

    /// The `ccm remove` invocation failed.
    #[error("Problem removing test cluster {name}: exit code {code:?}")]
    RemoveFailed { name: String, code: Option<i32> },

    /// Process spawn error.
    #[error("Failed to spawn process: {0}")]
    SpawnError(String),

    /// Host interface enumeration failed.
    #[error("Failed to query network interfaces: {0}")]
    InterfaceQuery(#[source] nix::Error),

    /// Sending a kill signal failed.
    #[error("Failed to kill process {pid}: {source}")]
    KillFailed {
        pid: u32,
        #[source]
        source: nix::Error,
    },

    /// A cqlsh statement failed.
    #[error("CQL statement failed with exit code {code:?}: {stderr}")]
    CqlFailed { code: Option<i32>, stderr: String },
}

impl Error {
    /// Exit code the test run should terminate with, for errors that abort the
    /// whole run instead of failing a single test.
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Error::MissingBindings { .. } => Some(1),
            Error::ClusterCommandFailed { code, .. } => Some(*code),
            _ => None,
        }
    }

    /// Returns true if this error must terminate the test run.
    pub fn is_fatal(&self) -> bool {
        self.exit_code().is_some()
    }
}

fn format_bindings(bindings: &[InterfaceBinding]) -> String {
    bindings
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Result type for cluster operations.
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_codes() {
        let missing = Error::MissingBindings {
            remediation: vec![ShellCommand::new("sudo ifconfig lo0 alias 127.0.5.1")],
        };
        assert_eq!(missing.exit_code(), Some(1));

        let create = Error::ClusterCommandFailed {
            command: ShellCommand::new("ccm create x"),
            code: 42,
            stdout: String::new(),
            stderr: String::new(),
        };
        assert_eq!(create.exit_code(), Some(42));
        assert!(create.is_fatal());

        assert!(!Error::NameRequired.is_fatal());
        assert_eq!(Error::InvalidNodeCount(0).exit_code(), None);
    }

    #[test]
    fn test_still_missing_lists_every_binding() {
        let err = Error::BindingsStillMissing(vec![
            InterfaceBinding::new("lo:ccm0", "127.0.5.1"),
            InterfaceBinding::new("lo:ccm2", "127.0.5.3"),
        ]);
        let message = err.to_string();
        assert!(message.contains("lo:ccm0 127.0.5.1"));
        assert!(message.contains("lo:ccm2 127.0.5.3"));
    }
}
