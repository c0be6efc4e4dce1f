//! Test cluster configuration.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};

/// Default address prefix; node N gets `127.0.5.{N + 1}`.
pub const DEFAULT_IP_PREFIX: &str = "127.0.5.";

/// Default number of nodes.
pub const DEFAULT_NODE_COUNT: usize = 3;

/// Main class of the Cassandra daemon, as it appears on the JVM command line.
pub const CASSANDRA_MAIN_CLASS: &str = "org.apache.cassandra.service.CassandraDaemon";

/// Configuration for an ephemeral test cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
    /// Cluster name passed to `ccm`. Empty until a session name is chosen.
    pub name: String,

    /// Number of nodes in the cluster.
    pub node_count: usize,

    /// Address prefix; the node index plus one is appended.
    pub ip_prefix: String,

    /// Add and remove loopback aliases automatically (usually needs sudo).
    pub manage_interfaces: bool,

    /// Kill every matching Cassandra process found during the state check.
    /// This can stop other clusters whose name contains ours.
    pub kill_all_on_conflict: bool,

    /// Let `ccm remove` write straight to the terminal.
    pub debug: bool,

    /// Opt-in switch for running cluster-backed tests.
    pub enabled: bool,

    /// Cassandra version passed to `ccm create -v`.
    pub cassandra_version: String,

    /// Path or name of the `ccm` executable.
    pub ccm_binary: String,

    /// Path or name of the `cqlsh` executable.
    pub cqlsh_binary: String,

    /// CQL native transport port.
    pub native_port: u16,

    /// Overrides the platform interface naming (`lo0` on BSD, `lo:ccm` on Linux).
    pub interface_prefix: Option<String>,

    /// Only interfaces whose name starts with this are inspected.
    pub loopback_scan_prefix: String,

    /// Executable name of the daemon host process.
    pub daemon_executable: String,

    /// Argument identifying a Cassandra daemon.
    pub daemon_main_class: String,

    /// How often to re-check for leftover processes after `ccm remove`.
    pub removal_poll_interval_ms: u64,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        Self {
            name: String::new(),
            node_count: DEFAULT_NODE_COUNT,
            ip_prefix: DEFAULT_IP_PREFIX.to_string(),
            manage_interfaces: false,
            kill_all_on_conflict: false,
            debug: true,
            enabled: false,
            cassandra_version: "3.7".to_string(),
            ccm_binary: "ccm".to_string(),
            cqlsh_binary: "cqlsh".to_string(),
            native_port: 9042,
            interface_prefix: None,
            loopback_scan_prefix: "lo".to_string(),
            daemon_executable: "java".to_string(),
            daemon_main_class: CASSANDRA_MAIN_CLASS.to_string(),
            removal_poll_interval_ms: 500,
        }
    }
}

impl ClusterConfig {
    /// Creates a configuration with the given name and node count.
    pub fn new(name: impl Into<String>, node_count: usize) -> Result<Self> {
        let config = Self {
            name: name.into(),
            node_count,
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Checks the invariants the controller relies on.
    pub fn validate(&self) -> Result<()> {
        if self.node_count == 0 {
            return Err(Error::InvalidNodeCount(self.node_count));
        }
        if self.ip_prefix.is_empty() {
            return Err(Error::Config("ip_prefix must not be empty".to_string()));
        }
        if self.ccm_binary.is_empty() {
            return Err(Error::Config("ccm_binary must not be empty".to_string()));
        }
        if self.daemon_main_class.is_empty() {
            return Err(Error::Config(
                "daemon_main_class must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    /// Address of a node (0-indexed).
    pub fn node_address(&self, node: usize) -> String {
        format!("{}{}", self.ip_prefix, node + 1)
    }

    /// Addresses of all nodes, in node order.
    pub fn hosts(&self) -> Vec<String> {
        (0..self.node_count).map(|n| self.node_address(n)).collect()
    }

    /// Comma-separated host list, as contact points for a driver.
    pub fn hosts_cfg(&self) -> String {
        self.hosts().join(", ")
    }
}
