pub mod check;
pub mod down;
pub mod hosts;
pub mod ps;
pub mod run;
pub mod up;

use anyhow::{Context, Result};
use ccm_harness::{ClusterConfig, ConfigLoader, HostController};
use clap::Args;
use std::path::PathBuf;

/// Options shared by every command; they override the config files.
#[derive(Args, Debug, Clone)]
pub struct ClusterArgs {
    /// Directory containing ccm-harness.toml.
    #[arg(long, global = true, default_value = ".")]
    pub project_dir: PathBuf,

    /// Cluster name.
    #[arg(long, global = true)]
    pub name: Option<String>,

    /// Number of nodes.
    #[arg(long, global = true)]
    pub nodes: Option<usize>,

    /// Address prefix, e.g. 127.0.5.
    #[arg(long, global = true)]
    pub ip_prefix: Option<String>,

    /// Add missing loopback aliases (runs sudo ifconfig).
    #[arg(long, global = true)]
    pub manage_interfaces: bool,

    /// Kill every matching Cassandra process before creating the cluster.
    #[arg(long, global = true)]
    pub kill_all: bool,

    /// Capture ccm output instead of streaming it.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Disable colored output.
    #[arg(long, global = true)]
    pub no_color: bool,
}

impl ClusterArgs {
    /// Loads configuration and applies the command-line overrides.
    pub fn config(&self) -> Result<ClusterConfig> {
        let mut config = ConfigLoader::new()
            .with_project_dir(&self.project_dir)
            .load()
            .with_context(|| {
                format!(
                    "Failed to load configuration from {}",
                    self.project_dir.display()
                )
            })?;

        if let Some(name) = &self.name {
            config.name.clone_from(name);
        }
        if let Some(nodes) = self.nodes {
            config.node_count = nodes;
        }
        if let Some(prefix) = &self.ip_prefix {
            config.ip_prefix.clone_from(prefix);
        }
        if self.manage_interfaces {
            config.manage_interfaces = true;
        }
        if self.kill_all {
            config.kill_all_on_conflict = true;
        }
        if self.quiet {
            config.debug = false;
        }

        config.validate()?;
        Ok(config)
    }

    /// Builds a controller for this host from the effective configuration.
    pub fn controller(&self) -> Result<HostController> {
        let config = self.config()?;
        Ok(HostController::for_host(config)?)
    }
}
