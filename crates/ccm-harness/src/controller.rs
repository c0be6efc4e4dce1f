//! Cluster lifecycle controller.

use crate::ccm::Ccm;
use crate::interfaces::{InterfaceBinding, InterfaceSource};
use crate::platform::Platform;
use crate::process::{ProcessFinder, ProcessInfo, ProcessTable};
use crate::runner::{CommandRunner, ShellCommand};
use crate::{ClusterConfig, Error, Result};
use std::io::{self, Write};
use std::time::Duration;
use tokio::time::sleep;
use tracing::{info, warn};

/// Creates, checks and removes one test cluster.
///
/// Host access goes through the three type parameters so the lifecycle can
/// run against stubs: `R` runs shell commands, `N` lists interface bindings,
/// `P` lists and kills processes.
pub struct ClusterController<R, N, P> {
    config: ClusterConfig,
    platform: Platform,
    runner: R,
    interfaces: N,
    processes: P,
    initialized: bool,
}

impl<R, N, P> ClusterController<R, N, P>
where
    R: CommandRunner,
    N: InterfaceSource,
    P: ProcessTable,
{
    /// Creates a controller. Nothing touches the host until [`setup`](Self::setup).
    pub fn new(
        config: ClusterConfig,
        platform: Platform,
        runner: R,
        interfaces: N,
        processes: P,
    ) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            platform,
            runner,
            interfaces,
            processes,
            initialized: false,
        })
    }

    /// Returns the cluster configuration.
    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    /// Returns the platform adapter in use.
    pub fn platform(&self) -> &Platform {
        &self.platform
    }

    /// Returns the command runner.
    pub fn runner(&self) -> &R {
        &self.runner
    }

    /// Returns the cluster name (empty until set).
    pub fn name(&self) -> &str {
        &self.config.name
    }

    /// Returns true once setup has run.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Node addresses, in node order.
    pub fn hosts(&self) -> Vec<String> {
        self.config.hosts()
    }

    /// Comma-separated node addresses.
    pub fn hosts_cfg(&self) -> String {
        self.config.hosts_cfg()
    }

    /// The binding every node needs, in node order.
    pub fn required_bindings(&self) -> Vec<InterfaceBinding> {
        (0..self.config.node_count)
            .map(|node| {
                InterfaceBinding::new(
                    self.platform.interface_for(node),
                    self.config.node_address(node),
                )
            })
            .collect()
    }

    /// Required bindings absent from the host.
    pub fn missing_bindings(&self) -> Result<Vec<InterfaceBinding>> {
        let present = self
            .interfaces
            .bindings(&self.config.loopback_scan_prefix)?;

        Ok(self
            .required_bindings()
            .into_iter()
            .filter(|binding| !present.contains(binding))
            .collect())
    }

    /// Finder for the processes of this cluster.
    pub fn finder(&self) -> ProcessFinder {
        ProcessFinder::new(&self.config)
    }

    /// Processes of this cluster currently running.
    pub fn cluster_processes(&self) -> Result<Vec<ProcessInfo>> {
        Ok(self.finder().matching(&self.processes)?.collect())
    }

    /// Checks the host and creates the cluster.
    ///
    /// Does nothing if already initialized. A failed state check leaves the
    /// controller uninitialized; once creation has been attempted the
    /// controller counts as initialized whatever the outcome, so a broken
    /// cluster is never created twice.
    pub async fn setup(&mut self, name: Option<&str>) -> Result<()> {
        if self.initialized {
            return Ok(());
        }
        if let Some(name) = name {
            self.config.name = name.to_string();
        }

        self.check_state().await?;

        let created = Ccm::new(&self.config)
            .create(&self.runner, &self.config.name)
            .await;
        self.initialized = true;
        created?;

        info!(name = %self.config.name, hosts = %self.hosts_cfg(), "Cluster created");
        Ok(())
    }

    /// Marks a cluster created elsewhere as owned by this controller, so
    /// [`teardown`](Self::teardown) will remove it.
    pub fn attach(&mut self, name: &str) {
        self.config.name = name.to_string();
        self.initialized = true;
    }

    /// Removes the cluster and leaves the host ready for the next setup.
    ///
    /// Does nothing if not initialized. The initialized flag is cleared even
    /// when removal fails, and the state check always runs afterwards; the
    /// first error encountered is returned.
    pub async fn teardown(&mut self) -> Result<()> {
        if !self.initialized {
            return Ok(());
        }

        let removed = self.remove_cluster().await;
        let released = if removed.is_ok() && self.config.manage_interfaces {
            self.teardown_loopbacks().await
        } else {
            Ok(())
        };
        self.initialized = false;

        let checked = self.check_state().await;
        removed.and(released).and(checked)
    }

    /// Verifies (or repairs) loopback bindings, then reclaims stray
    /// processes if `kill_all_on_conflict` is set.
    pub async fn check_state(&self) -> Result<()> {
        if self.config.manage_interfaces {
            self.setup_loopbacks().await?;
        } else {
            self.check_loopbacks()?;
        }

        let finder = self.finder();
        if self.config.kill_all_on_conflict && finder.any_running(&self.processes)? {
            warn!(
                "Killing all cassandra processes, disable this by setting kill_all_on_conflict to false"
            );
            finder.kill_all(&self.processes)?;
        }

        Ok(())
    }

    /// Fails with the commands that would add the missing bindings.
    ///
    /// The commands are also written to stderr for the operator; nothing is
    /// changed on the host.
    pub fn check_loopbacks(&self) -> Result<()> {
        let missing = self.missing_bindings()?;
        if missing.is_empty() {
            return Ok(());
        }

        let remediation = self.remediation_commands(&missing);
        report_missing(&remediation);
        Err(Error::MissingBindings { remediation })
    }

    /// Adds every missing binding, then fails listing any still absent.
    pub async fn setup_loopbacks(&self) -> Result<()> {
        for binding in self.missing_bindings()? {
            info!(%binding, "Add ip address to loopback");
            self.platform
                .add_alias(&self.runner, &binding.interface, &binding.address)
                .await?;
        }

        let still_missing = self.missing_bindings()?;
        if !still_missing.is_empty() {
            return Err(Error::BindingsStillMissing(still_missing));
        }

        Ok(())
    }

    /// Removes the binding of every node.
    pub async fn teardown_loopbacks(&self) -> Result<()> {
        for binding in self.required_bindings() {
            self.platform
                .remove_alias(&self.runner, &binding.interface, &binding.address)
                .await?;
        }
        Ok(())
    }

    /// Commands that would add `missing`, one per binding.
    pub fn remediation_commands(&self, missing: &[InterfaceBinding]) -> Vec<ShellCommand> {
        missing
            .iter()
            .map(|b| self.platform.add_alias_command(&b.interface, &b.address))
            .collect()
    }

    /// Runs `ccm remove`, then waits until no process of the cluster is left.
    async fn remove_cluster(&self) -> Result<()> {
        Ccm::new(&self.config)
            .remove(&self.runner, &self.config.name)
            .await?;

        let finder = self.finder();
        let interval = Duration::from_millis(self.config.removal_poll_interval_ms);
        while finder.any_running(&self.processes)? {
            sleep(interval).await;
        }

        info!(name = %self.config.name, "Cluster removed");
        Ok(())
    }
}

fn report_missing(remediation: &[ShellCommand]) {
    let mut err = io::stderr().lock();
    let _ = writeln!(
        err,
        "Missing network addresses.\nYou can run the following commands to resolve this:\n"
    );
    for command in remediation {
        let _ = writeln!(err, "\t{command}");
    }
    let _ = err.flush();
}
