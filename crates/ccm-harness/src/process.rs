//! Discovery of Cassandra daemon processes belonging to a test cluster.

use crate::{ClusterConfig, Error, Result};
use nix::sys::signal::{Signal, kill};
use nix::unistd::Pid;
use sysinfo::System;
use tracing::{debug, warn};

/// Point-in-time view of a host process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    /// Process ID.
    pub pid: u32,

    /// Executable name.
    pub name: String,

    /// Command line arguments; empty when they could not be read.
    pub cmdline: Vec<String>,
}

/// Access to the host process table.
pub trait ProcessTable {
    /// Returns every process currently visible.
    fn snapshot(&self) -> Result<Vec<ProcessInfo>>;

    /// Kills a process with `SIGKILL`.
    fn kill(&self, pid: u32) -> Result<()>;
}

/// Process table of the running host.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemProcesses;

impl ProcessTable for SystemProcesses {
    fn snapshot(&self) -> Result<Vec<ProcessInfo>> {
        let mut system = System::new();
        system.refresh_processes();

        Ok(system
            .processes()
            .values()
            .map(|process| ProcessInfo {
                pid: process.pid().as_u32(),
                name: process.name().to_string(),
                cmdline: process.cmd().to_vec(),
            })
            .collect())
    }

    fn kill(&self, pid: u32) -> Result<()> {
        let raw = i32::try_from(pid)
            .map_err(|_| Error::Config(format!("pid {pid} out of range")))?;
        kill(Pid::from_raw(raw), Signal::SIGKILL).map_err(|source| Error::KillFailed { pid, source })
    }
}

/// Finds the daemon processes of one named cluster.
#[derive(Debug, Clone)]
pub struct ProcessFinder {
    cluster_name: String,
    executable: String,
    main_class: String,
}

impl ProcessFinder {
    /// Creates a finder for the cluster described by `config`.
    pub fn new(config: &ClusterConfig) -> Self {
        Self {
            cluster_name: config.name.clone(),
            executable: config.daemon_executable.clone(),
            main_class: config.daemon_main_class.clone(),
        }
    }

    /// Changes the cluster name matched against.
    pub fn set_cluster_name(&mut self, name: impl Into<String>) {
        self.cluster_name = name.into();
    }

    /// Returns true if `cmdline` belongs to a daemon of this cluster: the main
    /// class is one of the arguments and some argument mentions the name.
    pub fn cmdline_matches<S: AsRef<str>>(&self, cmdline: &[S]) -> bool {
        let is_daemon = cmdline.iter().any(|arg| arg.as_ref() == self.main_class);
        is_daemon
            && cmdline
                .iter()
                .any(|arg| arg.as_ref().contains(self.cluster_name.as_str()))
    }

    /// Matching processes. Each call queries the process table again.
    pub fn matching<T: ProcessTable>(&self, table: &T) -> Result<impl Iterator<Item = ProcessInfo>> {
        let processes = table.snapshot()?;

        Ok(processes.into_iter().filter(move |process| {
            if process.name != self.executable {
                return false;
            }
            if process.cmdline.is_empty() {
                debug!(
                    pid = process.pid,
                    "Unable to access command line of {} process", self.executable
                );
                return false;
            }
            self.cmdline_matches(&process.cmdline)
        }))
    }

    /// Returns true if any process of this cluster is running.
    pub fn any_running<T: ProcessTable>(&self, table: &T) -> Result<bool> {
        Ok(self.matching(table)?.next().is_some())
    }

    /// Kills every matching process and returns how many were signalled.
    pub fn kill_all<T: ProcessTable>(&self, table: &T) -> Result<usize> {
        let mut killed = 0;
        for process in self.matching(table)? {
            warn!(pid = process.pid, "Kill process");
            table.kill(process.pid)?;
            killed += 1;
        }
        Ok(killed)
    }
}
