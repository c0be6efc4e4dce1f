//! In-memory stand-ins for the host: a recording command runner, a fake
//! process table and a fake interface list.
//!
//! Useful for exercising code built on [`ClusterController`](crate::ClusterController)
//! without sudo, `ccm` or a JVM.

use crate::config::CASSANDRA_MAIN_CLASS;
use crate::interfaces::{InterfaceBinding, InterfaceSource};
use crate::process::{ProcessInfo, ProcessTable};
use crate::runner::{CommandOutput, CommandRunner, OutputMode, ShellCommand};
use crate::{Error, Result};
use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

type Effect = Box<dyn Fn(&str) + Send + Sync>;

/// Records every command and answers with canned outputs.
///
/// Commands that match no rule exit with code 0. Rules match by substring;
/// the first matching response wins.
#[derive(Default)]
pub struct StubRunner {
    log: Mutex<Vec<String>>,
    responses: Vec<(String, CommandOutput)>,
    unspawnable: Vec<String>,
    effects: Vec<(String, Effect)>,
}

impl StubRunner {
    /// Creates a runner where every command succeeds.
    pub fn new() -> Self {
        Self::default()
    }

    /// Answers commands containing `pattern` with `output`.
    pub fn respond(mut self, pattern: &str, output: CommandOutput) -> Self {
        self.responses.push((pattern.to_string(), output));
        self
    }

    /// Commands containing `pattern` exit with `code`.
    pub fn fail_matching(self, pattern: &str, code: i32) -> Self {
        self.respond(pattern, CommandOutput::exited(code))
    }

    /// Commands containing `pattern` fail to spawn.
    pub fn unspawnable(mut self, pattern: &str) -> Self {
        self.unspawnable.push(pattern.to_string());
        self
    }

    /// Runs `effect` whenever a command containing `pattern` runs.
    pub fn on_run(mut self, pattern: &str, effect: impl Fn(&str) + Send + Sync + 'static) -> Self {
        self.effects.push((pattern.to_string(), Box::new(effect)));
        self
    }

    /// Every command run so far, in order.
    pub fn commands(&self) -> Vec<String> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    /// Number of commands run that contain `pattern`.
    pub fn count_matching(&self, pattern: &str) -> usize {
        self.commands().iter().filter(|c| c.contains(pattern)).count()
    }
}

impl CommandRunner for StubRunner {
    async fn run(&self, command: &ShellCommand, _mode: OutputMode) -> Result<CommandOutput> {
        let line = command.as_str();
        self.log
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(line.to_string());

        if self.unspawnable.iter().any(|p| line.contains(p.as_str())) {
            return Err(Error::SpawnError(format!("{line}: not found")));
        }

        for (pattern, effect) in &self.effects {
            if line.contains(pattern.as_str()) {
                effect(line);
            }
        }

        Ok(self
            .responses
            .iter()
            .find(|(pattern, _)| line.contains(pattern.as_str()))
            .map_or_else(|| CommandOutput::exited(0), |(_, output)| output.clone()))
    }
}

/// Shared, mutable process table. Clones see the same processes.
#[derive(Debug, Clone, Default)]
pub struct StubProcesses {
    processes: Arc<Mutex<Vec<ProcessInfo>>>,
    killed: Arc<Mutex<Vec<u32>>>,
    /// Pending exits: needle and the snapshots left before it applies.
    exits: Arc<Mutex<Vec<(String, usize)>>>,
    snapshots: Arc<AtomicUsize>,
}

impl StubProcesses {
    /// Creates a table holding `processes`.
    pub fn new(processes: Vec<ProcessInfo>) -> Self {
        Self {
            processes: Arc::new(Mutex::new(processes)),
            ..Self::default()
        }
    }

    /// Adds a process.
    pub fn push(&self, process: ProcessInfo) {
        self.lock().push(process);
    }

    /// Removes every process.
    pub fn clear(&self) {
        self.lock().clear();
    }

    /// Removes processes whose command line mentions `needle`.
    pub fn remove_mentioning(&self, needle: &str) {
        self.lock()
            .retain(|p| !p.cmdline.iter().any(|arg| arg.contains(needle)));
    }

    /// Processes mentioning `needle` stay visible for `snapshots` more
    /// snapshots, then exit.
    pub fn exit_after(&self, needle: &str, snapshots: usize) {
        self.exits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push((needle.to_string(), snapshots));
    }

    /// Number of snapshots taken so far.
    pub fn snapshot_count(&self) -> usize {
        self.snapshots.load(Ordering::SeqCst)
    }

    /// PIDs still in the table.
    pub fn remaining(&self) -> Vec<u32> {
        self.lock().iter().map(|p| p.pid).collect()
    }

    /// PIDs killed so far, in order.
    pub fn killed(&self) -> Vec<u32> {
        self.killed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<ProcessInfo>> {
        self.processes.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl ProcessTable for StubProcesses {
    fn snapshot(&self) -> Result<Vec<ProcessInfo>> {
        self.snapshots.fetch_add(1, Ordering::SeqCst);

        let mut exits = self.exits.lock().unwrap_or_else(PoisonError::into_inner);
        exits.retain_mut(|(needle, left)| {
            if *left == 0 {
                self.remove_mentioning(needle);
                false
            } else {
                *left -= 1;
                true
            }
        });
        drop(exits);

        Ok(self.lock().clone())
    }

    fn kill(&self, pid: u32) -> Result<()> {
        self.lock().retain(|p| p.pid != pid);
        self.killed
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(pid);
        Ok(())
    }
}

/// Shared, mutable set of interface bindings. Clones see the same set.
#[derive(Debug, Clone, Default)]
pub struct StubInterfaces {
    bindings: Arc<Mutex<BTreeSet<InterfaceBinding>>>,
}

impl StubInterfaces {
    /// Creates a host with the given bindings.
    pub fn new(bindings: impl IntoIterator<Item = InterfaceBinding>) -> Self {
        Self {
            bindings: Arc::new(Mutex::new(bindings.into_iter().collect())),
        }
    }

    /// Adds a binding.
    pub fn insert(&self, binding: InterfaceBinding) {
        self.lock().insert(binding);
    }

    /// Removes a binding.
    pub fn remove(&self, binding: &InterfaceBinding) {
        self.lock().remove(binding);
    }

    /// Every binding currently present.
    pub fn all(&self) -> BTreeSet<InterfaceBinding> {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, BTreeSet<InterfaceBinding>> {
        self.bindings.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl InterfaceSource for StubInterfaces {
    fn bindings(&self, prefix: &str) -> Result<BTreeSet<InterfaceBinding>> {
        Ok(self
            .lock()
            .iter()
            .filter(|b| b.interface.starts_with(prefix))
            .cloned()
            .collect())
    }
}

/// A JVM running a Cassandra node of cluster `cluster`.
pub fn daemon_process(pid: u32, cluster: &str) -> ProcessInfo {
    ProcessInfo {
        pid,
        name: "java".to_string(),
        cmdline: vec![
            "java".to_string(),
            "-ea".to_string(),
            format!("-Dcassandra.logdir=/home/ci/.ccm/{cluster}/node1/logs"),
            CASSANDRA_MAIN_CLASS.to_string(),
        ],
    }
}
