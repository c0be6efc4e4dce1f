//! Run a test command inside a provisioned cluster session.

use super::ClusterArgs;
use crate::style::{self, SemanticStyle};
use anyhow::{Context, Result, bail};
use ccm_harness::fixture::{self, CLUSTER_ENV, ENABLED_ENV, HOSTS_ENV};
use ccm_harness::{ClusterSession, HostSession};
use tokio::process::Command;
use tokio::signal;
use tracing::{error, info};

/// Exit code used when the run is interrupted with Ctrl+C.
const INTERRUPTED_EXIT_CODE: i32 = 130;

/// Runs `command` and returns its exit code.
///
/// With `--with-cassandra` (or `enabled = true` in config) the cluster is
/// set up before the command starts and removed after it exits; otherwise
/// the command runs on its own.
pub async fn run(args: &ClusterArgs, with_cassandra: bool, command: &[String]) -> Result<i32> {
    let Some((program, program_args)) = command.split_first() else {
        bail!("No command given. Usage: ccm-harness run --with-cassandra -- <command>");
    };

    let config = args.config()?;
    if !with_cassandra && !fixture::is_enabled(&config) {
        style::print_warn("Cassandra tests not enabled, running without a cluster");
        let mut child = Command::new(program);
        child.args(program_args);
        return wait_for(child).await;
    }

    let controller = ccm_harness::HostController::for_host(config)?;
    let session = ClusterSession::start(controller, None)
        .await
        .context("Failed to set up cluster")?;
    style::print_success(&format!(
        "Cluster {} up at {}",
        session.name().code(),
        session.hosts_cfg()
    ));

    let mut child = Command::new(program);
    child
        .args(program_args)
        .env(HOSTS_ENV, session.hosts_cfg())
        .env(CLUSTER_ENV, session.name())
        .env(ENABLED_ENV, "true");

    let code = wait_for(child).await;
    finish(session, code).await
}

/// Tears the session down; the command's exit code wins over a teardown error
/// unless the command succeeded.
async fn finish(session: HostSession, code: Result<i32>) -> Result<i32> {
    let name = session.name().to_string();
    let teardown = session.finish().await;

    match (code, teardown) {
        (Ok(code), Ok(())) => Ok(code),
        (Ok(0), Err(e)) => Err(e).with_context(|| format!("Failed to remove cluster {name}")),
        (Ok(code), Err(e)) => {
            error!(error = %e, cluster = %name, "Failed to remove cluster");
            Ok(code)
        }
        (Err(e), teardown) => {
            if let Err(t) = teardown {
                error!(error = %t, cluster = %name, "Failed to remove cluster");
            }
            Err(e)
        }
    }
}

/// Spawns the command and waits, killing it if Ctrl+C arrives first.
async fn wait_for(mut command: Command) -> Result<i32> {
    let mut child = command.spawn().context("Failed to start test command")?;

    tokio::select! {
        status = child.wait() => {
            let status = status.context("Failed to wait for test command")?;
            Ok(status.code().unwrap_or(1))
        }
        _ = signal::ctrl_c() => {
            info!("Received Ctrl+C, stopping test command...");
            child.kill().await.ok();
            Ok(INTERRUPTED_EXIT_CODE)
        }
    }
}
