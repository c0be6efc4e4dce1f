//! Bring a cluster up and leave it running.

use super::ClusterArgs;
use crate::style::{self, SemanticStyle};
use anyhow::{Context, Result};
use ccm_harness::ClusterSession;

/// Creates the cluster and prints how to reach and remove it.
pub async fn run(args: &ClusterArgs) -> Result<()> {
    let controller = args.controller()?;

    let session = ClusterSession::start(controller, None)
        .await
        .context("Failed to set up cluster")?;

    style::print_success(&format!("Cluster {} is up", session.name().code()));
    style::print_labeled("Hosts", &session.hosts_cfg());
    println!();
    println!("Remove it with:");
    println!(
        "  {}",
        format!("ccm-harness down --name {}", session.name()).code()
    );

    Ok(())
}
