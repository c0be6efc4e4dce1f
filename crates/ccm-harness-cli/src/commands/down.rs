//! Remove a cluster created with `up`.

use super::ClusterArgs;
use crate::style::{self, SemanticStyle};
use anyhow::{Context, Result, bail};

/// Removes the named cluster and waits for its processes to exit.
pub async fn run(args: &ClusterArgs) -> Result<()> {
    let mut controller = args.controller()?;

    let name = controller.name().to_string();
    if name.is_empty() {
        bail!("No cluster name given. Pass {}", "--name <NAME>".code());
    }

    controller.attach(&name);
    controller
        .teardown()
        .await
        .with_context(|| format!("Failed to remove cluster {name}"))?;

    style::print_success(&format!("Cluster {} removed", name.code()));
    Ok(())
}
