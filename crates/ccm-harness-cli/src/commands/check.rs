//! Loopback precondition check.

use super::ClusterArgs;
use crate::style::{self, SemanticStyle};
use anyhow::Result;

/// Verifies the loopback bindings without changing anything.
///
/// Missing bindings are reported on stderr with the commands that add them,
/// and the process exits with code 1.
pub fn run(args: &ClusterArgs) -> Result<()> {
    let controller = args.controller()?;

    controller.check_loopbacks()?;

    style::print_success(&format!(
        "Network ready: {} addresses bound",
        controller.config().node_count
    ));
    for binding in controller.required_bindings() {
        style::print_labeled(&binding.interface, &binding.address.code());
    }

    Ok(())
}
