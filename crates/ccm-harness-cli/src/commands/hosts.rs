//! Print the node addresses.

use super::ClusterArgs;
use anyhow::Result;

/// Prints the comma-separated host list on a single line.
pub fn run(args: &ClusterArgs) -> Result<()> {
    let config = args.config()?;
    println!("{}", config.hosts_cfg());
    Ok(())
}
