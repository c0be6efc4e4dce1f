//! List cluster daemon processes.

use super::ClusterArgs;
use crate::style;
use anyhow::Result;
use comfy_table::{Cell, Color, Table, presets::UTF8_FULL};

/// Lists matching Cassandra daemons. Without a cluster name every daemon matches.
pub fn run(args: &ClusterArgs) -> Result<()> {
    let controller = args.controller()?;
    let processes = controller.cluster_processes()?;

    if processes.is_empty() {
        style::print_success("No matching Cassandra processes");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        Cell::new("PID").fg(Color::Blue),
        Cell::new("Command Line").fg(Color::Blue),
    ]);

    for process in &processes {
        table.add_row(vec![
            Cell::new(process.pid),
            Cell::new(process.cmdline.join(" ")),
        ]);
    }

    println!("{table}");
    println!("{} matching processes", processes.len());

    Ok(())
}
