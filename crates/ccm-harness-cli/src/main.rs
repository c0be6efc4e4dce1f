//! ccm-harness command-line interface.
//!
//! Provisions throwaway Cassandra clusters for integration tests.
//!
//! # Quick Start
//!
//! ```bash
//! # Check that the loopback addresses exist
//! ccm-harness check
//!
//! # Run the test suite against a fresh 3-node cluster
//! ccm-harness run --with-cassandra -- cargo test
//! ```

mod commands;
mod style;

use anyhow::Result;
use clap::{Parser, Subcommand};
use commands::ClusterArgs;
use style::SemanticStyle;

/// ccm-harness - ephemeral Cassandra clusters for integration tests.
#[derive(Parser)]
#[command(name = "ccm-harness")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    cluster: ClusterArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the comma-separated node addresses.
    Hosts,

    /// Check that every node address is bound to a loopback interface.
    Check,

    /// List Cassandra daemons belonging to the cluster.
    Ps,

    /// Create and start the cluster, leaving it running.
    Up,

    /// Remove a cluster created with `up`.
    Down,

    /// Run a test command, provisioning a cluster around it when enabled.
    Run {
        /// Provision a cluster for the command (opt-in).
        #[arg(long)]
        with_cassandra: bool,

        /// Command to run, after `--`.
        #[arg(trailing_var_arg = true, required = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Logs go to stderr so `hosts` output stays machine-readable.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    let cli = Cli::parse();
    style::set_no_color(cli.cluster.no_color || std::env::var_os("NO_COLOR").is_some());

    let result = match cli.command {
        Commands::Hosts => commands::hosts::run(&cli.cluster).map(|()| 0),
        Commands::Check => commands::check::run(&cli.cluster).map(|()| 0),
        Commands::Ps => commands::ps::run(&cli.cluster).map(|()| 0),
        Commands::Up => commands::up::run(&cli.cluster).await.map(|()| 0),
        Commands::Down => commands::down::run(&cli.cluster).await.map(|()| 0),
        Commands::Run {
            with_cassandra,
            command,
        } => commands::run::run(&cli.cluster, with_cassandra, &command).await,
    };

    match result {
        Ok(0) => Ok(()),
        Ok(code) => std::process::exit(code),
        Err(e) => {
            // Provisioning failures abort with the failing command's exit code.
            if let Some(code) = e
                .downcast_ref::<ccm_harness::Error>()
                .and_then(ccm_harness::Error::exit_code)
            {
                eprintln!("{} {e:#}", "Error:".error());
                std::process::exit(code);
            }
            Err(e)
        }
    }
}
