//! Ephemeral multi-node Cassandra clusters for integration tests.
//!
//! Provides local cluster provisioning driven through `ccm`:
//! - Loopback alias checks (and optional creation) for every node address
//! - Cluster creation and removal through the `ccm` CLI
//! - Discovery and cleanup of stray Cassandra daemons
//! - A session fixture exposing the node addresses to tests
//!
//! ```no_run
//! use ccm_harness::{ClusterConfig, ClusterSession, HostController};
//!
//! # async fn run() -> ccm_harness::Result<()> {
//! let controller = HostController::for_host(ClusterConfig::default())?;
//! let session = ClusterSession::start(controller, Some("auth_test")).await?;
//! println!("contact points: {}", session.hosts_cfg());
//! session.finish().await
//! # }
//! ```

pub mod ccm;
pub mod config;
pub mod controller;
pub mod cql;
pub mod error;
pub mod fixture;
pub mod interfaces;
pub mod loader;
pub mod platform;
pub mod process;
pub mod runner;
pub mod testing;

pub use config::ClusterConfig;
pub use controller::ClusterController;
pub use cql::{Cqlsh, Keyspace};
pub use error::{Error, Result};
pub use fixture::{ClusterSession, HostController, HostSession, Provisioned};
pub use interfaces::{InterfaceBinding, InterfaceSource, SystemInterfaces};
pub use loader::ConfigLoader;
pub use platform::Platform;
pub use process::{ProcessFinder, ProcessInfo, ProcessTable, SystemProcesses};
pub use runner::{CommandOutput, CommandRunner, OutputMode, ShellCommand, SystemRunner};

/// Loads configuration from the current directory and environment.
pub fn load_config() -> Result<ClusterConfig> {
    ConfigLoader::new().load()
}

#[cfg(test)]
mod tests {
    use super::*;
    use testing::{StubInterfaces, StubProcesses, StubRunner};

    #[tokio::test]
    async fn test_session_round_trip_on_stub_host() {
        let config = ClusterConfig::new("auth_test", 3).unwrap();
        let interfaces = StubInterfaces::new(
            (0..3).map(|n| InterfaceBinding::new(format!("lo:ccm{n}"), format!("127.0.5.{}", n + 1))),
        );
        let controller = ClusterController::new(
            config,
            Platform::for_os("linux", None).unwrap(),
            StubRunner::new(),
            interfaces,
            StubProcesses::default(),
        )
        .unwrap();

        let session = ClusterSession::start(controller, None).await.unwrap();
        assert_eq!(session.hosts_cfg(), "127.0.5.1, 127.0.5.2, 127.0.5.3");
        session.finish().await.unwrap();
    }
}
