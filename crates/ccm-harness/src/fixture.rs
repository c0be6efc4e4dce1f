//! Session-scoped cluster fixture.
//!
//! A [`ClusterSession`] owns one [`ClusterController`] for the whole test
//! session: [`ClusterSession::start`] brings the cluster up once and
//! [`ClusterSession::finish`] removes it. Test processes launched by
//! `ccm-harness run --with-cassandra` instead join the cluster named in the
//! environment, see [`Provisioned`].

use crate::controller::ClusterController;
use crate::cql::{Cqlsh, Keyspace};
use crate::interfaces::{InterfaceSource, SystemInterfaces};
use crate::loader::ConfigLoader;
use crate::platform::Platform;
use crate::process::{ProcessTable, SystemProcesses};
use crate::runner::{CommandRunner, SystemRunner};
use crate::{ClusterConfig, Result};
use tracing::{error, info};
use uuid::Uuid;

/// Comma-separated node addresses of a provisioned cluster.
pub const HOSTS_ENV: &str = "CCM_HOSTS";

/// Name of a provisioned cluster.
pub const CLUSTER_ENV: &str = "CCM_CLUSTER";

/// Opt-in switch for cluster-backed tests.
pub const ENABLED_ENV: &str = "CCMH_ENABLED";

/// Controller wired to the real host.
pub type HostController = ClusterController<SystemRunner, SystemInterfaces, SystemProcesses>;

/// Session on the real host.
pub type HostSession = ClusterSession<SystemRunner, SystemInterfaces, SystemProcesses>;

impl HostController {
    /// Builds a controller for this machine's platform.
    pub fn for_host(config: ClusterConfig) -> Result<Self> {
        let platform = Platform::detect(config.interface_prefix.as_deref())?;
        ClusterController::new(
            config,
            platform,
            SystemRunner,
            SystemInterfaces,
            SystemProcesses,
        )
    }
}

/// A cluster created by a parent `ccm-harness run`, as exported to the test
/// process through [`CLUSTER_ENV`] and [`HOSTS_ENV`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Provisioned {
    pub name: String,
    /// Empty when the parent exported no hosts.
    pub hosts: Vec<String>,
}

impl Provisioned {
    /// Reads the cluster exported by a parent process, if any.
    pub fn from_env() -> Option<Self> {
        Self::from_vars(
            std::env::var(CLUSTER_ENV).ok().as_deref(),
            std::env::var(HOSTS_ENV).ok().as_deref(),
        )
    }

    /// Builds from raw variable values. Requires a non-empty cluster name.
    pub fn from_vars(cluster: Option<&str>, hosts: Option<&str>) -> Option<Self> {
        let name = cluster.map(str::trim).filter(|name| !name.is_empty())?;
        Some(Self {
            name: name.to_string(),
            hosts: hosts.map(parse_hosts).unwrap_or_default(),
        })
    }
}

/// A running test cluster, created once per session.
pub struct ClusterSession<R, N, P> {
    controller: ClusterController<R, N, P>,
    name: String,
    hosts: Vec<String>,
    /// False for a joined cluster: someone else removes it.
    owned: bool,
}

impl<R, N, P> ClusterSession<R, N, P>
where
    R: CommandRunner,
    N: InterfaceSource,
    P: ProcessTable,
{
    /// Sets up the cluster.
    ///
    /// The name is, in order of preference: `name`, the configured name, a
    /// freshly generated [`session_name`].
    pub async fn start(
        mut controller: ClusterController<R, N, P>,
        name: Option<&str>,
    ) -> Result<Self> {
        let name = match name {
            Some(name) => name.to_string(),
            None if !controller.name().is_empty() => controller.name().to_string(),
            None => session_name(),
        };

        info!(%name, "Setting up cassandra cluster");
        controller.setup(Some(&name)).await?;
        info!(%name, "Cassandra cluster setup complete");

        let hosts = controller.hosts();
        Ok(Self {
            controller,
            name,
            hosts,
            owned: true,
        })
    }

    /// Uses a cluster that is already running without touching the host.
    ///
    /// Nothing is checked or created, and [`finish`](Self::finish) leaves the
    /// cluster in place. Without exported hosts the configured ones are used.
    pub fn join(controller: ClusterController<R, N, P>, provisioned: Provisioned) -> Self {
        let Provisioned { name, hosts } = provisioned;
        let hosts = if hosts.is_empty() {
            controller.hosts()
        } else {
            hosts
        };

        info!(%name, hosts = %hosts.join(", "), "Joining provisioned cassandra cluster");
        Self {
            controller,
            name,
            hosts,
            owned: false,
        }
    }

    /// Cluster name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Node addresses.
    pub fn hosts(&self) -> Vec<String> {
        self.hosts.clone()
    }

    /// Comma-separated node addresses.
    pub fn hosts_cfg(&self) -> String {
        self.hosts.join(", ")
    }

    /// Returns true if [`finish`](Self::finish) removes the cluster.
    pub fn is_owned(&self) -> bool {
        self.owned
    }

    /// The underlying controller.
    pub fn controller(&self) -> &ClusterController<R, N, P> {
        &self.controller
    }

    /// `cqlsh` pointed at the first node.
    pub fn cqlsh(&self) -> Cqlsh {
        let config = self.controller.config();
        let host = self
            .hosts
            .first()
            .cloned()
            .unwrap_or_else(|| config.node_address(0));
        Cqlsh::new(config.cqlsh_binary.clone(), host, config.native_port)
    }

    /// Creates a keyspace on the cluster; an existing one is kept.
    pub async fn create_keyspace(&self, keyspace: &Keyspace) -> Result<()> {
        self.cqlsh()
            .create_keyspace(self.controller.runner(), keyspace)
            .await
    }

    /// Removes the cluster if this session created it.
    pub async fn finish(mut self) -> Result<()> {
        if !self.owned {
            info!(name = %self.name, "Leaving provisioned cassandra cluster running");
            return Ok(());
        }
        info!(name = %self.name, "Tearing down cassandra cluster");
        self.controller.teardown().await
    }
}

/// Loads configuration and, if cluster tests are enabled, returns a session
/// on this host. Returns `Ok(None)` when they are disabled.
///
/// Inside `ccm-harness run` the exported cluster is joined; otherwise a new
/// one is created.
pub async fn start_from_env() -> Result<Option<HostSession>> {
    let config = ConfigLoader::new().load()?;
    if !is_enabled(&config) {
        return Ok(None);
    }

    let controller = HostController::for_host(config)?;
    start_or_join(controller, Provisioned::from_env())
        .await
        .map(Some)
}

/// Joins `provisioned` if given, otherwise starts a new cluster, aborting the
/// process on fatal setup errors.
pub async fn start_or_join<R, N, P>(
    controller: ClusterController<R, N, P>,
    provisioned: Option<Provisioned>,
) -> Result<ClusterSession<R, N, P>>
where
    R: CommandRunner,
    N: InterfaceSource,
    P: ProcessTable,
{
    match provisioned {
        Some(provisioned) => Ok(ClusterSession::join(controller, provisioned)),
        None => exit_on_fatal(ClusterSession::start(controller, None).await),
    }
}

/// Returns true if cluster-backed tests should run.
pub fn is_enabled(config: &ClusterConfig) -> bool {
    config.enabled
}

/// Generates a cluster name unique to this session.
pub fn session_name() -> String {
    let id = Uuid::new_v4().simple().to_string();
    format!("ccmh_{}", &id[..8])
}

/// Hosts of a cluster provisioned by `ccm-harness run`, if any.
pub fn provisioned_hosts() -> Option<Vec<String>> {
    std::env::var(HOSTS_ENV)
        .ok()
        .map(|hosts| parse_hosts(&hosts))
        .filter(|hosts| !hosts.is_empty())
}

/// Splits a comma-separated host list.
pub fn parse_hosts(hosts: &str) -> Vec<String> {
    hosts
        .split(',')
        .map(str::trim)
        .filter(|host| !host.is_empty())
        .map(str::to_string)
        .collect()
}

/// Terminates the process for errors that must abort the test run, passing
/// any other result through.
pub fn exit_on_fatal<T>(result: Result<T>) -> Result<T> {
    if let Err(e) = &result
        && let Some(code) = e.exit_code()
    {
        error!(error = %e, code, "Aborting test run");
        std::process::exit(code);
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{StubInterfaces, StubProcesses, StubRunner};
    use crate::interfaces::InterfaceBinding;

    fn stub_controller(config: ClusterConfig) -> ClusterController<StubRunner, StubInterfaces, StubProcesses> {
        let interfaces = StubInterfaces::new(
            (0..config.node_count)
                .map(|n| InterfaceBinding::new(format!("lo:ccm{n}"), config.node_address(n))),
        );
        ClusterController::new(
            config,
            Platform::for_os("linux", None).unwrap(),
            StubRunner::new(),
            interfaces,
            StubProcesses::default(),
        )
        .unwrap()
    }

    #[test]
    fn test_session_names_are_unique() {
        let a = session_name();
        let b = session_name();
        assert!(a.starts_with("ccmh_"));
        assert_eq!(a.len(), "ccmh_".len() + 8);
        assert_ne!(a, b);
    }

    #[test]
    fn test_parse_hosts() {
        assert_eq!(
            parse_hosts("127.0.5.1, 127.0.5.2,127.0.5.3"),
            vec!["127.0.5.1", "127.0.5.2", "127.0.5.3"]
        );
        assert!(parse_hosts(" , ").is_empty());
    }

    #[test]
    fn test_disabled_by_default() {
        assert!(!is_enabled(&ClusterConfig::default()));
        let config = ClusterConfig {
            enabled: true,
            ..ClusterConfig::default()
        };
        assert!(is_enabled(&config));
    }

    #[tokio::test]
    async fn test_start_generates_name() {
        let session = ClusterSession::start(stub_controller(ClusterConfig::default()), None)
            .await
            .unwrap();

        assert!(session.name().starts_with("ccmh_"));
        assert_eq!(session.hosts().len(), 3);
        assert_eq!(
            session.controller().runner().count_matching(session.name()),
            1
        );
    }

    #[tokio::test]
    async fn test_start_prefers_configured_name() {
        let config = ClusterConfig::new("from_config", 3).unwrap();
        let session = ClusterSession::start(stub_controller(config), None)
            .await
            .unwrap();
        assert_eq!(session.name(), "from_config");

        let config = ClusterConfig::new("from_config", 3).unwrap();
        let session = ClusterSession::start(stub_controller(config), Some("explicit"))
            .await
            .unwrap();
        assert_eq!(session.name(), "explicit");
    }

    #[tokio::test]
    async fn test_cqlsh_targets_first_node() {
        let config = ClusterConfig::new("c", 3).unwrap();
        let session = ClusterSession::start(stub_controller(config), None)
            .await
            .unwrap();
        assert_eq!(
            session.cqlsh().command("SELECT 1;").as_str(),
            "cqlsh 127.0.5.1 9042 -e 'SELECT 1;'"
        );
    }

    #[test]
    fn test_provisioned_from_vars() {
        let provisioned = Provisioned::from_vars(
            Some("ccmh_parent1"),
            Some("127.0.5.1, 127.0.5.2, 127.0.5.3"),
        )
        .unwrap();
        assert_eq!(provisioned.name, "ccmh_parent1");
        assert_eq!(provisioned.hosts, vec!["127.0.5.1", "127.0.5.2", "127.0.5.3"]);

        assert_eq!(Provisioned::from_vars(None, Some("127.0.5.1")), None);
        assert_eq!(Provisioned::from_vars(Some("  "), Some("127.0.5.1")), None);
        assert!(Provisioned::from_vars(Some("c"), None).unwrap().hosts.is_empty());
    }

    #[tokio::test]
    async fn test_joins_provisioned_cluster_without_touching_host() {
        // No bindings at all: starting a cluster here would abort the process.
        let controller = ClusterController::new(
            ClusterConfig {
                enabled: true,
                ..ClusterConfig::default()
            },
            Platform::for_os("linux", None).unwrap(),
            StubRunner::new(),
            StubInterfaces::default(),
            StubProcesses::default(),
        )
        .unwrap();
        let provisioned = Provisioned::from_vars(
            Some("ccmh_parent1"),
            Some("127.0.9.1, 127.0.9.2, 127.0.9.3"),
        );

        let session = start_or_join(controller, provisioned).await.unwrap();

        assert!(!session.is_owned());
        assert_eq!(session.name(), "ccmh_parent1");
        assert_eq!(session.hosts_cfg(), "127.0.9.1, 127.0.9.2, 127.0.9.3");
        assert_eq!(
            session.cqlsh().command("SELECT 1;").as_str(),
            "cqlsh 127.0.9.1 9042 -e 'SELECT 1;'"
        );
        assert!(session.controller().runner().commands().is_empty());
        assert!(!session.controller().is_initialized());
    }

    #[tokio::test]
    async fn test_finish_leaves_joined_cluster_running() {
        use std::sync::Arc;
        use std::sync::atomic::{AtomicBool, Ordering};

        let removed = Arc::new(AtomicBool::new(false));
        let flag = Arc::clone(&removed);
        let mut controller = ClusterController::new(
            ClusterConfig::new("c", 2).unwrap(),
            Platform::for_os("linux", None).unwrap(),
            StubRunner::new().on_run(" remove ", move |_| flag.store(true, Ordering::SeqCst)),
            StubInterfaces::default(),
            StubProcesses::default(),
        )
        .unwrap();
        controller.attach("ccmh_parent1");

        let provisioned = Provisioned::from_vars(Some("ccmh_parent1"), None).unwrap();
        let session = ClusterSession::join(controller, provisioned);
        assert_eq!(session.hosts(), vec!["127.0.5.1", "127.0.5.2"]);

        session.finish().await.unwrap();
        assert!(!removed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_start_or_join_starts_without_provisioned_cluster() {
        let session = start_or_join(stub_controller(ClusterConfig::default()), None)
            .await
            .unwrap();

        assert!(session.is_owned());
        assert_eq!(session.controller().runner().count_matching(" create "), 1);
    }

    #[test]
    fn test_exit_on_fatal_passes_through_non_fatal() {
        let ok: Result<u8> = Ok(1);
        assert_eq!(exit_on_fatal(ok).unwrap(), 1);

        let err: Result<u8> = Err(crate::Error::NameRequired);
        assert!(matches!(exit_on_fatal(err), Err(crate::Error::NameRequired)));
    }
}
