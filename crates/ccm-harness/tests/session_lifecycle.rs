//! End-to-end session lifecycle against stubbed host access.

use ccm_harness::testing::{StubInterfaces, StubProcesses, StubRunner, daemon_process};
use ccm_harness::{
    ClusterConfig, ClusterController, ClusterSession, CommandOutput, Error, InterfaceBinding,
    Keyspace, Platform,
};

fn bsd() -> Platform {
    Platform::for_os("macos", None).unwrap()
}

/// Runner that behaves like `ifconfig` on macOS: `alias` adds the address to
/// the shared host state, `-alias` removes it.
fn ifconfig_runner(host: &StubInterfaces) -> StubRunner {
    let added = host.clone();
    let removed = host.clone();
    StubRunner::new()
        .on_run(" alias ", move |line| {
            let address = line.rsplit(' ').next().unwrap();
            added.insert(InterfaceBinding::new("lo0", address));
        })
        .on_run(" -alias ", move |line| {
            let address = line.rsplit(' ').next().unwrap();
            removed.remove(&InterfaceBinding::new("lo0", address));
        })
}

#[tokio::test]
async fn managed_interfaces_full_cycle() {
    let host = StubInterfaces::new([InterfaceBinding::new("lo0", "127.0.0.1")]);
    let config = ClusterConfig {
        manage_interfaces: true,
        removal_poll_interval_ms: 1,
        ..ClusterConfig::default()
    };
    let controller = ClusterController::new(
        config,
        bsd(),
        ifconfig_runner(&host),
        host.clone(),
        StubProcesses::default(),
    )
    .unwrap();

    let session = ClusterSession::start(controller, Some("it_cluster"))
        .await
        .unwrap();

    for n in 1..=3 {
        assert!(host.all().contains(&InterfaceBinding::new("lo0", format!("127.0.5.{n}"))));
    }
    let commands = session.controller().runner().commands();
    assert_eq!(
        commands,
        vec![
            "sudo ifconfig lo0 alias 127.0.5.1",
            "sudo ifconfig lo0 alias 127.0.5.2",
            "sudo ifconfig lo0 alias 127.0.5.3",
            "ccm create it_cluster --nodes 3 -v 3.7 -i '127.0.5.' --start --no-switch",
        ]
    );

    session.finish().await.unwrap();
}

#[tokio::test]
async fn unmanaged_missing_interfaces_abort_with_exit_code_one() {
    let host = StubInterfaces::new([
        InterfaceBinding::new("lo0", "127.0.0.1"),
        InterfaceBinding::new("lo0", "127.0.5.1"),
    ]);
    let controller = ClusterController::new(
        ClusterConfig::default(),
        bsd(),
        StubRunner::new(),
        host,
        StubProcesses::default(),
    )
    .unwrap();

    let err = ClusterSession::start(controller, Some("it_cluster"))
        .await
        .err()
        .unwrap();

    assert_eq!(err.exit_code(), Some(1));
    let Error::MissingBindings { remediation } = err else {
        panic!("expected MissingBindings");
    };
    let lines: Vec<&str> = remediation.iter().map(|c| c.as_str()).collect();
    assert_eq!(
        lines,
        vec![
            "sudo ifconfig lo0 alias 127.0.5.2",
            "sudo ifconfig lo0 alias 127.0.5.3",
        ]
    );
}

#[tokio::test]
async fn failed_create_reports_exact_exit_code() {
    let host = StubInterfaces::new((1..=3).map(|n| InterfaceBinding::new("lo0", format!("127.0.5.{n}"))));
    let runner = StubRunner::new().respond(
        "ccm create",
        CommandOutput {
            code: Some(17),
            stdout: "Downloading 3.7...\n".to_string(),
            stderr: "Unable to download\n".to_string(),
        },
    );
    let controller =
        ClusterController::new(ClusterConfig::default(), bsd(), runner, host, StubProcesses::default())
            .unwrap();

    let err = ClusterSession::start(controller, Some("it_cluster"))
        .await
        .err()
        .unwrap();

    assert!(err.is_fatal());
    assert_eq!(err.exit_code(), Some(17));
}

#[tokio::test]
async fn stray_daemons_are_reclaimed_before_create() {
    let host = StubInterfaces::new((1..=3).map(|n| InterfaceBinding::new("lo0", format!("127.0.5.{n}"))));
    let processes = StubProcesses::new(vec![
        daemon_process(501, "it_cluster"),
        daemon_process(502, "unrelated"),
    ]);
    let config = ClusterConfig {
        kill_all_on_conflict: true,
        ..ClusterConfig::default()
    };
    let controller =
        ClusterController::new(config, bsd(), StubRunner::new(), host, processes.clone()).unwrap();

    let _session = ClusterSession::start(controller, Some("it_cluster"))
        .await
        .unwrap();

    assert_eq!(processes.killed(), vec![501]);
    assert_eq!(processes.remaining(), vec![502]);
}

#[tokio::test]
async fn keyspace_is_created_on_first_node() {
    let host = StubInterfaces::new((1..=3).map(|n| InterfaceBinding::new("lo0", format!("127.0.5.{n}"))));
    let controller = ClusterController::new(
        ClusterConfig::default(),
        bsd(),
        StubRunner::new(),
        host,
        StubProcesses::default(),
    )
    .unwrap();

    let session = ClusterSession::start(controller, Some("it_cluster"))
        .await
        .unwrap();
    session
        .create_keyspace(&Keyspace::new("auth_test"))
        .await
        .unwrap();

    let runner = session.controller().runner();
    assert_eq!(runner.count_matching("cqlsh 127.0.5.1 9042"), 1);
}
