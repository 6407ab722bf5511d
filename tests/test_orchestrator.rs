use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use netlab_distributor::api::deployment_dto::DeploymentRecordDto;
use netlab_distributor::domain::mesh::MeshBuilder;
use netlab_distributor::domain::orchestrator::{DeploymentOrchestrator, DeploymentStatus, TaskStatus};
use netlab_distributor::domain::remote::deployer::PartitionState;
use netlab_distributor::domain::remote::mock::{MockDeployer, MockProvisioner, MockRunner, MockTelemetry};
use netlab_distributor::domain::target::ComputeTarget;
use netlab_distributor::domain::topology::{Link, NetworkTopology, NodeConfig};
use netlab_distributor::error::Error;

fn linux_topology(name: &str, node_count: usize) -> NetworkTopology {
    let nodes = (0..node_count)
        .map(|i| (format!("n{i}"), NodeConfig { kind: Some("linux".to_string()), raw: json!({"kind": "linux"}) }))
        .collect();
    NetworkTopology { name: name.to_string(), mgmt: None, nodes, links: Vec::new() }
}

fn link(a: &str, b: &str) -> Link {
    Link { endpoints: vec![format!("{a}:eth1"), format!("{b}:eth1")], extra: serde_json::Map::new() }
}

struct Harness {
    orchestrator: DeploymentOrchestrator,
    deployer: Arc<MockDeployer>,
    provisioner: Arc<MockProvisioner>,
    mesh_runner: Arc<MockRunner>,
}

fn harness(fleet: Vec<ComputeTarget>, deployer: MockDeployer) -> Harness {
    let deployer = Arc::new(deployer);
    let provisioner = Arc::new(MockProvisioner::new(fleet));
    let mesh_runner = Arc::new(MockRunner::default());
    let orchestrator = DeploymentOrchestrator::new(
        provisioner.clone(),
        deployer.clone(),
        Arc::new(MockTelemetry::default()),
        MeshBuilder::new(mesh_runner.clone()),
        5,
    )
    .with_task_timeout(Duration::from_secs(5));

    Harness { orchestrator, deployer, provisioner, mesh_runner }
}

/// A target large enough for exactly one 5-node linux chunk (which needs
/// 3 cpu / 3.5 GB / 20 GB) but not two.
fn one_chunk_target(id: &str) -> ComputeTarget {
    MockProvisioner::running_target(id, 4, 8.0, 40.0)
}

#[tokio::test]
async fn test_single_target_deploy_succeeds() {
    let h = harness(vec![one_chunk_target("t-a")], MockDeployer::default());
    let topology = linux_topology("lab", 4);

    let record = h.orchestrator.deploy(&topology).await.unwrap();

    assert_eq!(record.status, DeploymentStatus::Success);
    assert_eq!(record.successful, 1);
    assert_eq!(record.failed, 0);
    assert_eq!(record.distribution.len(), 1);
    assert_eq!(record.distribution["t-a"].len(), 4);

    let task = &record.tasks[0];
    assert_eq!(task.status, TaskStatus::Completed);
    assert!(task.started_at.is_some() && task.completed_at.is_some());
    assert_eq!(task.partition_name, "lab-t-a");

    // One target: no mesh.
    assert!(!record.connectivity.attempted);
    assert!(h.mesh_runner.log.lock().unwrap().is_empty());

    assert!(h.orchestrator.registry().get("lab").is_some());
}

#[tokio::test]
async fn test_twelve_nodes_spread_over_three_targets_and_meshed() {
    let fleet = vec![one_chunk_target("t-a"), one_chunk_target("t-b"), one_chunk_target("t-c")];
    let h = harness(fleet, MockDeployer::default());

    let mut topology = linux_topology("lab12", 12);
    topology.links = vec![link("n0", "n4"), link("n4", "n5")];

    let record = h.orchestrator.deploy(&topology).await.unwrap();

    assert_eq!(record.status, DeploymentStatus::Success);
    assert_eq!(record.distribution.len(), 3);
    let mut sizes: Vec<usize> = record.distribution.values().map(Vec::len).collect();
    sizes.sort_unstable();
    assert_eq!(sizes, vec![2, 5, 5]);

    // The intra-partition link survives in exactly one partial; the
    // partition-crossing one is dropped everywhere.
    let snapshots = h.deployer.partition_snapshots.lock().unwrap();
    let retained: Vec<_> = snapshots.iter().flat_map(|p| p.links.iter()).collect();
    assert_eq!(retained.len(), 1);
    assert_eq!(retained[0].first_endpoint_nodes(), Some(("n0", "n4")));

    // Full mesh over three targets: 3 pairs, two tunnel sides each.
    assert!(record.connectivity.attempted);
    assert!(record.connectivity.ok);
    assert_eq!(h.mesh_runner.log.lock().unwrap().len(), 6);
}

#[tokio::test]
async fn test_mixed_outcome_is_partial_and_isolated() {
    let fleet = vec![one_chunk_target("t-a"), one_chunk_target("t-b"), one_chunk_target("t-c")];
    let h = harness(fleet, MockDeployer::default().erroring_for("t-b"));

    let record = h.orchestrator.deploy(&linux_topology("lab", 12)).await.unwrap();

    assert_eq!(record.status, DeploymentStatus::Partial);
    assert_eq!(record.successful, 2);
    assert_eq!(record.failed, 1);

    let failed_task = record.tasks.iter().find(|t| t.target.id == "t-b").unwrap();
    assert_eq!(failed_task.status, TaskStatus::Failed);
    assert!(failed_task.error_message.as_deref().unwrap().contains("scripted deploy error"));

    // Sibling tasks were not aborted by the failing one.
    assert!(record.tasks.iter().filter(|t| t.target.id != "t-b").all(|t| t.status == TaskStatus::Completed));
}

#[tokio::test]
async fn test_zero_successes_is_failed_not_partial() {
    let fleet = vec![one_chunk_target("t-a"), one_chunk_target("t-b")];
    let h = harness(fleet, MockDeployer::default().failing_for("t-a").failing_for("t-b"));

    let record = h.orchestrator.deploy(&linux_topology("lab", 10)).await.unwrap();

    assert_eq!(record.status, DeploymentStatus::Failed);
    assert_eq!(record.successful, 0);
    assert_eq!(record.failed, 2);
    // Counts and distribution stay reportable even in total failure.
    assert_eq!(record.distribution.len(), 2);
    assert!(!record.connectivity.attempted);
}

#[tokio::test]
async fn test_empty_topology_is_a_placement_error() {
    let h = harness(vec![one_chunk_target("t-a")], MockDeployer::default());
    let result = h.orchestrator.deploy(&linux_topology("empty", 0)).await;
    assert!(matches!(result, Err(Error::NoNodesToDistribute(_))));
}

#[tokio::test]
async fn test_overflow_chunks_get_planned_targets() {
    // Empty fleet: every chunk needs a newly planned target.
    let h = harness(Vec::new(), MockDeployer::default());

    let record = h.orchestrator.deploy(&linux_topology("lab", 12)).await.unwrap();

    assert_eq!(record.status, DeploymentStatus::Success);
    assert_eq!(h.provisioner.planned_count(), 3);
    assert!(record.distribution.keys().all(|id| id.starts_with("planned-")));
}

#[tokio::test]
async fn test_unplannable_placement_fails_whole_deploy() {
    let deployer = Arc::new(MockDeployer::default());
    let provisioner = Arc::new(MockProvisioner::new(Vec::new()).without_planning());
    let orchestrator = DeploymentOrchestrator::new(
        provisioner,
        deployer,
        Arc::new(MockTelemetry::default()),
        MeshBuilder::new(Arc::new(MockRunner::default())),
        5,
    );

    let result = orchestrator.deploy(&linux_topology("lab", 3)).await;
    assert!(matches!(result, Err(Error::ProvisioningError(_))));
}

#[tokio::test]
async fn test_addressless_target_is_excluded_but_not_fatal() {
    let mut bad = one_chunk_target("t-bad");
    bad.address = None;
    let fleet = vec![bad, one_chunk_target("t-good")];
    let h = harness(fleet, MockDeployer::default());

    let record = h.orchestrator.deploy(&linux_topology("lab", 10)).await.unwrap();

    // Both targets were placed, only the reachable one was dispatched.
    assert_eq!(record.distribution.len(), 2);
    assert_eq!(record.tasks.len(), 1);
    assert_eq!(record.tasks[0].target.id, "t-good");
    assert_eq!(record.successful, 1);
    assert_eq!(record.status, DeploymentStatus::Success);
}

#[tokio::test]
async fn test_destroy_removes_record_and_swallows_failures() {
    let fleet = vec![one_chunk_target("t-a"), one_chunk_target("t-b")];
    let mut deployer = MockDeployer::default();
    deployer.destroy_error_targets.insert("t-a".to_string());
    let h = harness(fleet, deployer);

    h.orchestrator.deploy(&linux_topology("lab", 10)).await.unwrap();
    h.orchestrator.destroy("lab").await.unwrap();

    // The failing side was swallowed, the other side was torn down, and
    // the record is gone either way.
    let destroyed = h.deployer.destroyed.lock().unwrap();
    assert_eq!(destroyed.len(), 1);
    assert_eq!(destroyed[0].0, "t-b");
    drop(destroyed);

    assert!(h.orchestrator.registry().get("lab").is_none());
    assert!(h.orchestrator.status("lab").await.unwrap().is_none());
}

#[tokio::test]
async fn test_destroy_unknown_name_reports_not_found() {
    let h = harness(vec![one_chunk_target("t-a")], MockDeployer::default());
    let result = h.orchestrator.destroy("ghost").await;
    assert!(matches!(result, Err(Error::DeploymentNotFound(name)) if name == "ghost"));
}

#[tokio::test]
async fn test_status_repolls_live_task_state() {
    let h = harness(vec![one_chunk_target("t-a")], MockDeployer::default());
    let record = h.orchestrator.deploy(&linux_topology("lab", 4)).await.unwrap();
    let partition_name = record.tasks[0].partition_name.clone();

    // The partition disappears on the target behind our back.
    h.deployer.live_states.lock().unwrap().insert(partition_name, PartitionState::NotDeployed);

    let refreshed = h.orchestrator.status("lab").await.unwrap().unwrap();
    assert_eq!(refreshed.tasks[0].status, TaskStatus::Failed);

    // The refreshed state was written back to the registry.
    assert_eq!(h.orchestrator.registry().get("lab").unwrap().tasks[0].status, TaskStatus::Failed);
}

#[tokio::test]
async fn test_concurrent_deploys_of_different_names_stay_isolated() {
    let fleet = vec![one_chunk_target("t-a"), one_chunk_target("t-b")];
    let mut deployer = MockDeployer::default();
    deployer.delay = Some(Duration::from_millis(50));
    let h = harness(fleet, deployer);
    let orchestrator = Arc::new(h.orchestrator);

    let alpha = linux_topology("alpha", 4);
    let beta = linux_topology("beta", 4);

    let (a, b) = tokio::join!(orchestrator.deploy(&alpha), orchestrator.deploy(&beta));
    let (a, b) = (a.unwrap(), b.unwrap());

    assert_eq!(a.topology_name, "alpha");
    assert_eq!(b.topology_name, "beta");
    assert!(a.tasks.iter().all(|t| t.partition_name.starts_with("alpha-")));
    assert!(b.tasks.iter().all(|t| t.partition_name.starts_with("beta-")));

    let mut names = orchestrator.registry().names();
    names.sort();
    assert_eq!(names, vec!["alpha", "beta"]);
}

#[tokio::test]
async fn test_same_name_calls_serialize_and_never_interleave() {
    let fleet = vec![one_chunk_target("t-a"), one_chunk_target("t-b")];
    let mut deployer = MockDeployer::default();
    deployer.delay = Some(Duration::from_millis(100));
    let h = harness(fleet, deployer);
    let orchestrator = Arc::new(h.orchestrator);

    let deploy = {
        let orchestrator = orchestrator.clone();
        tokio::spawn(async move { orchestrator.deploy(&linux_topology("lab", 10)).await })
    };
    // Let the deploy take the name lock before contending with it.
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Arrives mid-deploy; must block until the record is complete, never
    // observe a half-written one.
    let polled = orchestrator.status("lab").await.unwrap().unwrap();
    assert_eq!(polled.tasks.len(), 2);
    assert!(polled.tasks.iter().all(|t| t.status == TaskStatus::Completed));

    orchestrator.destroy("lab").await.unwrap();

    let record = deploy.await.unwrap().unwrap();
    assert_eq!(record.status, DeploymentStatus::Success);

    // The destroy saw the finished record: every deployed partition was
    // torn down, no more, no fewer.
    let destroyed = h.deployer.destroyed.lock().unwrap();
    let mut torn_down: Vec<&str> = destroyed.iter().map(|(_, name)| name.as_str()).collect();
    torn_down.sort_unstable();
    let mut expected: Vec<&str> = record.tasks.iter().map(|t| t.partition_name.as_str()).collect();
    expected.sort_unstable();
    assert_eq!(torn_down, expected);
    drop(destroyed);

    assert!(orchestrator.registry().get("lab").is_none());
}

#[tokio::test]
async fn test_record_dto_serializes_boundary_shape() {
    let h = harness(vec![one_chunk_target("t-a")], MockDeployer::default());
    let record = h.orchestrator.deploy(&linux_topology("lab", 4)).await.unwrap();

    let dto = DeploymentRecordDto::from(&record);
    let value = serde_json::to_value(&dto).unwrap();

    assert_eq!(value["topology_name"], "lab");
    assert_eq!(value["status"], "success");
    assert_eq!(value["total_targets"], 1);
    assert_eq!(value["successful_deployments"], 1);
    assert_eq!(value["failed_deployments"], 0);
    assert_eq!(value["tasks"][0]["status"], "completed");
    assert_eq!(value["connectivity"]["attempted"], false);
    assert!(value["distribution"]["t-a"].is_array());
}
