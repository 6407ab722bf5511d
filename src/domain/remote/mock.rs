//! Scriptable in-crate collaborators for unit and integration tests.

use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;

use crate::domain::remote::deployer::{Deployer, PartitionState, PartitionStatus};
use crate::domain::remote::exec::{CommandRunner, RemoteOutcome};
use crate::domain::remote::provisioner::{Provisioner, TargetFilter};
use crate::domain::remote::telemetry::TelemetryCollector;
use crate::domain::resources::ResourceUsage;
use crate::domain::target::{ComputeTarget, TargetCapacity, TargetSpec, TargetState};
use crate::domain::topology::NetworkTopology;
use crate::error::{Error, Result};

/// Records every remote call; commands matching a `fail_on` fragment exit
/// non-zero, commands matching a `responding` fragment produce the scripted
/// stdout.
#[derive(Default)]
pub struct MockRunner {
    pub log: Mutex<Vec<(String, String)>>,
    fail_on: Vec<String>,
    stdout_for: Vec<(String, String)>,
}

impl MockRunner {
    pub fn failing_on(mut self, fragment: &str) -> Self {
        self.fail_on.push(fragment.to_string());
        self
    }

    pub fn responding(mut self, fragment: &str, stdout: &str) -> Self {
        self.stdout_for.push((fragment.to_string(), stdout.to_string()));
        self
    }

    pub fn commands_for(&self, address: &str) -> Vec<String> {
        self.log.lock().unwrap().iter().filter(|(a, _)| a == address).map(|(_, c)| c.clone()).collect()
    }
}

#[async_trait]
impl CommandRunner for MockRunner {
    async fn run(&self, address: &str, command: &str) -> Result<RemoteOutcome> {
        self.log.lock().unwrap().push((address.to_string(), command.to_string()));

        if self.fail_on.iter().any(|f| command.contains(f)) {
            return Ok(RemoteOutcome { exit_code: 1, stdout: String::new(), stderr: "scripted failure".to_string() });
        }

        let stdout = self.stdout_for.iter().find(|(f, _)| command.contains(f)).map(|(_, out)| out.clone()).unwrap_or_default();
        Ok(RemoteOutcome { exit_code: 0, stdout, stderr: String::new() })
    }

    async fn upload(&self, address: &str, remote_path: &str, contents: &str) -> Result<()> {
        let _ = contents;
        self.log.lock().unwrap().push((address.to_string(), format!("upload {remote_path}")));
        Ok(())
    }
}

/// Deployer whose per-target behavior is scripted up front.
#[derive(Default)]
pub struct MockDeployer {
    /// Targets whose deploy reports an unverified result (`Ok(false)`).
    pub fail_targets: HashSet<String>,
    /// Targets whose deploy raises an error.
    pub error_targets: HashSet<String>,
    /// Targets whose destroy raises an error.
    pub destroy_error_targets: HashSet<String>,
    /// Optional artificial latency per deploy, for concurrency tests.
    pub delay: Option<Duration>,
    pub deployed: Mutex<Vec<(String, String)>>,
    /// Full partial topologies as received, for content assertions.
    pub partition_snapshots: Mutex<Vec<NetworkTopology>>,
    pub destroyed: Mutex<Vec<(String, String)>>,
    /// Overrides what `status` reports per partition name.
    pub live_states: Mutex<HashMap<String, PartitionState>>,
}

impl MockDeployer {
    pub fn failing_for(mut self, target_id: &str) -> Self {
        self.fail_targets.insert(target_id.to_string());
        self
    }

    pub fn erroring_for(mut self, target_id: &str) -> Self {
        self.error_targets.insert(target_id.to_string());
        self
    }

    pub fn deployed_partitions(&self) -> Vec<String> {
        self.deployed.lock().unwrap().iter().map(|(_, name)| name.clone()).collect()
    }
}

#[async_trait]
impl Deployer for MockDeployer {
    async fn deploy(&self, target: &ComputeTarget, partition: &NetworkTopology) -> Result<bool> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.error_targets.contains(&target.id) {
            return Err(Error::RemoteExecError { target: target.id.clone(), message: "scripted deploy error".to_string() });
        }
        if self.fail_targets.contains(&target.id) {
            return Ok(false);
        }
        self.deployed.lock().unwrap().push((target.id.clone(), partition.name.clone()));
        self.partition_snapshots.lock().unwrap().push(partition.clone());
        self.live_states.lock().unwrap().insert(partition.name.clone(), PartitionState::Deployed);
        Ok(true)
    }

    async fn destroy(&self, target: &ComputeTarget, partition_name: &str) -> Result<bool> {
        if self.destroy_error_targets.contains(&target.id) {
            return Err(Error::RemoteExecError { target: target.id.clone(), message: "scripted destroy error".to_string() });
        }
        self.destroyed.lock().unwrap().push((target.id.clone(), partition_name.to_string()));
        self.live_states.lock().unwrap().remove(partition_name);
        Ok(true)
    }

    async fn status(&self, _target: &ComputeTarget, partition_name: &str) -> Result<PartitionStatus> {
        let state = self.live_states.lock().unwrap().get(partition_name).copied().unwrap_or(PartitionState::NotDeployed);
        Ok(PartitionStatus { state, details: None })
    }
}

/// Provisioner over an in-memory fleet that can optionally grow on demand.
pub struct MockProvisioner {
    pub fleet: Mutex<Vec<ComputeTarget>>,
    pub can_plan: bool,
    planned: AtomicUsize,
}

impl MockProvisioner {
    pub fn new(fleet: Vec<ComputeTarget>) -> Self {
        MockProvisioner { fleet: Mutex::new(fleet), can_plan: true, planned: AtomicUsize::new(0) }
    }

    pub fn without_planning(mut self) -> Self {
        self.can_plan = false;
        self
    }

    pub fn planned_count(&self) -> usize {
        self.planned.load(Ordering::SeqCst)
    }

    pub fn running_target(id: &str, cpu: u32, memory_gb: f64, storage_gb: f64) -> ComputeTarget {
        ComputeTarget {
            id: id.to_string(),
            address: Some(format!("{id}.example.net")),
            private_address: Some(format!("10.0.0.{}", id.len())),
            state: TargetState::Running,
            capacity: TargetCapacity { cpu_cores: cpu, memory_gb, storage_gb, max_workloads: 25 },
        }
    }
}

#[async_trait]
impl Provisioner for MockProvisioner {
    async fn list_targets(&self, filter: &TargetFilter) -> Result<Vec<ComputeTarget>> {
        Ok(self.fleet.lock().unwrap().iter().filter(|t| filter.matches(t)).cloned().collect())
    }

    async fn plan_target(&self, spec: &TargetSpec) -> Result<ComputeTarget> {
        if !self.can_plan {
            return Err(Error::ProvisioningError("planning disabled".to_string()));
        }
        let n = self.planned.fetch_add(1, Ordering::SeqCst);
        let target = ComputeTarget {
            id: format!("planned-{:04}", n),
            address: Some(format!("planned-{n}.example.net")),
            private_address: Some(format!("10.0.1.{}", n + 1)),
            state: TargetState::Running,
            capacity: TargetCapacity { cpu_cores: spec.cpu_cores, memory_gb: spec.memory_gb, storage_gb: spec.storage_gb, max_workloads: spec.max_workloads },
        };
        self.fleet.lock().unwrap().push(target.clone());
        Ok(target)
    }

    async fn terminate(&self, target_id: &str) -> Result<bool> {
        let mut fleet = self.fleet.lock().unwrap();
        let before = fleet.len();
        fleet.retain(|t| t.id != target_id);
        Ok(fleet.len() < before)
    }
}

/// Telemetry collector with fixed usage per target; unknown targets report
/// zero usage.
#[derive(Default)]
pub struct MockTelemetry {
    pub usage_by_target: HashMap<String, ResourceUsage>,
    pub failing_targets: HashSet<String>,
}

impl MockTelemetry {
    pub fn with_usage(mut self, target_id: &str, usage: ResourceUsage) -> Self {
        self.usage_by_target.insert(target_id.to_string(), usage);
        self
    }

    pub fn failing_for(mut self, target_id: &str) -> Self {
        self.failing_targets.insert(target_id.to_string());
        self
    }
}

#[async_trait]
impl TelemetryCollector for MockTelemetry {
    async fn usage(&self, target: &ComputeTarget) -> Result<ResourceUsage> {
        if self.failing_targets.contains(&target.id) {
            return Err(Error::RemoteExecError { target: target.id.clone(), message: "scripted telemetry error".to_string() });
        }
        Ok(self.usage_by_target.get(&target.id).cloned().unwrap_or_default())
    }
}
