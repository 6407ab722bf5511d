use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tokio::time::timeout;
use uuid::Uuid;

use crate::domain::mesh::MeshBuilder;
use crate::domain::partitioner::{chunk_nodes, derive_partial};
use crate::domain::remote::deployer::{Deployer, PartitionState};
use crate::domain::remote::provisioner::{Provisioner, TargetFilter};
use crate::domain::remote::telemetry::TelemetryCollector;
use crate::domain::resources::estimate_nodes;
use crate::domain::selector::{TargetResources, first_fit, plan_tier};
use crate::domain::target::ComputeTarget;
use crate::domain::topology::NetworkTopology;
use crate::error::{Error, Result};

/// Lifecycle of one partition's deploy attempt.
/// `Pending -> Running -> {Completed | Failed}`, terminal states stay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            TaskStatus::Pending => "pending",
            TaskStatus::Running => "running",
            TaskStatus::Completed => "completed",
            TaskStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// Overall outcome of one distributed deployment.
///
/// `Failed` is reported when not a single partition deployed; `Partial`
/// only for genuinely mixed outcomes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeploymentStatus {
    Success,
    Partial,
    Failed,
}

impl fmt::Display for DeploymentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DeploymentStatus::Success => "success",
            DeploymentStatus::Partial => "partial",
            DeploymentStatus::Failed => "failed",
        };
        write!(f, "{s}")
    }
}

/// The unit of work representing one partition's deploy attempt.
#[derive(Debug, Clone)]
pub struct DeploymentTask {
    pub id: Uuid,
    pub target: ComputeTarget,
    pub partition_name: String,
    pub nodes: Vec<String>,
    pub partition: NetworkTopology,
    pub status: TaskStatus,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectivityReport {
    pub attempted: bool,
    pub ok: bool,
}

/// Everything known about one deployed topology, keyed by topology name in
/// the registry.
#[derive(Debug, Clone)]
pub struct DeploymentRecord {
    pub topology_name: String,
    pub status: DeploymentStatus,
    pub distribution: HashMap<String, Vec<String>>,
    pub tasks: Vec<DeploymentTask>,
    pub successful: usize,
    pub failed: usize,
    pub connectivity: ConnectivityReport,
    pub deployed_at: DateTime<Utc>,
}

/// Process-wide store of active deployments.
///
/// Calls on the same topology name serialize through a per-name mutex;
/// different names proceed independently.
#[derive(Clone, Default)]
pub struct DeploymentRegistry {
    inner: Arc<RwLock<RegistryInner>>,
}

#[derive(Default)]
struct RegistryInner {
    records: HashMap<String, DeploymentRecord>,
    locks: HashMap<String, Arc<Mutex<()>>>,
}

impl DeploymentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Per-topology-name guard. Created on first use and kept for the
    /// registry's lifetime so concurrent callers always agree on it.
    pub fn name_lock(&self, topology_name: &str) -> Arc<Mutex<()>> {
        let mut guard = self.inner.write().unwrap();
        guard.locks.entry(topology_name.to_string()).or_insert_with(|| Arc::new(Mutex::new(()))).clone()
    }

    pub fn insert(&self, record: DeploymentRecord) {
        let mut guard = self.inner.write().unwrap();
        guard.records.insert(record.topology_name.clone(), record);
    }

    pub fn get(&self, topology_name: &str) -> Option<DeploymentRecord> {
        let guard = self.inner.read().unwrap();
        guard.records.get(topology_name).cloned()
    }

    pub fn remove(&self, topology_name: &str) -> Option<DeploymentRecord> {
        let mut guard = self.inner.write().unwrap();
        guard.records.remove(topology_name)
    }

    pub fn names(&self) -> Vec<String> {
        let guard = self.inner.read().unwrap();
        guard.records.keys().cloned().collect()
    }

    /// Forgets a name's guard once its record is gone and no other caller
    /// holds the handle, so the lock map does not grow with every name
    /// ever deployed.
    pub fn discard_lock(&self, topology_name: &str, handle: &Arc<Mutex<()>>) {
        let mut guard = self.inner.write().unwrap();
        if guard.records.contains_key(topology_name) {
            return;
        }
        // Exactly two handles left: the map's and the caller's.
        if Arc::strong_count(handle) == 2 {
            guard.locks.remove(topology_name);
        }
    }
}

/// Turns a topology into per-target deployment tasks, dispatches them
/// concurrently, repairs cross-target connectivity and maintains the
/// deployment registry.
pub struct DeploymentOrchestrator {
    provisioner: Arc<dyn Provisioner>,
    deployer: Arc<dyn Deployer>,
    telemetry: Arc<dyn TelemetryCollector>,
    mesh: MeshBuilder,
    registry: DeploymentRegistry,
    chunk_size: usize,
    task_timeout: Duration,
}

/// Minimum number of succeeded partitions before mesh setup is worthwhile.
const MIN_MESH_PARTITIONS: usize = 2;

const DEFAULT_TASK_TIMEOUT: Duration = Duration::from_secs(300);

impl DeploymentOrchestrator {
    pub fn new(
        provisioner: Arc<dyn Provisioner>,
        deployer: Arc<dyn Deployer>,
        telemetry: Arc<dyn TelemetryCollector>,
        mesh: MeshBuilder,
        chunk_size: usize,
    ) -> Self {
        DeploymentOrchestrator {
            provisioner,
            deployer,
            telemetry,
            mesh,
            registry: DeploymentRegistry::new(),
            chunk_size,
            task_timeout: DEFAULT_TASK_TIMEOUT,
        }
    }

    pub fn with_task_timeout(mut self, task_timeout: Duration) -> Self {
        self.task_timeout = task_timeout;
        self
    }

    pub fn registry(&self) -> &DeploymentRegistry {
        &self.registry
    }

    /// Deploys `topology` across the fleet and stores the resulting record.
    ///
    /// Placement errors fail the whole call; per-partition failures are
    /// isolated into their task and counted.
    pub async fn deploy(&self, topology: &NetworkTopology) -> Result<DeploymentRecord> {
        let lock = self.registry.name_lock(&topology.name);
        let _guard = lock.lock().await;

        let placement = self.place(topology).await?;

        // Targets without a reachable address cannot take a partition; the
        // rest of the deployment proceeds without them.
        let mut tasks: Vec<DeploymentTask> = Vec::new();
        let mut distribution: HashMap<String, Vec<String>> = HashMap::new();
        for (target, nodes) in placement {
            distribution.insert(target.id.clone(), nodes.clone());
            if target.address.is_none() {
                log::warn!("Excluding partition on '{}' from dispatch: no reachable address", target.id);
                continue;
            }
            let partition = derive_partial(topology, &nodes, &target.suffix());
            tasks.push(DeploymentTask {
                id: Uuid::new_v4(),
                partition_name: partition.name.clone(),
                nodes,
                partition,
                target,
                status: TaskStatus::Pending,
                started_at: None,
                completed_at: None,
                error_message: None,
            });
        }

        // Concurrent dispatch; the join is the aggregation barrier.
        for task in &mut tasks {
            task.status = TaskStatus::Running;
            task.started_at = Some(Utc::now());
        }
        let results = join_all(tasks.iter().map(|task| self.dispatch(task))).await;

        let mut successful = 0;
        let mut failed = 0;
        for (task, result) in tasks.iter_mut().zip(results) {
            task.completed_at = Some(Utc::now());
            match result {
                Ok(true) => {
                    task.status = TaskStatus::Completed;
                    successful += 1;
                }
                Ok(false) => {
                    task.status = TaskStatus::Failed;
                    task.error_message = Some("remote deploy reported failure".to_string());
                    failed += 1;
                }
                Err(e) => {
                    task.status = TaskStatus::Failed;
                    task.error_message = Some(e.to_string());
                    failed += 1;
                }
            }
        }

        let status = if failed == 0 {
            DeploymentStatus::Success
        } else if successful == 0 {
            DeploymentStatus::Failed
        } else {
            DeploymentStatus::Partial
        };

        // Mesh runs strictly after the dispatch barrier. Its outcome is
        // recorded but never changes the deployment status.
        let mut connectivity = ConnectivityReport::default();
        if distribution.len() > 1 && successful >= MIN_MESH_PARTITIONS {
            let participants: Vec<ComputeTarget> = tasks.iter().map(|t| t.target.clone()).collect();
            connectivity.attempted = true;
            connectivity.ok = self.mesh.connect(&participants).await;
        }

        let record = DeploymentRecord {
            topology_name: topology.name.clone(),
            status,
            distribution,
            tasks,
            successful,
            failed,
            connectivity,
            deployed_at: Utc::now(),
        };

        log::info!(
            "Deployment of '{}' finished: {} ({} succeeded, {} failed, {} target(s))",
            record.topology_name,
            record.status,
            record.successful,
            record.failed,
            record.distribution.len()
        );
        self.registry.insert(record.clone());
        Ok(record)
    }

    /// Tears down every task of a deployment, best-effort, and removes the
    /// record. Individual destroy failures are logged and swallowed.
    pub async fn destroy(&self, topology_name: &str) -> Result<()> {
        let lock = self.registry.name_lock(topology_name);
        let _guard = lock.lock().await;

        let Some(record) = self.registry.get(topology_name) else {
            self.registry.discard_lock(topology_name, &lock);
            return Err(Error::DeploymentNotFound(topology_name.to_string()));
        };

        let results = join_all(record.tasks.iter().map(|task| async move {
            match timeout(self.task_timeout, self.deployer.destroy(&task.target, &task.partition_name)).await {
                Ok(Ok(ok)) => ok,
                Ok(Err(e)) => {
                    log::warn!("Destroy of '{}' on '{}' failed: {}", task.partition_name, task.target.id, e);
                    false
                }
                Err(_) => {
                    log::warn!("Destroy of '{}' on '{}' timed out", task.partition_name, task.target.id);
                    false
                }
            }
        }))
        .await;

        let failed = results.iter().filter(|ok| !**ok).count();
        if failed > 0 {
            log::warn!("Destroyed '{}' with {} task(s) not confirmed", topology_name, failed);
        }

        self.registry.remove(topology_name);
        self.registry.discard_lock(topology_name, &lock);
        log::info!("Removed deployment '{}' from the registry", topology_name);
        Ok(())
    }

    /// Re-polls every task's live status from its target and returns the
    /// refreshed record, or `None` for unknown names.
    pub async fn status(&self, topology_name: &str) -> Result<Option<DeploymentRecord>> {
        let lock = self.registry.name_lock(topology_name);
        let _guard = lock.lock().await;

        let Some(mut record) = self.registry.get(topology_name) else {
            self.registry.discard_lock(topology_name, &lock);
            return Ok(None);
        };

        let polls = join_all(record.tasks.iter().map(|task| async move {
            timeout(self.task_timeout, self.deployer.status(&task.target, &task.partition_name)).await
        }))
        .await;

        for (task, poll) in record.tasks.iter_mut().zip(polls) {
            match poll {
                Ok(Ok(status)) => match status.state {
                    PartitionState::Deployed => task.status = TaskStatus::Completed,
                    PartitionState::NotDeployed | PartitionState::Error => task.status = TaskStatus::Failed,
                    PartitionState::Unknown => {}
                },
                Ok(Err(e)) => log::warn!("Status poll of '{}' on '{}' failed: {}", task.partition_name, task.target.id, e),
                Err(_) => log::warn!("Status poll of '{}' on '{}' timed out", task.partition_name, task.target.id),
            }
        }

        self.registry.insert(record.clone());
        Ok(Some(record))
    }

    /// One dispatch, isolated: timeouts and errors resolve locally.
    async fn dispatch(&self, task: &DeploymentTask) -> Result<bool> {
        match timeout(self.task_timeout, self.deployer.deploy(&task.target, &task.partition)).await {
            Ok(result) => result,
            Err(_) => Err(Error::RemoteTimeout { target: task.target.id.clone(), seconds: self.task_timeout.as_secs() }),
        }
    }

    /// Assigns every chunk of the topology to a compute target: first-fit
    /// over the live fleet, otherwise a newly planned target sized to the
    /// chunk.
    async fn place(&self, topology: &NetworkTopology) -> Result<Vec<(ComputeTarget, Vec<String>)>> {
        let chunks = chunk_nodes(topology, self.chunk_size);
        if chunks.is_empty() {
            return Err(Error::NoNodesToDistribute(topology.name.clone()));
        }

        let mut fleet = self.fleet_snapshot().await?;
        let mut placement: Vec<(ComputeTarget, Vec<String>)> = Vec::new();

        for chunk in chunks {
            let requirement = estimate_nodes(topology.nodes.iter().filter(|(name, _)| chunk.contains(name)).map(|(_, c)| c));

            let target = match first_fit(&requirement, &fleet) {
                Some(existing) => {
                    let target = existing.clone();
                    // The chunk now occupies part of this target's spare
                    // capacity; later chunks see the reduced headroom.
                    if let Some(entry) = fleet.iter_mut().find(|r| r.target.id == target.id) {
                        entry.available_cpu -= requirement.cpu_cores as f64;
                        entry.available_memory_gb -= requirement.memory_gb;
                        entry.available_storage_gb -= requirement.storage_gb;
                    }
                    target
                }
                None => {
                    let tier = plan_tier(&requirement, chunk.len() as u32);
                    log::info!("No running target fits {} node(s); planning a '{}' target", chunk.len(), tier.name);
                    let target = self.provisioner.plan_target(&tier.to_spec()).await.map_err(|e| Error::ProvisioningError(e.to_string()))?;
                    fleet.push(TargetResources {
                        available_cpu: (target.capacity.cpu_cores as f64 - requirement.cpu_cores as f64).max(0.0),
                        available_memory_gb: (target.capacity.memory_gb - requirement.memory_gb).max(0.0),
                        available_storage_gb: (target.capacity.storage_gb - requirement.storage_gb).max(0.0),
                        target: target.clone(),
                    });
                    target
                }
            };

            // First-fit may pick the same target for several chunks; they
            // collapse into one partition so one partial topology per
            // target is deployed.
            if let Some((_, nodes)) = placement.iter_mut().find(|(t, _)| t.id == target.id) {
                nodes.extend(chunk);
            } else {
                placement.push((target, chunk));
            }
        }

        Ok(placement)
    }

    /// Lists running targets and subtracts live usage. Targets whose
    /// telemetry fails are left out of placement rather than trusted blind.
    async fn fleet_snapshot(&self) -> Result<Vec<TargetResources>> {
        let targets = self.provisioner.list_targets(&TargetFilter::running()).await?;

        let usages = join_all(targets.iter().map(|target| self.telemetry.usage(target))).await;

        let mut fleet = Vec::new();
        for (target, usage) in targets.into_iter().zip(usages) {
            match usage {
                Ok(usage) => fleet.push(TargetResources::from_usage(target, &usage)),
                Err(e) => log::warn!("Skipping target '{}' for placement: telemetry failed ({})", target.id, e),
            }
        }
        Ok(fleet)
    }
}
