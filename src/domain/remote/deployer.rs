use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::domain::remote::exec::CommandRunner;
use crate::domain::target::ComputeTarget;
use crate::domain::topology::NetworkTopology;
use crate::error::{Error, Result};

/// Per-target operation executor: deploys, destroys and inspects one
/// partition on one compute target.
#[async_trait]
pub trait Deployer: Send + Sync {
    /// Returns `Ok(true)` only on verified success (zero remote exit code).
    async fn deploy(&self, target: &ComputeTarget, partition: &NetworkTopology) -> Result<bool>;
    async fn destroy(&self, target: &ComputeTarget, partition_name: &str) -> Result<bool>;
    async fn status(&self, target: &ComputeTarget, partition_name: &str) -> Result<PartitionStatus>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartitionState {
    Deployed,
    NotDeployed,
    Unknown,
    Error,
}

#[derive(Debug, Clone)]
pub struct PartitionStatus {
    pub state: PartitionState,
    pub details: Option<Value>,
}

/// Deployer that drives `containerlab` on the target over a
/// [`CommandRunner`].
pub struct SshDeployer {
    runner: Arc<dyn CommandRunner>,
    workdir: String,
}

impl SshDeployer {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        SshDeployer { runner, workdir: "/opt/netlab/topos".to_string() }
    }

    fn topology_file(&self, partition_name: &str) -> String {
        format!("{}/{}.clab.yml", self.workdir, partition_name.replace(' ', "_"))
    }

    fn address_of<'a>(&self, target: &'a ComputeTarget) -> Result<&'a str> {
        target.address.as_deref().ok_or_else(|| Error::RemoteExecError { target: target.id.clone(), message: "target has no reachable address".to_string() })
    }
}

#[async_trait]
impl Deployer for SshDeployer {
    async fn deploy(&self, target: &ComputeTarget, partition: &NetworkTopology) -> Result<bool> {
        let address = self.address_of(target)?;
        let file = self.topology_file(&partition.name);

        // JSON is a YAML subset, so containerlab takes the document as-is.
        let document = serde_json::to_string_pretty(&partition.to_dto())?;
        self.runner.upload(address, &file, &document).await?;

        let outcome = self.runner.run(address, &format!("cd {} && sudo containerlab deploy -t {} --reconfigure", self.workdir, file)).await?;
        if !outcome.success() {
            log::error!("containerlab deploy of '{}' failed on {} (code={}): {}", partition.name, target.id, outcome.exit_code, outcome.stderr.trim());
            return Ok(false);
        }

        log::info!("Deployed partition '{}' onto target {}", partition.name, target.id);
        Ok(true)
    }

    async fn destroy(&self, target: &ComputeTarget, partition_name: &str) -> Result<bool> {
        let address = self.address_of(target)?;
        let file = self.topology_file(partition_name);

        let outcome = self.runner.run(address, &format!("cd {} && sudo containerlab destroy -t {} --cleanup", self.workdir, file)).await?;
        if !outcome.success() {
            log::warn!("containerlab destroy of '{}' on {} exited with {}", partition_name, target.id, outcome.exit_code);
        }
        Ok(outcome.success())
    }

    async fn status(&self, target: &ComputeTarget, partition_name: &str) -> Result<PartitionStatus> {
        let address = self.address_of(target)?;
        let file = self.topology_file(partition_name);

        let probe = self.runner.run(address, &format!("test -f {file} && echo exists")).await?;
        if probe.stdout_trimmed() != "exists" {
            return Ok(PartitionStatus { state: PartitionState::NotDeployed, details: None });
        }

        let inspect = self.runner.run(address, &format!("cd {} && sudo containerlab inspect -t {} --format json", self.workdir, file)).await?;
        if !inspect.success() {
            return Ok(PartitionStatus { state: PartitionState::Error, details: None });
        }

        match serde_json::from_str::<Value>(inspect.stdout_trimmed()) {
            Ok(details) => Ok(PartitionStatus { state: PartitionState::Deployed, details: Some(details) }),
            Err(e) => {
                log::warn!("Unparseable inspect output from {}: {}", target.id, e);
                Ok(PartitionStatus { state: PartitionState::Unknown, details: None })
            }
        }
    }
}
