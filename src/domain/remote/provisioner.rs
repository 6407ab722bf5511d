use std::path::Path;

use async_trait::async_trait;

use crate::api::fleet_dto::{FleetDto, FleetTargetDto};
use crate::domain::target::{ComputeTarget, TargetCapacity, TargetSpec, TargetState};
use crate::error::{Error, Result};
use crate::loader::parser::parse_json_file;

/// Restricts which targets a `list_targets` call returns.
#[derive(Debug, Clone, Default)]
pub struct TargetFilter {
    /// Empty means any state.
    pub states: Vec<TargetState>,
}

impl TargetFilter {
    pub fn running() -> Self {
        TargetFilter { states: vec![TargetState::Running] }
    }

    pub fn matches(&self, target: &ComputeTarget) -> bool {
        self.states.is_empty() || self.states.contains(&target.state)
    }
}

/// Compute-target lifecycle service. Creation and teardown of real hosts
/// live behind this contract; the core only plans sizes and reads capacity.
#[async_trait]
pub trait Provisioner: Send + Sync {
    async fn list_targets(&self, filter: &TargetFilter) -> Result<Vec<ComputeTarget>>;
    /// Creates a target matching `spec` and blocks until it is ready.
    async fn plan_target(&self, spec: &TargetSpec) -> Result<ComputeTarget>;
    async fn terminate(&self, target_id: &str) -> Result<bool>;
}

/// Provisioner over a fixed, pre-provisioned fleet loaded from a JSON file.
///
/// Cannot create new targets; placement that overflows the static fleet
/// fails with a provisioning error.
pub struct StaticFleetProvisioner {
    fleet: Vec<ComputeTarget>,
}

impl StaticFleetProvisioner {
    pub fn new(fleet: Vec<ComputeTarget>) -> Self {
        StaticFleetProvisioner { fleet }
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let dto: FleetDto = parse_json_file(path)?;
        let fleet = dto.targets.into_iter().map(target_from_dto).collect();
        Ok(StaticFleetProvisioner::new(fleet))
    }
}

fn target_from_dto(dto: FleetTargetDto) -> ComputeTarget {
    let state = match dto.state.as_str() {
        "pending" => TargetState::Pending,
        "running" => TargetState::Running,
        "stopped" => TargetState::Stopped,
        other => {
            log::warn!("Unknown target state '{}' for '{}'; treating as terminated", other, dto.id);
            TargetState::Terminated
        }
    };

    ComputeTarget {
        id: dto.id,
        address: dto.address,
        private_address: dto.private_address,
        state,
        capacity: TargetCapacity { cpu_cores: dto.cpu_cores, memory_gb: dto.memory_gb, storage_gb: dto.storage_gb, max_workloads: dto.max_workloads },
    }
}

#[async_trait]
impl Provisioner for StaticFleetProvisioner {
    async fn list_targets(&self, filter: &TargetFilter) -> Result<Vec<ComputeTarget>> {
        Ok(self.fleet.iter().filter(|t| filter.matches(t)).cloned().collect())
    }

    async fn plan_target(&self, spec: &TargetSpec) -> Result<ComputeTarget> {
        Err(Error::ProvisioningError(format!("static fleet cannot provision a new '{}' target", spec.tier)))
    }

    async fn terminate(&self, target_id: &str) -> Result<bool> {
        log::warn!("Static fleet cannot terminate target '{}'", target_id);
        Ok(false)
    }
}
