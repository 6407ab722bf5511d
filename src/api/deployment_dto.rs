use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::orchestrator::{DeploymentRecord, DeploymentTask};

/// Outward shape of a deployment record, as exposed at the process boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentRecordDto {
    pub topology_name: String,
    pub status: String,
    pub total_targets: usize,
    pub successful_deployments: usize,
    pub failed_deployments: usize,
    pub distribution: HashMap<String, Vec<String>>,
    pub tasks: Vec<DeploymentTaskDto>,
    pub connectivity: ConnectivityDto,
    pub deployed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeploymentTaskDto {
    pub id: String,
    pub target_id: String,
    pub partition_name: String,
    pub nodes: Vec<String>,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConnectivityDto {
    pub attempted: bool,
    pub ok: bool,
}

impl From<&DeploymentTask> for DeploymentTaskDto {
    fn from(task: &DeploymentTask) -> Self {
        DeploymentTaskDto {
            id: task.id.to_string(),
            target_id: task.target.id.clone(),
            partition_name: task.partition_name.clone(),
            nodes: task.nodes.clone(),
            status: task.status.to_string(),
            started_at: task.started_at,
            completed_at: task.completed_at,
            error_message: task.error_message.clone(),
        }
    }
}

impl From<&DeploymentRecord> for DeploymentRecordDto {
    fn from(record: &DeploymentRecord) -> Self {
        DeploymentRecordDto {
            topology_name: record.topology_name.clone(),
            status: record.status.to_string(),
            total_targets: record.distribution.len(),
            successful_deployments: record.successful,
            failed_deployments: record.failed,
            distribution: record.distribution.clone(),
            tasks: record.tasks.iter().map(DeploymentTaskDto::from).collect(),
            connectivity: ConnectivityDto { attempted: record.connectivity.attempted, ok: record.connectivity.ok },
            deployed_at: record.deployed_at,
        }
    }
}
