use serde::{Deserialize, Serialize};

/// Wire shape of a static fleet description file.
///
/// Used by the binary to run against pre-provisioned hosts instead of a
/// cloud provisioning service.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetDto {
    pub targets: Vec<FleetTargetDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FleetTargetDto {
    pub id: String,
    /// Reachable endpoint used for remote command execution.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    /// Endpoint used as the local side of mesh tunnels.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub private_address: Option<String>,
    #[serde(default = "default_state")]
    pub state: String,
    pub cpu_cores: u32,
    pub memory_gb: f64,
    pub storage_gb: f64,
    #[serde(default)]
    pub max_workloads: u32,
}

fn default_state() -> String {
    "running".to_string()
}
