use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};

/// An abstract remote host capable of running the per-target deployer.
///
/// Identity and lifecycle belong to the provisioning collaborator; the core
/// only reads capacity and addresses.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComputeTarget {
    pub id: String,
    /// Reachable endpoint for remote command execution. `None` means the
    /// target cannot currently be addressed and must be skipped.
    pub address: Option<String>,
    /// Endpoint used as the local side of mesh tunnels.
    pub private_address: Option<String>,
    pub state: TargetState,
    pub capacity: TargetCapacity,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TargetState {
    Pending,
    Running,
    Stopped,
    Terminated,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetCapacity {
    pub cpu_cores: u32,
    pub memory_gb: f64,
    pub storage_gb: f64,
    pub max_workloads: u32,
}

impl ComputeTarget {
    /// Suffix used to derive partition names and tunnel interface names.
    pub fn suffix(&self) -> String {
        let chars: Vec<char> = self.id.chars().collect();
        let start = chars.len().saturating_sub(8);
        chars[start..].iter().collect()
    }
}

/// Specification for a compute target that does not exist yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TargetSpec {
    pub tier: String,
    pub instance_type: String,
    pub cpu_cores: u32,
    pub memory_gb: f64,
    pub storage_gb: f64,
    pub max_workloads: u32,
}

/// One entry of the fixed size-tier table used when planning a new target.
#[derive(Debug, Clone)]
pub struct SizeTier {
    pub name: &'static str,
    pub instance_type: &'static str,
    pub cpu: u32,
    pub memory_gb: f64,
    pub storage_gb: f64,
    pub max_workloads: u32,
    pub hourly_cost: f64,
}

impl SizeTier {
    pub fn to_spec(&self) -> TargetSpec {
        TargetSpec {
            tier: self.name.to_string(),
            instance_type: self.instance_type.to_string(),
            cpu_cores: self.cpu,
            memory_gb: self.memory_gb,
            storage_gb: self.storage_gb,
            max_workloads: self.max_workloads,
        }
    }
}

lazy_static! {
    /// Ordered size-tier table: general-purpose tiers smallest to largest,
    /// then compute-optimized and memory-optimized variants. First-fit
    /// scans walk this order.
    pub static ref SIZE_TIERS: Vec<SizeTier> = vec![
        SizeTier { name: "small", instance_type: "t3.small", cpu: 2, memory_gb: 2.0, storage_gb: 20.0, max_workloads: 3, hourly_cost: 0.0208 },
        SizeTier { name: "medium", instance_type: "t3.medium", cpu: 2, memory_gb: 4.0, storage_gb: 20.0, max_workloads: 5, hourly_cost: 0.0416 },
        SizeTier { name: "large", instance_type: "t3.large", cpu: 2, memory_gb: 8.0, storage_gb: 50.0, max_workloads: 8, hourly_cost: 0.0832 },
        SizeTier { name: "xlarge", instance_type: "t3.xlarge", cpu: 4, memory_gb: 16.0, storage_gb: 100.0, max_workloads: 15, hourly_cost: 0.1664 },
        SizeTier { name: "2xlarge", instance_type: "t3.2xlarge", cpu: 8, memory_gb: 32.0, storage_gb: 200.0, max_workloads: 25, hourly_cost: 0.3328 },
        SizeTier { name: "compute-large", instance_type: "c5.large", cpu: 2, memory_gb: 4.0, storage_gb: 30.0, max_workloads: 6, hourly_cost: 0.085 },
        SizeTier { name: "compute-xlarge", instance_type: "c5.xlarge", cpu: 4, memory_gb: 8.0, storage_gb: 60.0, max_workloads: 12, hourly_cost: 0.17 },
        SizeTier { name: "memory-large", instance_type: "r5.large", cpu: 2, memory_gb: 16.0, storage_gb: 50.0, max_workloads: 10, hourly_cost: 0.126 },
        SizeTier { name: "memory-xlarge", instance_type: "r5.xlarge", cpu: 4, memory_gb: 32.0, storage_gb: 100.0, max_workloads: 20, hourly_cost: 0.252 },
    ];
}

/// Fallback when no tier covers the requirement.
pub const FALLBACK_TIER: &str = "2xlarge";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_takes_last_eight_chars() {
        let target = ComputeTarget {
            id: "i-0abc1234def56789".to_string(),
            address: None,
            private_address: None,
            state: TargetState::Running,
            capacity: TargetCapacity { cpu_cores: 2, memory_gb: 4.0, storage_gb: 20.0, max_workloads: 5 },
        };
        assert_eq!(target.suffix(), "def56789");
    }

    #[test]
    fn test_suffix_of_short_id_is_whole_id() {
        let target = ComputeTarget {
            id: "t1".to_string(),
            address: None,
            private_address: None,
            state: TargetState::Running,
            capacity: TargetCapacity { cpu_cores: 2, memory_gb: 4.0, storage_gb: 20.0, max_workloads: 5 },
        };
        assert_eq!(target.suffix(), "t1");
    }

    #[test]
    fn test_fallback_tier_exists_in_table() {
        assert!(SIZE_TIERS.iter().any(|t| t.name == FALLBACK_TIER));
    }
}
