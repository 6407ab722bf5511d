use serde::{Deserialize, Serialize};

use crate::domain::topology::{NetworkTopology, NodeConfig};

/// Derived resource requirement for running a set of emulated nodes.
///
/// Never user-supplied; always produced by [`estimate`] or
/// [`estimate_nodes`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceRequirement {
    pub cpu_cores: u32,
    pub memory_gb: f64,
    pub storage_gb: f64,
    /// Estimate of OS-level processes the nodes will spawn on the host.
    /// Not a workload (container) count; the size-tier table has its own
    /// `max_workloads` field for that.
    pub estimated_host_processes: u32,
}

/// Live usage numbers as reported by the telemetry collector.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub cpu_used: f64,
    pub memory_used_gb: f64,
    pub storage_used_gb: f64,
    pub process_count: u32,
}

/// Per-node cost profile of one node kind.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KindProfile {
    pub cpu: f64,
    pub memory_gb: f64,
    pub storage_gb: f64,
}

const BASE_STORAGE_GB: f64 = 10.0;
const OVERHEAD_CPU: f64 = 1.0;
const OVERHEAD_MEMORY_GB: f64 = 1.0;
const OVERHEAD_STORAGE_GB: f64 = 5.0;

/// Profile applied to node kinds with no table entry.
const UNCLASSIFIED_PROFILE: KindProfile = KindProfile { cpu: 0.5, memory_gb: 0.5, storage_gb: 2.0 };

/// Looks up the cost profile for a node kind. Unknown kinds get the
/// explicit unclassified profile; the profile of a previously seen node is
/// never reused.
pub fn kind_profile(kind: Option<&str>) -> KindProfile {
    match kind {
        Some("srl") | Some("srlinux") => KindProfile { cpu: 1.0, memory_gb: 2.0, storage_gb: 5.0 },
        Some("ceos") | Some("arista_ceos") => KindProfile { cpu: 0.5, memory_gb: 1.0, storage_gb: 3.0 },
        Some("linux") => KindProfile { cpu: 0.2, memory_gb: 0.5, storage_gb: 1.0 },
        _ => UNCLASSIFIED_PROFILE,
    }
}

/// Estimates the resource requirement for deploying the whole topology.
pub fn estimate(topology: &NetworkTopology) -> ResourceRequirement {
    estimate_nodes(topology.nodes.iter().map(|(_, config)| config))
}

/// Estimates the resource requirement for a subset of nodes (one chunk).
pub fn estimate_nodes<'a>(nodes: impl Iterator<Item = &'a NodeConfig>) -> ResourceRequirement {
    let mut total_cpu = 0.0;
    let mut total_memory = 0.0;
    let mut total_storage = BASE_STORAGE_GB;
    let mut node_count: u32 = 0;

    for config in nodes {
        let profile = kind_profile(config.kind.as_deref());
        total_cpu += profile.cpu;
        total_memory += profile.memory_gb;
        total_storage += profile.storage_gb;
        node_count += 1;
    }

    total_cpu += OVERHEAD_CPU;
    total_memory += OVERHEAD_MEMORY_GB;
    total_storage += OVERHEAD_STORAGE_GB;

    ResourceRequirement {
        cpu_cores: total_cpu as u32 + 1,
        memory_gb: total_memory,
        storage_gb: total_storage,
        estimated_host_processes: node_count * 5 + 10,
    }
}
