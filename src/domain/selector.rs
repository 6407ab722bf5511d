use crate::domain::resources::{ResourceRequirement, ResourceUsage};
use crate::domain::target::{ComputeTarget, FALLBACK_TIER, SIZE_TIERS, SizeTier, TargetState};

/// A compute target together with its currently available capacity
/// (capacity minus live usage).
#[derive(Debug, Clone)]
pub struct TargetResources {
    pub target: ComputeTarget,
    pub available_cpu: f64,
    pub available_memory_gb: f64,
    pub available_storage_gb: f64,
}

impl TargetResources {
    pub fn from_usage(target: ComputeTarget, usage: &ResourceUsage) -> Self {
        let available_cpu = target.capacity.cpu_cores as f64 - usage.cpu_used;
        let available_memory_gb = target.capacity.memory_gb - usage.memory_used_gb;
        let available_storage_gb = target.capacity.storage_gb - usage.storage_used_gb;
        TargetResources { target, available_cpu, available_memory_gb, available_storage_gb }
    }
}

/// Policy A: first-fit over the existing fleet.
///
/// Scans the fleet in the given order and returns the first running target
/// whose spare cpu, memory and storage each cover the requirement. No
/// best-fit scoring; first match wins.
pub fn first_fit<'a>(requirement: &ResourceRequirement, fleet: &'a [TargetResources]) -> Option<&'a ComputeTarget> {
    for candidate in fleet {
        if candidate.target.state != TargetState::Running {
            continue;
        }
        if candidate.available_cpu >= requirement.cpu_cores as f64
            && candidate.available_memory_gb >= requirement.memory_gb
            && candidate.available_storage_gb >= requirement.storage_gb
        {
            log::debug!("First-fit selected target '{}' for requirement {:?}", candidate.target.id, requirement);
            return Some(&candidate.target);
        }
    }
    None
}

/// Policy B: smallest tier covering the requirement, in table order.
///
/// `workload_count` is the number of emulated nodes the target will host
/// (compared against the tier's `max_workloads`), not the host-process
/// estimate. Falls back to the largest general-purpose tier with a warning
/// when nothing fits.
pub fn plan_tier(requirement: &ResourceRequirement, workload_count: u32) -> &'static SizeTier {
    for tier in SIZE_TIERS.iter() {
        if tier.cpu >= requirement.cpu_cores && tier.memory_gb >= requirement.memory_gb && tier.max_workloads >= workload_count {
            return tier;
        }
    }

    log::warn!(
        "No size tier covers requirement (cpu={}, memory={}GB, workloads={}); falling back to '{}'",
        requirement.cpu_cores,
        requirement.memory_gb,
        workload_count,
        FALLBACK_TIER
    );
    SIZE_TIERS.iter().find(|t| t.name == FALLBACK_TIER).unwrap_or(&SIZE_TIERS[SIZE_TIERS.len() - 1])
}

/// Scored variant of Policy B: minimizes wasted headroom and hourly cost
/// over all qualifying tiers. Ties are broken by tier name so the choice is
/// stable across table reorderings.
pub fn best_fit_tier(requirement: &ResourceRequirement, workload_count: u32) -> &'static SizeTier {
    let mut best: Option<(&'static SizeTier, f64)> = None;

    for tier in SIZE_TIERS.iter() {
        if tier.cpu < requirement.cpu_cores || tier.memory_gb < requirement.memory_gb || tier.max_workloads < workload_count {
            continue;
        }

        let cpu_overhead = (tier.cpu - requirement.cpu_cores) as f64;
        let memory_overhead = tier.memory_gb - requirement.memory_gb;
        let workload_overhead = (tier.max_workloads - workload_count) as f64;
        let score = cpu_overhead * 0.4 + memory_overhead * 0.4 + workload_overhead * 0.2 + tier.hourly_cost * 10.0;

        let better = match best {
            None => true,
            Some((current, current_score)) => score < current_score || (score == current_score && tier.name < current.name),
        };
        if better {
            best = Some((tier, score));
        }
    }

    match best {
        Some((tier, score)) => {
            log::debug!("Best-fit selected tier '{}' (score {:.4})", tier.name, score);
            tier
        }
        None => plan_tier(requirement, workload_count),
    }
}
