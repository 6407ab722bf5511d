use std::sync::Arc;

use futures::future::join_all;

use crate::domain::remote::exec::CommandRunner;
use crate::domain::target::ComputeTarget;

/// A planned point-to-point tunnel between two targets, with the private
/// subnet that numbers both tunnel interfaces.
///
/// Pair indices are 1-based and assigned over the target list sorted by id,
/// so the same participant set always yields the same subnets.
#[derive(Debug, Clone, PartialEq)]
pub struct TunnelLink {
    pub index: usize,
    pub left: String,
    pub right: String,
}

impl TunnelLink {
    pub fn subnet(&self) -> String {
        format!("192.168.{}.0/24", self.index)
    }

    pub fn left_address(&self) -> String {
        format!("192.168.{}.1/24", self.index)
    }

    pub fn right_address(&self) -> String {
        format!("192.168.{}.2/24", self.index)
    }
}

/// Enumerates every unordered pair of participating targets.
///
/// The mesh is topology-agnostic: every pair gets a tunnel whether or not
/// any original link crosses that pair.
pub fn plan_pairs(targets: &[ComputeTarget]) -> Vec<TunnelLink> {
    let mut ids: Vec<&str> = targets.iter().map(|t| t.id.as_str()).collect();
    ids.sort_unstable();
    ids.dedup();

    let mut pairs = Vec::new();
    for i in 0..ids.len() {
        for j in (i + 1)..ids.len() {
            pairs.push(TunnelLink { index: pairs.len() + 1, left: ids[i].to_string(), right: ids[j].to_string() });
        }
    }

    if pairs.len() > 254 {
        log::warn!("{} tunnel pairs exceed the 192.168.0.0/16 numbering space", pairs.len());
    }
    pairs
}

/// Builds the full tunnel mesh between all participating targets.
pub struct MeshBuilder {
    runner: Arc<dyn CommandRunner>,
}

struct TunnelSide<'a> {
    local: &'a ComputeTarget,
    peer: &'a ComputeTarget,
    address: String,
}

impl MeshBuilder {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        MeshBuilder { runner }
    }

    /// Establishes a GRE tunnel per planned pair. Best-effort: a failed
    /// side is logged and the remaining pairs still run. Returns `false`
    /// iff any side failed.
    pub async fn connect(&self, targets: &[ComputeTarget]) -> bool {
        let pairs = plan_pairs(targets);
        if pairs.is_empty() {
            return true;
        }

        let mut sides = Vec::new();
        for pair in &pairs {
            let left = targets.iter().find(|t| t.id == pair.left);
            let right = targets.iter().find(|t| t.id == pair.right);
            let (Some(left), Some(right)) = (left, right) else { continue };

            if left.private_address.is_none() || right.private_address.is_none() {
                log::warn!("Skipping tunnel {} <-> {}: missing private address", pair.left, pair.right);
                continue;
            }

            sides.push(TunnelSide { local: left, peer: right, address: pair.left_address() });
            sides.push(TunnelSide { local: right, peer: left, address: pair.right_address() });
        }

        let results = join_all(sides.iter().map(|side| self.setup_side(side))).await;
        let failed = results.iter().filter(|ok| !**ok).count();
        if failed > 0 {
            log::warn!("Tunnel mesh established with {} failed side(s) out of {}", failed, results.len());
        } else {
            log::info!("Tunnel mesh established across {} target pair(s)", pairs.len());
        }
        failed == 0
    }

    async fn setup_side(&self, side: &TunnelSide<'_>) -> bool {
        let Some(address) = side.local.address.as_deref() else {
            log::warn!("Target {} has no reachable address for tunnel setup", side.local.id);
            return false;
        };
        // Presence checked in connect().
        let Some(local_private) = side.local.private_address.as_deref() else { return false };
        let Some(peer_private) = side.peer.private_address.as_deref() else { return false };

        let interface = format!("gre-{}", side.peer.suffix());
        let command = format!(
            "sudo ip tunnel add {iface} mode gre remote {remote} local {local} && sudo ip link set {iface} up && sudo ip addr add {addr} dev {iface}",
            iface = interface,
            remote = peer_private,
            local = local_private,
            addr = side.address,
        );

        match self.runner.run(address, &command).await {
            Ok(outcome) if outcome.success() => true,
            Ok(outcome) => {
                log::error!("Tunnel setup on {} towards {} exited with {}: {}", side.local.id, side.peer.id, outcome.exit_code, outcome.stderr.trim());
                false
            }
            Err(e) => {
                log::error!("Tunnel setup on {} towards {} failed: {}", side.local.id, side.peer.id, e);
                false
            }
        }
    }
}
