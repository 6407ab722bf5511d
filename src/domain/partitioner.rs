use crate::domain::topology::NetworkTopology;

/// Default number of nodes per partition.
pub const DEFAULT_CHUNK_SIZE: usize = 5;

/// Splits the topology's nodes into contiguous chunks of at most
/// `chunk_size`, in topology node order.
///
/// Topologies with at most `chunk_size` nodes bypass chunking and come back
/// as a single chunk. An empty topology yields no chunks.
pub fn chunk_nodes(topology: &NetworkTopology, chunk_size: usize) -> Vec<Vec<String>> {
    let names = topology.node_names();
    if names.is_empty() {
        return Vec::new();
    }
    if names.len() <= chunk_size {
        return vec![names];
    }

    names.chunks(chunk_size).map(|chunk| chunk.to_vec()).collect()
}

/// Derives the partial topology actually deployed onto one target.
///
/// Keeps only the assigned nodes' configs and the links whose first two
/// endpoints both resolve to assigned nodes. Links that cross partition
/// boundaries are dropped here; cross-target traffic rides the tunnel mesh
/// instead.
pub fn derive_partial(topology: &NetworkTopology, assigned: &[String], target_suffix: &str) -> NetworkTopology {
    let nodes = topology
        .nodes
        .iter()
        .filter(|(name, _)| assigned.iter().any(|a| a == name))
        .map(|(name, config)| (name.clone(), config.clone()))
        .collect();

    let links = topology
        .links
        .iter()
        .filter(|link| match link.first_endpoint_nodes() {
            Some((a, b)) => assigned.iter().any(|n| n == a) && assigned.iter().any(|n| n == b),
            None => false,
        })
        .cloned()
        .collect();

    NetworkTopology { name: format!("{}-{}", topology.name, target_suffix), mgmt: topology.mgmt.clone(), nodes, links }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    use serde_json::json;

    use crate::domain::topology::{Link, NodeConfig};

    fn topology_with_nodes(count: usize) -> NetworkTopology {
        let nodes = (0..count).map(|i| (format!("n{i}"), NodeConfig { kind: Some("linux".to_string()), raw: json!({"kind": "linux"}) })).collect();
        NetworkTopology { name: "lab".to_string(), mgmt: None, nodes, links: Vec::new() }
    }

    fn link(a: &str, b: &str) -> Link {
        Link { endpoints: vec![format!("{a}:eth1"), format!("{b}:eth1")], extra: serde_json::Map::new() }
    }

    #[test]
    fn test_chunking_produces_ceil_n_over_k_disjoint_chunks() {
        let topology = topology_with_nodes(12);
        let chunks = chunk_nodes(&topology, 5);

        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks.iter().map(Vec::len).collect::<Vec<_>>(), vec![5, 5, 2]);

        let mut seen = HashSet::new();
        for chunk in &chunks {
            for node in chunk {
                assert!(seen.insert(node.clone()), "node {node} appears in two chunks");
            }
        }
        assert_eq!(seen.len(), 12);
    }

    #[test]
    fn test_small_topology_is_one_chunk() {
        let topology = topology_with_nodes(5);
        let chunks = chunk_nodes(&topology, 5);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].len(), 5);
    }

    #[test]
    fn test_empty_topology_yields_no_chunks() {
        let topology = topology_with_nodes(0);
        assert!(chunk_nodes(&topology, 5).is_empty());
    }

    #[test]
    fn test_partial_keeps_internal_links_and_drops_crossing_ones() {
        let mut topology = topology_with_nodes(12);
        topology.links = vec![link("n0", "n4"), link("n4", "n5")];

        let chunks = chunk_nodes(&topology, 5);
        let first = derive_partial(&topology, &chunks[0], "aaaa1111");
        let second = derive_partial(&topology, &chunks[1], "bbbb2222");

        // n0 and n4 are both in the first chunk; the link stays there.
        assert_eq!(first.links.len(), 1);
        assert_eq!(first.links[0].first_endpoint_nodes(), Some(("n0", "n4")));

        // n4 (chunk 1) -- n5 (chunk 2) is dropped from every partial.
        assert!(second.links.is_empty());
        assert_eq!(first.name, "lab-aaaa1111");
        assert_eq!(second.nodes.len(), 5);
    }

    #[test]
    fn test_partial_drops_degenerate_links() {
        let mut topology = topology_with_nodes(3);
        topology.links = vec![Link { endpoints: vec!["n0:eth1".to_string()], extra: serde_json::Map::new() }];

        let all: Vec<String> = topology.node_names();
        let partial = derive_partial(&topology, &all, "cafe0001");
        assert!(partial.links.is_empty());
    }

    #[test]
    fn test_partial_ignores_unknown_assigned_nodes() {
        let topology = topology_with_nodes(3);
        let assigned = vec!["n1".to_string(), "ghost".to_string()];
        let partial = derive_partial(&topology, &assigned, "cafe0001");
        assert_eq!(partial.nodes.len(), 1);
        assert_eq!(partial.nodes[0].0, "n1");
    }
}
