use serde_json::{Map, Value};

use crate::api::topology_dto::{LinkDto, TopologyBodyDto, TopologyDto};

/// A declarative network-emulation topology: named nodes plus the virtual
/// links between their interfaces.
///
/// Node order is preserved from the source document. Chunked partitioning
/// walks nodes in this order, so two loads of the same document always
/// produce the same partitions.
#[derive(Debug, Clone)]
pub struct NetworkTopology {
    pub name: String,
    pub mgmt: Option<Value>,
    pub nodes: Vec<(String, NodeConfig)>,
    pub links: Vec<Link>,
}

/// Configuration of a single emulated node. Only the `kind` tag is
/// interpreted locally; everything else is carried verbatim for the remote
/// deployer.
#[derive(Debug, Clone)]
pub struct NodeConfig {
    pub kind: Option<String>,
    pub raw: Value,
}

/// A link between ≥2 endpoints in `"node:interface"` form.
#[derive(Debug, Clone)]
pub struct Link {
    pub endpoints: Vec<String>,
    pub extra: Map<String, Value>,
}

/// Extracts the node name from a `"node:interface"` endpoint string.
pub fn endpoint_node(endpoint: &str) -> &str {
    endpoint.split(':').next().unwrap_or(endpoint)
}

impl Link {
    /// Node names parsed from the first two endpoints, if the link has them.
    pub fn first_endpoint_nodes(&self) -> Option<(&str, &str)> {
        if self.endpoints.len() < 2 {
            return None;
        }
        Some((endpoint_node(&self.endpoints[0]), endpoint_node(&self.endpoints[1])))
    }
}

impl NetworkTopology {
    pub fn from_dto(dto: TopologyDto) -> Self {
        let nodes = dto
            .topology
            .nodes
            .into_iter()
            .map(|(name, raw)| {
                let kind = raw.get("kind").and_then(Value::as_str).map(str::to_string);
                (name, NodeConfig { kind, raw })
            })
            .collect();

        let links = dto.topology.links.into_iter().map(|l| Link { endpoints: l.endpoints, extra: l.extra }).collect();

        NetworkTopology { name: dto.name, mgmt: dto.mgmt, nodes, links }
    }

    pub fn to_dto(&self) -> TopologyDto {
        let mut nodes = Map::new();
        for (name, config) in &self.nodes {
            nodes.insert(name.clone(), config.raw.clone());
        }

        let links = self.links.iter().map(|l| LinkDto { endpoints: l.endpoints.clone(), extra: l.extra.clone() }).collect();

        TopologyDto { name: self.name.clone(), mgmt: self.mgmt.clone(), topology: TopologyBodyDto { nodes, links } }
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn node_names(&self) -> Vec<String> {
        self.nodes.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn node_config(&self, name: &str) -> Option<&NodeConfig> {
        self.nodes.iter().find(|(n, _)| n == name).map(|(_, c)| c)
    }
}
