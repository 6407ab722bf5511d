use std::path::Path;

use crate::api::topology_dto::TopologyDto;
use crate::domain::topology::NetworkTopology;
use crate::error::Result;
use crate::loader::parser::parse_json_file;

pub mod api;
pub mod domain;
pub mod error;
pub mod loader;
pub mod logger;

/// Loads a topology document from disk and builds the domain model.
pub fn load_topology(file_path: impl AsRef<Path>) -> Result<NetworkTopology> {
    let dto: TopologyDto = parse_json_file(file_path)?;
    log::info!("Topology document parsed successfully.");

    let topology = NetworkTopology::from_dto(dto);
    log::info!("Topology '{}' loaded with {} node(s) and {} link(s).", topology.name, topology.node_count(), topology.links.len());

    Ok(topology)
}
