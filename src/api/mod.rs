pub mod deployment_dto;
pub mod fleet_dto;
pub mod topology_dto;
