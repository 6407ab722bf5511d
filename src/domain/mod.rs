pub mod mesh;
pub mod orchestrator;
pub mod partitioner;
pub mod remote;
pub mod resources;
pub mod selector;
pub mod target;
pub mod topology;
