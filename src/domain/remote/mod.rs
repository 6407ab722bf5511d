pub mod deployer;
pub mod exec;
pub mod mock;
pub mod provisioner;
pub mod telemetry;
