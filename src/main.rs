use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;

use netlab_distributor::api::deployment_dto::DeploymentRecordDto;
use netlab_distributor::domain::mesh::MeshBuilder;
use netlab_distributor::domain::orchestrator::DeploymentOrchestrator;
use netlab_distributor::domain::partitioner::DEFAULT_CHUNK_SIZE;
use netlab_distributor::domain::remote::deployer::SshDeployer;
use netlab_distributor::domain::remote::exec::SshRunner;
use netlab_distributor::domain::remote::provisioner::StaticFleetProvisioner;
use netlab_distributor::domain::remote::telemetry::SshTelemetryCollector;
use netlab_distributor::{load_topology, logger};

/// Distributes a network-emulation topology across a fleet of remote hosts.
#[derive(Debug, Parser)]
#[command(name = "netlab-distributor")]
struct Cli {
    /// Topology document (JSON).
    topology: PathBuf,

    /// Static fleet description (JSON).
    #[arg(long)]
    fleet: PathBuf,

    /// Maximum number of nodes per partition.
    #[arg(long, default_value_t = DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// SSH private key used to reach the targets.
    #[arg(long, default_value = "~/.ssh/id_rsa")]
    ssh_key: String,

    /// SSH username on the targets.
    #[arg(long, default_value = "ubuntu")]
    ssh_user: String,
}

fn expand_home(path: &str) -> PathBuf {
    match (path.strip_prefix("~/"), std::env::var_os("HOME")) {
        (Some(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => PathBuf::from(path),
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    logger::init();
    let cli = Cli::parse();

    let topology = load_topology(&cli.topology).with_context(|| format!("loading topology from {}", cli.topology.display()))?;
    let provisioner = StaticFleetProvisioner::from_file(&cli.fleet).with_context(|| format!("loading fleet from {}", cli.fleet.display()))?;

    let runner = Arc::new(SshRunner::new(expand_home(&cli.ssh_key), cli.ssh_user));
    let deployer = Arc::new(SshDeployer::new(runner.clone()));
    let telemetry = Arc::new(SshTelemetryCollector::new(runner.clone()));
    let mesh = MeshBuilder::new(runner);

    let orchestrator = DeploymentOrchestrator::new(Arc::new(provisioner), deployer, telemetry, mesh, cli.chunk_size);

    let record = orchestrator.deploy(&topology).await?;
    let dto = DeploymentRecordDto::from(&record);
    println!("{}", serde_json::to_string_pretty(&dto)?);

    Ok(())
}
