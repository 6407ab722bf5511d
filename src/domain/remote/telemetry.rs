use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::remote::exec::CommandRunner;
use crate::domain::resources::ResourceUsage;
use crate::domain::target::ComputeTarget;
use crate::error::{Error, Result};

/// Read-only usage probe, consumed by Policy A to compute spare capacity.
#[async_trait]
pub trait TelemetryCollector: Send + Sync {
    async fn usage(&self, target: &ComputeTarget) -> Result<ResourceUsage>;
}

/// Collects usage over a [`CommandRunner`] with plain coreutils probes.
pub struct SshTelemetryCollector {
    runner: Arc<dyn CommandRunner>,
}

const CPU_PROBE: &str = "top -bn1 | grep 'Cpu(s)' | awk '{print $2}' | sed 's/%us,//'";
const MEMORY_PROBE: &str = "free -g | awk 'NR==2{printf \"%.2f\", $3}'";
const STORAGE_PROBE: &str = "df -BG / | awk 'NR==2{print $3}' | sed 's/G//'";
const PROCESS_PROBE: &str = "ps aux | wc -l";

impl SshTelemetryCollector {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        SshTelemetryCollector { runner }
    }

    async fn probe(&self, address: &str, command: &str) -> Result<String> {
        let outcome = self.runner.run(address, command).await?;
        Ok(outcome.stdout_trimmed().to_string())
    }
}

/// Parses a `top` user-cpu percentage into a fraction of one core.
/// Empty or garbled output counts as zero usage.
pub(crate) fn parse_cpu_fraction(raw: &str) -> f64 {
    raw.trim().parse::<f64>().unwrap_or(0.0) / 100.0
}

pub(crate) fn parse_gb(raw: &str) -> f64 {
    raw.trim().parse::<f64>().unwrap_or(0.0)
}

pub(crate) fn parse_count(raw: &str) -> u32 {
    raw.trim().parse::<u32>().unwrap_or(0)
}

#[async_trait]
impl TelemetryCollector for SshTelemetryCollector {
    async fn usage(&self, target: &ComputeTarget) -> Result<ResourceUsage> {
        let address = target
            .address
            .as_deref()
            .ok_or_else(|| Error::RemoteExecError { target: target.id.clone(), message: "target has no reachable address".to_string() })?;

        let cpu = self.probe(address, CPU_PROBE).await?;
        let memory = self.probe(address, MEMORY_PROBE).await?;
        let storage = self.probe(address, STORAGE_PROBE).await?;
        let processes = self.probe(address, PROCESS_PROBE).await?;

        Ok(ResourceUsage {
            cpu_used: parse_cpu_fraction(&cpu),
            memory_used_gb: parse_gb(&memory),
            storage_used_gb: parse_gb(&storage),
            process_count: parse_count(&processes),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_cpu_fraction() {
        assert!((parse_cpu_fraction("12.5\n") - 0.125).abs() < 1e-9);
        assert_eq!(parse_cpu_fraction(""), 0.0);
        assert_eq!(parse_cpu_fraction("garbage"), 0.0);
    }

    #[test]
    fn test_parse_gb_and_count() {
        assert!((parse_gb("3.25") - 3.25).abs() < 1e-9);
        assert_eq!(parse_gb("\n"), 0.0);
        assert_eq!(parse_count("142\n"), 142);
        assert_eq!(parse_count("NaN"), 0);
    }
}
