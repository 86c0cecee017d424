//! Health command implementation

use crate::config::{Config, EndpointsConfig};
use crate::latency::{EndpointProbe, HttpProbe, LatencyMonitor};
use clap::Args;
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct HealthArgs {
    /// Probe rounds before reporting
    #[arg(short, long, default_value_t = 1)]
    pub rounds: u32,
}

impl HealthArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let probes = build_probes(&config.endpoints)?;
        let monitor = LatencyMonitor::new(config.latency.clone());

        for _ in 0..self.rounds.max(1) {
            monitor.probe_all(&probes).await;
        }

        let report = monitor.report().await;
        println!("{}", serde_json::to_string_pretty(&report)?);
        Ok(())
    }
}

/// One HTTP probe per configured target, sharing a client
pub(crate) fn build_probes(
    endpoints: &EndpointsConfig,
) -> anyhow::Result<Vec<Arc<dyn EndpointProbe>>> {
    let client = reqwest::Client::builder()
        .timeout(endpoints.request_timeout())
        .build()?;
    Ok(endpoints
        .probes
        .iter()
        .map(|target| Arc::new(HttpProbe::new(target, client.clone())) as Arc<dyn EndpointProbe>)
        .collect())
}
