//! Periodic endpoint probing

use super::{HealthStatus, LatencyMonitor};
use crate::config::ProbeTarget;
use crate::telemetry::record_endpoint_probe;
use async_trait::async_trait;
use futures_util::future::join_all;
use reqwest::Client;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;

/// A monitored endpoint
#[async_trait]
pub trait EndpointProbe: Send + Sync {
    fn name(&self) -> &str;
    /// One round trip; `Err` carries the failure reason
    async fn probe(&self) -> Result<(), String>;
}

/// Probe that issues a GET and expects a 2xx
pub struct HttpProbe {
    name: String,
    url: String,
    client: Client,
}

impl HttpProbe {
    pub fn new(target: &ProbeTarget, client: Client) -> Self {
        Self {
            name: target.name.clone(),
            url: target.url.clone(),
            client,
        }
    }
}

#[async_trait]
impl EndpointProbe for HttpProbe {
    fn name(&self) -> &str {
        &self.name
    }

    async fn probe(&self) -> Result<(), String> {
        let response = self
            .client
            .get(&self.url)
            .send()
            .await
            .map_err(|e| e.to_string())?;
        if response.status().is_success() {
            Ok(())
        } else {
            Err(format!("HTTP {}", response.status()))
        }
    }
}

impl LatencyMonitor {
    /// Probe every endpoint once, concurrently
    ///
    /// Each probe is bounded by the configured timeout; a timeout is recorded
    /// as a failure at the timeout's duration.
    pub async fn probe_all(&self, probes: &[Arc<dyn EndpointProbe>]) {
        let timeout = self.config().probe_timeout();

        let outcomes = join_all(probes.iter().map(|probe| async move {
            let started = Instant::now();
            let result = match tokio::time::timeout(timeout, probe.probe()).await {
                Ok(result) => result,
                Err(_) => Err("timed out".to_string()),
            };
            (probe.name().to_string(), started.elapsed(), result)
        }))
        .await;

        for (name, elapsed, result) in outcomes {
            let latency_ms = elapsed.as_secs_f64() * 1000.0;
            if let Err(e) = &result {
                tracing::warn!(endpoint = %name, latency_ms, error = %e, "Endpoint probe failed");
            }
            record_endpoint_probe(&name, latency_ms, result.is_ok());
            self.record(&name, latency_ms, result.is_ok()).await;
        }
    }
}

/// Probe on a fixed interval for the life of the process
pub fn spawn_probe_loop(
    monitor: LatencyMonitor,
    probes: Vec<Arc<dyn EndpointProbe>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(monitor.config().probe_interval());
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        let mut last_status = HealthStatus::Healthy;

        loop {
            interval.tick().await;
            monitor.probe_all(&probes).await;

            let report = monitor.report().await;
            if report.status != last_status {
                tracing::warn!(
                    from = %last_status,
                    to = %report.status,
                    trading_safe = report.trading_safe,
                    "Endpoint health changed"
                );
                last_status = report.status;
            }
            if let Some(reason) = &report.block_reason {
                tracing::warn!(reason = %reason, "Trading blocked by latency monitor");
            }
        }
    })
}
