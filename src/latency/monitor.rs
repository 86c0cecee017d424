//! Shared latency monitor handle

use super::{
    classify_health, compute_stats, recommended_slippage, trading_block_reason, HealthStatus,
    LatencyReport, LatencySample, LatencyStats,
};
use crate::config::LatencyConfig;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::RwLock;

/// Rolling per-endpoint latency history
#[derive(Clone)]
pub struct LatencyMonitor {
    histories: Arc<RwLock<HashMap<String, VecDeque<LatencySample>>>>,
    config: LatencyConfig,
}

impl LatencyMonitor {
    pub fn new(config: LatencyConfig) -> Self {
        Self {
            histories: Arc::new(RwLock::new(HashMap::new())),
            config,
        }
    }

    pub fn config(&self) -> &LatencyConfig {
        &self.config
    }

    /// Record one outcome, dropping the oldest sample past `history_size`
    pub async fn record(&self, endpoint: &str, latency_ms: f64, success: bool) {
        let capacity = self.config.history_size.max(1);
        let mut histories = self.histories.write().await;
        let history = histories
            .entry(endpoint.to_string())
            .or_insert_with(|| VecDeque::with_capacity(capacity));
        while history.len() >= capacity {
            history.pop_front();
        }
        history.push_back(LatencySample {
            latency_ms,
            success,
        });
    }

    pub async fn stats(&self, endpoint: &str) -> Option<LatencyStats> {
        let histories = self.histories.read().await;
        histories
            .get(endpoint)
            .and_then(|history| compute_stats(endpoint, history))
    }

    /// Stats for every endpoint with samples, sorted by name
    pub async fn all_stats(&self) -> Vec<LatencyStats> {
        let histories = self.histories.read().await;
        let mut stats: Vec<LatencyStats> = histories
            .iter()
            .filter_map(|(endpoint, history)| compute_stats(endpoint, history))
            .collect();
        stats.sort_by(|a, b| a.endpoint.cmp(&b.endpoint));
        stats
    }

    pub async fn health(&self) -> HealthStatus {
        classify_health(&self.all_stats().await, &self.config)
    }

    /// Hard trading gate
    ///
    /// False with no measurements, excessive p95 latency, or a low success
    /// rate on any endpoint.
    pub async fn is_trading_safe(&self) -> bool {
        self.block_reason().await.is_none()
    }

    pub async fn block_reason(&self) -> Option<String> {
        trading_block_reason(&self.all_stats().await, &self.config)
    }

    /// Slippage for the worst observed p95 latency
    pub async fn recommended_slippage_pct(&self) -> f64 {
        let stats = self.all_stats().await;
        match stats.iter().map(|s| s.p95_ms).reduce(f64::max) {
            Some(worst) => recommended_slippage(worst, &self.config),
            None => self.config.max_slippage_pct,
        }
    }

    pub async fn report(&self) -> LatencyReport {
        let endpoints = self.all_stats().await;
        let block_reason = trading_block_reason(&endpoints, &self.config);
        let worst = endpoints.iter().map(|s| s.p95_ms).reduce(f64::max);

        LatencyReport {
            status: classify_health(&endpoints, &self.config),
            trading_safe: block_reason.is_none(),
            block_reason,
            recommended_slippage_pct: worst
                .map(|p95| recommended_slippage(p95, &self.config))
                .unwrap_or(self.config.max_slippage_pct),
            endpoints,
        }
    }

    pub async fn reset(&self) {
        self.histories.write().await.clear();
    }
}
