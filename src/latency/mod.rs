//! Endpoint latency and error-rate monitoring
//!
//! Keeps a bounded sample history per endpoint, derives percentile stats on
//! demand, and produces the hard trading block the execution path consults.

mod monitor;
mod probe;

pub use monitor::LatencyMonitor;
pub use probe::{spawn_probe_loop, EndpointProbe, HttpProbe};

use crate::config::LatencyConfig;
use serde::Serialize;
use std::fmt;

/// One probe or request outcome
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LatencySample {
    pub latency_ms: f64,
    pub success: bool,
}

/// Derived statistics for one endpoint
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencyStats {
    pub endpoint: String,
    pub samples: usize,
    pub avg_ms: f64,
    pub min_ms: f64,
    pub max_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    /// Fraction of successful samples
    pub success_rate: f64,
}

/// Overall endpoint health
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Critical,
}

impl fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            HealthStatus::Healthy => "healthy",
            HealthStatus::Degraded => "degraded",
            HealthStatus::Critical => "critical",
        };
        f.write_str(s)
    }
}

/// Full health report
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LatencyReport {
    pub status: HealthStatus,
    pub trading_safe: bool,
    pub block_reason: Option<String>,
    pub recommended_slippage_pct: f64,
    pub endpoints: Vec<LatencyStats>,
}

/// Nearest-rank percentile over sorted values
fn percentile(sorted: &[f64], pct: f64) -> f64 {
    if sorted.is_empty() {
        return 0.0;
    }
    let rank = ((pct / 100.0) * sorted.len() as f64).ceil() as usize;
    sorted[rank.clamp(1, sorted.len()) - 1]
}

/// Stats over every sample, failures included
pub fn compute_stats<'a>(
    endpoint: &str,
    samples: impl IntoIterator<Item = &'a LatencySample>,
) -> Option<LatencyStats> {
    let samples: Vec<&LatencySample> = samples.into_iter().collect();
    if samples.is_empty() {
        return None;
    }

    let mut latencies: Vec<f64> = samples.iter().map(|s| s.latency_ms).collect();
    latencies.sort_by(|a, b| a.total_cmp(b));

    let n = latencies.len();
    let successes = samples.iter().filter(|s| s.success).count();

    Some(LatencyStats {
        endpoint: endpoint.to_string(),
        samples: n,
        avg_ms: latencies.iter().sum::<f64>() / n as f64,
        min_ms: latencies[0],
        max_ms: latencies[n - 1],
        p50_ms: percentile(&latencies, 50.0),
        p95_ms: percentile(&latencies, 95.0),
        p99_ms: percentile(&latencies, 99.0),
        success_rate: successes as f64 / n as f64,
    })
}

/// Classify endpoint health
///
/// Critical is sticky within one pass: a later degraded endpoint never
/// lowers it.
pub fn classify_health(stats: &[LatencyStats], config: &LatencyConfig) -> HealthStatus {
    let mut status = HealthStatus::Healthy;
    for s in stats {
        if s.p95_ms > config.critical_p95_ms {
            status = HealthStatus::Critical;
        } else if (s.p95_ms > config.degraded_p95_ms
            || s.success_rate < config.degraded_success_rate)
            && status != HealthStatus::Critical
        {
            status = HealthStatus::Degraded;
        }
    }
    status
}

/// Reason trading must be blocked, if any
pub fn trading_block_reason(stats: &[LatencyStats], config: &LatencyConfig) -> Option<String> {
    if stats.is_empty() {
        return Some("no latency measurements yet".to_string());
    }

    let max_p95 = stats.iter().map(|s| s.p95_ms).fold(f64::MIN, f64::max);
    if max_p95 > config.block_p95_ms {
        return Some(format!(
            "p95 latency {:.0}ms above {:.0}ms",
            max_p95, config.block_p95_ms
        ));
    }

    let min_success = stats.iter().map(|s| s.success_rate).fold(f64::MAX, f64::min);
    if min_success < config.block_success_rate {
        return Some(format!(
            "success rate {:.0}% below {:.0}%",
            min_success * 100.0,
            config.block_success_rate * 100.0
        ));
    }

    None
}

/// Slippage to use at the observed latency
///
/// Linear from the base value at `slippage_floor_ms` to the max value at the
/// critical threshold, clamped at both ends.
pub fn recommended_slippage(latency_ms: f64, config: &LatencyConfig) -> f64 {
    let span = config.critical_p95_ms - config.slippage_floor_ms;
    if span <= 0.0 {
        return config.max_slippage_pct;
    }
    let t = ((latency_ms - config.slippage_floor_ms) / span).clamp(0.0, 1.0);
    config.base_slippage_pct + t * (config.max_slippage_pct - config.base_slippage_pct)
}
