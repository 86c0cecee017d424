//! Prometheus metrics
//!
//! Thin typed wrappers over the `metrics` facade. Without an installed
//! recorder every call is a no-op, which is what tests run against.

use ::metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Latency metric types
#[derive(Debug, Clone, Copy)]
pub enum LatencyMetric {
    /// REST order book poll
    BookPoll,
    /// Full snapshot fetch (cache or poll)
    Snapshot,
    /// Order submission round trip
    OrderSubmission,
}

/// Counter metric types
#[derive(Debug, Clone, Copy)]
pub enum CounterMetric {
    /// Books written from the push feed
    StreamBookUpdates,
    /// Books written from polls
    PollBookUpdates,
    /// Poll writes rejected by the cache-safety rule
    PollWritesRejected,
    /// Snapshots served from the market data store
    SnapshotsFromCache,
    /// Snapshots served from a direct poll
    SnapshotsFromPoll,
    /// Placeholder snapshots after a failed poll
    SnapshotsPlaceholder,
    /// Snapshot drift detected right before execution
    SnapshotIntegrityViolations,
    /// Sell orders confirmed
    SellsFilled,
    /// Sell attempts rejected or failed
    SellsFailed,
    /// Sell attempts refused by the latency gate
    TradingBlocked,
    /// Scavenger mode transitions
    ScavengerModeChanges,
    /// Scanner candidates emitted
    ScannerCandidates,
}

/// Gauge metric types
#[derive(Debug, Clone, Copy)]
pub enum GaugeMetric {
    /// Tokens held by the market data store
    CacheEntries,
    /// Hit ratio of the market data store
    CacheHitRatio,
    /// LRU evictions in the market data store
    CacheEvictions,
    /// TTL expirations in the market data store
    CacheExpirations,
    /// 1 when the push feed is connected
    FeedConnected,
    /// 1 while in scavenger mode
    ScavengerMode,
    /// Capital deployed by scavenger entries
    ScavengerDeployedUsd,
    /// Open scavenger positions
    ScavengerPositions,
}

impl LatencyMetric {
    fn name(self) -> &'static str {
        match self {
            LatencyMetric::BookPoll => "polyexec_book_poll_latency_ms",
            LatencyMetric::Snapshot => "polyexec_snapshot_latency_ms",
            LatencyMetric::OrderSubmission => "polyexec_order_submission_latency_ms",
        }
    }
}

impl CounterMetric {
    fn name(self) -> &'static str {
        match self {
            CounterMetric::StreamBookUpdates => "polyexec_stream_book_updates_total",
            CounterMetric::PollBookUpdates => "polyexec_poll_book_updates_total",
            CounterMetric::PollWritesRejected => "polyexec_poll_writes_rejected_total",
            CounterMetric::SnapshotsFromCache => "polyexec_snapshots_cache_total",
            CounterMetric::SnapshotsFromPoll => "polyexec_snapshots_poll_total",
            CounterMetric::SnapshotsPlaceholder => "polyexec_snapshots_placeholder_total",
            CounterMetric::SnapshotIntegrityViolations => {
                "polyexec_snapshot_integrity_violations_total"
            }
            CounterMetric::SellsFilled => "polyexec_sells_filled_total",
            CounterMetric::SellsFailed => "polyexec_sells_failed_total",
            CounterMetric::TradingBlocked => "polyexec_trading_blocked_total",
            CounterMetric::ScavengerModeChanges => "polyexec_scavenger_mode_changes_total",
            CounterMetric::ScannerCandidates => "polyexec_scanner_candidates_total",
        }
    }
}

impl GaugeMetric {
    fn name(self) -> &'static str {
        match self {
            GaugeMetric::CacheEntries => "polyexec_market_data_entries",
            GaugeMetric::CacheHitRatio => "polyexec_market_data_hit_ratio",
            GaugeMetric::CacheEvictions => "polyexec_market_data_evictions",
            GaugeMetric::CacheExpirations => "polyexec_market_data_expirations",
            GaugeMetric::FeedConnected => "polyexec_feed_connected",
            GaugeMetric::ScavengerMode => "polyexec_scavenger_mode",
            GaugeMetric::ScavengerDeployedUsd => "polyexec_scavenger_deployed_usd",
            GaugeMetric::ScavengerPositions => "polyexec_scavenger_positions",
        }
    }
}

/// Record a latency measurement
pub fn record_latency(metric: LatencyMetric, duration: Duration) {
    histogram!(metric.name()).record(duration.as_secs_f64() * 1000.0);
}

/// Increment a counter by one
pub fn increment_counter(metric: CounterMetric) {
    counter!(metric.name()).increment(1);
}

/// Set a gauge value
pub fn set_gauge(metric: GaugeMetric, value: f64) {
    gauge!(metric.name()).set(value);
}

/// Record one endpoint probe, labelled by endpoint name
pub fn record_endpoint_probe(endpoint: &str, latency_ms: f64, success: bool) {
    histogram!("polyexec_endpoint_latency_ms", "endpoint" => endpoint.to_string())
        .record(latency_ms);
    if !success {
        counter!("polyexec_endpoint_failures_total", "endpoint" => endpoint.to_string())
            .increment(1);
    }
}
