//! Configuration types for poly-exec
//!
//! Every section is optional in the TOML file; missing keys fall back to the
//! defaults below. Percentages are in percent units (2 = 2%) unless the field
//! name says `rate`, which is a fraction (0.9 = 90%).

use crate::execution::OrderType;
use crate::telemetry::LogFormat;
use chrono::Duration;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Root configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub endpoints: EndpointsConfig,
    #[serde(default)]
    pub account: AccountConfig,
    #[serde(default)]
    pub market_data: MarketDataConfig,
    #[serde(default)]
    pub snapshot: SnapshotConfig,
    #[serde(default)]
    pub sell: SellConfig,
    #[serde(default)]
    pub latency: LatencyConfig,
    #[serde(default)]
    pub scavenger: ScavengerConfig,
    #[serde(default)]
    pub scanner: ScannerConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Longest window, cooldown or stale bound accepted from a config file
pub const MAX_WINDOW_SECS: u64 = 365 * 24 * 60 * 60;

impl Config {
    /// Load configuration from a TOML file
    pub fn load(path: impl AsRef<std::path::Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Reject windows too long to add to a timestamp
    pub fn validate(&self) -> anyhow::Result<()> {
        let windows = [
            ("market_data.ttl_secs", self.market_data.ttl_secs),
            ("market_data.stale_ms", self.market_data.stale_ms / 1_000),
            ("scavenger.detection_window_secs", self.scavenger.detection_window_secs),
            ("scavenger.stagnation_secs", self.scavenger.stagnation_secs),
            ("scavenger.sustained_low_secs", self.scavenger.sustained_low_secs),
            ("scavenger.sustained_recovery_secs", self.scavenger.sustained_recovery_secs),
            ("scavenger.stall_window_secs", self.scavenger.stall_window_secs),
            ("scavenger.cooldown_secs", self.scavenger.cooldown_secs),
            ("scanner.movement_window_secs", self.scanner.movement_window_secs),
            ("scanner.leaderboard_window_secs", self.scanner.leaderboard_window_secs),
            ("scanner.dedup_secs", self.scanner.dedup_secs),
        ];
        for (key, secs) in windows {
            if secs > MAX_WINDOW_SECS {
                anyhow::bail!("{key} exceeds the {MAX_WINDOW_SECS}s limit");
            }
        }
        Ok(())
    }
}

/// Whole seconds as a window, clamped to [`MAX_WINDOW_SECS`]
fn window_secs(secs: u64) -> Duration {
    Duration::try_seconds(secs.min(MAX_WINDOW_SECS) as i64).unwrap_or_else(Duration::zero)
}

fn window_millis(ms: u64) -> Duration {
    Duration::try_milliseconds(ms.min(MAX_WINDOW_SECS * 1_000) as i64)
        .unwrap_or_else(Duration::zero)
}

/// Exchange endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EndpointsConfig {
    /// CLOB REST base URL
    pub clob_url: String,
    /// Data API base URL (positions)
    pub data_api_url: String,
    /// Market channel WebSocket URL
    pub ws_url: String,
    /// Per-request timeout for REST calls
    pub request_timeout_ms: u64,
    /// Endpoints probed by the latency monitor
    pub probes: Vec<ProbeTarget>,
}

/// A named URL probed by the latency monitor
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeTarget {
    pub name: String,
    pub url: String,
}

impl Default for EndpointsConfig {
    fn default() -> Self {
        Self {
            clob_url: "https://clob.polymarket.com".to_string(),
            data_api_url: "https://data-api.polymarket.com".to_string(),
            ws_url: crate::orderbook::POLYMARKET_WS_URL.to_string(),
            request_timeout_ms: 5_000,
            probes: vec![
                ProbeTarget {
                    name: "clob".to_string(),
                    url: "https://clob.polymarket.com/time".to_string(),
                },
                ProbeTarget {
                    name: "data-api".to_string(),
                    url: "https://data-api.polymarket.com/".to_string(),
                },
            ],
        }
    }
}

impl EndpointsConfig {
    pub fn request_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.request_timeout_ms)
    }
}

/// Trading account
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AccountConfig {
    /// Proxy wallet address whose positions are managed
    pub address: Option<String>,
    /// Counterpart wallets whose trades feed the active-target signal and
    /// the scanner's leaderboard reason
    pub watched_wallets: Vec<String>,
}

/// Market data store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarketDataConfig {
    /// Maximum number of tokens held
    pub capacity: usize,
    /// Entries older than this are dropped on read
    pub ttl_secs: u64,
    /// Entries older than this are not trusted for execution
    pub stale_ms: u64,
    /// Window (in cents from best) used for the depth figure
    pub depth_window_cents: Decimal,
}

impl Default for MarketDataConfig {
    fn default() -> Self {
        Self {
            capacity: 500,
            ttl_secs: 300,
            stale_ms: 2_000,
            depth_window_cents: dec!(5),
        }
    }
}

impl MarketDataConfig {
    pub fn ttl(&self) -> Duration {
        window_secs(self.ttl_secs)
    }

    pub fn stale_after(&self) -> Duration {
        window_millis(self.stale_ms)
    }
}

/// Snapshot and book-health configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotConfig {
    pub empty_bid: Decimal,
    pub empty_ask: Decimal,
    pub dust_bid: Decimal,
    pub dust_ask: Decimal,
    pub max_ask_cents: Decimal,
    pub max_spread_cents: Decimal,
    /// Largest tolerated drift between a snapshot and the live book
    pub integrity_epsilon: Decimal,
    /// Bound on the fallback poll
    pub poll_timeout_ms: u64,
}

impl Default for SnapshotConfig {
    fn default() -> Self {
        Self {
            empty_bid: dec!(0.01),
            empty_ask: dec!(0.99),
            dust_bid: dec!(0.02),
            dust_ask: dec!(0.98),
            max_ask_cents: dec!(95),
            max_spread_cents: dec!(10),
            integrity_epsilon: dec!(0.0001),
            poll_timeout_ms: 3_000,
        }
    }
}

impl SnapshotConfig {
    pub fn poll_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.poll_timeout_ms)
    }
}

/// Smart sell configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SellConfig {
    /// Explicit slippage; overrides every computed band when set
    pub slippage_pct: Option<Decimal>,
    /// Explicit order type; overrides the liquidity-based choice when set
    pub order_type: Option<OrderType>,
    /// Band used when nothing else applies
    pub default_slippage_pct: Decimal,
    /// Band used for forced sells
    pub max_slippage_pct: Decimal,
    /// Prices at or above this are treated as near resolution
    pub high_price_threshold: Decimal,
    /// Band used near resolution
    pub high_price_slippage_pct: Decimal,
    /// Loss (percent of cost) beyond which exiting beats price
    pub loss_threshold_pct: Decimal,
    /// Band used for positions beyond the loss threshold
    pub loss_slippage_pct: Decimal,
    /// Fraction of the requested shares that counts as fillable
    pub min_fill_ratio: Decimal,
    /// Minimum USD value reachable within the slippage bound
    pub min_liquidity_usd: Decimal,
    /// Minimum shares at the best bid for an immediate order
    pub min_best_bid_depth: Decimal,
    /// Maximum levels an immediate order may walk
    pub max_immediate_levels: usize,
    /// Profit floor used by the profitability check
    pub min_profit_pct: Decimal,
    /// Exchange price increment
    pub tick_size: Decimal,
    /// Bound on the live book fetch
    pub book_timeout_ms: u64,
    /// Bound on order submission
    pub submit_timeout_ms: u64,
}

impl Default for SellConfig {
    fn default() -> Self {
        Self {
            slippage_pct: None,
            order_type: None,
            default_slippage_pct: dec!(5),
            max_slippage_pct: dec!(25),
            high_price_threshold: dec!(0.90),
            high_price_slippage_pct: dec!(1),
            loss_threshold_pct: dec!(20),
            loss_slippage_pct: dec!(10),
            min_fill_ratio: dec!(0.8),
            min_liquidity_usd: dec!(1),
            min_best_bid_depth: dec!(10),
            max_immediate_levels: 2,
            min_profit_pct: dec!(1),
            tick_size: dec!(0.01),
            book_timeout_ms: 3_000,
            submit_timeout_ms: 5_000,
        }
    }
}

impl SellConfig {
    pub fn book_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.book_timeout_ms)
    }

    pub fn submit_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.submit_timeout_ms)
    }
}

/// Latency monitor configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LatencyConfig {
    /// Samples kept per endpoint
    pub history_size: usize,
    pub probe_interval_secs: u64,
    pub probe_timeout_ms: u64,
    /// p95 above this marks the endpoint degraded
    pub degraded_p95_ms: f64,
    /// p95 above this marks the endpoint critical
    pub critical_p95_ms: f64,
    /// Success rate below this marks the endpoint degraded
    pub degraded_success_rate: f64,
    /// p95 above this blocks trading
    pub block_p95_ms: f64,
    /// Success rate below this blocks trading
    pub block_success_rate: f64,
    /// Slippage recommended at or below `slippage_floor_ms`
    pub base_slippage_pct: f64,
    /// Slippage recommended at or above `critical_p95_ms`
    pub max_slippage_pct: f64,
    pub slippage_floor_ms: f64,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            history_size: 100,
            probe_interval_secs: 30,
            probe_timeout_ms: 5_000,
            degraded_p95_ms: 800.0,
            critical_p95_ms: 2_000.0,
            degraded_success_rate: 0.90,
            block_p95_ms: 3_000.0,
            block_success_rate: 0.50,
            base_slippage_pct: 2.0,
            max_slippage_pct: 10.0,
            slippage_floor_ms: 200.0,
        }
    }
}

impl LatencyConfig {
    pub fn probe_interval(&self) -> std::time::Duration {
        std::time::Duration::from_secs(self.probe_interval_secs)
    }

    pub fn probe_timeout(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.probe_timeout_ms)
    }
}

/// Scavenger mode configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScavengerConfig {
    pub enabled: bool,
    /// Rolling window for all detection samples
    pub detection_window_secs: u64,
    /// Windowed volume below this is a low-liquidity signal
    pub low_volume_usd: Decimal,
    /// Average depth below this is a low-liquidity signal
    pub low_depth_usd: Decimal,
    /// Books unchanged for this long are stagnant
    pub stagnation_secs: u64,
    /// Moves smaller than this percentage do not count as a change
    pub stagnation_pct: Decimal,
    /// Fewer active target wallets than this is a low-liquidity signal
    pub min_active_targets: usize,
    /// Low liquidity must persist this long before entering scavenger mode
    pub sustained_low_secs: u64,
    pub recovery_volume_usd: Decimal,
    pub recovery_depth_usd: Decimal,
    pub recovery_active_targets: usize,
    /// A recovery signal must persist this long before leaving scavenger mode
    pub sustained_recovery_secs: u64,
    /// A profitable position whose price moved less than `stall_pct` over
    /// this window is exited
    pub stall_window_secs: u64,
    pub stall_pct: Decimal,
    /// Slippage below the current price accepted on scavenger exits
    pub exit_slippage_pct: Decimal,
    /// Monitored losing positions are exited once P&L reaches this
    pub min_profit_pct: Decimal,
    pub cooldown_secs: u64,
    pub max_deployed_usd: Decimal,
    pub max_positions: usize,
    /// Price samples kept per token
    pub price_history_len: usize,
    pub cycle_interval_secs: u64,
}

impl Default for ScavengerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            detection_window_secs: 300,
            low_volume_usd: dec!(1000),
            low_depth_usd: dec!(500),
            stagnation_secs: 120,
            stagnation_pct: dec!(0.1),
            min_active_targets: 2,
            sustained_low_secs: 180,
            recovery_volume_usd: dec!(5000),
            recovery_depth_usd: dec!(2000),
            recovery_active_targets: 3,
            sustained_recovery_secs: 120,
            stall_window_secs: 300,
            stall_pct: dec!(0.5),
            exit_slippage_pct: dec!(3),
            min_profit_pct: dec!(1),
            cooldown_secs: 600,
            max_deployed_usd: dec!(100),
            max_positions: 5,
            price_history_len: 120,
            cycle_interval_secs: 30,
        }
    }
}

impl ScavengerConfig {
    pub fn detection_window(&self) -> Duration {
        window_secs(self.detection_window_secs)
    }

    pub fn stagnation(&self) -> Duration {
        window_secs(self.stagnation_secs)
    }

    pub fn sustained_low(&self) -> Duration {
        window_secs(self.sustained_low_secs)
    }

    pub fn sustained_recovery(&self) -> Duration {
        window_secs(self.sustained_recovery_secs)
    }

    pub fn stall_window(&self) -> Duration {
        window_secs(self.stall_window_secs)
    }

    pub fn cooldown(&self) -> Duration {
        window_secs(self.cooldown_secs)
    }
}

/// Market scanner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScannerConfig {
    /// Safe zone lower bound on the mid price
    pub min_price_cents: Decimal,
    /// Safe zone upper bound on the mid price
    pub max_price_cents: Decimal,
    pub max_spread_cents: Decimal,
    pub min_bid_depth_usd: Decimal,
    /// Mid must move at least this many cents within the window
    pub movement_band_cents: Decimal,
    pub movement_window_secs: u64,
    pub leaderboard_enabled: bool,
    pub leaderboard_min_trades: usize,
    pub leaderboard_window_secs: u64,
    /// A token cannot produce another candidate within this window
    pub dedup_secs: u64,
    /// Tokens tracked before LRU eviction kicks in
    pub max_tracked_tokens: usize,
    /// How often the run loop observes followed tokens
    pub scan_interval_secs: u64,
}

impl Default for ScannerConfig {
    fn default() -> Self {
        Self {
            min_price_cents: dec!(20),
            max_price_cents: dec!(80),
            max_spread_cents: dec!(3),
            min_bid_depth_usd: dec!(100),
            movement_band_cents: dec!(5),
            movement_window_secs: 300,
            leaderboard_enabled: false,
            leaderboard_min_trades: 2,
            leaderboard_window_secs: 600,
            dedup_secs: 900,
            max_tracked_tokens: 1_000,
            scan_interval_secs: 5,
        }
    }
}

impl ScannerConfig {
    pub fn movement_window(&self) -> Duration {
        window_secs(self.movement_window_secs)
    }

    pub fn leaderboard_window(&self) -> Duration {
        window_secs(self.leaderboard_window_secs)
    }

    pub fn dedup_window(&self) -> Duration {
        window_secs(self.dedup_secs)
    }
}

/// Telemetry configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TelemetryConfig {
    /// Prometheus exporter port (disabled when unset)
    pub metrics_port: Option<u16>,
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            metrics_port: None,
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.market_data.stale_ms, 2_000);
        assert_eq!(config.snapshot.dust_bid, dec!(0.02));
        assert_eq!(config.sell.min_fill_ratio, dec!(0.8));
        assert_eq!(config.endpoints.probes.len(), 2);
        assert!(config.sell.order_type.is_none());
    }

    #[test]
    fn test_partial_section_keeps_other_defaults() {
        let toml = r#"
            [sell]
            slippage_pct = 7.5
            order_type = "limit"

            [scavenger]
            sustained_low_secs = 60

            [telemetry]
            log_level = "debug"
            log_format = "json"
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.sell.slippage_pct, Some(dec!(7.5)));
        assert_eq!(config.sell.order_type, Some(OrderType::Limit));
        assert_eq!(config.sell.default_slippage_pct, dec!(5));
        assert_eq!(config.scavenger.sustained_low_secs, 60);
        assert_eq!(config.scavenger.sustained_recovery_secs, 120);
        assert_eq!(config.telemetry.log_format, LogFormat::Json);
    }

    #[test]
    fn test_probe_targets() {
        let toml = r#"
            [endpoints]
            probes = [{ name = "rpc", url = "https://polygon-rpc.com" }]
        "#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.endpoints.probes.len(), 1);
        assert_eq!(config.endpoints.probes[0].name, "rpc");
        assert_eq!(config.endpoints.clob_url, "https://clob.polymarket.com");
    }

    #[test]
    fn test_duration_helpers() {
        let config = Config::default();
        assert_eq!(config.market_data.stale_after(), Duration::milliseconds(2_000));
        assert_eq!(config.scavenger.cooldown(), Duration::seconds(600));
        assert_eq!(config.scanner.dedup_window(), Duration::seconds(900));
    }

    #[test]
    fn test_config_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[market_data]\ncapacity = 42").unwrap();

        let config = Config::load(file.path()).unwrap();
        assert_eq!(config.market_data.capacity, 42);
    }

    #[test]
    fn test_oversized_window_is_rejected() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[scavenger]\ncooldown_secs = 9223372036854775807").unwrap();

        let err = Config::load(file.path()).unwrap_err();
        assert!(err.to_string().contains("scavenger.cooldown_secs"));

        // Built in code, the helper clamps instead of panicking
        let scavenger = ScavengerConfig {
            cooldown_secs: u64::MAX,
            ..Default::default()
        };
        assert_eq!(scavenger.cooldown(), Duration::seconds(MAX_WINDOW_SECS as i64));
        let market_data = MarketDataConfig {
            stale_ms: u64::MAX,
            ..Default::default()
        };
        assert_eq!(market_data.stale_after(), Duration::seconds(MAX_WINDOW_SECS as i64));
    }

    #[test]
    fn test_config_load_nonexistent() {
        assert!(Config::load("/nonexistent/path/config.toml").is_err());
    }
}
