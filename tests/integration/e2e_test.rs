//! End-to-end integration tests

use poly_exec::config::Config;
use poly_exec::execution::OrderType;
use poly_exec::telemetry::LogFormat;
use rust_decimal_macros::dec;

#[test]
fn test_config_example_loads() {
    let path = concat!(env!("CARGO_MANIFEST_DIR"), "/config.toml.example");
    let config = Config::load(path).unwrap();

    assert_eq!(config.market_data.stale_ms, 2000);
    assert_eq!(config.snapshot.dust_bid, dec!(0.02));
    assert_eq!(config.sell.min_fill_ratio, dec!(0.8));
    assert_eq!(config.scavenger.stagnation_pct, dec!(0.1));
    assert_eq!(config.scanner.max_spread_cents, dec!(3));
    assert_eq!(config.endpoints.probes.len(), 2);
    assert!(config.account.address.is_none());
    assert!(config.telemetry.metrics_port.is_none());
}

#[test]
fn test_config_overrides() {
    let toml = r#"
        [account]
        address = "0xabc"
        watched_wallets = ["0xw1", "0xw2"]

        [sell]
        order_type = "limit"
        max_slippage_pct = 15

        [scavenger]
        enabled = false

        [telemetry]
        metrics_port = 9090
        log_format = "json"
    "#;

    let config: Config = toml::from_str(toml).unwrap();
    assert_eq!(config.account.address.as_deref(), Some("0xabc"));
    assert_eq!(config.account.watched_wallets, vec!["0xw1", "0xw2"]);
    assert_eq!(config.sell.order_type, Some(OrderType::Limit));
    assert_eq!(config.sell.max_slippage_pct, dec!(15));
    assert_eq!(config.sell.default_slippage_pct, dec!(5));
    assert!(!config.scavenger.enabled);
    assert_eq!(config.telemetry.metrics_port, Some(9090));
    assert_eq!(config.telemetry.log_format, LogFormat::Json);
}

#[test]
fn test_effective_config_round_trips_through_toml() {
    let rendered = toml::to_string_pretty(&Config::default()).unwrap();
    let parsed: Config = toml::from_str(&rendered).unwrap();
    assert_eq!(parsed.scanner.dedup_secs, 900);
    assert_eq!(parsed.latency.history_size, 100);
}
