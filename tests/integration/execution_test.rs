//! Liquidity walk and smart sell integration tests

use crate::support::{book, ScriptedBooks};
use chrono::Utc;
use poly_exec::config::{LatencyConfig, SellConfig};
use poly_exec::execution::{
    analyze_liquidity, OrderType, PaperSubmitter, SellError, SellRequest, SmartSeller,
    CLOB_ENDPOINT,
};
use poly_exec::latency::LatencyMonitor;
use poly_exec::market::SourceError;
use poly_exec::orderbook::{BookThresholds, PriceLevel};
use poly_exec::snapshot::{MarketSnapshot, SnapshotSource};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

fn quote(bid: Decimal, ask: Decimal) -> MarketSnapshot {
    MarketSnapshot::new(
        "t",
        None,
        Some(bid),
        Some(ask),
        SnapshotSource::Poll,
        "attempt",
        Utc::now(),
        &BookThresholds::default(),
    )
}

fn seller(source: Arc<ScriptedBooks>) -> (SmartSeller, Arc<PaperSubmitter>) {
    let paper = Arc::new(PaperSubmitter::new(source.clone()));
    let seller = SmartSeller::new(source, paper.clone(), SellConfig::default());
    (seller, paper)
}

#[test]
fn test_single_level_fill() {
    let bids = vec![PriceLevel::new(dec!(0.50), dec!(200))];
    let analysis = analyze_liquidity(&bids, dec!(100), dec!(2));

    assert_eq!(analysis.expected_avg_price, dec!(0.50));
    assert!(analysis.can_fill);
    assert_eq!(analysis.levels_needed, 1);
}

#[test]
fn test_two_level_walk() {
    let bids = vec![
        PriceLevel::new(dec!(0.50), dec!(50)),
        PriceLevel::new(dec!(0.45), dec!(50)),
    ];
    let analysis = analyze_liquidity(&bids, dec!(100), dec!(15));

    assert_eq!(analysis.expected_avg_price, dec!(0.475));
    assert_eq!(analysis.expected_slippage_pct, dec!(5));
    assert_eq!(analysis.levels_needed, 2);
}

#[test]
fn test_walk_never_beats_best_bid() {
    let bids = vec![
        PriceLevel::new(dec!(0.60), dec!(10)),
        PriceLevel::new(dec!(0.58), dec!(20)),
        PriceLevel::new(dec!(0.55), dec!(40)),
        PriceLevel::new(dec!(0.50), dec!(80)),
    ];
    let mut last_levels = 0;
    for shares in [1, 10, 25, 50, 100, 200] {
        let analysis = analyze_liquidity(&bids, Decimal::from(shares), dec!(25));
        assert!(analysis.expected_avg_price <= dec!(0.60));
        assert!(analysis.levels_needed >= last_levels);
        last_levels = analysis.levels_needed;
    }
}

#[tokio::test]
async fn test_smart_sell_fills_against_live_book() {
    let source = Arc::new(ScriptedBooks::new(Ok(book(
        "t",
        &[(dec!(0.50), dec!(200))],
        &[(dec!(0.52), dec!(200))],
    ))));
    let (seller, paper) = seller(source);

    let snapshot = quote(dec!(0.50), dec!(0.52));
    let request = SellRequest::from_snapshot(&snapshot, dec!(100), dec!(0.40));
    let outcome = seller.smart_sell(&request, &snapshot).await.unwrap();

    assert_eq!(outcome.order_type, OrderType::ImmediateOrCancel);
    assert_eq!(outcome.filled_shares, dec!(100));
    assert_eq!(outcome.proceeds_usd, dec!(50));
    assert_eq!(paper.fills().await.len(), 1);
}

#[tokio::test]
async fn test_smart_sell_aborts_on_snapshot_drift() {
    let source = Arc::new(ScriptedBooks::new(Ok(book(
        "t",
        &[(dec!(0.50), dec!(200))],
        &[(dec!(0.52), dec!(200))],
    ))));
    let (seller, paper) = seller(source.clone());

    let snapshot = quote(dec!(0.50), dec!(0.52));
    // The book moves between the decision and the sell
    source
        .set(Ok(book("t", &[(dec!(0.47), dec!(200))], &[(dec!(0.52), dec!(200))])))
        .await;

    let request = SellRequest::from_snapshot(&snapshot, dec!(100), dec!(0.40));
    let err = seller.smart_sell(&request, &snapshot).await.unwrap_err();

    assert!(matches!(err, SellError::SnapshotDrift(_)));
    assert_eq!(err.reason_code(), "SNAPSHOT_DRIFT");
    assert!(paper.fills().await.is_empty());
}

#[tokio::test]
async fn test_smart_sell_distinguishes_empty_and_closed() {
    let empty = Arc::new(ScriptedBooks::new(Ok(book("t", &[], &[(dec!(0.52), dec!(10))]))));
    let (seller_empty, _) = seller(empty);
    let snapshot = quote(dec!(0.50), dec!(0.52));
    let request = SellRequest::from_snapshot(&snapshot, dec!(10), dec!(0.40));
    let err = seller_empty.smart_sell(&request, &snapshot).await.unwrap_err();
    assert!(matches!(err, SellError::EmptyBook(_)));

    let closed = Arc::new(ScriptedBooks::new(Err(SourceError::MarketClosed("t".to_string()))));
    let (seller_closed, _) = seller(closed);
    let err = seller_closed.smart_sell(&request, &snapshot).await.unwrap_err();
    assert!(matches!(err, SellError::MarketClosed(_)));
}

#[tokio::test]
async fn test_latency_gate_blocks_until_measured() {
    let source = Arc::new(ScriptedBooks::new(Ok(book(
        "t",
        &[(dec!(0.50), dec!(200))],
        &[(dec!(0.52), dec!(200))],
    ))));
    let monitor = LatencyMonitor::new(LatencyConfig::default());
    let (seller, _) = seller(source.clone());
    let seller = seller.with_latency_gate(monitor.clone());
    let snapshot = quote(dec!(0.50), dec!(0.52));
    let request = SellRequest::from_snapshot(&snapshot, dec!(100), dec!(0.40));

    let err = seller.smart_sell(&request, &snapshot).await.unwrap_err();
    assert!(matches!(err, SellError::Blocked(_)));
    assert_eq!(source.poll_count(), 0);

    for _ in 0..10 {
        monitor.record(CLOB_ENDPOINT, 120.0, true).await;
    }
    assert!(seller.smart_sell(&request, &snapshot).await.is_ok());
}
