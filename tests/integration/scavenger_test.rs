//! Scavenger mode integration tests

use crate::support::{book, RecordingNotifier, ScriptedBooks};
use chrono::{DateTime, Duration, Utc};
use poly_exec::config::{MarketDataConfig, ScavengerConfig, SellConfig, SnapshotConfig};
use poly_exec::execution::{PaperSubmitter, SmartSeller};
use poly_exec::market::Position;
use poly_exec::market_data::MarketDataStore;
use poly_exec::orderbook::BookThresholds;
use poly_exec::scavenger::{ExitReason, Scavenger, ScavengerMode};
use poly_exec::snapshot::SnapshotService;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::sync::Arc;

fn scavenger_over(
    bid: Decimal,
    notifier: Arc<RecordingNotifier>,
) -> (Scavenger, Arc<PaperSubmitter>) {
    let source = Arc::new(ScriptedBooks::new(Ok(book(
        "t",
        &[(bid, dec!(1000))],
        &[(bid + dec!(0.01), dec!(1000))],
    ))));
    let paper = Arc::new(PaperSubmitter::new(source.clone()));
    let seller = SmartSeller::new(source.clone(), paper.clone(), SellConfig::default());
    let store = MarketDataStore::new(&MarketDataConfig::default(), BookThresholds::default());
    let snapshots = SnapshotService::new(store, source, &SnapshotConfig::default());
    let scv = Scavenger::new(ScavengerConfig::default(), seller, snapshots, notifier);
    (scv, paper)
}

fn scavenger(notifier: Arc<RecordingNotifier>) -> Scavenger {
    scavenger_over(dec!(0.60), notifier).0
}

async fn enter(scv: &Scavenger) -> DateTime<Utc> {
    let t0 = Utc::now();
    feed_dry_market(scv, t0).await;
    scv.evaluate_at(t0).await;
    let entered = t0 + Duration::seconds(180);
    scv.evaluate_at(entered).await;
    assert_eq!(scv.mode().await, ScavengerMode::Scavenger);
    entered
}

/// Thin volume and thin depth: two of four signals
async fn feed_dry_market(scv: &Scavenger, at: DateTime<Utc>) {
    scv.record_volume_at(at, dec!(50)).await;
    scv.record_depth_at(at, dec!(100)).await;
}

#[tokio::test]
async fn test_full_mode_cycle() {
    let notifier = Arc::new(RecordingNotifier::default());
    let scv = scavenger(notifier.clone());
    let t0 = Utc::now();

    for s in (0..=180).step_by(30) {
        let at = t0 + Duration::seconds(s);
        feed_dry_market(&scv, at).await;
        scv.evaluate_at(at).await;
    }
    assert_eq!(scv.mode().await, ScavengerMode::Scavenger);

    // Depth recovers and holds
    let t1 = t0 + Duration::seconds(400);
    for s in (0..=120).step_by(30) {
        let at = t1 + Duration::seconds(s);
        scv.record_depth_at(at, dec!(10_000)).await;
        scv.evaluate_at(at).await;
    }
    assert_eq!(scv.mode().await, ScavengerMode::Normal);

    let titles = notifier.titles.lock().await;
    assert_eq!(
        *titles,
        vec!["Scavenger mode: SCAVENGER".to_string(), "Scavenger mode: NORMAL".to_string()]
    );
}

#[tokio::test]
async fn test_brief_dry_spells_keep_normal_mode() {
    let scv = scavenger(Arc::new(RecordingNotifier::default()));
    let t0 = Utc::now();

    // Two minutes dry, then a burst of depth, repeated
    for round in 0..4 {
        let base = t0 + Duration::seconds(400 * round);
        for s in (0..=120).step_by(30) {
            let at = base + Duration::seconds(s);
            feed_dry_market(&scv, at).await;
            scv.evaluate_at(at).await;
        }
        let burst = base + Duration::seconds(150);
        scv.record_volume_at(burst, dec!(10_000)).await;
        scv.record_depth_at(burst, dec!(10_000)).await;
        scv.evaluate_at(burst).await;
    }
    assert_eq!(scv.mode().await, ScavengerMode::Normal);
}

#[tokio::test]
async fn test_cycle_exits_stalled_winner() {
    let scv = scavenger(Arc::new(RecordingNotifier::default()));
    let entered = enter(&scv).await;

    let held = vec![
        Position::new("t", dec!(100), dec!(0.50), dec!(0.60)),
        Position::new("u", dec!(20), dec!(0.70), dec!(0.60)),
    ];
    let first = scv.run_scavenger_cycle_at(&held, entered).await;
    assert!(first.exits.is_empty());
    assert_eq!(first.newly_monitored, vec!["u".to_string()]);

    let later = entered + Duration::seconds(300);
    let second = scv.run_scavenger_cycle_at(&held, later).await;
    assert_eq!(second.exits.len(), 1);
    assert_eq!(second.exits[0].token_id, "t");
    assert_eq!(second.exits[0].reason, ExitReason::Stalled);
    assert!(scv.cooldown_until("t", later).await.is_some());
}

#[tokio::test]
async fn test_stale_position_mark_never_drives_an_exit() {
    // The account still marks the position at 0.60; the book bids 0.40
    let (scv, paper) = scavenger_over(dec!(0.40), Arc::new(RecordingNotifier::default()));
    let entered = enter(&scv).await;
    let held = vec![Position::new("t", dec!(100), dec!(0.50), dec!(0.60))];

    let first = scv.run_scavenger_cycle_at(&held, entered).await;
    assert_eq!(first.newly_monitored, vec!["t".to_string()]);

    let second = scv
        .run_scavenger_cycle_at(&held, entered + Duration::seconds(300))
        .await;
    assert!(second.exits.is_empty());
    assert!(paper.fills().await.is_empty());
}
