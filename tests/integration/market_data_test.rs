//! Market data store and snapshot integration tests

use crate::support::{book, ScriptedBooks};
use chrono::{Duration, Utc};
use poly_exec::cache::BoundedCache;
use poly_exec::config::{MarketDataConfig, SnapshotConfig};
use poly_exec::market::SourceError;
use poly_exec::market_data::{MarketDataStore, PollWrite};
use poly_exec::orderbook::{classify_book_status, BookStatus, BookThresholds};
use poly_exec::snapshot::{
    assert_snapshot_integrity, SnapshotService, SnapshotSource, INTEGRITY_EPSILON,
};
use rust_decimal_macros::dec;
use std::sync::Arc;

fn store() -> MarketDataStore {
    MarketDataStore::new(&MarketDataConfig::default(), BookThresholds::default())
}

#[test]
fn test_empty_book_classification() {
    let thresholds = BookThresholds::default();
    let status = classify_book_status(Some(dec!(0.005)), Some(dec!(0.995)), &thresholds);
    assert_eq!(status, BookStatus::EmptyBook);
}

#[test]
fn test_capacity_overflow_evicts_lru() {
    let mut cache = BoundedCache::new(3, Duration::seconds(60));
    let now = Utc::now();
    cache.insert_at("a", 1, now);
    cache.insert_at("b", 2, now);
    cache.insert_at("c", 3, now);
    cache.get_at(&"a", now);

    let evicted = cache.insert_at("d", 4, now);
    assert_eq!(evicted, Some(("b", 2)));
    assert_eq!(cache.len(), 3);
}

#[tokio::test]
async fn test_healthy_entry_survives_dust_poll() {
    let store = store();
    let now = Utc::now();
    let healthy = book("t", &[(dec!(0.50), dec!(100))], &[(dec!(0.51), dec!(100))]);
    store.update_from_stream_at(healthy, now).await;

    let write = store
        .update_from_poll_at(book("t", &[(dec!(0.02), dec!(5))], &[(dec!(0.98), dec!(5))]), now)
        .await;

    assert!(matches!(
        write,
        PollWrite::RejectedUnhealthy {
            existing: BookStatus::Healthy,
            incoming: BookStatus::DustBook
        }
    ));
    let state = store.get_at("t", now).await.unwrap();
    assert_eq!(state.best_bid, Some(dec!(0.50)));
    assert_eq!(state.best_ask, Some(dec!(0.51)));
    assert_eq!(store.stats().await.rejected_polls, 1);
}

#[tokio::test]
async fn test_snapshot_prefers_fresh_cache() {
    let source = Arc::new(ScriptedBooks::new(Err(SourceError::Timeout)));
    let store = store();
    store
        .update_from_stream(book("t", &[(dec!(0.40), dec!(100))], &[(dec!(0.42), dec!(100))]))
        .await;
    let service = SnapshotService::new(store, source.clone(), &SnapshotConfig::default());

    let snapshot = service.fetch_market_snapshot("t", Some("attempt-1")).await;
    assert_eq!(snapshot.source(), SnapshotSource::StreamCache);
    assert_eq!(snapshot.attempt_id(), "attempt-1");
    assert_eq!(snapshot.mid(), dec!(0.41));
    assert_eq!(snapshot.book_status(), BookStatus::Healthy);
    assert_eq!(source.poll_count(), 0);
}

#[tokio::test]
async fn test_poll_fallback_writes_back_through_safety_rule() {
    let source = Arc::new(ScriptedBooks::new(Ok(book(
        "t",
        &[(dec!(0.01), dec!(5))],
        &[(dec!(0.99), dec!(5))],
    ))));
    let store = store();
    // Healthy but stale entry forces a poll
    let stale_at = Utc::now() - Duration::seconds(10);
    let healthy = book("t", &[(dec!(0.50), dec!(100))], &[(dec!(0.51), dec!(100))]);
    store.update_from_stream_at(healthy, stale_at).await;
    let service = SnapshotService::new(store.clone(), source.clone(), &SnapshotConfig::default());

    let snapshot = service.fetch_market_snapshot("t", None).await;
    assert_eq!(snapshot.source(), SnapshotSource::Poll);
    assert_eq!(snapshot.book_status(), BookStatus::EmptyBook);
    assert!(!snapshot.is_tradeable());
    assert_eq!(source.poll_count(), 1);

    let state = store.get("t").await.unwrap();
    assert_eq!(state.best_bid, Some(dec!(0.50)));
}

#[tokio::test]
async fn test_transport_failure_yields_placeholder() {
    let source = Arc::new(ScriptedBooks::new(Err(SourceError::Transport("reset".to_string()))));
    let service = SnapshotService::new(store(), source, &SnapshotConfig::default());

    let snapshot = service.fetch_market_snapshot("t", None).await;
    assert!(snapshot.is_placeholder());
    assert!(!snapshot.attempt_id().is_empty());
    assert_eq!(snapshot.best_bid(), dec!(0.01));
    assert_eq!(snapshot.best_ask(), dec!(0.99));
    assert!(!assert_snapshot_integrity(
        &snapshot,
        Some(dec!(0.01)),
        Some(dec!(0.99)),
        "test",
        INTEGRITY_EPSILON
    ));
}

#[tokio::test]
async fn test_integrity_detects_drift_between_snapshot_and_live() {
    let source = Arc::new(ScriptedBooks::new(Ok(book(
        "t",
        &[(dec!(0.50), dec!(100))],
        &[(dec!(0.52), dec!(100))],
    ))));
    let service = SnapshotService::new(store(), source, &SnapshotConfig::default());
    let snapshot = service.fetch_market_snapshot("t", None).await;

    assert!(assert_snapshot_integrity(
        &snapshot,
        Some(dec!(0.50)),
        Some(dec!(0.52)),
        "test",
        INTEGRITY_EPSILON
    ));
    assert!(!assert_snapshot_integrity(
        &snapshot,
        Some(dec!(0.49)),
        Some(dec!(0.52)),
        "test",
        INTEGRITY_EPSILON
    ));
}
