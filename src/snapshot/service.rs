//! Snapshot fetching

use super::{MarketSnapshot, SnapshotSource};
use crate::config::SnapshotConfig;
use crate::market::{OrderBookSource, SourceError};
use crate::market_data::MarketDataStore;
use crate::orderbook::{BookThresholds, OrderBook};
use crate::telemetry::{increment_counter, record_latency, CounterMetric, LatencyMetric};
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Builds one snapshot per execution attempt
///
/// Prefers a fresh two-sided book from the market data store and falls back
/// to a bounded direct poll. Never fails: an unreachable book yields a
/// placeholder snapshot that every downstream check rejects.
#[derive(Clone)]
pub struct SnapshotService {
    store: MarketDataStore,
    source: Arc<dyn OrderBookSource>,
    thresholds: BookThresholds,
    poll_timeout: Duration,
    epsilon: Decimal,
}

impl SnapshotService {
    pub fn new(
        store: MarketDataStore,
        source: Arc<dyn OrderBookSource>,
        config: &SnapshotConfig,
    ) -> Self {
        Self {
            store,
            source,
            thresholds: BookThresholds::from(config),
            poll_timeout: config.poll_timeout(),
            epsilon: config.integrity_epsilon,
        }
    }

    pub fn store(&self) -> &MarketDataStore {
        &self.store
    }

    pub fn thresholds(&self) -> &BookThresholds {
        &self.thresholds
    }

    pub fn epsilon(&self) -> Decimal {
        self.epsilon
    }

    /// Snapshot for a token; a fresh attempt ID is generated when none is given
    pub async fn fetch_market_snapshot(
        &self,
        token_id: &str,
        attempt_id: Option<&str>,
    ) -> MarketSnapshot {
        self.fetch_market_snapshot_for(token_id, None, attempt_id).await
    }

    /// Same as [`fetch_market_snapshot`](Self::fetch_market_snapshot) with the
    /// market's condition ID attached
    pub async fn fetch_market_snapshot_for(
        &self,
        token_id: &str,
        market_id: Option<&str>,
        attempt_id: Option<&str>,
    ) -> MarketSnapshot {
        let started = Instant::now();
        let attempt_id = attempt_id
            .map(str::to_string)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let market_id = market_id.map(str::to_string);

        let snapshot = match self.from_store(token_id, market_id.clone(), &attempt_id).await {
            Some(snapshot) => {
                increment_counter(CounterMetric::SnapshotsFromCache);
                snapshot
            }
            None => self.from_poll(token_id, market_id, &attempt_id).await,
        };

        record_latency(LatencyMetric::Snapshot, started.elapsed());
        tracing::debug!(
            token_id = %token_id,
            attempt_id = %snapshot.attempt_id(),
            source = ?snapshot.source(),
            status = %snapshot.book_status(),
            bid = %snapshot.best_bid(),
            ask = %snapshot.best_ask(),
            "Market snapshot"
        );
        snapshot
    }

    async fn from_store(
        &self,
        token_id: &str,
        market_id: Option<String>,
        attempt_id: &str,
    ) -> Option<MarketSnapshot> {
        let now = Utc::now();
        let state = self.store.get_at(token_id, now).await?;
        if state.is_stale_at(now, self.store.stale_after()) || !state.has_both_sides() {
            return None;
        }

        Some(MarketSnapshot::new(
            token_id,
            market_id,
            state.best_bid,
            state.best_ask,
            SnapshotSource::StreamCache,
            attempt_id,
            now,
            &self.thresholds,
        ))
    }

    async fn from_poll(
        &self,
        token_id: &str,
        market_id: Option<String>,
        attempt_id: &str,
    ) -> MarketSnapshot {
        match self.poll(token_id).await {
            Ok(book) => {
                let snapshot = MarketSnapshot::new(
                    token_id,
                    market_id,
                    book.best_bid(),
                    book.best_ask(),
                    SnapshotSource::Poll,
                    attempt_id,
                    Utc::now(),
                    &self.thresholds,
                );
                self.store.update_from_poll(book).await;
                increment_counter(CounterMetric::SnapshotsFromPoll);
                snapshot
            }
            Err(e) => {
                tracing::warn!(
                    token_id = %token_id,
                    attempt_id = %attempt_id,
                    error = %e,
                    "Snapshot poll failed, using placeholder"
                );
                increment_counter(CounterMetric::SnapshotsPlaceholder);
                MarketSnapshot::placeholder(
                    token_id,
                    market_id,
                    attempt_id,
                    Utc::now(),
                    &self.thresholds,
                )
            }
        }
    }

    /// Poll the live book, bounded by the configured timeout
    pub async fn poll(&self, token_id: &str) -> Result<OrderBook, SourceError> {
        let started = Instant::now();
        let result = tokio::time::timeout(self.poll_timeout, self.source.poll_order_book(token_id))
            .await
            .unwrap_or(Err(SourceError::Timeout));
        record_latency(LatencyMetric::BookPoll, started.elapsed());
        result
    }
}
