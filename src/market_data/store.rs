//! Dual-source book store

use super::{BookSource, FeedMode, MarketDataStats, OrderBookState, PollWrite};
use crate::cache::BoundedCache;
use crate::config::MarketDataConfig;
use crate::orderbook::{BookThresholds, OrderBook};
use crate::telemetry::{increment_counter, set_gauge, CounterMetric, GaugeMetric};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::RwLock;

struct StoreInner {
    books: BoundedCache<String, OrderBookState>,
    stream_connected: bool,
    stream_writes: u64,
    poll_writes: u64,
    rejected_polls: u64,
}

/// Shared handle to the market data store
///
/// Cloning is cheap; all clones see the same books.
#[derive(Clone)]
pub struct MarketDataStore {
    inner: Arc<RwLock<StoreInner>>,
    thresholds: BookThresholds,
    stale_after: Duration,
    depth_window: Decimal,
}

impl MarketDataStore {
    pub fn new(config: &MarketDataConfig, thresholds: BookThresholds) -> Self {
        let inner = StoreInner {
            books: BoundedCache::new(config.capacity, config.ttl()),
            stream_connected: false,
            stream_writes: 0,
            poll_writes: 0,
            rejected_polls: 0,
        };

        Self {
            inner: Arc::new(RwLock::new(inner)),
            thresholds,
            stale_after: config.stale_after(),
            depth_window: config.depth_window_cents / Decimal::ONE_HUNDRED,
        }
    }

    pub fn thresholds(&self) -> &BookThresholds {
        &self.thresholds
    }

    pub fn stale_after(&self) -> Duration {
        self.stale_after
    }

    /// Store a pushed book; push writes always replace the stored one
    pub async fn update_from_stream(&self, book: OrderBook) {
        self.update_from_stream_at(book, Utc::now()).await
    }

    pub async fn update_from_stream_at(&self, book: OrderBook, now: DateTime<Utc>) {
        let state = OrderBookState::from_book(book, BookSource::Stream, self.depth_window, now);
        let mut inner = self.inner.write().await;
        inner.stream_writes += 1;
        if let Some((evicted, _)) = inner.books.insert_at(state.token_id.clone(), state, now) {
            tracing::debug!(token_id = %evicted, "Evicted book to make room");
        }
        increment_counter(CounterMetric::StreamBookUpdates);
    }

    /// Store a polled book unless it would replace a healthy book with dust
    pub async fn update_from_poll(&self, book: OrderBook) -> PollWrite {
        self.update_from_poll_at(book, Utc::now()).await
    }

    pub async fn update_from_poll_at(&self, book: OrderBook, now: DateTime<Utc>) -> PollWrite {
        let state = OrderBookState::from_book(book, BookSource::Poll, self.depth_window, now);
        let incoming = state.status(&self.thresholds);

        let mut inner = self.inner.write().await;

        if incoming.is_dust_or_empty() {
            let existing = inner
                .books
                .peek_at(&state.token_id, now)
                .map(|entry| entry.value.status(&self.thresholds));

            if let Some(existing) = existing.filter(|s| s.is_healthy()) {
                inner.rejected_polls += 1;
                tracing::warn!(
                    token_id = %state.token_id,
                    existing = %existing,
                    incoming = %incoming,
                    bid = ?state.best_bid,
                    ask = ?state.best_ask,
                    "Rejected poll update: would overwrite healthy book"
                );
                increment_counter(CounterMetric::PollWritesRejected);
                return PollWrite::RejectedUnhealthy { existing, incoming };
            }
        }

        inner.poll_writes += 1;
        if let Some((evicted, _)) = inner.books.insert_at(state.token_id.clone(), state, now) {
            tracing::debug!(token_id = %evicted, "Evicted book to make room");
        }
        increment_counter(CounterMetric::PollBookUpdates);
        PollWrite::Accepted
    }

    /// Stored book for a token, if present and within TTL
    pub async fn get(&self, token_id: &str) -> Option<OrderBookState> {
        self.get_at(token_id, Utc::now()).await
    }

    pub async fn get_at(&self, token_id: &str, now: DateTime<Utc>) -> Option<OrderBookState> {
        let mut inner = self.inner.write().await;
        inner.books.get_at(&token_id.to_string(), now).cloned()
    }

    /// True when there is no book or the stored one is older than the stale threshold
    pub async fn is_stale(&self, token_id: &str) -> bool {
        self.is_stale_at(token_id, Utc::now()).await
    }

    pub async fn is_stale_at(&self, token_id: &str, now: DateTime<Utc>) -> bool {
        let inner = self.inner.read().await;
        match inner.books.peek_at(&token_id.to_string(), now) {
            Some(entry) => entry.value.is_stale_at(now, self.stale_after),
            None => true,
        }
    }

    pub async fn set_stream_connected(&self, connected: bool) {
        let mut inner = self.inner.write().await;
        if inner.stream_connected != connected {
            tracing::info!(connected, "Push feed connection changed");
        }
        inner.stream_connected = connected;
        set_gauge(GaugeMetric::FeedConnected, if connected { 1.0 } else { 0.0 });
    }

    pub async fn is_stream_connected(&self) -> bool {
        self.inner.read().await.stream_connected
    }

    pub async fn feed_mode(&self) -> FeedMode {
        if self.is_stream_connected().await {
            FeedMode::PushOk
        } else {
            FeedMode::PollOnly
        }
    }

    pub async fn remove(&self, token_id: &str) -> Option<OrderBookState> {
        self.inner.write().await.books.remove(&token_id.to_string())
    }

    /// Drop every expired book, returning how many were removed
    pub async fn purge_expired(&self) -> usize {
        self.inner.write().await.books.purge_expired_at(Utc::now())
    }

    pub async fn stats(&self) -> MarketDataStats {
        let inner = self.inner.read().await;
        MarketDataStats {
            cache: inner.books.stats(),
            stream_writes: inner.stream_writes,
            poll_writes: inner.poll_writes,
            rejected_polls: inner.rejected_polls,
            feed_mode: if inner.stream_connected {
                FeedMode::PushOk
            } else {
                FeedMode::PollOnly
            },
        }
    }

    /// Push the current cache counters to the metrics gauges
    pub async fn export_metrics(&self) {
        let stats = self.stats().await;
        set_gauge(GaugeMetric::CacheEntries, stats.cache.entries as f64);
        set_gauge(GaugeMetric::CacheHitRatio, stats.cache.hit_ratio());
        set_gauge(GaugeMetric::CacheEvictions, stats.cache.evictions as f64);
        set_gauge(GaugeMetric::CacheExpirations, stats.cache.expirations as f64);
    }

    /// Drop all books and counters
    pub async fn reset(&self) {
        let mut inner = self.inner.write().await;
        inner.books.clear();
        inner.stream_connected = false;
        inner.stream_writes = 0;
        inner.poll_writes = 0;
        inner.rejected_polls = 0;
    }
}
