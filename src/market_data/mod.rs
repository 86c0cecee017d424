//! Market data store
//!
//! One book per token, fed by the WebSocket push feed and by REST polls.
//! Push writes always win. Poll writes go through a cache-safety rule so a
//! dust or empty poll can never replace a healthy book.

mod ingest;
mod store;

pub use ingest::spawn_stream_ingest;
pub use store::MarketDataStore;

use crate::cache::CacheStats;
use crate::orderbook::{classify_book_status, BookStatus, BookThresholds, OrderBook, PriceLevel};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Which writer produced a stored book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookSource {
    Stream,
    Poll,
}

/// Whether the push feed is currently usable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedMode {
    PushOk,
    PollOnly,
}

/// Outcome of a poll write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollWrite {
    Accepted,
    /// The stored book is healthy and the poll was dust or empty
    RejectedUnhealthy {
        existing: BookStatus,
        incoming: BookStatus,
    },
}

impl PollWrite {
    pub fn is_accepted(&self) -> bool {
        matches!(self, PollWrite::Accepted)
    }
}

/// Stored book for one token
///
/// Replaced wholesale on every accepted write, never merged.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OrderBookState {
    pub token_id: String,
    pub bids: Vec<PriceLevel>,
    pub asks: Vec<PriceLevel>,
    pub best_bid: Option<Decimal>,
    pub best_ask: Option<Decimal>,
    /// Time the store received this book
    pub updated_at: DateTime<Utc>,
    /// USD resting within the configured window of the best price
    pub depth_within_window: Decimal,
    pub source: BookSource,
}

impl OrderBookState {
    pub fn from_book(
        book: OrderBook,
        source: BookSource,
        depth_window: Decimal,
        received_at: DateTime<Utc>,
    ) -> Self {
        Self {
            best_bid: book.best_bid(),
            best_ask: book.best_ask(),
            depth_within_window: book.depth_within(depth_window),
            token_id: book.token_id,
            bids: book.bids,
            asks: book.asks,
            updated_at: received_at,
            source,
        }
    }

    pub fn has_both_sides(&self) -> bool {
        self.best_bid.is_some() && self.best_ask.is_some()
    }

    pub fn is_stale_at(&self, now: DateTime<Utc>, stale_after: Duration) -> bool {
        now - self.updated_at > stale_after
    }

    /// Health of the stored quote
    ///
    /// A missing side is read as the extreme price (bid 0, ask 1), so a book
    /// with no levels classifies as empty rather than invalid.
    pub fn status(&self, thresholds: &BookThresholds) -> BookStatus {
        classify_book_status(
            Some(self.best_bid.unwrap_or(Decimal::ZERO)),
            Some(self.best_ask.unwrap_or(Decimal::ONE)),
            thresholds,
        )
    }

    pub fn to_order_book(&self) -> OrderBook {
        OrderBook {
            token_id: self.token_id.clone(),
            bids: self.bids.clone(),
            asks: self.asks.clone(),
            updated_at: self.updated_at,
        }
    }
}

/// Store health counters
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MarketDataStats {
    pub cache: CacheStats,
    pub stream_writes: u64,
    pub poll_writes: u64,
    pub rejected_polls: u64,
    pub feed_mode: FeedMode,
}
