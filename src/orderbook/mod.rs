//! Order book module
//!
//! Book types, top-of-book health classification, and the Polymarket
//! WebSocket push feed.

mod book;
mod status;
mod stream;

pub use book::OrderBook;
pub use status::{classify_book_status, BookStatus, BookThresholds};
pub use stream::{
    FeedEvent, MarketStream, StreamConfig, StreamError, TradePrint, MAX_LEVEL_SIZE,
    POLYMARKET_WS_URL,
};

pub(crate) use book::notional;
pub(crate) use stream::{parse_levels, WireLevel};

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A price level in the order book
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceLevel {
    /// Price at this level
    pub price: Decimal,
    /// Total size available
    pub size: Decimal,
}

impl PriceLevel {
    pub fn new(price: Decimal, size: Decimal) -> Self {
        Self { price, size }
    }
}
