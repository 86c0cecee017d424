//! Book health classification

use crate::config::SnapshotConfig;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Health of a top-of-book quote
///
/// Variants are listed in precedence order: when several conditions hold,
/// the first one wins.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BookStatus {
    /// A side is missing or priced outside [0, 1]
    InvalidBook,
    /// Best bid above best ask
    CrossedBook,
    /// Both sides pinned at the extremes (no liquidity at all)
    EmptyBook,
    /// Both sides near the extremes (placeholder orders only)
    DustBook,
    /// Ask above the configured ceiling
    AskTooHigh,
    /// Spread wider than the configured maximum
    WideSpread,
    /// Tradeable
    Healthy,
}

impl BookStatus {
    pub fn is_healthy(&self) -> bool {
        matches!(self, BookStatus::Healthy)
    }

    /// Books that carry no real liquidity
    pub fn is_dust_or_empty(&self) -> bool {
        matches!(self, BookStatus::DustBook | BookStatus::EmptyBook)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookStatus::InvalidBook => "INVALID_BOOK",
            BookStatus::CrossedBook => "CROSSED_BOOK",
            BookStatus::EmptyBook => "EMPTY_BOOK",
            BookStatus::DustBook => "DUST_BOOK",
            BookStatus::AskTooHigh => "ASK_TOO_HIGH",
            BookStatus::WideSpread => "WIDE_SPREAD",
            BookStatus::Healthy => "HEALTHY",
        }
    }
}

impl fmt::Display for BookStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Thresholds used by [`classify_book_status`]
#[derive(Debug, Clone, PartialEq)]
pub struct BookThresholds {
    /// Bid at or below this counts as empty
    pub empty_bid: Decimal,
    /// Ask at or above this counts as empty
    pub empty_ask: Decimal,
    /// Bid at or below this counts as dust
    pub dust_bid: Decimal,
    /// Ask at or above this counts as dust
    pub dust_ask: Decimal,
    /// Asks above this many cents are rejected
    pub max_ask_cents: Decimal,
    /// Spreads above this many cents are rejected
    pub max_spread_cents: Decimal,
}

impl Default for BookThresholds {
    fn default() -> Self {
        Self {
            empty_bid: dec!(0.01),
            empty_ask: dec!(0.99),
            dust_bid: dec!(0.02),
            dust_ask: dec!(0.98),
            max_ask_cents: dec!(95),
            max_spread_cents: dec!(10),
        }
    }
}

impl From<&SnapshotConfig> for BookThresholds {
    fn from(config: &SnapshotConfig) -> Self {
        Self {
            empty_bid: config.empty_bid,
            empty_ask: config.empty_ask,
            dust_bid: config.dust_bid,
            dust_ask: config.dust_ask,
            max_ask_cents: config.max_ask_cents,
            max_spread_cents: config.max_spread_cents,
        }
    }
}

impl BookThresholds {
    /// Same thresholds with a different spread ceiling
    pub fn with_max_spread_cents(mut self, cents: Decimal) -> Self {
        self.max_spread_cents = cents;
        self
    }
}

/// Classify a top-of-book quote
pub fn classify_book_status(
    bid: Option<Decimal>,
    ask: Option<Decimal>,
    thresholds: &BookThresholds,
) -> BookStatus {
    let in_range = |p: Decimal| p >= Decimal::ZERO && p <= Decimal::ONE;
    let (bid, ask) = match (bid, ask) {
        (Some(b), Some(a)) if in_range(b) && in_range(a) => (b, a),
        _ => return BookStatus::InvalidBook,
    };

    if bid > ask {
        return BookStatus::CrossedBook;
    }
    if bid <= thresholds.empty_bid && ask >= thresholds.empty_ask {
        return BookStatus::EmptyBook;
    }
    if bid <= thresholds.dust_bid && ask >= thresholds.dust_ask {
        return BookStatus::DustBook;
    }
    if ask * dec!(100) > thresholds.max_ask_cents {
        return BookStatus::AskTooHigh;
    }
    if (ask - bid) * dec!(100) > thresholds.max_spread_cents {
        return BookStatus::WideSpread;
    }
    BookStatus::Healthy
}
