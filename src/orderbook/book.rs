//! Order book state management

use super::PriceLevel;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// L2 aggregated order book for a token
///
/// Books built through [`OrderBook::from_levels`] are normalized: bids best
/// (highest) first, asks best (lowest) first, zero-size levels dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderBook {
    /// Token identifier
    pub token_id: String,
    /// Bid levels, sorted best (highest) to worst
    pub bids: Vec<PriceLevel>,
    /// Ask levels, sorted best (lowest) to worst
    pub asks: Vec<PriceLevel>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl OrderBook {
    /// Create a new empty order book
    pub fn new(token_id: impl Into<String>) -> Self {
        Self {
            token_id: token_id.into(),
            bids: vec![],
            asks: vec![],
            updated_at: Utc::now(),
        }
    }

    /// Build a normalized book from raw levels in any order
    pub fn from_levels(
        token_id: impl Into<String>,
        bids: Vec<PriceLevel>,
        asks: Vec<PriceLevel>,
        updated_at: DateTime<Utc>,
    ) -> Self {
        let mut book = Self {
            token_id: token_id.into(),
            bids,
            asks,
            updated_at,
        };
        book.normalize();
        book
    }

    /// Drop empty levels and restore best-first ordering on both sides
    pub fn normalize(&mut self) {
        self.bids.retain(|l| l.size > Decimal::ZERO);
        self.asks.retain(|l| l.size > Decimal::ZERO);
        self.bids.sort_by(|a, b| b.price.cmp(&a.price));
        self.asks.sort_by(|a, b| a.price.cmp(&b.price));
    }

    /// Get best bid price
    pub fn best_bid(&self) -> Option<Decimal> {
        self.bids.first().map(|l| l.price)
    }

    /// Get best ask price
    pub fn best_ask(&self) -> Option<Decimal> {
        self.asks.first().map(|l| l.price)
    }

    /// Get mid price
    pub fn mid_price(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some((bid + ask) / Decimal::TWO),
            _ => None,
        }
    }

    /// Get spread
    pub fn spread(&self) -> Option<Decimal> {
        match (self.best_bid(), self.best_ask()) {
            (Some(bid), Some(ask)) => Some(ask - bid),
            _ => None,
        }
    }

    /// Get best bid size
    pub fn best_bid_size(&self) -> Option<Decimal> {
        self.bids.first().map(|l| l.size)
    }

    /// Both sides have at least one level
    pub fn has_both_sides(&self) -> bool {
        !self.bids.is_empty() && !self.asks.is_empty()
    }

    /// Neither side has any level
    pub fn is_empty(&self) -> bool {
        self.bids.is_empty() && self.asks.is_empty()
    }

    /// Total USD value resting on the bid side
    pub fn bid_depth_usd(&self) -> Decimal {
        notional(&self.bids)
    }

    /// USD value of levels within `window` of the best price on each side
    pub fn depth_within(&self, window: Decimal) -> Decimal {
        let bid_depth = match self.best_bid() {
            Some(best) => notional(self.bids.iter().filter(|l| best - l.price <= window)),
            None => Decimal::ZERO,
        };
        let ask_depth = match self.best_ask() {
            Some(best) => notional(self.asks.iter().filter(|l| l.price - best <= window)),
            None => Decimal::ZERO,
        };
        bid_depth.checked_add(ask_depth).unwrap_or(Decimal::MAX)
    }
}

/// Sum of `price * size`, saturating at `Decimal::MAX`
pub(crate) fn notional<'a>(levels: impl IntoIterator<Item = &'a PriceLevel>) -> Decimal {
    levels
        .into_iter()
        .try_fold(Decimal::ZERO, |acc, l| {
            l.price.checked_mul(l.size).and_then(|v| acc.checked_add(v))
        })
        .unwrap_or(Decimal::MAX)
}
