//! Market scanner
//!
//! Filters per-token book observations down to trade candidates: the book
//! must sit in the safe price zone with a tight spread and real bid depth,
//! and something must be happening (the mid moved, or watched wallets are
//! trading it).

mod filter;

pub use filter::{MarketScanner, ScannerStats};

use crate::orderbook::OrderBook;
use crate::snapshot::MarketSnapshot;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

/// Why a candidate fired
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CandidateReason {
    /// Mid moved at least the configured band within the window
    Movement,
    /// Enough watched-wallet trades within the window
    Leaderboard,
}

/// A token worth looking at
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScannerCandidate {
    pub market_id: String,
    pub token_id: String,
    pub reason: CandidateReason,
    pub mid: Decimal,
    pub spread_cents: Decimal,
    pub bid_depth_usd: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// Gate a token failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanGate {
    MissingSide,
    OutsideSafeZone,
    WideSpread,
    ThinBids,
}

/// One observation of a token's book
#[derive(Debug, Clone, PartialEq)]
pub struct ScanInput {
    pub market_id: String,
    pub token_id: String,
    pub best_bid: Option<Decimal>,
    pub best_ask: Option<Decimal>,
    pub bid_depth_usd: Decimal,
}

impl ScanInput {
    pub fn from_book(market_id: impl Into<String>, book: &OrderBook) -> Self {
        Self {
            market_id: market_id.into(),
            token_id: book.token_id.clone(),
            best_bid: book.best_bid(),
            best_ask: book.best_ask(),
            bid_depth_usd: book.bid_depth_usd(),
        }
    }

    /// Placeholder snapshots carry no usable prices
    pub fn from_snapshot(snapshot: &MarketSnapshot, bid_depth_usd: Decimal) -> Self {
        let usable = !snapshot.is_placeholder();
        Self {
            market_id: snapshot.market_id().unwrap_or_default().to_string(),
            token_id: snapshot.token_id().to_string(),
            best_bid: usable.then(|| snapshot.best_bid()),
            best_ask: usable.then(|| snapshot.best_ask()),
            bid_depth_usd,
        }
    }
}
