//! Per-attempt market snapshots
//!
//! A snapshot is the single quote an execution attempt decides on. It is
//! built once, never mutated, and checked against the live book right before
//! capital is committed.

mod integrity;
mod service;

pub use integrity::{
    assert_snapshot_integrity, report_integrity_violation, verify_snapshot_integrity,
    SnapshotIntegrityError, INTEGRITY_EPSILON,
};
pub use service::SnapshotService;

use crate::orderbook::{classify_book_status, BookStatus, BookThresholds};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

/// Bid used for placeholder snapshots
pub const PLACEHOLDER_BID: Decimal = dec!(0.01);
/// Ask used for placeholder snapshots
pub const PLACEHOLDER_ASK: Decimal = dec!(0.99);

/// Where a snapshot's quote came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SnapshotSource {
    /// Fresh entry in the market data store
    StreamCache,
    /// Direct REST poll
    Poll,
}

/// Immutable quote for one execution attempt
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketSnapshot {
    token_id: String,
    market_id: Option<String>,
    best_bid: Decimal,
    best_ask: Decimal,
    mid: Decimal,
    spread_cents: Decimal,
    book_status: BookStatus,
    source: SnapshotSource,
    fetched_at: DateTime<Utc>,
    attempt_id: String,
    placeholder: bool,
}

impl MarketSnapshot {
    /// Build a classified snapshot
    ///
    /// A missing side classifies the book as invalid and is recorded at the
    /// extreme price (bid 0, ask 1).
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        token_id: impl Into<String>,
        market_id: Option<String>,
        best_bid: Option<Decimal>,
        best_ask: Option<Decimal>,
        source: SnapshotSource,
        attempt_id: impl Into<String>,
        fetched_at: DateTime<Utc>,
        thresholds: &BookThresholds,
    ) -> Self {
        let book_status = classify_book_status(best_bid, best_ask, thresholds);
        let bid = best_bid.unwrap_or(Decimal::ZERO);
        let ask = best_ask.unwrap_or(Decimal::ONE);

        Self {
            token_id: token_id.into(),
            market_id,
            best_bid: bid,
            best_ask: ask,
            mid: (bid + ask) / Decimal::TWO,
            spread_cents: (ask - bid) * Decimal::ONE_HUNDRED,
            book_status,
            source,
            fetched_at,
            attempt_id: attempt_id.into(),
            placeholder: false,
        }
    }

    /// Snapshot standing in for a quote that could not be fetched
    ///
    /// Carries extreme prices so every downstream health check rejects it.
    pub fn placeholder(
        token_id: impl Into<String>,
        market_id: Option<String>,
        attempt_id: impl Into<String>,
        fetched_at: DateTime<Utc>,
        thresholds: &BookThresholds,
    ) -> Self {
        let mut snapshot = Self::new(
            token_id,
            market_id,
            Some(PLACEHOLDER_BID),
            Some(PLACEHOLDER_ASK),
            SnapshotSource::Poll,
            attempt_id,
            fetched_at,
            thresholds,
        );
        snapshot.placeholder = true;
        snapshot
    }

    pub fn token_id(&self) -> &str {
        &self.token_id
    }

    pub fn market_id(&self) -> Option<&str> {
        self.market_id.as_deref()
    }

    pub fn best_bid(&self) -> Decimal {
        self.best_bid
    }

    pub fn best_ask(&self) -> Decimal {
        self.best_ask
    }

    pub fn mid(&self) -> Decimal {
        self.mid
    }

    pub fn spread_cents(&self) -> Decimal {
        self.spread_cents
    }

    pub fn book_status(&self) -> BookStatus {
        self.book_status
    }

    pub fn source(&self) -> SnapshotSource {
        self.source
    }

    pub fn fetched_at(&self) -> DateTime<Utc> {
        self.fetched_at
    }

    pub fn attempt_id(&self) -> &str {
        &self.attempt_id
    }

    pub fn is_placeholder(&self) -> bool {
        self.placeholder
    }

    /// Healthy and backed by a real quote
    pub fn is_tradeable(&self) -> bool {
        !self.placeholder && self.book_status.is_healthy()
    }
}
