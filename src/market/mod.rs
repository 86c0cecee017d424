//! Market data and account sources
//!
//! Traits for the pull-side collaborators (order book polls, positions,
//! wallet trades) and the Polymarket REST client implementing them.

mod clob;
mod watcher;

pub use clob::{ClobConfig, ClobRestClient, CLOB_API_URL, DATA_API_URL};
pub use watcher::WalletWatcher;

use crate::orderbook::OrderBook;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned by market sources
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SourceError {
    #[error("Request timed out")]
    Timeout,
    #[error("Transport error: {0}")]
    Transport(String),
    /// The exchange has no book for this token (resolved or closed market)
    #[error("Market closed: {0}")]
    MarketClosed(String),
    #[error("Malformed response: {0}")]
    Malformed(String),
}

impl SourceError {
    /// Transport-level failures worth retrying later
    pub fn is_transient(&self) -> bool {
        matches!(self, SourceError::Timeout | SourceError::Transport(_))
    }
}

/// Pull-side order book source
#[async_trait]
pub trait OrderBookSource: Send + Sync {
    /// Fetch the current book for a token
    async fn poll_order_book(&self, token_id: &str) -> Result<OrderBook, SourceError>;
}

/// Account position source
#[async_trait]
pub trait PositionSource: Send + Sync {
    /// Fetch open positions for a wallet address
    async fn get_positions(&self, address: &str) -> Result<Vec<Position>, SourceError>;
}

/// Wallet trade history source
#[async_trait]
pub trait TradeSource: Send + Sync {
    /// Fetch the most recent trades made by a wallet
    async fn get_trades(&self, address: &str) -> Result<Vec<WalletTrade>, SourceError>;
}

/// A fill made by a watched wallet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WalletTrade {
    pub wallet: String,
    pub token_id: String,
    pub market_id: Option<String>,
    pub price: Decimal,
    pub size: Decimal,
    pub timestamp: DateTime<Utc>,
}

/// An open position in one outcome token
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub token_id: String,
    /// Condition ID of the market
    pub market_id: Option<String>,
    pub shares: Decimal,
    /// Average entry price
    pub avg_price: Decimal,
    /// Last known mark price
    pub current_price: Decimal,
    pub title: Option<String>,
}

impl Position {
    pub fn new(
        token_id: impl Into<String>,
        shares: Decimal,
        avg_price: Decimal,
        current_price: Decimal,
    ) -> Self {
        Self {
            token_id: token_id.into(),
            market_id: None,
            shares,
            avg_price,
            current_price,
            title: None,
        }
    }

    pub fn cost_basis(&self) -> Decimal {
        self.shares * self.avg_price
    }

    pub fn current_value(&self) -> Decimal {
        self.shares * self.current_price
    }

    pub fn pnl(&self) -> Decimal {
        self.current_value() - self.cost_basis()
    }

    /// Unrealized P&L in percent of cost basis
    pub fn pnl_pct(&self) -> Decimal {
        self.pnl_pct_at(self.current_price)
    }

    /// P&L in percent of cost basis if exited at `price`
    pub fn pnl_pct_at(&self, price: Decimal) -> Decimal {
        if self.avg_price.is_zero() {
            return Decimal::ZERO;
        }
        (price - self.avg_price) / self.avg_price * Decimal::ONE_HUNDRED
    }
}
