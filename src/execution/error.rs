//! Sell failure taxonomy

use crate::snapshot::SnapshotIntegrityError;
use rust_decimal::Decimal;
use thiserror::Error;

/// Why a sell attempt did not complete
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SellError {
    #[error("Order book for {0} is empty")]
    EmptyBook(String),
    #[error("Market for {0} is closed")]
    MarketClosed(String),
    #[error("Trading blocked: {0}")]
    Blocked(String),
    #[error("Snapshot drift: {0}")]
    SnapshotDrift(#[from] SnapshotIntegrityError),
    #[error("Liquidity ${available} below floor ${floor}")]
    LiquidityBelowFloor { available: Decimal, floor: Decimal },
    #[error("Only {fillable} of {requested} shares fillable within slippage")]
    InsufficientLiquidity { fillable: Decimal, requested: Decimal },
    #[error("Insufficient balance: {0}")]
    InsufficientBalance(String),
    #[error("Insufficient allowance: {0}")]
    InsufficientAllowance(String),
    #[error("Order not filled (status {status})")]
    NotFilled { status: String },
    #[error("Transport error: {0}")]
    Transport(String),
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl SellError {
    /// Stable code for logs and operator dashboards
    pub fn reason_code(&self) -> &'static str {
        match self {
            SellError::EmptyBook(_) => "EMPTY_BOOK",
            SellError::MarketClosed(_) => "MARKET_CLOSED",
            SellError::Blocked(_) => "BLOCKED",
            SellError::SnapshotDrift(_) => "SNAPSHOT_DRIFT",
            SellError::LiquidityBelowFloor { .. } => "LIQUIDITY_BELOW_FLOOR",
            SellError::InsufficientLiquidity { .. } => "INSUFFICIENT_LIQUIDITY",
            SellError::InsufficientBalance(_) => "INSUFFICIENT_BALANCE",
            SellError::InsufficientAllowance(_) => "INSUFFICIENT_ALLOWANCE",
            SellError::NotFilled { .. } => "NOT_FILLED",
            SellError::Transport(_) => "TRANSPORT",
            SellError::Unknown(_) => "UNKNOWN",
        }
    }

    /// Failures that may succeed if retried later
    pub fn is_retryable(&self) -> bool {
        matches!(self, SellError::Transport(_) | SellError::NotFilled { .. })
    }

    /// Map an exchange rejection message onto a specific reason
    pub fn from_rejection(message: &str) -> Self {
        let lower = message.to_ascii_lowercase();

        if lower.contains("balance") {
            SellError::InsufficientBalance(message.to_string())
        } else if lower.contains("allowance") {
            SellError::InsufficientAllowance(message.to_string())
        } else if lower.contains("not filled")
            || lower.contains("couldn't be fully filled")
            || lower.contains("no match")
            || lower.contains("unmatched")
        {
            SellError::NotFilled {
                status: message.to_string(),
            }
        } else if lower.contains("403")
            || lower.contains("forbidden")
            || lower.contains("restricted")
            || lower.contains("geoblock")
            || lower.contains("blocked")
        {
            SellError::Blocked(message.to_string())
        } else {
            SellError::Unknown(message.to_string())
        }
    }
}
