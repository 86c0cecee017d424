//! Execution types

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Order side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Side {
    Buy,
    Sell,
}

/// Order protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderType {
    /// Fill immediately or be voided
    ImmediateOrCancel,
    /// Rest on the book until matched
    Limit,
}

impl OrderType {
    pub fn is_immediate(&self) -> bool {
        matches!(self, OrderType::ImmediateOrCancel)
    }
}

/// An order handed to the submitter
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderRequest {
    pub token_id: String,
    pub side: Side,
    /// Size in shares
    pub shares: Decimal,
    /// Worst acceptable price
    pub limit_price: Decimal,
    pub order_type: OrderType,
}

/// Exchange response to a submission
///
/// `success` only means the exchange accepted the request. Whether anything
/// filled is carried by `status` and the amount fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OrderResponse {
    pub success: bool,
    #[serde(default)]
    pub order_id: Option<String>,
    /// Exchange status (`matched`, `live`, `delayed`, `unmatched`, ...)
    #[serde(default)]
    pub status: Option<String>,
    /// Amount given up (shares for a sell)
    #[serde(default)]
    pub making_amount: Option<Decimal>,
    /// Amount received (USDC for a sell)
    #[serde(default)]
    pub taking_amount: Option<Decimal>,
    #[serde(default)]
    pub error: Option<String>,
}

impl OrderResponse {
    /// Status reports a match and both amounts are positive
    pub fn is_filled(&self) -> bool {
        let matched = self
            .status
            .as_deref()
            .map(|s| s.eq_ignore_ascii_case("matched") || s.eq_ignore_ascii_case("filled"))
            .unwrap_or(false);
        let positive = |amount: Option<Decimal>| amount.map(|a| a > Decimal::ZERO).unwrap_or(false);

        matched && positive(self.making_amount) && positive(self.taking_amount)
    }
}

/// Submission transport errors
#[derive(Debug, Clone, PartialEq, Error)]
pub enum SubmitError {
    #[error("Submission timed out")]
    Timeout,
    #[error("Submission transport error: {0}")]
    Transport(String),
}

/// A simulated or confirmed fill
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub order_id: String,
    pub token_id: String,
    pub side: Side,
    /// Average fill price
    pub price: Decimal,
    pub shares: Decimal,
    pub timestamp: DateTime<Utc>,
}
