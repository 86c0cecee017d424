//! Execution module
//!
//! Liquidity analysis, smart sell, and the order submission seam (paper or
//! an external signer).

mod error;
mod liquidity;
mod paper;
mod smart_sell;
mod types;

pub use error::SellError;
pub use liquidity::{
    analyze_liquidity, analyze_liquidity_with_fill_ratio, calculate_optimal_slippage,
    determine_order_type, LiquidityAnalysis, MIN_FILL_RATIO,
};
pub use paper::PaperSubmitter;
pub use smart_sell::{
    check_sell_profitability, get_sell_recommendation, ProfitabilityCheck, SellAction,
    SellOutcome, SellRecommendation, SellRequest, SmartSeller, CLOB_ENDPOINT,
};
pub use types::{Fill, OrderRequest, OrderResponse, OrderType, Side, SubmitError};

use async_trait::async_trait;

/// Trait for order submission implementations
#[async_trait]
pub trait OrderSubmitter: Send + Sync {
    /// Submit an order and return the exchange's raw response
    async fn submit_order(&self, order: OrderRequest) -> Result<OrderResponse, SubmitError>;
}
