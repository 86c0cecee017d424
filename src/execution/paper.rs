//! Paper order submitter
//!
//! Simulates fills against the live book instead of signing and posting
//! orders. Immediate orders walk the opposite side down (or up) to the limit
//! price; resting orders are acknowledged as `live` and never fill.

use super::{Fill, OrderRequest, OrderResponse, OrderSubmitter, OrderType, Side, SubmitError};
use crate::market::{OrderBookSource, SourceError};
use async_trait::async_trait;
use chrono::Utc;
use rust_decimal::Decimal;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Paper trading submitter with simulated fills
pub struct PaperSubmitter {
    books: Arc<dyn OrderBookSource>,
    fills: Arc<RwLock<Vec<Fill>>>,
}

impl PaperSubmitter {
    pub fn new(books: Arc<dyn OrderBookSource>) -> Self {
        Self {
            books,
            fills: Arc::new(RwLock::new(vec![])),
        }
    }

    pub async fn fills(&self) -> Vec<Fill> {
        self.fills.read().await.clone()
    }
}

#[async_trait]
impl OrderSubmitter for PaperSubmitter {
    async fn submit_order(&self, order: OrderRequest) -> Result<OrderResponse, SubmitError> {
        let order_id = uuid::Uuid::new_v4().to_string();

        if order.order_type == OrderType::Limit {
            tracing::info!(
                order_id = %order_id,
                token_id = %order.token_id,
                price = %order.limit_price,
                shares = %order.shares,
                "Paper limit order resting"
            );
            return Ok(OrderResponse {
                success: true,
                order_id: Some(order_id),
                status: Some("live".to_string()),
                ..Default::default()
            });
        }

        let book = match self.books.poll_order_book(&order.token_id).await {
            Ok(book) => book,
            Err(SourceError::Timeout) => return Err(SubmitError::Timeout),
            Err(e) => return Err(SubmitError::Transport(e.to_string())),
        };

        let levels = match order.side {
            Side::Sell => &book.bids,
            Side::Buy => &book.asks,
        };
        let crosses = |price: Decimal| match order.side {
            Side::Sell => price >= order.limit_price,
            Side::Buy => price <= order.limit_price,
        };

        let mut remaining = order.shares;
        let mut shares = Decimal::ZERO;
        let mut notional = Decimal::ZERO;
        for level in levels.iter().take_while(|l| crosses(l.price)) {
            if remaining <= Decimal::ZERO {
                break;
            }
            let take = level.size.min(remaining);
            shares += take;
            notional += take * level.price;
            remaining -= take;
        }

        if shares.is_zero() {
            tracing::info!(
                order_id = %order_id,
                token_id = %order.token_id,
                "Paper order unmatched"
            );
            return Ok(OrderResponse {
                success: true,
                order_id: Some(order_id),
                status: Some("unmatched".to_string()),
                making_amount: Some(Decimal::ZERO),
                taking_amount: Some(Decimal::ZERO),
                error: None,
            });
        }

        let (making, taking) = match order.side {
            Side::Sell => (shares, notional),
            Side::Buy => (notional, shares),
        };

        self.fills.write().await.push(Fill {
            order_id: order_id.clone(),
            token_id: order.token_id.clone(),
            side: order.side,
            price: notional / shares,
            shares,
            timestamp: Utc::now(),
        });

        tracing::info!(
            order_id = %order_id,
            token_id = %order.token_id,
            shares = %shares,
            avg_price = %(notional / shares),
            "Paper order filled"
        );

        Ok(OrderResponse {
            success: true,
            order_id: Some(order_id),
            status: Some("matched".to_string()),
            making_amount: Some(making),
            taking_amount: Some(taking),
            error: None,
        })
    }
}
