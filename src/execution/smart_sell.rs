//! Smart sell
//!
//! Liquidity-aware exits: walk the live bid side, pick slippage and order
//! protocol, guard against snapshot drift, submit, and refuse to count an
//! immediate order as done until the exchange reports an actual fill.

use super::liquidity::{
    analyze_liquidity_with_fill_ratio, calculate_optimal_slippage, determine_order_type,
};
use super::{
    LiquidityAnalysis, OrderRequest, OrderSubmitter, OrderType, SellError, Side, SubmitError,
};
use crate::config::SellConfig;
use crate::latency::LatencyMonitor;
use crate::market::{OrderBookSource, Position, SourceError};
use crate::orderbook::{OrderBook, PriceLevel};
use crate::snapshot::{
    report_integrity_violation, verify_snapshot_integrity, MarketSnapshot, INTEGRITY_EPSILON,
};
use crate::telemetry::{increment_counter, record_latency, CounterMetric, LatencyMetric};
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Latency monitor endpoint fed by book fetches and order submissions
pub const CLOB_ENDPOINT: &str = "clob";

/// A request to exit (part of) a position
#[derive(Debug, Clone, PartialEq)]
pub struct SellRequest {
    pub token_id: String,
    pub shares: Decimal,
    pub entry_price: Decimal,
    /// Latest mark price, used to pick the slippage band
    pub current_price: Decimal,
    /// Skip liquidity rejections and sell at the widest band
    pub force: bool,
    pub slippage_pct: Option<Decimal>,
    pub order_type: Option<OrderType>,
}

impl SellRequest {
    pub fn new(
        token_id: impl Into<String>,
        shares: Decimal,
        entry_price: Decimal,
        current_price: Decimal,
    ) -> Self {
        Self {
            token_id: token_id.into(),
            shares,
            entry_price,
            current_price,
            force: false,
            slippage_pct: None,
            order_type: None,
        }
    }

    /// Sell at the snapshot's best bid
    pub fn from_snapshot(snapshot: &MarketSnapshot, shares: Decimal, entry_price: Decimal) -> Self {
        Self::new(snapshot.token_id(), shares, entry_price, snapshot.best_bid())
    }

    /// Sell the whole position at its current mark
    pub fn for_position(position: &Position) -> Self {
        Self::new(
            position.token_id.clone(),
            position.shares,
            position.avg_price,
            position.current_price,
        )
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }

    pub fn with_slippage(mut self, pct: Decimal) -> Self {
        self.slippage_pct = Some(pct);
        self
    }

    pub fn with_order_type(mut self, order_type: OrderType) -> Self {
        self.order_type = Some(order_type);
        self
    }

    /// Loss versus entry in percent (negative when in profit)
    pub fn loss_pct(&self) -> Decimal {
        if self.entry_price.is_zero() {
            return Decimal::ZERO;
        }
        (self.entry_price - self.current_price) / self.entry_price * Decimal::ONE_HUNDRED
    }
}

/// A completed sell submission
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SellOutcome {
    pub token_id: String,
    pub order_id: Option<String>,
    pub order_type: OrderType,
    pub limit_price: Decimal,
    pub slippage_pct: Decimal,
    pub shares_requested: Decimal,
    /// Zero for a resting order
    pub filled_shares: Decimal,
    pub proceeds_usd: Decimal,
    pub status: String,
    pub analysis: LiquidityAnalysis,
}

impl SellOutcome {
    pub fn is_resting(&self) -> bool {
        self.order_type == OrderType::Limit
    }
}

/// Expected result of selling now
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfitabilityCheck {
    pub expected_price: Decimal,
    pub expected_proceeds: Decimal,
    pub cost_basis: Decimal,
    pub pnl: Decimal,
    pub pnl_pct: Decimal,
    pub profitable: bool,
    pub slippage_pct: Decimal,
    pub analysis: LiquidityAnalysis,
}

/// Recommended action for a position
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SellAction {
    SellNow,
    PostLimit,
    Hold,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SellRecommendation {
    pub action: SellAction,
    pub reason: String,
    pub order_type: Option<OrderType>,
    pub profitability: ProfitabilityCheck,
}

/// Proceeds and P&L of selling into `bids` now
pub fn check_sell_profitability(
    request: &SellRequest,
    bids: &[PriceLevel],
    config: &SellConfig,
) -> ProfitabilityCheck {
    let slippage_pct = calculate_optimal_slippage(request, config);
    let analysis = analyze_liquidity_with_fill_ratio(
        bids,
        request.shares,
        slippage_pct,
        config.min_fill_ratio,
    );

    let expected_price = analysis.expected_avg_price;
    let expected_proceeds = expected_price * request.shares;
    let cost_basis = request.entry_price * request.shares;
    let pnl_pct = if request.entry_price.is_zero() {
        Decimal::ZERO
    } else {
        (expected_price - request.entry_price) / request.entry_price * Decimal::ONE_HUNDRED
    };

    ProfitabilityCheck {
        expected_price,
        expected_proceeds,
        cost_basis,
        pnl: expected_proceeds - cost_basis,
        pnl_pct,
        profitable: analysis.total_filled > Decimal::ZERO && pnl_pct >= config.min_profit_pct,
        slippage_pct,
        analysis,
    }
}

/// Sell now, post a limit, or hold
pub fn get_sell_recommendation(
    request: &SellRequest,
    bids: &[PriceLevel],
    config: &SellConfig,
) -> SellRecommendation {
    let profitability = check_sell_profitability(request, bids, config);

    if bids.is_empty() {
        return SellRecommendation {
            action: SellAction::Hold,
            reason: "no bids on the book".to_string(),
            order_type: None,
            profitability,
        };
    }

    let order_type = determine_order_type(&profitability.analysis, request, config);
    let act = match order_type {
        OrderType::ImmediateOrCancel => SellAction::SellNow,
        OrderType::Limit => SellAction::PostLimit,
    };

    let (action, reason) = if request.force {
        (act, "forced exit".to_string())
    } else if profitability.profitable {
        (act, format!("profitable at {:.2}%", profitability.pnl_pct))
    } else if profitability.pnl_pct <= -config.loss_threshold_pct {
        (
            act,
            format!("loss of {:.2}% beyond threshold, prioritizing exit", -profitability.pnl_pct),
        )
    } else {
        (
            SellAction::Hold,
            format!(
                "P&L {:.2}% below {}% floor",
                profitability.pnl_pct, config.min_profit_pct
            ),
        )
    };

    SellRecommendation {
        order_type: (action != SellAction::Hold).then_some(order_type),
        action,
        reason,
        profitability,
    }
}

/// Immediate orders are priced at the slippage floor, rounded down to a tick
fn immediate_limit_price(best_bid: Decimal, slippage_pct: Decimal, tick: Decimal) -> Decimal {
    let floor = best_bid * (Decimal::ONE - slippage_pct / Decimal::ONE_HUNDRED);
    if tick <= Decimal::ZERO {
        return floor;
    }
    ((floor / tick).floor() * tick).max(tick)
}

/// Executes sells against the live book
#[derive(Clone)]
pub struct SmartSeller {
    books: Arc<dyn OrderBookSource>,
    submitter: Arc<dyn OrderSubmitter>,
    latency: Option<LatencyMonitor>,
    config: SellConfig,
    epsilon: Decimal,
}

impl SmartSeller {
    pub fn new(
        books: Arc<dyn OrderBookSource>,
        submitter: Arc<dyn OrderSubmitter>,
        config: SellConfig,
    ) -> Self {
        Self {
            books,
            submitter,
            latency: None,
            config,
            epsilon: INTEGRITY_EPSILON,
        }
    }

    /// Refuse to sell while the latency monitor blocks trading
    pub fn with_latency_gate(mut self, monitor: LatencyMonitor) -> Self {
        self.latency = Some(monitor);
        self
    }

    pub fn with_integrity_epsilon(mut self, epsilon: Decimal) -> Self {
        self.epsilon = epsilon;
        self
    }

    pub fn config(&self) -> &SellConfig {
        &self.config
    }

    async fn live_book(&self, token_id: &str) -> Result<OrderBook, SellError> {
        let started = Instant::now();
        let result = tokio::time::timeout(
            self.config.book_timeout(),
            self.books.poll_order_book(token_id),
        )
        .await
        .unwrap_or(Err(SourceError::Timeout));
        let elapsed = started.elapsed();
        record_latency(LatencyMetric::BookPoll, elapsed);
        let reached = !matches!(&result, Err(e) if e.is_transient());
        self.record_endpoint(elapsed, reached).await;

        match result {
            Ok(book) => Ok(book),
            Err(SourceError::MarketClosed(_)) => Err(SellError::MarketClosed(token_id.to_string())),
            Err(e) => Err(SellError::Transport(e.to_string())),
        }
    }

    /// Feed a call outcome into the latency gate
    async fn record_endpoint(&self, elapsed: Duration, success: bool) {
        if let Some(monitor) = &self.latency {
            monitor
                .record(CLOB_ENDPOINT, elapsed.as_secs_f64() * 1_000.0, success)
                .await;
        }
    }

    /// Proceeds and P&L of selling into the live book
    pub async fn check_sell_profitability(
        &self,
        request: &SellRequest,
    ) -> Result<ProfitabilityCheck, SellError> {
        let book = self.live_book(&request.token_id).await?;
        Ok(check_sell_profitability(request, &book.bids, &self.config))
    }

    /// Recommended action against the live book
    pub async fn get_sell_recommendation(
        &self,
        request: &SellRequest,
    ) -> Result<SellRecommendation, SellError> {
        let book = self.live_book(&request.token_id).await?;
        Ok(get_sell_recommendation(request, &book.bids, &self.config))
    }

    /// Sell with liquidity analysis and fill verification
    ///
    /// `snapshot` is the quote the caller decided on. The order is only
    /// submitted while the live book still matches it.
    pub async fn smart_sell(
        &self,
        request: &SellRequest,
        snapshot: &MarketSnapshot,
    ) -> Result<SellOutcome, SellError> {
        let result = self.execute(request, snapshot).await;
        match &result {
            Ok(outcome) => {
                increment_counter(CounterMetric::SellsFilled);
                tracing::info!(
                    token_id = %request.token_id,
                    order_type = ?outcome.order_type,
                    status = %outcome.status,
                    filled = %outcome.filled_shares,
                    proceeds = %outcome.proceeds_usd,
                    "Sell submitted"
                );
            }
            Err(e) => {
                increment_counter(CounterMetric::SellsFailed);
                tracing::warn!(
                    token_id = %request.token_id,
                    attempt_id = %snapshot.attempt_id(),
                    reason = e.reason_code(),
                    error = %e,
                    "Sell failed"
                );
            }
        }
        result
    }

    async fn execute(
        &self,
        request: &SellRequest,
        snapshot: &MarketSnapshot,
    ) -> Result<SellOutcome, SellError> {
        if let Some(monitor) = &self.latency {
            if let Some(reason) = monitor.block_reason().await {
                increment_counter(CounterMetric::TradingBlocked);
                return Err(SellError::Blocked(reason));
            }
        }

        let book = self.live_book(&request.token_id).await?;
        if book.bids.is_empty() {
            return Err(SellError::EmptyBook(request.token_id.clone()));
        }

        let slippage_pct = calculate_optimal_slippage(request, &self.config);
        let analysis = analyze_liquidity_with_fill_ratio(
            &book.bids,
            request.shares,
            slippage_pct,
            self.config.min_fill_ratio,
        );
        tracing::debug!(
            token_id = %request.token_id,
            slippage_pct = %slippage_pct,
            avg_price = %analysis.expected_avg_price,
            filled = %analysis.total_filled,
            levels = analysis.levels_needed,
            can_fill = analysis.can_fill,
            "Liquidity analysis"
        );

        if !request.force {
            if analysis.available_liquidity_usd < self.config.min_liquidity_usd {
                return Err(SellError::LiquidityBelowFloor {
                    available: analysis.available_liquidity_usd,
                    floor: self.config.min_liquidity_usd,
                });
            }
            if !analysis.can_fill {
                return Err(SellError::InsufficientLiquidity {
                    fillable: analysis.total_filled,
                    requested: request.shares,
                });
            }
        }

        let order_type = determine_order_type(&analysis, request, &self.config);
        let limit_price = match order_type {
            OrderType::ImmediateOrCancel => {
                immediate_limit_price(analysis.best_bid, slippage_pct, self.config.tick_size)
            }
            OrderType::Limit => analysis.best_bid,
        };

        let order = OrderRequest {
            token_id: request.token_id.clone(),
            side: Side::Sell,
            shares: request.shares,
            limit_price,
            order_type,
        };

        let (live_bid, live_ask) = (book.best_bid(), book.best_ask());
        if let Err(e) = verify_snapshot_integrity(snapshot, live_bid, live_ask, self.epsilon) {
            report_integrity_violation(snapshot, live_bid, live_ask, "smart_sell", &e);
            return Err(e.into());
        }

        let started = Instant::now();
        let submitted = tokio::time::timeout(
            self.config.submit_timeout(),
            self.submitter.submit_order(order),
        )
        .await
        .unwrap_or(Err(SubmitError::Timeout));
        let elapsed = started.elapsed();
        record_latency(LatencyMetric::OrderSubmission, elapsed);
        self.record_endpoint(elapsed, submitted.is_ok()).await;

        let response = submitted.map_err(|e| match e {
            SubmitError::Timeout => SellError::Transport("submission timed out".to_string()),
            SubmitError::Transport(msg) => SellError::Transport(msg),
        })?;

        if !response.success {
            let message = response.error.as_deref().unwrap_or("order rejected");
            return Err(SellError::from_rejection(message));
        }

        let status = response.status.clone().unwrap_or_default();
        let (filled_shares, proceeds_usd) = if order_type.is_immediate() {
            if !response.is_filled() {
                return Err(SellError::NotFilled {
                    status: if status.is_empty() { "unknown".to_string() } else { status },
                });
            }
            (
                response.making_amount.unwrap_or_default(),
                response.taking_amount.unwrap_or_default(),
            )
        } else {
            (Decimal::ZERO, Decimal::ZERO)
        };

        Ok(SellOutcome {
            token_id: request.token_id.clone(),
            order_id: response.order_id,
            order_type,
            limit_price,
            slippage_pct,
            shares_requested: request.shares,
            filled_shares,
            proceeds_usd,
            status,
            analysis,
        })
    }
}
