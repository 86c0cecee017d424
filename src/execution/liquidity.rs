//! Liquidity walking
//!
//! Works out what a sell of a given size would actually fetch on the current
//! bid side, and picks the order protocol from that.

use super::{OrderType, SellRequest};
use crate::config::SellConfig;
use crate::orderbook::PriceLevel;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

/// Share of the requested size that counts as a fillable sell
pub const MIN_FILL_RATIO: Decimal = dec!(0.8);

/// Result of walking the bid side for one sell
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LiquidityAnalysis {
    pub best_bid: Decimal,
    /// Shares resting at the best bid
    pub best_bid_depth: Decimal,
    /// Lowest price the walk accepted
    pub min_acceptable_price: Decimal,
    /// Size-weighted average over the consumed levels
    pub expected_avg_price: Decimal,
    /// Average price shortfall versus the best bid, in percent
    pub expected_slippage_pct: Decimal,
    pub total_filled: Decimal,
    /// USD resting at or above the minimum acceptable price
    pub available_liquidity_usd: Decimal,
    pub can_fill: bool,
    pub levels_needed: usize,
    /// Portion of each level the walk would take
    pub levels: Vec<PriceLevel>,
}

impl LiquidityAnalysis {
    fn empty() -> Self {
        Self {
            best_bid: Decimal::ZERO,
            best_bid_depth: Decimal::ZERO,
            min_acceptable_price: Decimal::ZERO,
            expected_avg_price: Decimal::ZERO,
            expected_slippage_pct: Decimal::ZERO,
            total_filled: Decimal::ZERO,
            available_liquidity_usd: Decimal::ZERO,
            can_fill: false,
            levels_needed: 0,
            levels: vec![],
        }
    }

    /// Expected USD proceeds for the shares the walk fills
    pub fn expected_proceeds(&self) -> Decimal {
        self.expected_avg_price * self.total_filled
    }
}

/// Walk `bids` (best first) for a sell of `shares`
pub fn analyze_liquidity(
    bids: &[PriceLevel],
    shares: Decimal,
    max_slippage_pct: Decimal,
) -> LiquidityAnalysis {
    analyze_liquidity_with_fill_ratio(bids, shares, max_slippage_pct, MIN_FILL_RATIO)
}

/// [`analyze_liquidity`] with an explicit fill ratio
///
/// The walk stops at the first level priced below
/// `best_bid * (1 - max_slippage_pct / 100)` or once `shares` are covered.
pub fn analyze_liquidity_with_fill_ratio(
    bids: &[PriceLevel],
    shares: Decimal,
    max_slippage_pct: Decimal,
    min_fill_ratio: Decimal,
) -> LiquidityAnalysis {
    let best = match bids.first() {
        Some(level) => *level,
        None => return LiquidityAnalysis::empty(),
    };

    let min_acceptable_price =
        best.price * (Decimal::ONE - max_slippage_pct / Decimal::ONE_HUNDRED);

    let mut remaining = shares.max(Decimal::ZERO);
    let mut filled = Decimal::ZERO;
    let mut notional = Decimal::ZERO;
    let mut levels = Vec::new();

    for level in bids {
        if remaining <= Decimal::ZERO || level.price < min_acceptable_price {
            break;
        }
        let take = level.size.min(remaining);
        filled += take;
        notional += take * level.price;
        remaining -= take;
        levels.push(PriceLevel::new(level.price, take));
    }

    let available_liquidity_usd =
        crate::orderbook::notional(bids.iter().take_while(|l| l.price >= min_acceptable_price));

    let expected_avg_price = if filled > Decimal::ZERO {
        notional / filled
    } else {
        Decimal::ZERO
    };
    let expected_slippage_pct = if filled > Decimal::ZERO && best.price > Decimal::ZERO {
        (best.price - expected_avg_price) / best.price * Decimal::ONE_HUNDRED
    } else {
        Decimal::ZERO
    };

    LiquidityAnalysis {
        best_bid: best.price,
        best_bid_depth: best.size,
        min_acceptable_price,
        expected_avg_price,
        expected_slippage_pct,
        total_filled: filled,
        available_liquidity_usd,
        can_fill: shares > Decimal::ZERO && filled >= shares * min_fill_ratio,
        levels_needed: levels.len(),
        levels,
    }
}

/// Slippage band for a sell
///
/// An explicit value (request, then config) wins. Otherwise forced sells get
/// the maximum band, positions near resolution a tight one, deep losses a
/// wide one, and everything else the default.
pub fn calculate_optimal_slippage(request: &SellRequest, config: &SellConfig) -> Decimal {
    if let Some(explicit) = request.slippage_pct.or(config.slippage_pct) {
        return explicit;
    }
    if request.force {
        return config.max_slippage_pct;
    }
    if request.current_price >= config.high_price_threshold {
        return config.high_price_slippage_pct;
    }
    if request.loss_pct() > config.loss_threshold_pct {
        return config.loss_slippage_pct;
    }
    config.default_slippage_pct
}

/// Order protocol for a sell
///
/// Immediate-or-cancel when forced or when the book can absorb the size at
/// the top few levels; otherwise a resting limit so the order does not walk
/// down a thin book.
pub fn determine_order_type(
    analysis: &LiquidityAnalysis,
    request: &SellRequest,
    config: &SellConfig,
) -> OrderType {
    if let Some(explicit) = request.order_type.or(config.order_type) {
        return explicit;
    }
    if request.force {
        return OrderType::ImmediateOrCancel;
    }

    let good_liquidity = analysis.can_fill
        && analysis.best_bid_depth >= config.min_best_bid_depth
        && analysis.levels_needed <= config.max_immediate_levels;

    if good_liquidity {
        OrderType::ImmediateOrCancel
    } else {
        OrderType::Limit
    }
}
