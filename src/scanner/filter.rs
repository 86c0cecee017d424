//! Candidate filter

use super::{CandidateReason, ScanGate, ScanInput, ScannerCandidate};
use crate::cache::{BoundedCache, CacheStats};
use crate::config::ScannerConfig;
use crate::telemetry::{increment_counter, CounterMetric};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::VecDeque;

/// Scanner bookkeeping counters
#[derive(Debug, Clone, Serialize)]
pub struct ScannerStats {
    pub evaluated: u64,
    pub candidates: u64,
    pub history: CacheStats,
    pub dedup: CacheStats,
    pub watched_trades: CacheStats,
}

/// Per-token candidate filter
///
/// All per-token state lives in bounded caches, so a scanner watching an
/// unbounded set of markets holds at most `max_tracked_tokens` of each.
pub struct MarketScanner {
    config: ScannerConfig,
    history: BoundedCache<String, VecDeque<(DateTime<Utc>, Decimal)>>,
    watched_trades: BoundedCache<String, VecDeque<DateTime<Utc>>>,
    last_fired: BoundedCache<String, DateTime<Utc>>,
    evaluated: u64,
    candidates: u64,
}

impl MarketScanner {
    pub fn new(config: ScannerConfig) -> Self {
        let cap = config.max_tracked_tokens.max(1);
        Self {
            history: BoundedCache::new(cap, config.movement_window()),
            watched_trades: BoundedCache::new(cap, config.leaderboard_window()),
            last_fired: BoundedCache::new(cap, config.dedup_window()),
            config,
            evaluated: 0,
            candidates: 0,
        }
    }

    pub fn config(&self) -> &ScannerConfig {
        &self.config
    }

    pub fn evaluate(&mut self, input: &ScanInput) -> Option<ScannerCandidate> {
        self.evaluate_at(input, Utc::now())
    }

    /// Run one observation through the gates and reasons
    pub fn evaluate_at(
        &mut self,
        input: &ScanInput,
        now: DateTime<Utc>,
    ) -> Option<ScannerCandidate> {
        self.evaluated += 1;

        let (bid, ask) = match (input.best_bid, input.best_ask) {
            (Some(bid), Some(ask)) => (bid, ask),
            _ => {
                tracing::trace!(
                    token_id = %input.token_id,
                    gate = ?ScanGate::MissingSide,
                    "Scanner gate failed"
                );
                return None;
            }
        };
        let mid = (bid + ask) / Decimal::TWO;
        self.record_mid(&input.token_id, mid, now);

        if let Err(gate) = self.check_gates(bid, ask, mid, input.bid_depth_usd) {
            tracing::trace!(
                token_id = %input.token_id,
                gate = ?gate,
                mid = %mid,
                "Scanner gate failed"
            );
            return None;
        }

        let reason = self.reason(&input.token_id, now)?;

        if self.last_fired.contains_key_at(&input.token_id, now) {
            tracing::trace!(token_id = %input.token_id, "Scanner candidate deduplicated");
            return None;
        }
        self.last_fired.insert_at(input.token_id.clone(), now, now);
        self.candidates += 1;
        increment_counter(CounterMetric::ScannerCandidates);

        let candidate = ScannerCandidate {
            market_id: input.market_id.clone(),
            token_id: input.token_id.clone(),
            reason,
            mid,
            spread_cents: (ask - bid) * Decimal::ONE_HUNDRED,
            bid_depth_usd: input.bid_depth_usd,
            timestamp: now,
        };
        tracing::info!(
            market_id = %candidate.market_id,
            token_id = %candidate.token_id,
            reason = ?candidate.reason,
            mid = %candidate.mid,
            spread_cents = %candidate.spread_cents,
            "Scanner candidate"
        );
        Some(candidate)
    }

    fn check_gates(
        &self,
        bid: Decimal,
        ask: Decimal,
        mid: Decimal,
        bid_depth_usd: Decimal,
    ) -> Result<(), ScanGate> {
        let c = &self.config;
        let mid_cents = mid * Decimal::ONE_HUNDRED;
        if mid_cents < c.min_price_cents || mid_cents > c.max_price_cents {
            return Err(ScanGate::OutsideSafeZone);
        }
        if (ask - bid) * Decimal::ONE_HUNDRED > c.max_spread_cents {
            return Err(ScanGate::WideSpread);
        }
        if bid_depth_usd < c.min_bid_depth_usd {
            return Err(ScanGate::ThinBids);
        }
        Ok(())
    }

    fn reason(&mut self, token_id: &str, now: DateTime<Utc>) -> Option<CandidateReason> {
        if self.moved(token_id, now) {
            return Some(CandidateReason::Movement);
        }
        if self.config.leaderboard_enabled
            && self.watched_trade_count(token_id, now) >= self.config.leaderboard_min_trades
        {
            return Some(CandidateReason::Leaderboard);
        }
        None
    }

    /// Re-inserting refreshes the entry, so TTL measures idleness
    fn record_mid(&mut self, token_id: &str, mid: Decimal, now: DateTime<Utc>) {
        let key = token_id.to_string();
        let mut samples = self.history.remove(&key).unwrap_or_default();
        let cutoff = now - self.config.movement_window();
        while samples.front().is_some_and(|(ts, _)| *ts < cutoff) {
            samples.pop_front();
        }
        samples.push_back((now, mid));
        self.history.insert_at(key, samples, now);
    }

    fn moved(&mut self, token_id: &str, now: DateTime<Utc>) -> bool {
        let cutoff = now - self.config.movement_window();
        let Some(samples) = self.history.get_at(&token_id.to_string(), now) else {
            return false;
        };
        let mids = samples.iter().filter(|(ts, _)| *ts >= cutoff).map(|(_, mid)| *mid);
        let (low, high) = mids.fold((None::<Decimal>, None::<Decimal>), |(lo, hi), m| {
            (Some(lo.map_or(m, |l| l.min(m))), Some(hi.map_or(m, |h| h.max(m))))
        });
        match (low, high) {
            (Some(low), Some(high)) => {
                (high - low) * Decimal::ONE_HUNDRED >= self.config.movement_band_cents
            }
            _ => false,
        }
    }

    pub fn record_watched_trade(&mut self, token_id: &str) {
        self.record_watched_trade_at(token_id, Utc::now());
    }

    /// Count a trade by a watched wallet on this token
    pub fn record_watched_trade_at(&mut self, token_id: &str, now: DateTime<Utc>) {
        let key = token_id.to_string();
        let mut trades = self.watched_trades.remove(&key).unwrap_or_default();
        let cutoff = now - self.config.leaderboard_window();
        while trades.front().is_some_and(|ts| *ts < cutoff) {
            trades.pop_front();
        }
        trades.push_back(now);
        self.watched_trades.insert_at(key, trades, now);
    }

    fn watched_trade_count(&mut self, token_id: &str, now: DateTime<Utc>) -> usize {
        let cutoff = now - self.config.leaderboard_window();
        self.watched_trades
            .get_at(&token_id.to_string(), now)
            .map(|trades| trades.iter().filter(|ts| **ts >= cutoff).count())
            .unwrap_or(0)
    }

    pub fn stats(&self) -> ScannerStats {
        ScannerStats {
            evaluated: self.evaluated,
            candidates: self.candidates,
            history: self.history.stats(),
            dedup: self.last_fired.stats(),
            watched_trades: self.watched_trades.stats(),
        }
    }

    pub fn reset(&mut self) {
        self.history.clear();
        self.watched_trades.clear();
        self.last_fired.clear();
        self.evaluated = 0;
        self.candidates = 0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn input(token: &str, bid: Decimal, ask: Decimal, depth: Decimal) -> ScanInput {
        ScanInput {
            market_id: "m".to_string(),
            token_id: token.to_string(),
            best_bid: Some(bid),
            best_ask: Some(ask),
            bid_depth_usd: depth,
        }
    }

    #[test]
    fn test_movement_fires_once_band_crossed() {
        let mut scanner = MarketScanner::new(ScannerConfig::default());
        let t0 = Utc::now();

        assert!(scanner.evaluate_at(&input("a", dec!(0.40), dec!(0.42), dec!(500)), t0).is_none());
        assert!(scanner
            .evaluate_at(&input("a", dec!(0.43), dec!(0.45), dec!(500)), t0 + Duration::seconds(60))
            .is_none());
        let t2 = t0 + Duration::seconds(120);
        let candidate = scanner
            .evaluate_at(&input("a", dec!(0.45), dec!(0.47), dec!(500)), t2)
            .unwrap();

        assert_eq!(candidate.reason, CandidateReason::Movement);
        assert_eq!(candidate.mid, dec!(0.46));
        assert_eq!(candidate.spread_cents, dec!(2));
    }

    #[test]
    fn test_movement_outside_window_is_ignored() {
        let mut scanner = MarketScanner::new(ScannerConfig::default());
        let t0 = Utc::now();
        scanner.evaluate_at(&input("a", dec!(0.40), dec!(0.42), dec!(500)), t0);
        let later = t0 + Duration::seconds(400);
        assert!(scanner
            .evaluate_at(&input("a", dec!(0.45), dec!(0.47), dec!(500)), later)
            .is_none());
    }

    #[test]
    fn test_gates() {
        let config = ScannerConfig::default();
        let scanner = MarketScanner::new(config);
        assert_eq!(
            scanner.check_gates(dec!(0.10), dec!(0.12), dec!(0.11), dec!(500)),
            Err(ScanGate::OutsideSafeZone)
        );
        assert_eq!(
            scanner.check_gates(dec!(0.85), dec!(0.87), dec!(0.86), dec!(500)),
            Err(ScanGate::OutsideSafeZone)
        );
        assert_eq!(
            scanner.check_gates(dec!(0.40), dec!(0.45), dec!(0.425), dec!(500)),
            Err(ScanGate::WideSpread)
        );
        assert_eq!(
            scanner.check_gates(dec!(0.40), dec!(0.42), dec!(0.41), dec!(50)),
            Err(ScanGate::ThinBids)
        );
        assert_eq!(scanner.check_gates(dec!(0.40), dec!(0.42), dec!(0.41), dec!(100)), Ok(()));
    }

    #[test]
    fn test_gate_failure_blocks_movement() {
        let mut scanner = MarketScanner::new(ScannerConfig::default());
        let t0 = Utc::now();
        scanner.evaluate_at(&input("a", dec!(0.40), dec!(0.42), dec!(500)), t0);
        // Moved enough, but the bids are thin
        assert!(scanner
            .evaluate_at(&input("a", dec!(0.46), dec!(0.48), dec!(10)), t0 + Duration::seconds(30))
            .is_none());
    }

    #[test]
    fn test_missing_side_is_skipped() {
        let mut scanner = MarketScanner::new(ScannerConfig::default());
        let mut one_sided = input("a", dec!(0.40), dec!(0.42), dec!(500));
        one_sided.best_ask = None;
        assert!(scanner.evaluate_at(&one_sided, Utc::now()).is_none());
        assert_eq!(scanner.stats().evaluated, 1);
    }

    #[test]
    fn test_dedup_window() {
        let mut scanner = MarketScanner::new(ScannerConfig::default());
        let t0 = Utc::now();
        scanner.evaluate_at(&input("a", dec!(0.40), dec!(0.42), dec!(500)), t0);
        assert!(scanner
            .evaluate_at(&input("a", dec!(0.46), dec!(0.48), dec!(500)), t0 + Duration::seconds(10))
            .is_some());
        assert!(scanner
            .evaluate_at(&input("a", dec!(0.52), dec!(0.54), dec!(500)), t0 + Duration::seconds(20))
            .is_none());

        // Dedup window elapsed, fresh movement fires again
        let t1 = t0 + Duration::seconds(1000);
        scanner.evaluate_at(&input("a", dec!(0.40), dec!(0.42), dec!(500)), t1);
        assert!(scanner
            .evaluate_at(&input("a", dec!(0.46), dec!(0.48), dec!(500)), t1 + Duration::seconds(10))
            .is_some());
        assert_eq!(scanner.stats().candidates, 2);
    }

    #[test]
    fn test_leaderboard_reason() {
        let config = ScannerConfig {
            leaderboard_enabled: true,
            ..Default::default()
        };
        let mut scanner = MarketScanner::new(config);
        let t0 = Utc::now();
        let quiet = input("a", dec!(0.40), dec!(0.42), dec!(500));

        scanner.record_watched_trade_at("a", t0);
        assert!(scanner.evaluate_at(&quiet, t0).is_none());

        scanner.record_watched_trade_at("a", t0 + Duration::seconds(5));
        let candidate = scanner
            .evaluate_at(&quiet, t0 + Duration::seconds(10))
            .unwrap();
        assert_eq!(candidate.reason, CandidateReason::Leaderboard);
    }

    #[test]
    fn test_leaderboard_disabled_by_default() {
        let mut scanner = MarketScanner::new(ScannerConfig::default());
        let t0 = Utc::now();
        for i in 0..5 {
            scanner.record_watched_trade_at("a", t0 + Duration::seconds(i));
        }
        assert!(scanner
            .evaluate_at(&input("a", dec!(0.40), dec!(0.42), dec!(500)), t0 + Duration::seconds(10))
            .is_none());
    }

    #[test]
    fn test_tracked_tokens_are_bounded() {
        let config = ScannerConfig {
            max_tracked_tokens: 2,
            ..Default::default()
        };
        let mut scanner = MarketScanner::new(config);
        let now = Utc::now();
        for token in ["a", "b", "c"] {
            scanner.evaluate_at(&input(token, dec!(0.40), dec!(0.42), dec!(500)), now);
        }
        let stats = scanner.stats();
        assert_eq!(stats.history.entries, 2);
        assert_eq!(stats.history.evictions, 1);
    }
}
