//! Low-liquidity detection
//!
//! Four independent signals sampled over a rolling window: traded volume,
//! average book depth, book stagnation, and active target wallets. A signal
//! only counts once its stream has delivered at least one sample, so a quiet
//! start-up never looks like a dead market.

use crate::config::ScavengerConfig;
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{HashMap, HashSet, VecDeque};

/// Top of book tracked for stagnation
#[derive(Debug, Clone, Copy)]
struct BookObservation {
    bid: Decimal,
    ask: Decimal,
    seen_at: DateTime<Utc>,
    /// Last time bid or ask moved by more than the stagnation threshold
    changed_at: DateTime<Utc>,
}

/// One evaluation of every signal
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct LiquiditySignals {
    /// Windowed traded volume, `None` before any trade was seen
    pub volume_usd: Option<Decimal>,
    /// Windowed average depth, `None` without depth samples in the window
    pub avg_depth_usd: Option<Decimal>,
    /// Books in the window, and how many of them are stagnant
    pub tracked_books: usize,
    pub stagnant_books: usize,
    /// Distinct active target wallets, `None` before any activity was seen
    pub active_targets: Option<usize>,

    pub low_volume: bool,
    pub low_depth: bool,
    pub stagnant: bool,
    pub few_targets: bool,

    pub volume_recovered: bool,
    pub depth_recovered: bool,
    pub targets_recovered: bool,
}

impl LiquiditySignals {
    /// Number of low-liquidity signals firing
    pub fn low_count(&self) -> usize {
        [self.low_volume, self.low_depth, self.stagnant, self.few_targets]
            .iter()
            .filter(|&&fired| fired)
            .count()
    }

    /// At least two of the four signals fire
    pub fn is_low(&self) -> bool {
        self.low_count() >= 2
    }

    /// Recovery flags in a fixed order: volume, depth, targets
    pub fn recovery(&self) -> [bool; 3] {
        [self.volume_recovered, self.depth_recovered, self.targets_recovered]
    }
}

/// Rolling-window sample store
pub struct LiquidityDetector {
    config: ScavengerConfig,
    window: Duration,
    volume: VecDeque<(DateTime<Utc>, Decimal)>,
    depth: VecDeque<(DateTime<Utc>, Decimal)>,
    targets: VecDeque<(DateTime<Utc>, String)>,
    books: HashMap<String, BookObservation>,
    volume_seen: bool,
    targets_seen: bool,
}

impl LiquidityDetector {
    pub fn new(config: ScavengerConfig) -> Self {
        Self {
            window: config.detection_window(),
            config,
            volume: VecDeque::new(),
            depth: VecDeque::new(),
            targets: VecDeque::new(),
            books: HashMap::new(),
            volume_seen: false,
            targets_seen: false,
        }
    }

    pub fn record_volume_at(&mut self, now: DateTime<Utc>, usd: Decimal) {
        self.volume.push_back((now, usd));
        self.volume_seen = true;
        self.prune(now);
    }

    pub fn record_depth_at(&mut self, now: DateTime<Utc>, usd: Decimal) {
        self.depth.push_back((now, usd));
        self.prune(now);
    }

    pub fn record_target_activity_at(&mut self, now: DateTime<Utc>, wallet: &str) {
        self.targets.push_back((now, wallet.to_string()));
        self.targets_seen = true;
        self.prune(now);
    }

    /// A watched-wallet poll came back, even if it found no trades
    pub fn record_target_poll_at(&mut self, now: DateTime<Utc>) {
        self.targets_seen = true;
        self.prune(now);
    }

    /// Track a token's top of book for stagnation
    pub fn record_book_at(
        &mut self,
        now: DateTime<Utc>,
        token_id: &str,
        bid: Decimal,
        ask: Decimal,
    ) {
        let threshold = self.config.stagnation_pct;
        let moved = |old: Decimal, new: Decimal| {
            if old.is_zero() {
                return !new.is_zero();
            }
            ((new - old) / old).abs() * Decimal::ONE_HUNDRED > threshold
        };

        match self.books.get_mut(token_id) {
            Some(obs) => {
                if moved(obs.bid, bid) || moved(obs.ask, ask) {
                    obs.bid = bid;
                    obs.ask = ask;
                    obs.changed_at = now;
                }
                obs.seen_at = now;
            }
            None => {
                self.books.insert(
                    token_id.to_string(),
                    BookObservation {
                        bid,
                        ask,
                        seen_at: now,
                        changed_at: now,
                    },
                );
            }
        }
        self.prune(now);
    }

    fn prune(&mut self, now: DateTime<Utc>) {
        let cutoff = now - self.window;
        while self.volume.front().is_some_and(|(ts, _)| *ts < cutoff) {
            self.volume.pop_front();
        }
        while self.depth.front().is_some_and(|(ts, _)| *ts < cutoff) {
            self.depth.pop_front();
        }
        while self.targets.front().is_some_and(|(ts, _)| *ts < cutoff) {
            self.targets.pop_front();
        }
        self.books.retain(|_, obs| obs.seen_at >= cutoff);
    }

    /// Evaluate all signals as of `now`
    pub fn signals_at(&self, now: DateTime<Utc>) -> LiquiditySignals {
        let cutoff = now - self.window;
        let c = &self.config;

        let volume_usd = self.volume_seen.then(|| {
            self.volume
                .iter()
                .filter(|(ts, _)| *ts >= cutoff)
                .map(|(_, usd)| *usd)
                .sum::<Decimal>()
        });

        let depths: Vec<Decimal> = self
            .depth
            .iter()
            .filter(|(ts, _)| *ts >= cutoff)
            .map(|(_, usd)| *usd)
            .collect();
        let avg_depth_usd = (!depths.is_empty())
            .then(|| depths.iter().sum::<Decimal>() / Decimal::from(depths.len()));

        let live_books: Vec<&BookObservation> =
            self.books.values().filter(|obs| obs.seen_at >= cutoff).collect();
        let stagnant_books = live_books
            .iter()
            .filter(|obs| now - obs.changed_at >= self.config.stagnation())
            .count();

        let active_targets = self.targets_seen.then(|| {
            self.targets
                .iter()
                .filter(|(ts, _)| *ts >= cutoff)
                .map(|(_, wallet)| wallet.as_str())
                .collect::<HashSet<_>>()
                .len()
        });

        LiquiditySignals {
            low_volume: volume_usd.is_some_and(|v| v < c.low_volume_usd),
            low_depth: avg_depth_usd.is_some_and(|d| d < c.low_depth_usd),
            stagnant: !live_books.is_empty() && stagnant_books == live_books.len(),
            few_targets: active_targets.is_some_and(|n| n < c.min_active_targets),
            volume_recovered: volume_usd.is_some_and(|v| v >= c.recovery_volume_usd),
            depth_recovered: avg_depth_usd.is_some_and(|d| d >= c.recovery_depth_usd),
            targets_recovered: active_targets.is_some_and(|n| n >= c.recovery_active_targets),
            volume_usd,
            avg_depth_usd,
            tracked_books: live_books.len(),
            stagnant_books,
            active_targets,
        }
    }

    pub fn reset(&mut self) {
        self.volume.clear();
        self.depth.clear();
        self.targets.clear();
        self.books.clear();
        self.volume_seen = false;
        self.targets_seen = false;
    }
}
