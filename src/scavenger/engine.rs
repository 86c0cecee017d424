//! Scavenger handle and exit cycle

use super::state::{EntryRejection, ModeTransition, ScavengerState};
use super::{LiquidityDetector, LiquiditySignals, ScavengerMode};
use crate::config::ScavengerConfig;
use crate::execution::{SellError, SellOutcome, SellRequest, SmartSeller};
use crate::market::{Position, PositionSource};
use crate::notify::Notifier;
use crate::snapshot::{MarketSnapshot, SnapshotService};
use crate::telemetry::{increment_counter, set_gauge, CounterMetric, GaugeMetric};
use chrono::{DateTime, Utc};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::RwLock;
use tokio::task::JoinHandle;

/// Why a position was exited
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// Profitable and the price stopped moving
    Stalled,
    /// Was losing, climbed back above the profit floor
    Recovered,
}

/// One exit attempt in a cycle
#[derive(Debug)]
pub struct ExitRecord {
    pub token_id: String,
    pub reason: ExitReason,
    pub pnl_pct: Decimal,
    pub result: Result<SellOutcome, SellError>,
}

/// Result of one scavenger cycle
#[derive(Debug)]
pub struct CycleReport {
    pub mode: ScavengerMode,
    pub exits: Vec<ExitRecord>,
    pub newly_monitored: Vec<String>,
    pub deployed_capital_usd: Decimal,
    pub open_positions: usize,
}

impl CycleReport {
    fn idle(mode: ScavengerMode) -> Self {
        Self {
            mode,
            exits: vec![],
            newly_monitored: vec![],
            deployed_capital_usd: Decimal::ZERO,
            open_positions: 0,
        }
    }

    pub fn successful_exits(&self) -> usize {
        self.exits.iter().filter(|e| e.result.is_ok()).count()
    }
}

/// Point-in-time view for reporting
#[derive(Debug, Clone, Serialize)]
pub struct ScavengerStatus {
    pub mode: ScavengerMode,
    pub mode_entered_at: Option<DateTime<Utc>>,
    pub signals: LiquiditySignals,
    pub deployed_capital_usd: Decimal,
    pub open_positions: usize,
    pub monitored_red: usize,
    pub cooldowns: usize,
}

struct Inner {
    detector: LiquidityDetector,
    state: ScavengerState,
}

/// Shared scavenger handle
#[derive(Clone)]
pub struct Scavenger {
    inner: Arc<RwLock<Inner>>,
    config: ScavengerConfig,
    seller: SmartSeller,
    snapshots: SnapshotService,
    notifier: Arc<dyn Notifier>,
}

impl Scavenger {
    pub fn new(
        config: ScavengerConfig,
        seller: SmartSeller,
        snapshots: SnapshotService,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner {
                detector: LiquidityDetector::new(config.clone()),
                state: ScavengerState::new(),
            })),
            config,
            seller,
            snapshots,
            notifier,
        }
    }

    pub fn config(&self) -> &ScavengerConfig {
        &self.config
    }

    pub async fn mode(&self) -> ScavengerMode {
        self.inner.read().await.state.mode
    }

    pub async fn record_volume_at(&self, now: DateTime<Utc>, usd: Decimal) {
        self.inner.write().await.detector.record_volume_at(now, usd);
    }

    pub async fn record_depth_at(&self, now: DateTime<Utc>, usd: Decimal) {
        self.inner.write().await.detector.record_depth_at(now, usd);
    }

    pub async fn record_book_at(
        &self,
        now: DateTime<Utc>,
        token_id: &str,
        bid: Decimal,
        ask: Decimal,
    ) {
        self.inner
            .write()
            .await
            .detector
            .record_book_at(now, token_id, bid, ask);
    }

    pub async fn record_target_activity_at(&self, now: DateTime<Utc>, wallet: &str) {
        self.inner
            .write()
            .await
            .detector
            .record_target_activity_at(now, wallet);
    }

    pub async fn record_target_poll_at(&self, now: DateTime<Utc>) {
        self.inner.write().await.detector.record_target_poll_at(now);
    }

    pub async fn signals_at(&self, now: DateTime<Utc>) -> LiquiditySignals {
        self.inner.read().await.detector.signals_at(now)
    }

    pub async fn evaluate(&self) -> Option<ModeTransition> {
        self.evaluate_at(Utc::now()).await
    }

    /// Evaluate the detector once and apply any mode change
    pub async fn evaluate_at(&self, now: DateTime<Utc>) -> Option<ModeTransition> {
        if !self.config.enabled {
            return None;
        }

        let mut inner = self.inner.write().await;
        let signals = inner.detector.signals_at(now);
        let transition = inner.state.evaluate_at(&signals, now, &self.config);
        drop(inner);
        let transition = transition?;

        increment_counter(CounterMetric::ScavengerModeChanges);
        set_gauge(
            GaugeMetric::ScavengerMode,
            if transition.to == ScavengerMode::Scavenger { 1.0 } else { 0.0 },
        );
        tracing::warn!(
            from = %transition.from,
            to = %transition.to,
            reason = %transition.reason,
            "Scavenger mode changed"
        );
        self.notifier
            .notify(
                &format!("Scavenger mode: {}", transition.to),
                &transition.reason,
            )
            .await;

        Some(transition)
    }

    pub async fn run_scavenger_cycle(&self, positions: &[Position]) -> CycleReport {
        self.run_scavenger_cycle_at(positions, Utc::now()).await
    }

    /// Harvest stalled winners and recovered losers
    ///
    /// Every candidate gets one snapshot per attempt. P&L, stall detection
    /// and the exit order all use that snapshot's best bid, and the sell
    /// aborts if the live book has moved away from it. Decisions are taken
    /// under the lock; snapshots and sells run without it.
    pub async fn run_scavenger_cycle_at(
        &self,
        positions: &[Position],
        now: DateTime<Utc>,
    ) -> CycleReport {
        let held: Vec<&Position> = positions.iter().filter(|p| p.shares > Decimal::ZERO).collect();
        let candidates: Vec<&Position> = {
            let mut inner = self.inner.write().await;
            let state = &mut inner.state;
            if state.mode != ScavengerMode::Scavenger {
                return CycleReport::idle(state.mode);
            }

            let held_tokens: HashSet<&str> = held.iter().map(|p| p.token_id.as_str()).collect();
            state.monitored_red.retain(|token, _| held_tokens.contains(token.as_str()));
            for token in state.settle_resting_exits(&held_tokens) {
                tracing::info!(token_id = %token, "Resting exit filled, reservation released");
            }

            held.iter()
                .copied()
                .filter(|p| state.cooldown_until(&p.token_id, now).is_none())
                .collect()
        };

        let mut quoted = Vec::with_capacity(candidates.len());
        for position in candidates {
            let attempt_id = format!("scavenger-{}", uuid::Uuid::new_v4());
            let snapshot = self
                .snapshots
                .fetch_market_snapshot_for(
                    &position.token_id,
                    position.market_id.as_deref(),
                    Some(attempt_id.as_str()),
                )
                .await;
            if !snapshot.is_tradeable() {
                tracing::debug!(
                    token_id = %position.token_id,
                    attempt_id = %attempt_id,
                    status = %snapshot.book_status(),
                    placeholder = snapshot.is_placeholder(),
                    "No tradeable quote, skipping position this cycle"
                );
                continue;
            }
            quoted.push((position, snapshot));
        }

        let (exits, newly_monitored) = {
            let mut inner = self.inner.write().await;
            let state = &mut inner.state;
            // Mode may have flipped while snapshots were fetched
            if state.mode != ScavengerMode::Scavenger {
                return CycleReport::idle(state.mode);
            }

            let mut exits: Vec<(&Position, MarketSnapshot, ExitReason, Decimal)> = vec![];
            let mut newly_monitored = vec![];
            for (position, snapshot) in quoted {
                let token = position.token_id.as_str();
                let price = snapshot.best_bid();
                state.record_price(token, now, price, self.config.price_history_len);

                if state.resting_exits.contains(token) {
                    continue;
                }

                let pnl_pct = position.pnl_pct_at(price);
                if state.monitored_red.contains_key(token) {
                    if pnl_pct >= self.config.min_profit_pct {
                        exits.push((position, snapshot, ExitReason::Recovered, pnl_pct));
                    }
                } else if pnl_pct < Decimal::ZERO {
                    state.monitored_red.insert(token.to_string(), now);
                    newly_monitored.push(token.to_string());
                    tracing::info!(
                        token_id = %token,
                        pnl_pct = %pnl_pct,
                        "Monitoring losing position"
                    );
                } else if pnl_pct > Decimal::ZERO && state.is_stalled(token, now, &self.config) {
                    exits.push((position, snapshot, ExitReason::Stalled, pnl_pct));
                }
            }
            (exits, newly_monitored)
        };

        let mut records = Vec::with_capacity(exits.len());
        for (position, snapshot, reason, pnl_pct) in exits {
            let request = SellRequest::from_snapshot(&snapshot, position.shares, position.avg_price)
                .with_slippage(self.config.exit_slippage_pct);
            let result = self.seller.smart_sell(&request, &snapshot).await;
            match &result {
                Ok(outcome) => tracing::info!(
                    token_id = %position.token_id,
                    attempt_id = %snapshot.attempt_id(),
                    reason = ?reason,
                    pnl_pct = %pnl_pct,
                    status = %outcome.status,
                    proceeds = %outcome.proceeds_usd,
                    "Scavenger exit"
                ),
                Err(e) => tracing::warn!(
                    token_id = %position.token_id,
                    attempt_id = %snapshot.attempt_id(),
                    reason = ?reason,
                    error = %e,
                    code = e.reason_code(),
                    "Scavenger exit failed"
                ),
            }
            records.push(ExitRecord {
                token_id: position.token_id.clone(),
                reason,
                pnl_pct,
                result,
            });
        }

        let mut inner = self.inner.write().await;
        let state = &mut inner.state;
        // Cooldowns survive a mode flip during the sells
        for record in &records {
            let Ok(outcome) = &record.result else {
                continue;
            };
            state.set_cooldown(&record.token_id, now + self.config.cooldown());
            if outcome.filled_shares > Decimal::ZERO {
                state.monitored_red.remove(&record.token_id);
                state.release_entry(&record.token_id);
            } else {
                state.resting_exits.insert(record.token_id.clone());
            }
        }

        set_gauge(
            GaugeMetric::ScavengerDeployedUsd,
            state.deployed_capital_usd.to_f64().unwrap_or_default(),
        );
        set_gauge(GaugeMetric::ScavengerPositions, state.open_positions.len() as f64);

        CycleReport {
            mode: state.mode,
            exits: records,
            newly_monitored,
            deployed_capital_usd: state.deployed_capital_usd,
            open_positions: state.open_positions.len(),
        }
    }

    pub async fn try_reserve_entry(
        &self,
        token_id: &str,
        usd: Decimal,
    ) -> Result<(), EntryRejection> {
        self.try_reserve_entry_at(token_id, usd, Utc::now()).await
    }

    /// Reserve capital for a scavenger entry against mode, cooldown and caps
    pub async fn try_reserve_entry_at(
        &self,
        token_id: &str,
        usd: Decimal,
        now: DateTime<Utc>,
    ) -> Result<(), EntryRejection> {
        let mut inner = self.inner.write().await;
        inner
            .state
            .try_reserve_entry(token_id, usd, now, &self.config)?;
        set_gauge(
            GaugeMetric::ScavengerDeployedUsd,
            inner.state.deployed_capital_usd.to_f64().unwrap_or_default(),
        );
        set_gauge(GaugeMetric::ScavengerPositions, inner.state.open_positions.len() as f64);
        Ok(())
    }

    pub async fn release_entry(&self, token_id: &str) -> Option<Decimal> {
        self.inner.write().await.state.release_entry(token_id)
    }

    pub async fn cooldown_until(
        &self,
        token_id: &str,
        now: DateTime<Utc>,
    ) -> Option<DateTime<Utc>> {
        self.inner.read().await.state.cooldown_until(token_id, now)
    }

    pub async fn status_at(&self, now: DateTime<Utc>) -> ScavengerStatus {
        let inner = self.inner.read().await;
        ScavengerStatus {
            mode: inner.state.mode,
            mode_entered_at: inner.state.mode_entered_at,
            signals: inner.detector.signals_at(now),
            deployed_capital_usd: inner.state.deployed_capital_usd,
            open_positions: inner.state.open_positions.len(),
            monitored_red: inner.state.monitored_red.len(),
            cooldowns: inner
                .state
                .cooldowns
                .values()
                .filter(|until| **until > now)
                .count(),
        }
    }

    pub async fn reset(&self) {
        let mut inner = self.inner.write().await;
        inner.detector.reset();
        inner.state = ScavengerState::new();
    }
}

/// Evaluate the mode and run a cycle every `cycle_interval_secs`
pub fn spawn_scavenger_loop(
    scavenger: Scavenger,
    positions: Arc<dyn PositionSource>,
    address: String,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let period = std::time::Duration::from_secs(scavenger.config().cycle_interval_secs.max(1));
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            scavenger.evaluate().await;
            if scavenger.mode().await != ScavengerMode::Scavenger {
                continue;
            }

            let held = match positions.get_positions(&address).await {
                Ok(held) => held,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to fetch positions for scavenger cycle");
                    continue;
                }
            };
            let report = scavenger.run_scavenger_cycle(&held).await;
            tracing::debug!(
                positions = held.len(),
                exits = report.exits.len(),
                succeeded = report.successful_exits(),
                monitored = report.newly_monitored.len(),
                "Scavenger cycle complete"
            );
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MarketDataConfig, SellConfig, SnapshotConfig};
    use crate::execution::{OrderType, PaperSubmitter};
    use crate::market::{OrderBookSource, SourceError};
    use crate::market_data::MarketDataStore;
    use crate::notify::testing::RecordingNotifier;
    use crate::orderbook::{BookThresholds, OrderBook, PriceLevel};
    use async_trait::async_trait;
    use chrono::Duration;
    use rust_decimal_macros::dec;
    use std::sync::Mutex;

    /// Live book quoting one bid, one cent wide
    struct LiveBook {
        bid: Mutex<Decimal>,
    }

    impl LiveBook {
        fn book(token_id: &str, bid: Decimal) -> OrderBook {
            OrderBook::from_levels(
                token_id,
                vec![PriceLevel::new(bid, dec!(1000))],
                vec![PriceLevel::new(bid + dec!(0.01), dec!(1000))],
                Utc::now(),
            )
        }

        fn set(&self, bid: Decimal) {
            *self.bid.lock().unwrap() = bid;
        }
    }

    #[async_trait]
    impl OrderBookSource for LiveBook {
        async fn poll_order_book(&self, token_id: &str) -> Result<OrderBook, SourceError> {
            let bid = *self.bid.lock().unwrap();
            Ok(Self::book(token_id, bid))
        }
    }

    struct Fixture {
        scv: Scavenger,
        store: MarketDataStore,
        live: Arc<LiveBook>,
        paper: Arc<PaperSubmitter>,
    }

    impl Fixture {
        fn new(notifier: Arc<RecordingNotifier>) -> Self {
            Self::with(ScavengerConfig::default(), SellConfig::default(), notifier)
        }

        fn with(
            config: ScavengerConfig,
            sell: SellConfig,
            notifier: Arc<RecordingNotifier>,
        ) -> Self {
            let live = Arc::new(LiveBook {
                bid: Mutex::new(dec!(0.60)),
            });
            let books: Arc<dyn OrderBookSource> = live.clone();
            let paper = Arc::new(PaperSubmitter::new(books.clone()));
            let seller = SmartSeller::new(books.clone(), paper.clone(), sell);
            let store =
                MarketDataStore::new(&MarketDataConfig::default(), BookThresholds::default());
            let snapshots = SnapshotService::new(store.clone(), books, &SnapshotConfig::default());
            Self {
                scv: Scavenger::new(config, seller, snapshots, notifier),
                store,
                live,
                paper,
            }
        }

        /// Move both the streamed quote and the live book
        async fn quote(&self, token_id: &str, bid: Decimal) {
            self.live.set(bid);
            self.store.update_from_stream(LiveBook::book(token_id, bid)).await;
        }
    }

    /// Drive the detector into scavenger mode; returns the entry time
    async fn enter(scv: &Scavenger, t0: DateTime<Utc>) -> DateTime<Utc> {
        scv.record_volume_at(t0, dec!(100)).await;
        scv.record_depth_at(t0, dec!(50)).await;
        assert!(scv.evaluate_at(t0).await.is_none());
        let entered = t0 + Duration::seconds(180);
        assert!(scv.evaluate_at(entered).await.is_some());
        entered
    }

    #[tokio::test]
    async fn test_mode_change_notifies() {
        let notifier = Arc::new(RecordingNotifier::default());
        let f = Fixture::new(notifier.clone());
        enter(&f.scv, Utc::now()).await;

        assert_eq!(f.scv.mode().await, ScavengerMode::Scavenger);
        let messages = notifier.messages.lock().await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, "Scavenger mode: SCAVENGER");
    }

    #[tokio::test]
    async fn test_disabled_never_transitions() {
        let config = ScavengerConfig {
            enabled: false,
            ..Default::default()
        };
        let notifier = Arc::new(RecordingNotifier::default());
        let f = Fixture::with(config, SellConfig::default(), notifier);
        let t0 = Utc::now();
        f.scv.record_volume_at(t0, dec!(1)).await;
        f.scv.record_depth_at(t0, dec!(1)).await;
        assert!(f.scv.evaluate_at(t0).await.is_none());
        assert!(f.scv.evaluate_at(t0 + Duration::seconds(600)).await.is_none());
        assert_eq!(f.scv.mode().await, ScavengerMode::Normal);
    }

    #[tokio::test]
    async fn test_cycle_idle_in_normal_mode() {
        let f = Fixture::new(Arc::new(RecordingNotifier::default()));
        let positions = vec![Position::new("a", dec!(100), dec!(0.50), dec!(0.60))];
        let report = f.scv.run_scavenger_cycle_at(&positions, Utc::now()).await;
        assert_eq!(report.mode, ScavengerMode::Normal);
        assert!(report.exits.is_empty());
    }

    #[tokio::test]
    async fn test_stalled_winner_is_exited_then_cooled_down() {
        let f = Fixture::new(Arc::new(RecordingNotifier::default()));
        let t1 = enter(&f.scv, Utc::now()).await;
        f.quote("a", dec!(0.60)).await;
        let positions = vec![Position::new("a", dec!(100), dec!(0.50), dec!(0.60))];

        let first = f.scv.run_scavenger_cycle_at(&positions, t1).await;
        assert!(first.exits.is_empty());

        let t2 = t1 + Duration::seconds(300);
        let second = f.scv.run_scavenger_cycle_at(&positions, t2).await;
        assert_eq!(second.exits.len(), 1);
        assert_eq!(second.exits[0].reason, ExitReason::Stalled);
        assert_eq!(second.exits[0].pnl_pct, dec!(20));
        let outcome = second.exits[0].result.as_ref().unwrap();
        assert_eq!(outcome.filled_shares, dec!(100));
        assert!(f.scv.cooldown_until("a", t2).await.is_some());

        let third = f
            .scv
            .run_scavenger_cycle_at(&positions, t2 + Duration::seconds(30))
            .await;
        assert!(third.exits.is_empty());
    }

    #[tokio::test]
    async fn test_decision_uses_quote_not_position_mark() {
        let f = Fixture::new(Arc::new(RecordingNotifier::default()));
        let t1 = enter(&f.scv, Utc::now()).await;
        // Data API still marks the position at a profit; the book says otherwise
        f.quote("a", dec!(0.40)).await;
        let positions = vec![Position::new("a", dec!(100), dec!(0.50), dec!(0.60))];

        f.scv.run_scavenger_cycle_at(&positions, t1).await;
        let report = f
            .scv
            .run_scavenger_cycle_at(&positions, t1 + Duration::seconds(300))
            .await;
        assert!(report.exits.is_empty());
        assert!(f.paper.fills().await.is_empty());
        assert_eq!(f.scv.status_at(t1).await.monitored_red, 1);
    }

    #[tokio::test]
    async fn test_live_drift_from_decision_quote_aborts_exit() {
        let f = Fixture::new(Arc::new(RecordingNotifier::default()));
        let t1 = enter(&f.scv, Utc::now()).await;
        f.quote("a", dec!(0.60)).await;
        let positions = vec![Position::new("a", dec!(100), dec!(0.50), dec!(0.60))];
        f.scv.run_scavenger_cycle_at(&positions, t1).await;

        // Stream cache still shows 0.60 while the live bid has collapsed
        f.store
            .update_from_stream(LiveBook::book("a", dec!(0.60)))
            .await;
        f.live.set(dec!(0.40));

        let t2 = t1 + Duration::seconds(300);
        let report = f.scv.run_scavenger_cycle_at(&positions, t2).await;
        assert_eq!(report.exits.len(), 1);
        let err = report.exits[0].result.as_ref().unwrap_err();
        assert_eq!(err.reason_code(), "SNAPSHOT_DRIFT");
        assert!(f.paper.fills().await.is_empty());
        assert!(f.scv.cooldown_until("a", t2).await.is_none());
    }

    #[tokio::test]
    async fn test_red_position_monitored_until_recovery() {
        let f = Fixture::new(Arc::new(RecordingNotifier::default()));
        let t1 = enter(&f.scv, Utc::now()).await;
        let position = vec![Position::new("b", dec!(50), dec!(0.70), dec!(0.70))];

        f.quote("b", dec!(0.60)).await;
        let report = f.scv.run_scavenger_cycle_at(&position, t1).await;
        assert_eq!(report.newly_monitored, vec!["b".to_string()]);
        assert!(report.exits.is_empty());

        // Still below the profit floor
        f.quote("b", dec!(0.704)).await;
        let report = f
            .scv
            .run_scavenger_cycle_at(&position, t1 + Duration::seconds(30))
            .await;
        assert!(report.exits.is_empty());
        assert!(report.newly_monitored.is_empty());

        f.quote("b", dec!(0.71)).await;
        let report = f
            .scv
            .run_scavenger_cycle_at(&position, t1 + Duration::seconds(60))
            .await;
        assert_eq!(report.exits.len(), 1);
        assert_eq!(report.exits[0].reason, ExitReason::Recovered);
        assert!(report.exits[0].result.is_ok());
    }

    #[tokio::test]
    async fn test_placeholder_quote_skips_position() {
        struct Unreachable;

        #[async_trait]
        impl OrderBookSource for Unreachable {
            async fn poll_order_book(&self, _token_id: &str) -> Result<OrderBook, SourceError> {
                Err(SourceError::Transport("refused".into()))
            }
        }

        let books: Arc<dyn OrderBookSource> = Arc::new(Unreachable);
        let seller = SmartSeller::new(
            books.clone(),
            Arc::new(PaperSubmitter::new(books.clone())),
            SellConfig::default(),
        );
        let store = MarketDataStore::new(&MarketDataConfig::default(), BookThresholds::default());
        let snapshots = SnapshotService::new(store, books, &SnapshotConfig::default());
        let scv = Scavenger::new(
            ScavengerConfig::default(),
            seller,
            snapshots,
            Arc::new(RecordingNotifier::default()),
        );
        let t1 = enter(&scv, Utc::now()).await;

        let losing = vec![Position::new("c", dec!(10), dec!(0.90), dec!(0.10))];
        let report = scv.run_scavenger_cycle_at(&losing, t1).await;
        assert!(report.newly_monitored.is_empty());
        assert!(report.exits.is_empty());
    }

    #[tokio::test]
    async fn test_successful_exit_releases_reservation() {
        let f = Fixture::new(Arc::new(RecordingNotifier::default()));
        let t1 = enter(&f.scv, Utc::now()).await;
        f.quote("a", dec!(0.60)).await;

        f.scv.try_reserve_entry_at("a", dec!(30), t1).await.unwrap();
        let positions = vec![Position::new("a", dec!(100), dec!(0.50), dec!(0.60))];
        f.scv.run_scavenger_cycle_at(&positions, t1).await;
        let report = f
            .scv
            .run_scavenger_cycle_at(&positions, t1 + Duration::seconds(300))
            .await;

        assert_eq!(report.successful_exits(), 1);
        assert_eq!(report.deployed_capital_usd, dec!(0));
        assert_eq!(report.open_positions, 0);
        assert!(matches!(
            f.scv
                .try_reserve_entry_at("a", dec!(10), t1 + Duration::seconds(310))
                .await,
            Err(EntryRejection::OnCooldown { .. })
        ));
    }

    #[tokio::test]
    async fn test_resting_exit_keeps_reservation_until_filled() {
        let sell = SellConfig {
            order_type: Some(OrderType::Limit),
            ..Default::default()
        };
        let notifier = Arc::new(RecordingNotifier::default());
        let f = Fixture::with(ScavengerConfig::default(), sell, notifier);
        let t1 = enter(&f.scv, Utc::now()).await;
        f.quote("a", dec!(0.60)).await;

        f.scv.try_reserve_entry_at("a", dec!(30), t1).await.unwrap();
        let positions = vec![Position::new("a", dec!(100), dec!(0.50), dec!(0.60))];
        f.scv.run_scavenger_cycle_at(&positions, t1).await;
        let t2 = t1 + Duration::seconds(300);
        let report = f.scv.run_scavenger_cycle_at(&positions, t2).await;

        let outcome = report.exits[0].result.as_ref().unwrap();
        assert!(outcome.is_resting());
        assert_eq!(report.deployed_capital_usd, dec!(30));
        assert_eq!(report.open_positions, 1);
        assert!(f.scv.cooldown_until("a", t2).await.is_some());

        // The limit order filled: the position is gone from the account
        let report = f
            .scv
            .run_scavenger_cycle_at(&[], t2 + Duration::seconds(30))
            .await;
        assert_eq!(report.deployed_capital_usd, dec!(0));
        assert_eq!(report.open_positions, 0);
    }

    #[tokio::test]
    async fn test_reset() {
        let f = Fixture::new(Arc::new(RecordingNotifier::default()));
        let t1 = enter(&f.scv, Utc::now()).await;
        f.scv.reset().await;
        let status = f.scv.status_at(t1).await;
        assert_eq!(status.mode, ScavengerMode::Normal);
        assert_eq!(status.signals.low_count(), 0);
    }
}
