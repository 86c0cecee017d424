//! Run command implementation

use super::health::build_probes;
use crate::config::Config;
use crate::execution::{PaperSubmitter, SmartSeller};
use crate::latency::{spawn_probe_loop, LatencyMonitor};
use crate::market::{
    ClobConfig, ClobRestClient, OrderBookSource, TradeSource, WalletTrade, WalletWatcher,
};
use crate::market_data::{spawn_stream_ingest, MarketDataStore};
use crate::notify::LogNotifier;
use crate::orderbook::{BookThresholds, MarketStream, StreamConfig, TradePrint};
use crate::scanner::{MarketScanner, ScanInput};
use crate::scavenger::{spawn_scavenger_loop, Scavenger};
use crate::snapshot::SnapshotService;
use chrono::Utc;
use clap::Args;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Buffered trade prints between the feed and the volume signal
const TRADE_BUFFER: usize = 1_024;

#[derive(Args, Debug)]
pub struct RunArgs {
    /// Token IDs to follow (repeatable)
    #[arg(short, long = "token")]
    pub tokens: Vec<String>,

    /// Condition ID attached to snapshots and scanner candidates
    #[arg(long)]
    pub market: Option<String>,

    /// Stop after this many seconds instead of waiting for Ctrl-C
    #[arg(long)]
    pub duration_secs: Option<u64>,
}

impl RunArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let client = Arc::new(ClobRestClient::new(ClobConfig::from(&config.endpoints))?);
        let books: Arc<dyn OrderBookSource> = client.clone();

        let store =
            MarketDataStore::new(&config.market_data, BookThresholds::from(&config.snapshot));
        let stream = MarketStream::with_config(StreamConfig {
            ws_url: config.endpoints.ws_url.clone(),
            ..Default::default()
        });
        let (trade_tx, trade_rx) = mpsc::channel(TRADE_BUFFER);
        let mut tasks = vec![spawn_stream_ingest(
            store.clone(),
            stream.subscribe(self.tokens.clone()),
            Some(trade_tx),
        )];

        let monitor = LatencyMonitor::new(config.latency.clone());
        tasks.push(spawn_probe_loop(monitor.clone(), build_probes(&config.endpoints)?));

        let seller = SmartSeller::new(
            books.clone(),
            Arc::new(PaperSubmitter::new(books.clone())),
            config.sell.clone(),
        )
        .with_latency_gate(monitor)
        .with_integrity_epsilon(config.snapshot.integrity_epsilon);

        let service = SnapshotService::new(store.clone(), books, &config.snapshot);
        let scavenger = Scavenger::new(
            config.scavenger.clone(),
            seller,
            service.clone(),
            Arc::new(LogNotifier),
        );
        match &config.account.address {
            Some(address) => {
                let loop_task =
                    spawn_scavenger_loop(scavenger.clone(), client.clone(), address.clone());
                tasks.push(loop_task);
            }
            None => tracing::warn!("No account address configured, scavenger exits disabled"),
        }
        tasks.push(spawn_volume_feed(scavenger.clone(), trade_rx));

        let period = Duration::from_secs(config.scanner.scan_interval_secs.max(1));
        let (watched_tx, watched_rx) = mpsc::channel(TRADE_BUFFER);
        if config.account.watched_wallets.is_empty() {
            tracing::info!("No watched wallets configured, target activity signal idle");
        } else {
            let lookback = config
                .scanner
                .leaderboard_window()
                .max(config.scavenger.detection_window());
            tasks.push(spawn_wallet_watcher(
                client.clone(),
                config.account.watched_wallets.clone(),
                WalletWatcher::new(lookback),
                scavenger.clone(),
                watched_tx,
                period,
            ));
        }

        tasks.push(spawn_observer(
            service,
            scavenger.clone(),
            MarketScanner::new(config.scanner.clone()),
            watched_rx,
            self.tokens.clone(),
            self.market.clone(),
            period,
        ));

        tracing::info!(tokens = self.tokens.len(), "Paper loop running");
        match self.duration_secs {
            Some(secs) => tokio::time::sleep(Duration::from_secs(secs)).await,
            None => tokio::signal::ctrl_c().await?,
        }

        for task in &tasks {
            task.abort();
        }

        let stats = store.stats().await;
        let status = scavenger.status_at(Utc::now()).await;
        tracing::info!(
            entries = stats.cache.entries,
            hit_ratio = stats.cache.hit_ratio(),
            rejected_polls = stats.rejected_polls,
            feed_mode = ?stats.feed_mode,
            scavenger_mode = %status.mode,
            "Shutting down"
        );
        Ok(())
    }
}

/// Feed trade prints from the push feed into the volume signal
fn spawn_volume_feed(
    scavenger: Scavenger,
    mut trades: mpsc::Receiver<TradePrint>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(trade) = trades.recv().await {
            scavenger
                .record_volume_at(Utc::now(), trade.notional_usd())
                .await;
        }
    })
}

/// Poll watched wallets and report their new fills
///
/// Each fill counts as target activity for the scavenger and is forwarded to
/// the observer for the scanner's leaderboard reason.
fn spawn_wallet_watcher(
    source: Arc<dyn TradeSource>,
    wallets: Vec<String>,
    mut watcher: WalletWatcher,
    scavenger: Scavenger,
    watched: mpsc::Sender<WalletTrade>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            let fills =
                poll_watched_wallets(source.as_ref(), &wallets, &mut watcher, &scavenger).await;
            for fill in fills {
                if watched.send(fill).await.is_err() {
                    return;
                }
            }
        }
    })
}

async fn poll_watched_wallets(
    source: &dyn TradeSource,
    wallets: &[String],
    watcher: &mut WalletWatcher,
    scavenger: &Scavenger,
) -> Vec<WalletTrade> {
    let mut fills = Vec::new();
    for wallet in wallets {
        let trades = match source.get_trades(wallet).await {
            Ok(trades) => trades,
            Err(e) => {
                tracing::warn!(wallet = %wallet, error = %e, "Watched wallet poll failed");
                continue;
            }
        };

        let now = Utc::now();
        scavenger.record_target_poll_at(now).await;
        for fill in watcher.take_new_at(wallet, trades, now) {
            scavenger
                .record_target_activity_at(fill.timestamp, &fill.wallet)
                .await;
            fills.push(fill);
        }
    }
    fills
}

/// Snapshot every followed token on an interval and feed the scanner and
/// the scavenger detector
fn spawn_observer(
    service: SnapshotService,
    scavenger: Scavenger,
    mut scanner: MarketScanner,
    mut watched: mpsc::Receiver<WalletTrade>,
    tokens: Vec<String>,
    market: Option<String>,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            interval.tick().await;
            while let Ok(fill) = watched.try_recv() {
                scanner.record_watched_trade_at(&fill.token_id, fill.timestamp);
            }

            for token in &tokens {
                let snapshot = service
                    .fetch_market_snapshot_for(token, market.as_deref(), None)
                    .await;
                if snapshot.is_placeholder() {
                    continue;
                }

                let now = Utc::now();
                let (depth, bid_depth) = match service.store().get_at(token, now).await {
                    Some(state) => {
                        (state.depth_within_window, state.to_order_book().bid_depth_usd())
                    }
                    None => Default::default(),
                };
                scavenger
                    .record_book_at(now, token, snapshot.best_bid(), snapshot.best_ask())
                    .await;
                scavenger.record_depth_at(now, depth).await;
                scanner.evaluate_at(&ScanInput::from_snapshot(&snapshot, bid_depth), now);
            }

            let store = service.store();
            store.purge_expired().await;
            store.export_metrics().await;
        }
    })
}
