//! Watched-wallet trade tracking
//!
//! The Data API returns the latest page of trades on every poll, so the
//! same fill shows up repeatedly. The watcher remembers the newest trade
//! seen per wallet and only hands back fills after it.

use super::WalletTrade;
use chrono::{DateTime, Duration, Utc};
use std::collections::HashMap;

#[derive(Debug, Clone)]
pub struct WalletWatcher {
    /// Trades older than this are ignored on the first poll of a wallet
    lookback: Duration,
    last_seen: HashMap<String, DateTime<Utc>>,
}

impl WalletWatcher {
    pub fn new(lookback: Duration) -> Self {
        Self {
            lookback,
            last_seen: HashMap::new(),
        }
    }

    /// Fills from `trades` not reported before, oldest first
    pub fn take_new_at(
        &mut self,
        wallet: &str,
        mut trades: Vec<WalletTrade>,
        now: DateTime<Utc>,
    ) -> Vec<WalletTrade> {
        let floor = self
            .last_seen
            .get(wallet)
            .copied()
            .unwrap_or(now - self.lookback);

        trades.retain(|t| t.timestamp > floor && t.timestamp <= now);
        trades.sort_by_key(|t| t.timestamp);

        if let Some(newest) = trades.last() {
            self.last_seen.insert(wallet.to_string(), newest.timestamp);
        }
        trades
    }

    pub fn wallets_seen(&self) -> usize {
        self.last_seen.len()
    }
}
