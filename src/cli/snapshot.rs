//! Snapshot command implementation

use crate::config::Config;
use crate::execution::{PaperSubmitter, SellRequest, SmartSeller};
use crate::market::{ClobConfig, ClobRestClient, OrderBookSource};
use crate::market_data::MarketDataStore;
use crate::orderbook::BookThresholds;
use crate::snapshot::SnapshotService;
use clap::Args;
use rust_decimal::Decimal;
use std::sync::Arc;

#[derive(Args, Debug)]
pub struct SnapshotArgs {
    /// CLOB token ID
    pub token_id: String,

    /// Condition ID of the market, recorded on the snapshot
    #[arg(long)]
    pub market: Option<String>,

    /// Shares held; with --entry-price also prints a sell recommendation
    #[arg(long)]
    pub shares: Option<Decimal>,

    /// Average entry price of the held shares
    #[arg(long)]
    pub entry_price: Option<Decimal>,
}

impl SnapshotArgs {
    pub async fn execute(&self, config: &Config) -> anyhow::Result<()> {
        let client: Arc<dyn OrderBookSource> =
            Arc::new(ClobRestClient::new(ClobConfig::from(&config.endpoints))?);
        let store =
            MarketDataStore::new(&config.market_data, BookThresholds::from(&config.snapshot));
        let service = SnapshotService::new(store, client.clone(), &config.snapshot);

        let snapshot = service
            .fetch_market_snapshot_for(&self.token_id, self.market.as_deref(), None)
            .await;
        println!("{}", serde_json::to_string_pretty(&snapshot)?);

        if let (Some(shares), Some(entry_price)) = (self.shares, self.entry_price) {
            let seller = SmartSeller::new(
                client.clone(),
                Arc::new(PaperSubmitter::new(client)),
                config.sell.clone(),
            );
            let request =
                SellRequest::new(&self.token_id, shares, entry_price, snapshot.best_bid());
            let recommendation = seller.get_sell_recommendation(&request).await?;
            println!("{}", serde_json::to_string_pretty(&recommendation)?);
        }

        Ok(())
    }
}
