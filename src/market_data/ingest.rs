//! Push feed ingestion

use super::MarketDataStore;
use crate::orderbook::{FeedEvent, TradePrint};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;

/// Drain push feed events into the store
///
/// Books go to the store; trade prints are handed to `trades` when given.
/// A full trade channel drops the print rather than stalling book updates.
/// Runs until the feed channel closes; the connection flag is cleared on
/// exit so readers fall back to polling.
pub fn spawn_stream_ingest(
    store: MarketDataStore,
    mut events: mpsc::Receiver<FeedEvent>,
    trades: Option<mpsc::Sender<TradePrint>>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                FeedEvent::Connected => store.set_stream_connected(true).await,
                FeedEvent::Disconnected => store.set_stream_connected(false).await,
                FeedEvent::Book(book) => store.update_from_stream(book).await,
                FeedEvent::Trade(trade) => {
                    let Some(sink) = &trades else { continue };
                    if let Err(TrySendError::Full(trade)) = sink.try_send(trade) {
                        tracing::debug!(
                            token_id = %trade.token_id,
                            "Trade sink full, print dropped"
                        );
                    }
                }
            }
        }
        store.set_stream_connected(false).await;
        tracing::info!("Push feed closed, store running on polls only");
    })
}
