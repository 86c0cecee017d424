//! Polymarket WebSocket push feed
//!
//! Connects to the CLOB market channel, subscribes to a set of token IDs and
//! forwards full book snapshots and trade prints as [`FeedEvent`]s.
//! Connection state changes are forwarded too so the market data store knows
//! when it is running on polls alone.

use super::{OrderBook, PriceLevel};
use chrono::{DateTime, TimeZone, Utc};
use futures_util::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::time::sleep;
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Polymarket CLOB WebSocket URL for market data
pub const POLYMARKET_WS_URL: &str = "wss://ws-subscriptions-clob.polymarket.com/ws/market";

/// Largest level or trade size accepted from the wire, in shares
pub const MAX_LEVEL_SIZE: Decimal = dec!(1_000_000_000_000);

/// Events delivered by the push feed
#[derive(Debug, Clone)]
pub enum FeedEvent {
    /// Socket connected and subscription sent
    Connected,
    /// Socket dropped; a reconnect may follow
    Disconnected,
    /// Full book snapshot for one token
    Book(OrderBook),
    /// A match printed on one token
    Trade(TradePrint),
}

/// Last trade print from the market channel
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TradePrint {
    pub token_id: String,
    pub price: Decimal,
    pub size: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl TradePrint {
    /// Traded value in USD
    pub fn notional_usd(&self) -> Decimal {
        self.price.checked_mul(self.size).unwrap_or(Decimal::MAX)
    }
}

/// Push feed errors
#[derive(Debug, Error)]
pub enum StreamError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),
    #[error("Send failed: {0}")]
    SendFailed(String),
    #[error("Maximum reconnection attempts exceeded")]
    MaxReconnectsExceeded,
}

/// Configuration for the market stream
#[derive(Debug, Clone)]
pub struct StreamConfig {
    /// WebSocket URL
    pub ws_url: String,
    /// Maximum reconnection attempts (0 = infinite)
    pub max_reconnects: u32,
    /// Initial reconnection delay
    pub initial_delay: Duration,
    /// Maximum reconnection delay
    pub max_delay: Duration,
    /// Keepalive ping interval
    pub ping_interval: Duration,
    /// Channel buffer size for feed events
    pub buffer_size: usize,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            ws_url: POLYMARKET_WS_URL.to_string(),
            max_reconnects: 0,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            ping_interval: Duration::from_secs(10),
            buffer_size: 256,
        }
    }
}

/// WebSocket subscription to Polymarket book snapshots
pub struct MarketStream {
    config: StreamConfig,
}

impl MarketStream {
    pub fn new() -> Self {
        Self::with_config(StreamConfig::default())
    }

    pub fn with_config(config: StreamConfig) -> Self {
        Self { config }
    }

    /// Subscribe to book snapshots for the given tokens
    ///
    /// Spawns a background task that reconnects with exponential backoff and
    /// resubscribes after every reconnect. The task stops when the receiver
    /// is dropped.
    pub fn subscribe(&self, token_ids: Vec<String>) -> mpsc::Receiver<FeedEvent> {
        let (tx, rx) = mpsc::channel(self.config.buffer_size);

        if token_ids.is_empty() {
            tracing::warn!("No token IDs provided, push feed not started");
            return rx;
        }

        let config = self.config.clone();
        tracing::info!(token_count = token_ids.len(), "Starting market stream");

        tokio::spawn(async move {
            if let Err(e) = run_stream(config, token_ids, tx).await {
                tracing::error!(error = %e, "Market stream stopped");
            }
        });

        rx
    }
}

impl Default for MarketStream {
    fn default() -> Self {
        Self::new()
    }
}

async fn run_stream(
    config: StreamConfig,
    token_ids: Vec<String>,
    tx: mpsc::Sender<FeedEvent>,
) -> Result<(), StreamError> {
    let mut attempts = 0u32;
    let mut delay = config.initial_delay;

    loop {
        let result = stream_once(&config, &token_ids, &tx).await;
        if tx.send(FeedEvent::Disconnected).await.is_err() {
            return Ok(());
        }

        match result {
            Ok(()) => {
                tracing::info!("Market stream closed by server, reconnecting");
                attempts = 0;
                delay = config.initial_delay;
            }
            Err(e) => {
                attempts += 1;
                tracing::warn!(error = %e, attempt = attempts, "Market stream error");
                if config.max_reconnects > 0 && attempts >= config.max_reconnects {
                    return Err(StreamError::MaxReconnectsExceeded);
                }
            }
        }

        sleep(delay).await;
        delay = (delay * 2).min(config.max_delay);
    }
}

/// One connection lifetime: connect, subscribe, pump messages until close
async fn stream_once(
    config: &StreamConfig,
    token_ids: &[String],
    tx: &mpsc::Sender<FeedEvent>,
) -> Result<(), StreamError> {
    let (ws, _response) = connect_async(&config.ws_url)
        .await
        .map_err(|e| StreamError::ConnectionFailed(e.to_string()))?;
    let (mut write, mut read) = ws.split();

    let subscription = serde_json::to_string(&SubscriptionMessage {
        assets_ids: token_ids.to_vec(),
        msg_type: "market".to_string(),
    })
    .map_err(|e| StreamError::SendFailed(e.to_string()))?;
    write
        .send(Message::Text(subscription))
        .await
        .map_err(|e| StreamError::SendFailed(e.to_string()))?;

    tracing::info!(tokens = token_ids.len(), "Market stream subscribed");
    if tx.send(FeedEvent::Connected).await.is_err() {
        return Ok(());
    }

    let mut ping = tokio::time::interval(config.ping_interval);
    ping.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
    let mut awaiting_pong = false;

    loop {
        tokio::select! {
            msg = read.next() => match msg {
                Some(Ok(Message::Text(text))) => {
                    for event in parse_market_message(&text) {
                        if tx.send(event).await.is_err() {
                            return Ok(());
                        }
                    }
                }
                Some(Ok(Message::Ping(data))) => {
                    write.send(Message::Pong(data)).await
                        .map_err(|e| StreamError::SendFailed(e.to_string()))?;
                }
                Some(Ok(Message::Pong(_))) => awaiting_pong = false,
                Some(Ok(Message::Close(_))) => return Ok(()),
                Some(Ok(_)) => {}
                Some(Err(e)) => return Err(StreamError::ConnectionFailed(e.to_string())),
                None => {
                    return Err(StreamError::ConnectionFailed("Stream ended unexpectedly".into()))
                }
            },
            _ = ping.tick() => {
                if awaiting_pong {
                    return Err(StreamError::ConnectionFailed("Pong timeout".into()));
                }
                write.send(Message::Ping(vec![])).await
                    .map_err(|e| StreamError::SendFailed(e.to_string()))?;
                awaiting_pong = true;
            }
        }
    }
}

/// Subscription message for the market channel
#[derive(Debug, Serialize)]
struct SubscriptionMessage {
    assets_ids: Vec<String>,
    #[serde(rename = "type")]
    msg_type: String,
}

/// Book snapshot event
#[derive(Debug, Deserialize)]
struct BookEvent {
    #[serde(default)]
    event_type: Option<String>,
    asset_id: String,
    #[serde(default)]
    bids: Vec<WireLevel>,
    #[serde(default)]
    asks: Vec<WireLevel>,
    #[serde(default)]
    timestamp: Option<String>,
}

/// `last_trade_price` event
#[derive(Debug, Deserialize)]
struct TradeEvent {
    asset_id: String,
    price: String,
    size: String,
    #[serde(default)]
    timestamp: Option<String>,
}

/// Price level as sent on the wire (decimal strings)
#[derive(Debug, Deserialize)]
pub(crate) struct WireLevel {
    pub price: String,
    pub size: String,
}

/// Parse wire levels, dropping any that are not valid decimals
///
/// Prices must lie in `[0, 1]` and sizes in `[0, MAX_LEVEL_SIZE]`.
pub(crate) fn parse_levels(levels: Vec<WireLevel>) -> Vec<PriceLevel> {
    levels
        .into_iter()
        .filter_map(|level| parse_price_size(&level.price, &level.size))
        .map(|(price, size)| PriceLevel { price, size })
        .collect()
}

fn parse_price_size(price: &str, size: &str) -> Option<(Decimal, Decimal)> {
    let price = Decimal::from_str(price).ok()?;
    let size = Decimal::from_str(size).ok()?;
    let price_ok = price >= Decimal::ZERO && price <= Decimal::ONE;
    let size_ok = size >= Decimal::ZERO && size <= MAX_LEVEL_SIZE;
    if !(price_ok && size_ok) {
        tracing::debug!(%price, %size, "Dropping out-of-range level");
        return None;
    }
    Some((price, size))
}

fn parse_timestamp(timestamp: Option<&str>) -> DateTime<Utc> {
    timestamp
        .and_then(|ts| ts.parse::<i64>().ok())
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or_else(Utc::now)
}

/// Extract every book snapshot and trade print from a market channel message
///
/// Messages arrive either as a single object or as an array of events.
/// Only full `book` snapshots are returned for books: the store replaces
/// books and never merges, so incremental `price_change` events are skipped.
fn parse_market_message(text: &str) -> Vec<FeedEvent> {
    let value: serde_json::Value = match serde_json::from_str(text) {
        Ok(v) => v,
        Err(e) => {
            tracing::debug!(error = %e, "Ignoring non-JSON market message");
            return vec![];
        }
    };

    let events = match value {
        serde_json::Value::Array(events) => events,
        other => vec![other],
    };

    events.into_iter().filter_map(parse_event).collect()
}

fn parse_event(event: serde_json::Value) -> Option<FeedEvent> {
    match event.get("event_type").and_then(|v| v.as_str()) {
        Some("last_trade_price") => parse_trade_event(event).map(FeedEvent::Trade),
        _ => parse_book_event(event).map(FeedEvent::Book),
    }
}

fn parse_trade_event(event: serde_json::Value) -> Option<TradePrint> {
    let trade: TradeEvent = match serde_json::from_value(event) {
        Ok(t) => t,
        Err(e) => {
            tracing::debug!(error = %e, "Malformed trade event");
            return None;
        }
    };
    let (price, size) = parse_price_size(&trade.price, &trade.size)?;

    Some(TradePrint {
        token_id: trade.asset_id,
        price,
        size,
        timestamp: parse_timestamp(trade.timestamp.as_deref()),
    })
}

fn parse_book_event(event: serde_json::Value) -> Option<OrderBook> {
    let is_book = match event.get("event_type").and_then(|v| v.as_str()) {
        Some("book") => true,
        Some(_) => false,
        None => event.get("bids").is_some() || event.get("asks").is_some(),
    };
    if !is_book || event.get("asset_id").is_none() {
        return None;
    }

    let book: BookEvent = match serde_json::from_value(event) {
        Ok(b) => b,
        Err(e) => {
            tracing::debug!(error = %e, "Malformed book event");
            return None;
        }
    };
    tracing::trace!(event_type = ?book.event_type, token_id = %book.asset_id, "Book event");

    let updated_at = parse_timestamp(book.timestamp.as_deref());

    Some(OrderBook::from_levels(
        book.asset_id,
        parse_levels(book.bids),
        parse_levels(book.asks),
        updated_at,
    ))
}
