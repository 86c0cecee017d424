//! Polymarket REST client
//!
//! Polls order books from the CLOB API, and positions and wallet trades
//! from the Data API.
//! Responses are parsed into strict schemas here; numeric strings that do
//! not parse as decimals are dropped at the boundary.

use super::{
    OrderBookSource, Position, PositionSource, SourceError, TradeSource, WalletTrade,
};
use crate::orderbook::{parse_levels, OrderBook, WireLevel};
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::time::Duration;

/// Trades fetched per wallet poll
const TRADES_PAGE_LIMIT: &str = "50";

/// CLOB REST base URL
pub const CLOB_API_URL: &str = "https://clob.polymarket.com";

/// Data API base URL
pub const DATA_API_URL: &str = "https://data-api.polymarket.com";

/// Configuration for the REST client
#[derive(Debug, Clone)]
pub struct ClobConfig {
    pub clob_url: String,
    pub data_api_url: String,
    /// Per-request timeout
    pub timeout: Duration,
}

impl Default for ClobConfig {
    fn default() -> Self {
        Self {
            clob_url: CLOB_API_URL.to_string(),
            data_api_url: DATA_API_URL.to_string(),
            timeout: Duration::from_secs(5),
        }
    }
}

impl From<&crate::config::EndpointsConfig> for ClobConfig {
    fn from(config: &crate::config::EndpointsConfig) -> Self {
        Self {
            clob_url: config.clob_url.trim_end_matches('/').to_string(),
            data_api_url: config.data_api_url.trim_end_matches('/').to_string(),
            timeout: config.request_timeout(),
        }
    }
}

/// Client for the CLOB and Data APIs
#[derive(Clone)]
pub struct ClobRestClient {
    config: ClobConfig,
    client: Client,
}

impl ClobRestClient {
    pub fn new(config: ClobConfig) -> Result<Self, SourceError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        Ok(Self { config, client })
    }

    async fn get(
        &self,
        url: &str,
        query: &[(&str, &str)],
    ) -> Result<reqwest::Response, SourceError> {
        self.client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(map_reqwest_error)
    }
}

fn map_reqwest_error(e: reqwest::Error) -> SourceError {
    if e.is_timeout() {
        SourceError::Timeout
    } else {
        SourceError::Transport(e.to_string())
    }
}

#[async_trait]
impl OrderBookSource for ClobRestClient {
    async fn poll_order_book(&self, token_id: &str) -> Result<OrderBook, SourceError> {
        let url = format!("{}/book", self.config.clob_url);
        tracing::debug!(token_id = %token_id, "Polling order book");

        let response = self.get(&url, &[("token_id", token_id)]).await?;
        let status = response.status();
        let body = response.text().await.map_err(map_reqwest_error)?;

        if !status.is_success() {
            return Err(classify_book_failure(token_id, status, &body));
        }

        parse_book_response(token_id, &body)
    }
}

#[async_trait]
impl PositionSource for ClobRestClient {
    async fn get_positions(&self, address: &str) -> Result<Vec<Position>, SourceError> {
        let url = format!("{}/positions", self.config.data_api_url);

        let response = self
            .get(&url, &[("user", address), ("sizeThreshold", "0")])
            .await?;
        let status = response.status();
        let body = response.text().await.map_err(map_reqwest_error)?;

        if !status.is_success() {
            return Err(data_api_failure(status, &body));
        }

        let raw: Vec<DataApiPosition> =
            serde_json::from_str(&body).map_err(|e| SourceError::Malformed(e.to_string()))?;
        let positions: Vec<Position> = raw
            .into_iter()
            .filter_map(DataApiPosition::into_position)
            .collect();

        tracing::debug!(address = %address, count = positions.len(), "Fetched positions");
        Ok(positions)
    }
}

#[async_trait]
impl TradeSource for ClobRestClient {
    async fn get_trades(&self, address: &str) -> Result<Vec<WalletTrade>, SourceError> {
        let url = format!("{}/trades", self.config.data_api_url);

        let response = self
            .get(&url, &[("user", address), ("limit", TRADES_PAGE_LIMIT)])
            .await?;
        let status = response.status();
        let body = response.text().await.map_err(map_reqwest_error)?;

        if !status.is_success() {
            return Err(data_api_failure(status, &body));
        }

        let trades = parse_trades_response(address, &body)?;
        tracing::debug!(address = %address, count = trades.len(), "Fetched wallet trades");
        Ok(trades)
    }
}

fn data_api_failure(status: StatusCode, body: &str) -> SourceError {
    SourceError::Transport(format!("Data API error: {} - {}", status, body))
}

/// Map a non-2xx book response onto a source error
fn classify_book_failure(token_id: &str, status: StatusCode, body: &str) -> SourceError {
    if status == StatusCode::NOT_FOUND || body.contains("No orderbook exists") {
        SourceError::MarketClosed(token_id.to_string())
    } else {
        SourceError::Transport(format!("CLOB API error: {} - {}", status, body))
    }
}

/// `GET /book` response
#[derive(Debug, Deserialize)]
struct BookResponse {
    #[serde(default)]
    asset_id: Option<String>,
    #[serde(default)]
    bids: Vec<WireLevel>,
    #[serde(default)]
    asks: Vec<WireLevel>,
    #[serde(default)]
    timestamp: Option<String>,
}

fn parse_book_response(token_id: &str, body: &str) -> Result<OrderBook, SourceError> {
    let raw: BookResponse =
        serde_json::from_str(body).map_err(|e| SourceError::Malformed(e.to_string()))?;

    if let Some(asset_id) = raw.asset_id.as_deref() {
        if asset_id != token_id {
            return Err(SourceError::Malformed(format!(
                "book for {} returned for {}",
                asset_id, token_id
            )));
        }
    }

    let updated_at = raw
        .timestamp
        .as_deref()
        .and_then(|ts| ts.parse::<i64>().ok())
        .and_then(|ms| Utc.timestamp_millis_opt(ms).single())
        .unwrap_or_else(Utc::now);

    Ok(OrderBook::from_levels(
        token_id,
        parse_levels(raw.bids),
        parse_levels(raw.asks),
        updated_at,
    ))
}

/// Data API position record
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DataApiPosition {
    asset: String,
    #[serde(default)]
    condition_id: Option<String>,
    size: Decimal,
    #[serde(default)]
    avg_price: Decimal,
    #[serde(default)]
    cur_price: Decimal,
    #[serde(default)]
    title: Option<String>,
}

impl DataApiPosition {
    fn into_position(self) -> Option<Position> {
        if self.size <= Decimal::ZERO {
            return None;
        }
        Some(Position {
            token_id: self.asset,
            market_id: self.condition_id,
            shares: self.size,
            avg_price: self.avg_price,
            current_price: self.cur_price,
            title: self.title,
        })
    }
}

/// Data API trade record
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct DataApiTrade {
    asset: String,
    #[serde(default)]
    condition_id: Option<String>,
    size: Decimal,
    price: Decimal,
    /// Unix seconds
    timestamp: i64,
}

fn parse_trades_response(address: &str, body: &str) -> Result<Vec<WalletTrade>, SourceError> {
    let raw: Vec<DataApiTrade> =
        serde_json::from_str(body).map_err(|e| SourceError::Malformed(e.to_string()))?;

    Ok(raw
        .into_iter()
        .filter_map(|t| {
            let timestamp = Utc.timestamp_opt(t.timestamp, 0).single()?;
            Some(WalletTrade {
                wallet: address.to_string(),
                token_id: t.asset,
                market_id: t.condition_id,
                price: t.price,
                size: t.size,
                timestamp,
            })
        })
        .collect())
}
