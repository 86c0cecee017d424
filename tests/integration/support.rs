//! Shared fakes for integration tests

use async_trait::async_trait;
use chrono::Utc;
use poly_exec::market::{OrderBookSource, SourceError};
use poly_exec::notify::Notifier;
use poly_exec::orderbook::{OrderBook, PriceLevel};
use rust_decimal::Decimal;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Mutex;

pub fn book(token_id: &str, bids: &[(Decimal, Decimal)], asks: &[(Decimal, Decimal)]) -> OrderBook {
    OrderBook::from_levels(
        token_id,
        bids.iter().map(|(p, s)| PriceLevel::new(*p, *s)).collect(),
        asks.iter().map(|(p, s)| PriceLevel::new(*p, *s)).collect(),
        Utc::now(),
    )
}

/// Book source whose answer can be swapped mid-test
pub struct ScriptedBooks {
    next: Mutex<Result<OrderBook, SourceError>>,
    pub polls: AtomicUsize,
}

impl ScriptedBooks {
    pub fn new(result: Result<OrderBook, SourceError>) -> Self {
        Self {
            next: Mutex::new(result),
            polls: AtomicUsize::new(0),
        }
    }

    pub async fn set(&self, result: Result<OrderBook, SourceError>) {
        *self.next.lock().await = result;
    }

    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl OrderBookSource for ScriptedBooks {
    async fn poll_order_book(&self, _token_id: &str) -> Result<OrderBook, SourceError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        self.next.lock().await.clone()
    }
}

#[derive(Default)]
pub struct RecordingNotifier {
    pub titles: Mutex<Vec<String>>,
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn notify(&self, title: &str, _message: &str) {
        self.titles.lock().await.push(title.to_string());
    }
}
