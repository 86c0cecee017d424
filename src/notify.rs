//! Operator notifications
//!
//! Delivery channels (chat bots, issue trackers) live outside this crate and
//! plug in through [`Notifier`]. [`LogNotifier`] is the built-in fallback.

use async_trait::async_trait;

/// Delivers short operator messages
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, title: &str, message: &str);
}

/// Notifier that writes to the log
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, title: &str, message: &str) {
        tracing::info!(title = %title, "{}", message);
    }
}
