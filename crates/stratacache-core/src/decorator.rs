//! Construction-time decorators for the message bus.
//!
//! Cross-cutting behavior (retry, later perhaps circuit breaking) is layered
//! by wrapping the bus in another `MessageBus` implementation when the
//! coordinator is assembled, not by patching call sites.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::bus::{HybridMessage, MessageBus};
use crate::error::Result;

/// Bus decorator that retries failed publishes with doubling backoff.
///
/// Subscriptions pass through untouched; the inner bus already owns
/// reconnect behavior for its subscriber side.
pub struct RetryBus {
    inner: Arc<dyn MessageBus>,
    max_attempts: u32,
    initial_backoff: Duration,
}

impl RetryBus {
    /// Wrap `inner`, retrying each publish up to `max_attempts` times in
    /// total, sleeping `initial_backoff` doubled after each failure.
    pub fn new(inner: Arc<dyn MessageBus>, max_attempts: u32, initial_backoff: Duration) -> Self {
        Self {
            inner,
            max_attempts: max_attempts.max(1),
            initial_backoff,
        }
    }
}

#[async_trait]
impl MessageBus for RetryBus {
    async fn publish(&self, topic: &str, message: &HybridMessage) -> Result<()> {
        let mut backoff = self.initial_backoff;
        let mut attempt = 1;
        loop {
            match self.inner.publish(topic, message).await {
                Ok(()) => return Ok(()),
                Err(e) if attempt >= self.max_attempts => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        topic = %topic,
                        attempt,
                        error = %e,
                        "bus publish failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff *= 2;
                    attempt += 1;
                }
            }
        }
    }

    async fn subscribe(&self, topic: &str) -> Result<mpsc::Receiver<HybridMessage>> {
        self.inner.subscribe(topic).await
    }
}
