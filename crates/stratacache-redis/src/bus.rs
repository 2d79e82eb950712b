//! Redis pub/sub bus adapter.
//!
//! Publishes go through the shared pool. Each subscription owns a dedicated
//! pub/sub connection (pooled connections cannot SUBSCRIBE) driven by a
//! background task that reconnects with exponential backoff when the
//! connection is lost.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::Pool;
use futures_util::StreamExt;
use redis::AsyncCommands;
use tokio::sync::mpsc;

use stratacache_core::bus::{HybridMessage, MessageBus};
use stratacache_core::error::{CacheError, Result};

const SUBSCRIBER_CHANNEL_CAPACITY: usize = 256;
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Redis-backed invalidation bus.
pub struct RedisBus {
    pool: Pool,
    redis_url: String,
}

impl RedisBus {
    /// `redis_url` is used for the dedicated subscriber connections; it
    /// should point at the same server as `pool`.
    pub fn new(pool: Pool, redis_url: impl Into<String>) -> Self {
        Self {
            pool,
            redis_url: redis_url.into(),
        }
    }
}

#[async_trait]
impl MessageBus for RedisBus {
    async fn publish(&self, topic: &str, message: &HybridMessage) -> Result<()> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| CacheError::bus(format!("failed to get redis connection: {e}")))?;

        let payload = serde_json::to_string(message)
            .map_err(|e| CacheError::bus(format!("failed to encode bus message: {e}")))?;

        conn.publish::<_, _, ()>(topic, payload)
            .await
            .map_err(|e| CacheError::bus(format!("redis PUBLISH '{topic}' failed: {e}")))?;

        tracing::debug!(topic = %topic, key = %message.cache_key, "published invalidation");
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<mpsc::Receiver<HybridMessage>> {
        let (tx, rx) = mpsc::channel(SUBSCRIBER_CHANNEL_CAPACITY);
        let url = self.redis_url.clone();
        let topic = topic.to_string();

        tokio::spawn(async move {
            let mut backoff = INITIAL_BACKOFF;
            loop {
                match run_subscription(&url, &topic, &tx).await {
                    // Receiver dropped: the subscription is over.
                    Ok(()) => return,
                    Err(e) => {
                        if tx.is_closed() {
                            return;
                        }
                        tracing::error!(
                            topic = %topic,
                            error = %e,
                            backoff_secs = backoff.as_secs(),
                            "bus subscription lost, reconnecting"
                        );
                        tokio::time::sleep(backoff).await;
                        backoff = (backoff * 2).min(MAX_BACKOFF);
                    }
                }
            }
        });

        Ok(rx)
    }
}

async fn run_subscription(
    url: &str,
    topic: &str,
    tx: &mpsc::Sender<HybridMessage>,
) -> Result<()> {
    let client = redis::Client::open(url)
        .map_err(|e| CacheError::bus(format!("failed to create redis client: {e}")))?;

    let mut pubsub = client
        .get_async_pubsub()
        .await
        .map_err(|e| CacheError::bus(format!("failed to open pub/sub connection: {e}")))?;

    pubsub
        .subscribe(topic)
        .await
        .map_err(|e| CacheError::bus(format!("failed to subscribe to '{topic}': {e}")))?;

    tracing::info!(topic = %topic, "subscribed to invalidation topic");

    let mut stream = pubsub.on_message();
    while let Some(msg) = stream.next().await {
        let payload: String = match msg.get_payload() {
            Ok(payload) => payload,
            Err(e) => {
                tracing::warn!(topic = %topic, error = %e, "failed to read bus payload");
                continue;
            }
        };

        match serde_json::from_str::<HybridMessage>(&payload) {
            Ok(message) => {
                if tx.send(message).await.is_err() {
                    return Ok(());
                }
            }
            Err(e) => {
                tracing::warn!(
                    topic = %topic,
                    payload = %payload,
                    error = %e,
                    "failed to decode bus payload"
                );
            }
        }
    }

    Err(CacheError::bus("pub/sub stream ended"))
}
