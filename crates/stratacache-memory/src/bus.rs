//! In-process message bus.
//!
//! Per-topic tokio broadcast channels bridged to the bus contract. Useful for
//! single-process deployments and for exercising the hybrid coordinator in
//! tests without a broker.

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{broadcast, mpsc};

use stratacache_core::bus::{HybridMessage, MessageBus};
use stratacache_core::error::Result;

const CHANNEL_CAPACITY: usize = 256;

/// Broadcast-backed bus. Cloning is cheap; all clones share topics.
#[derive(Debug, Default)]
pub struct MemoryBus {
    topics: DashMap<String, broadcast::Sender<HybridMessage>>,
}

impl MemoryBus {
    pub fn new() -> Self {
        Self::default()
    }

    fn sender_for(&self, topic: &str) -> broadcast::Sender<HybridMessage> {
        self.topics
            .entry(topic.to_string())
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .clone()
    }
}

#[async_trait]
impl MessageBus for MemoryBus {
    async fn publish(&self, topic: &str, message: &HybridMessage) -> Result<()> {
        // A send error only means nobody is subscribed, which is fine.
        let _ = self.sender_for(topic).send(message.clone());
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<mpsc::Receiver<HybridMessage>> {
        let mut broadcast_rx = self.sender_for(topic).subscribe();
        let (tx, rx) = mpsc::channel(CHANNEL_CAPACITY);
        let topic = topic.to_string();

        tokio::spawn(async move {
            loop {
                match broadcast_rx.recv().await {
                    Ok(message) => {
                        if tx.send(message).await.is_err() {
                            // Subscriber dropped its receiver.
                            return;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!(topic = %topic, skipped, "bus subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => return,
                }
            }
        });

        Ok(rx)
    }
}
