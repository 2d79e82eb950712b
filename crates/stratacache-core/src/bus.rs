//! Invalidation message bus contract.
//!
//! The hybrid coordinator publishes a small message on every write/removal so
//! that *other* instances drop their local copy of the key. The message never
//! carries the value itself: payloads stay bounded and a slow subscriber can
//! never apply a stale value.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use uuid::Uuid;

use crate::error::Result;

/// A cache invalidation notice.
///
/// `origin_id` identifies the publishing coordinator instance; subscribers
/// ignore their own messages so a writer does not evict the entry it just
/// repopulated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HybridMessage {
    pub cache_key: String,
    pub origin_id: Uuid,
}

impl HybridMessage {
    pub fn new(cache_key: impl Into<String>, origin_id: Uuid) -> Self {
        Self {
            cache_key: cache_key.into(),
            origin_id,
        }
    }
}

/// Topic-based publish/subscribe of invalidation messages.
///
/// Delivery is at-least-once with no ordering guarantee; handlers must treat
/// messages as idempotent (local eviction is).
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Publish `message` on `topic`.
    async fn publish(&self, topic: &str, message: &HybridMessage) -> Result<()>;

    /// Subscribe to `topic`. Messages arrive on the returned channel from an
    /// arbitrary task; the subscription ends when the receiver is dropped.
    async fn subscribe(&self, topic: &str) -> Result<mpsc::Receiver<HybridMessage>>;
}
