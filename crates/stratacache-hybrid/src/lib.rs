//! Two-tier cache coordination.
//!
//! [`HybridCache`] composes a fast in-process provider (the local tier) with
//! a slower shared provider (the distributed tier, the source of truth) and
//! keeps the local tiers of all instances coherent through an invalidation
//! bus:
//!
//! - reads prefer local; a distributed hit repopulates local under a capped
//!   TTL
//! - writes go distributed-first, then local, then publish an invalidation
//!   so *other* instances drop their local copy (the message never carries
//!   the value)
//! - a subscriber task applies incoming invalidations, filtered by origin id
//!   so an instance never evicts the entry it just wrote
//!
//! Distributed-tier and bus failures degrade after a warning; only local-tier
//! failures propagate, since the local tier is in-process and assumed
//! always-available.

pub mod options;

pub use options::HybridOptions;

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use stratacache_core::bus::{HybridMessage, MessageBus};
use stratacache_core::error::{BoxError, Result};
use stratacache_core::key;
use stratacache_core::provider::CacheClient;
use stratacache_core::value::CacheValue;

/// Coordinator over one local and one distributed provider.
///
/// Build with [`HybridCache::start`], which also spawns the invalidation
/// subscriber; instances are shared (`Arc`) for the life of the process.
pub struct HybridCache {
    local: Arc<CacheClient>,
    distributed: Arc<CacheClient>,
    bus: Arc<dyn MessageBus>,
    options: HybridOptions,
    instance_id: Uuid,
}

impl HybridCache {
    /// Assemble the coordinator and subscribe it to the invalidation topic.
    ///
    /// # Errors
    ///
    /// Fails when the options are invalid or the initial bus subscription
    /// cannot be established. Later bus failures degrade per call instead.
    pub async fn start(
        local: Arc<CacheClient>,
        distributed: Arc<CacheClient>,
        bus: Arc<dyn MessageBus>,
        options: HybridOptions,
    ) -> Result<Arc<Self>> {
        options.validate()?;

        let cache = Arc::new(Self {
            local,
            distributed,
            bus,
            options,
            instance_id: Uuid::new_v4(),
        });
        cache.spawn_subscriber().await?;
        Ok(cache)
    }

    /// Identity carried in published messages so this instance can ignore
    /// its own invalidations.
    pub fn instance_id(&self) -> Uuid {
        self.instance_id
    }

    pub fn options(&self) -> &HybridOptions {
        &self.options
    }

    /// Read a value, local tier first.
    ///
    /// A local hit returns immediately without touching the network. On a
    /// local miss the distributed tier is consulted; a hit there repopulates
    /// the local tier bounded by the remaining distributed TTL and the local
    /// cap. Distributed failures degrade to a miss.
    pub async fn get<T>(&self, cache_key: &str) -> Result<CacheValue<T>>
    where
        T: Serialize + DeserializeOwned + Send,
    {
        key::ensure_key(cache_key)?;

        let found = self.local.get::<T>(cache_key).await?;
        if found.has_value() {
            return Ok(found);
        }

        match self.distributed.get::<T>(cache_key).await {
            Ok(CacheValue::Value(value)) => {
                self.repopulate_local(cache_key, &value).await?;
                Ok(CacheValue::Value(value))
            }
            Ok(CacheValue::NoValue) => Ok(CacheValue::NoValue),
            Err(e) => {
                tracing::warn!(
                    key = %cache_key,
                    error = %e,
                    "distributed read failed, degrading to miss"
                );
                Ok(CacheValue::NoValue)
            }
        }
    }

    /// Read a value, retrieving it on a full miss.
    ///
    /// The distributed tier acts as the backend of the stampede-protected
    /// get-or-create, so concurrent misses across instances run the
    /// retriever once; the local tier is then repopulated from the result.
    /// Distributed errors propagate here, because the distributed tier is
    /// the source of truth for the retrieved value.
    pub async fn get_or_create<T, F, Fut>(
        &self,
        cache_key: &str,
        retriever: F,
        expiration: Duration,
    ) -> Result<CacheValue<T>>
    where
        T: Serialize + DeserializeOwned + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = std::result::Result<Option<T>, BoxError>> + Send,
    {
        key::ensure_key(cache_key)?;
        key::ensure_expiration(expiration)?;

        let found = self.local.get::<T>(cache_key).await?;
        if found.has_value() {
            return Ok(found);
        }

        let created = self
            .distributed
            .get_or_create(cache_key, retriever, expiration)
            .await?;
        if let CacheValue::Value(value) = &created {
            self.repopulate_local(cache_key, value).await?;
        }
        Ok(created)
    }

    /// Write through both tiers.
    ///
    /// Distributed first (source of truth), then local under the capped
    /// expiration, then a fire-and-forget invalidation so other instances
    /// drop their stale local copies. A distributed failure degrades to a
    /// local-only write; only a local failure fails the call.
    pub async fn set<T: Serialize>(
        &self,
        cache_key: &str,
        value: &T,
        expiration: Duration,
    ) -> Result<()> {
        key::ensure_key(cache_key)?;
        key::ensure_expiration(expiration)?;

        if let Err(e) = self.distributed.set(cache_key, value, expiration).await {
            tracing::warn!(
                key = %cache_key,
                error = %e,
                "distributed write failed, keeping local copy only"
            );
        }

        self.local
            .set(
                cache_key,
                value,
                expiration.min(self.options.local_expiration_cap()),
            )
            .await?;

        self.publish_invalidation(cache_key).await;
        Ok(())
    }

    /// Remove from both tiers and tell other instances to do the same.
    ///
    /// The three steps are independent: a distributed failure never blocks
    /// local removal, and a publish failure never fails the call.
    pub async fn remove(&self, cache_key: &str) -> Result<()> {
        key::ensure_key(cache_key)?;

        if let Err(e) = self.distributed.remove(cache_key).await {
            tracing::warn!(
                key = %cache_key,
                error = %e,
                "distributed removal failed, removing local copy anyway"
            );
        }

        self.local.remove(cache_key).await?;
        self.publish_invalidation(cache_key).await;
        Ok(())
    }

    /// Whether either tier holds a live entry for `cache_key`.
    pub async fn exists(&self, cache_key: &str) -> Result<bool> {
        key::ensure_key(cache_key)?;

        if self.local.exists(cache_key).await? {
            return Ok(true);
        }
        match self.distributed.exists(cache_key).await {
            Ok(found) => Ok(found),
            Err(e) => {
                tracing::warn!(
                    key = %cache_key,
                    error = %e,
                    "distributed exists check failed, reporting absent"
                );
                Ok(false)
            }
        }
    }

    /// Populate the local tier after a distributed hit.
    ///
    /// The local expiration is the remaining distributed TTL capped by the
    /// local policy; when the TTL probe fails or reports nothing, the
    /// configured fallback applies — the value is still usable even if its
    /// remaining lifetime is unknown.
    async fn repopulate_local<T: Serialize>(&self, cache_key: &str, value: &T) -> Result<()> {
        let expiration = match self.distributed.ttl(cache_key).await {
            Ok(Some(remaining)) if !remaining.is_zero() => remaining,
            Ok(_) => self.options.ttl_probe_fallback(),
            Err(e) => {
                tracing::warn!(
                    key = %cache_key,
                    error = %e,
                    "distributed TTL probe failed, using fallback expiration"
                );
                self.options.ttl_probe_fallback()
            }
        };

        self.local
            .set(
                cache_key,
                value,
                expiration.min(self.options.local_expiration_cap()),
            )
            .await
    }

    async fn publish_invalidation(&self, cache_key: &str) {
        let message = HybridMessage::new(cache_key, self.instance_id);
        if let Err(e) = self.bus.publish(&self.options.topic, &message).await {
            tracing::warn!(
                key = %cache_key,
                error = %e,
                "failed to publish invalidation"
            );
        }
    }

    async fn spawn_subscriber(self: &Arc<Self>) -> Result<()> {
        let mut rx = self.bus.subscribe(&self.options.topic).await?;
        let local = Arc::clone(&self.local);
        let instance_id = self.instance_id;
        let topic = self.options.topic.clone();

        tokio::spawn(async move {
            while let Some(message) = rx.recv().await {
                if message.origin_id == instance_id {
                    continue;
                }
                tracing::debug!(
                    key = %message.cache_key,
                    origin = %message.origin_id,
                    "evicting local copy on invalidation"
                );
                // The distributed tier is already authoritative; only the
                // local copy is dropped.
                if let Err(e) = local.remove(&message.cache_key).await {
                    tracing::warn!(
                        key = %message.cache_key,
                        error = %e,
                        "failed to evict local copy"
                    );
                }
            }
            tracing::debug!(topic = %topic, "invalidation subscription ended");
        });

        Ok(())
    }
}
