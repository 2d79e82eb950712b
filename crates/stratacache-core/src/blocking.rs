//! Blocking facade for thread-pool callers.
//!
//! Wraps a [`CacheClient`] with a captured runtime handle so synchronous code
//! can use the cache without owning async plumbing. Must not be called from
//! within the runtime itself; that would block a worker thread on its own
//! scheduler.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::runtime::Handle;

use crate::error::{BoxError, Result};
use crate::provider::CacheClient;
use crate::stats::CacheStats;
use crate::value::CacheValue;

/// Synchronous view over an async cache provider.
pub struct BlockingCache {
    inner: Arc<CacheClient>,
    handle: Handle,
}

impl BlockingCache {
    /// Wrap `inner`, driving its futures on the runtime behind `handle`.
    pub fn new(inner: Arc<CacheClient>, handle: Handle) -> Self {
        Self { inner, handle }
    }

    pub fn get<T: DeserializeOwned>(&self, cache_key: &str) -> Result<CacheValue<T>> {
        self.handle.block_on(self.inner.get(cache_key))
    }

    pub fn set<T: Serialize>(
        &self,
        cache_key: &str,
        value: &T,
        expiration: Duration,
    ) -> Result<()> {
        self.handle.block_on(self.inner.set(cache_key, value, expiration))
    }

    /// Blocking get-or-create with a synchronous retriever.
    pub fn get_or_create<T, F>(
        &self,
        cache_key: &str,
        retriever: F,
        expiration: Duration,
    ) -> Result<CacheValue<T>>
    where
        T: Serialize + DeserializeOwned + Send,
        F: FnOnce() -> std::result::Result<Option<T>, BoxError> + Send,
    {
        self.handle.block_on(self.inner.get_or_create(
            cache_key,
            || async move { retriever() },
            expiration,
        ))
    }

    pub fn remove(&self, cache_key: &str) -> Result<()> {
        self.handle.block_on(self.inner.remove(cache_key))
    }

    pub fn exists(&self, cache_key: &str) -> Result<bool> {
        self.handle.block_on(self.inner.exists(cache_key))
    }

    pub fn stats(&self) -> CacheStats {
        self.inner.stats()
    }
}
