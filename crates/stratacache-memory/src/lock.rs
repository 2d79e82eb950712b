//! In-process lock provider.
//!
//! Serializes miss-path retrieval within one process. For cross-process
//! protection use the Redis lock provider; the contract is the same.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use dashmap::DashMap;
use tokio::sync::{Mutex, OwnedMutexGuard};

use stratacache_core::error::Result;
use stratacache_core::lock::{DistributedLock, DistributedLockProvider};

/// Per-name async mutexes. Lock entries are created on first use and kept for
/// the life of the provider; the per-key footprint is one `Arc<Mutex<()>>`.
#[derive(Debug, Default)]
pub struct MemoryLockProvider {
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl MemoryLockProvider {
    pub fn new() -> Self {
        Self::default()
    }

    fn mutex_for(&self, lock_name: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(lock_name.to_string())
            .or_default()
            .clone()
    }
}

struct MemoryLockGuard {
    // Released when the guard drops, which also covers cancelled callers.
    _guard: OwnedMutexGuard<()>,
}

#[async_trait]
impl DistributedLock for MemoryLockGuard {
    async fn release(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl DistributedLockProvider for MemoryLockProvider {
    async fn try_acquire(
        &self,
        lock_name: &str,
        budget: Duration,
    ) -> Result<Option<Box<dyn DistributedLock>>> {
        let mutex = self.mutex_for(lock_name);
        match tokio::time::timeout(budget, mutex.lock_owned()).await {
            Ok(guard) => Ok(Some(Box::new(MemoryLockGuard { _guard: guard }))),
            Err(_) => Ok(None),
        }
    }
}
