//! Redis-backed distributed lock.
//!
//! Acquisition is `SET NX PX` with a per-guard owner token, polled until the
//! caller's budget elapses. Release runs an owner-checked Lua DEL, so a stale
//! guard can never delete a lock that a later holder re-acquired after the
//! key expired.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use deadpool_redis::Pool;
use redis::Script;
use uuid::Uuid;

use stratacache_core::error::{CacheError, Result};
use stratacache_core::lock::{DistributedLock, DistributedLockProvider};

const RELEASE_SCRIPT: &str = r#"
if redis.call('GET', KEYS[1]) == ARGV[1] then
    return redis.call('DEL', KEYS[1])
else
    return 0
end
"#;

/// Cross-process lock provider over a shared Redis.
pub struct RedisLockProvider {
    pool: Pool,
    lock_ttl: Duration,
    poll_interval: Duration,
}

impl RedisLockProvider {
    /// `lock_ttl` bounds how long a crashed holder can keep the lock taken;
    /// it must exceed the longest retriever budget used with this provider.
    pub fn new(pool: Pool, lock_ttl: Duration) -> Self {
        Self {
            pool,
            lock_ttl,
            poll_interval: Duration::from_millis(50),
        }
    }

    /// How long to sleep between acquisition attempts while the lock is held
    /// elsewhere.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    async fn try_set(&self, lock_name: &str, owner: &str) -> Result<bool> {
        let mut conn = self
            .pool
            .get()
            .await
            .map_err(|e| CacheError::backend_with("failed to get redis connection", e))?;
        let outcome: Option<String> = redis::cmd("SET")
            .arg(lock_name)
            .arg(owner)
            .arg("NX")
            .arg("PX")
            .arg(self.lock_ttl.as_millis() as u64)
            .query_async(&mut conn)
            .await
            .map_err(|e| {
                CacheError::backend_with(format!("redis SET NX '{lock_name}' failed"), e)
            })?;
        Ok(outcome.is_some())
    }
}

#[async_trait]
impl DistributedLockProvider for RedisLockProvider {
    async fn try_acquire(
        &self,
        lock_name: &str,
        budget: Duration,
    ) -> Result<Option<Box<dyn DistributedLock>>> {
        let owner = Uuid::new_v4().to_string();
        let deadline = Instant::now() + budget;

        loop {
            if self.try_set(lock_name, &owner).await? {
                return Ok(Some(Box::new(RedisLockGuard {
                    pool: self.pool.clone(),
                    lock_name: lock_name.to_string(),
                    owner,
                    released: false,
                })));
            }
            if Instant::now() + self.poll_interval >= deadline {
                return Ok(None);
            }
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

struct RedisLockGuard {
    pool: Pool,
    lock_name: String,
    owner: String,
    released: bool,
}

impl RedisLockGuard {
    async fn delete_if_owner(pool: &Pool, lock_name: &str, owner: &str) -> Result<()> {
        let mut conn = pool
            .get()
            .await
            .map_err(|e| CacheError::backend_with("failed to get redis connection", e))?;
        let _deleted: i64 = Script::new(RELEASE_SCRIPT)
            .key(lock_name)
            .arg(owner)
            .invoke_async(&mut conn)
            .await
            .map_err(|e| {
                CacheError::backend_with(format!("redis lock release '{lock_name}' failed"), e)
            })?;
        Ok(())
    }
}

#[async_trait]
impl DistributedLock for RedisLockGuard {
    async fn release(mut self: Box<Self>) -> Result<()> {
        self.released = true;
        Self::delete_if_owner(&self.pool, &self.lock_name, &self.owner).await
    }
}

impl Drop for RedisLockGuard {
    fn drop(&mut self) {
        if self.released {
            return;
        }
        // A dropped-without-release guard means the caller was cancelled;
        // release in the background so the lock is not pinned until its TTL.
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let pool = self.pool.clone();
        let lock_name = std::mem::take(&mut self.lock_name);
        let owner = std::mem::take(&mut self.owner);
        handle.spawn(async move {
            if let Err(e) = RedisLockGuard::delete_if_owner(&pool, &lock_name, &owner).await {
                tracing::warn!(
                    lock_name = %lock_name,
                    error = %e,
                    "failed to release redis lock on drop"
                );
            }
        });
    }
}
