//! Redis store adapter.

use std::time::Duration;

use async_trait::async_trait;
use deadpool_redis::{Connection, Pool};
use redis::AsyncCommands;

use stratacache_core::error::{CacheError, Result};
use stratacache_core::store::BackendStore;

/// How many keys one DEL carries during a prefix sweep.
const DEL_BATCH_SIZE: usize = 500;

/// Key-value store over a pooled Redis connection.
///
/// Writes use millisecond TTLs (`SET PX`); prefix removal walks the keyspace
/// with cursor SCAN so it never blocks the server the way KEYS would.
pub struct RedisStore {
    pool: Pool,
}

impl RedisStore {
    pub fn new(pool: Pool) -> Self {
        Self { pool }
    }

    async fn conn(&self) -> Result<Connection> {
        self.pool
            .get()
            .await
            .map_err(|e| CacheError::backend_with("failed to get redis connection", e))
    }
}

#[async_trait]
impl BackendStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let mut conn = self.conn().await?;
        conn.get::<_, Option<Vec<u8>>>(key)
            .await
            .map_err(|e| CacheError::backend_with(format!("redis GET '{key}' failed"), e))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
        let mut conn = self.conn().await?;
        // Sub-millisecond TTLs round up so the entry is not born dead.
        let ttl_ms = (ttl.as_millis() as u64).max(1);
        conn.pset_ex::<_, _, ()>(key, value, ttl_ms)
            .await
            .map_err(|e| CacheError::backend_with(format!("redis SET '{key}' failed"), e))
    }

    async fn remove(&self, key: &str) -> Result<()> {
        let mut conn = self.conn().await?;
        conn.del::<_, ()>(key)
            .await
            .map_err(|e| CacheError::backend_with(format!("redis DEL '{key}' failed"), e))
    }

    async fn remove_by_prefix(&self, prefix: &str) -> Result<u64> {
        let mut conn = self.conn().await?;
        let pattern = format!("{prefix}*");

        let keys: Vec<String> = {
            let mut iter = conn
                .scan_match::<_, String>(&pattern)
                .await
                .map_err(|e| {
                    CacheError::backend_with(format!("redis SCAN '{pattern}' failed"), e)
                })?;
            let mut keys = Vec::new();
            while let Some(key) = iter.next_item().await {
                keys.push(key);
            }
            keys
        };

        let removed = keys.len() as u64;
        for batch in keys.chunks(DEL_BATCH_SIZE) {
            conn.del::<_, ()>(batch.to_vec())
                .await
                .map_err(|e| CacheError::backend_with("redis DEL batch failed", e))?;
        }

        tracing::debug!(prefix = %prefix, removed, "removed keys by prefix");
        Ok(removed)
    }

    async fn exists(&self, key: &str) -> Result<bool> {
        let mut conn = self.conn().await?;
        conn.exists::<_, bool>(key)
            .await
            .map_err(|e| CacheError::backend_with(format!("redis EXISTS '{key}' failed"), e))
    }

    async fn get_ttl(&self, key: &str) -> Result<Option<Duration>> {
        let mut conn = self.conn().await?;
        let ttl_ms: i64 = conn
            .pttl(key)
            .await
            .map_err(|e| CacheError::backend_with(format!("redis PTTL '{key}' failed"), e))?;
        // -2: no such key, -1: no expiry. Unknown lifetime either way.
        if ttl_ms < 0 {
            Ok(None)
        } else {
            Ok(Some(Duration::from_millis(ttl_ms as u64)))
        }
    }

    fn backend_name(&self) -> &'static str {
        "redis"
    }
}
