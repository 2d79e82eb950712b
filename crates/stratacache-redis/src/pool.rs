//! Redis connection pooling.

use std::time::Duration;

use deadpool_redis::{Config, Pool, Runtime};

use stratacache_core::error::{CacheError, Result};

/// Connection knobs shared by the Redis adapters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RedisPoolConfig {
    /// Connection URL, e.g. `redis://localhost:6379`.
    pub url: String,
    /// Maximum pooled connections.
    pub pool_size: usize,
    /// Budget in milliseconds for creating, recycling, or waiting on a
    /// pooled connection.
    pub timeout_ms: u64,
}

impl Default for RedisPoolConfig {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            pool_size: 16,
            timeout_ms: 5_000,
        }
    }
}

/// Build a connection pool and probe it once, so a misconfigured URL fails
/// at startup instead of on the first cache call.
pub async fn create_pool(config: &RedisPoolConfig) -> Result<Pool> {
    let mut redis_config = Config::from_url(&config.url);

    let mut pool_config = redis_config.get_pool_config();
    pool_config.max_size = config.pool_size;
    pool_config.timeouts.wait = Some(Duration::from_millis(config.timeout_ms));
    pool_config.timeouts.create = Some(Duration::from_millis(config.timeout_ms));
    pool_config.timeouts.recycle = Some(Duration::from_millis(config.timeout_ms));
    redis_config.pool = Some(pool_config);

    let pool = redis_config
        .create_pool(Some(Runtime::Tokio1))
        .map_err(|e| CacheError::backend_with("failed to create redis pool", e))?;

    pool.get()
        .await
        .map_err(|e| CacheError::backend_with("failed to connect to redis", e))?;

    tracing::info!(url = %config.url, pool_size = config.pool_size, "connected to redis");
    Ok(pool)
}
