//! Redis adapters for stratacache.
//!
//! Implements the core contracts against a shared Redis deployment:
//!
//! - [`RedisStore`]: byte-level key-value store over a deadpool connection
//!   pool, with cursor-based prefix removal
//! - [`RedisLockProvider`]: cross-process locks via `SET NX PX` with
//!   owner-checked release
//! - [`RedisBus`]: pub/sub invalidation with automatic reconnect
//!
//! All adapters share one [`Pool`](deadpool_redis::Pool); build it with
//! [`create_pool`].

pub mod bus;
pub mod lock;
pub mod pool;
pub mod store;

pub use bus::RedisBus;
pub use lock::RedisLockProvider;
pub use pool::{RedisPoolConfig, create_pool};
pub use store::RedisStore;
