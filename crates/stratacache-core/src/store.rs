//! The backend store contract.
//!
//! This is the only shape the core depends on: a byte-level key-value store
//! with TTL semantics. Concrete backends (in-memory, Redis, ...) are adapters
//! implementing this trait in their own crates.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// The key-value contract every cache backend adapter must implement.
///
/// Implementations must be thread-safe (`Send + Sync`). Keys arriving here are
/// already validated and namespaced by the provider; adapters never see raw
/// caller keys.
///
/// # Errors
///
/// Adapters surface their driver errors as `CacheError::Backend`. Whether such
/// an error propagates to the caller or degrades to a miss is decided by the
/// provider and the hybrid coordinator, not here.
#[async_trait]
pub trait BackendStore: Send + Sync {
    /// Reads the raw bytes stored under `key`.
    ///
    /// Returns `None` for a missing or expired entry.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// Writes `value` under `key` with the given time-to-live.
    async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()>;

    /// Removes `key`. Removing a missing key is not an error.
    async fn remove(&self, key: &str) -> Result<()>;

    /// Removes every key starting with `prefix`, returning how many were
    /// dropped (best effort for backends that can only approximate the count).
    async fn remove_by_prefix(&self, prefix: &str) -> Result<u64>;

    /// Whether a live (non-expired) entry exists under `key`.
    async fn exists(&self, key: &str) -> Result<bool>;

    /// Remaining time-to-live of `key`.
    ///
    /// Returns `Ok(None)` when the key is missing or carries no expiry — the
    /// remaining lifetime is unknown either way.
    async fn get_ttl(&self, key: &str) -> Result<Option<Duration>>;

    /// Returns the name of this backend for logging/metadata.
    fn backend_name(&self) -> &'static str;
}
