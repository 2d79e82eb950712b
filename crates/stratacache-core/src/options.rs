//! Per-provider configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{CacheError, Result};

/// Tuning knobs for a single cache provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderOptions {
    /// Upper bound of the random jitter, in seconds, added to every write
    /// expiration so hot keys written together do not all expire together.
    /// `0` disables jitter.
    pub max_random_second: u64,

    /// Budget, in milliseconds, for acquiring the per-key lock on the miss
    /// path. Exhausting it fails the call with a lock timeout.
    pub sleep_ms_for_lock: u64,

    /// Budget, in milliseconds, for the caller-supplied retriever to complete
    /// while the lock is held. Exceeding it fails the call with a retriever
    /// timeout so a hung retriever cannot pin the lock.
    pub lock_ms: u64,

    /// Cache negative retriever results (`None`) instead of leaving the key
    /// absent, shielding the backend source from repeated lookups of
    /// nonexistent data.
    pub cache_nulls: bool,

    /// Expiration, in seconds, for cached negative results. Deliberately
    /// shorter than typical positive TTLs so "not found" answers heal fast.
    pub negative_expiration_secs: u64,

    /// Emit per-operation debug logs in addition to listener events.
    pub enable_logging: bool,
}

impl Default for ProviderOptions {
    fn default() -> Self {
        Self {
            max_random_second: 0,
            sleep_ms_for_lock: 3_000,
            lock_ms: 5_000,
            cache_nulls: false,
            negative_expiration_secs: 120,
            enable_logging: false,
        }
    }
}

impl ProviderOptions {
    /// Validate option combinations that cannot be expressed in the type.
    pub fn validate(&self) -> Result<()> {
        if self.sleep_ms_for_lock == 0 {
            return Err(CacheError::argument(
                "sleep_ms_for_lock must be strictly positive",
            ));
        }
        if self.lock_ms == 0 {
            return Err(CacheError::argument("lock_ms must be strictly positive"));
        }
        if self.cache_nulls && self.negative_expiration_secs == 0 {
            return Err(CacheError::argument(
                "negative_expiration_secs must be strictly positive when cache_nulls is enabled",
            ));
        }
        Ok(())
    }

    pub fn lock_budget(&self) -> Duration {
        Duration::from_millis(self.sleep_ms_for_lock)
    }

    pub fn retriever_budget(&self) -> Duration {
        Duration::from_millis(self.lock_ms)
    }

    pub fn negative_expiration(&self) -> Duration {
        Duration::from_secs(self.negative_expiration_secs)
    }
}

/// Read-only descriptive metadata of a constructed provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderInfo {
    pub name: String,
    pub backend: &'static str,
    pub max_random_second: u64,
    pub serializer_name: &'static str,
}
