//! Hybrid coordinator configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use stratacache_core::error::{CacheError, Result};

/// Tuning knobs for a [`HybridCache`](crate::HybridCache).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridOptions {
    /// Bus topic invalidation messages travel on. Every instance of one
    /// deployment must share it.
    pub topic: String,

    /// Cap, in seconds, on every local-tier expiration. Bounds how long a
    /// local copy can serve reads after the key changed elsewhere, should
    /// an invalidation message be lost.
    pub local_expiration_cap_secs: u64,

    /// Expiration, in seconds, for local repopulation when the distributed
    /// tier's remaining TTL cannot be determined.
    pub ttl_probe_fallback_secs: u64,
}

impl Default for HybridOptions {
    fn default() -> Self {
        Self {
            topic: "stratacache:invalidate".to_string(),
            local_expiration_cap_secs: 300,
            ttl_probe_fallback_secs: 60,
        }
    }
}

impl HybridOptions {
    pub fn validate(&self) -> Result<()> {
        if self.topic.trim().is_empty() {
            return Err(CacheError::argument("hybrid topic must not be empty"));
        }
        if self.local_expiration_cap_secs == 0 {
            return Err(CacheError::argument(
                "local_expiration_cap_secs must be strictly positive",
            ));
        }
        if self.ttl_probe_fallback_secs == 0 {
            return Err(CacheError::argument(
                "ttl_probe_fallback_secs must be strictly positive",
            ));
        }
        Ok(())
    }

    pub fn local_expiration_cap(&self) -> Duration {
        Duration::from_secs(self.local_expiration_cap_secs)
    }

    pub fn ttl_probe_fallback(&self) -> Duration {
        Duration::from_secs(self.ttl_probe_fallback_secs)
    }
}
