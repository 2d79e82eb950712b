//! Cache key and expiration validation.
//!
//! Every public operation validates its arguments here before any I/O,
//! so an invalid key or expiration never reaches a backend.

use std::time::Duration;

use crate::error::{CacheError, Result};

/// Validate a single cache key. Empty and whitespace-only keys are rejected.
pub fn ensure_key(key: &str) -> Result<()> {
    if key.trim().is_empty() {
        return Err(CacheError::argument("cache key must not be empty or whitespace"));
    }
    Ok(())
}

/// Validate a batch of cache keys. The batch itself must be non-empty.
pub fn ensure_keys<'a, I>(keys: I) -> Result<()>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut seen_any = false;
    for key in keys {
        ensure_key(key)?;
        seen_any = true;
    }
    if !seen_any {
        return Err(CacheError::argument("key batch must not be empty"));
    }
    Ok(())
}

/// Validate a write expiration. Zero is a caller error, not "never expire".
pub fn ensure_expiration(expiration: Duration) -> Result<()> {
    if expiration.is_zero() {
        return Err(CacheError::argument(
            "expiration must be strictly positive",
        ));
    }
    Ok(())
}

/// Backend key for a logical cache key, namespaced by provider name so one
/// physical backend can serve several providers.
///
/// Format: `{provider}:{key}` — e.g. `users:user:42`.
#[inline]
pub fn namespaced(provider: &str, key: &str) -> String {
    format!("{provider}:{key}")
}

/// Namespace prefix of a provider, used for prefix sweeps and flush.
#[inline]
pub fn namespace_prefix(provider: &str) -> String {
    format!("{provider}:")
}

/// Name of the per-key distributed lock guarding miss-path retrieval.
///
/// Deterministic across processes: every instance computing the same provider
/// name and key contends on the same lock.
#[inline]
pub fn lock_name(provider: &str, key: &str) -> String {
    format!("{provider}:{key}:lock")
}
