//! The distributed lock contract used for stampede protection.

use std::time::Duration;

use async_trait::async_trait;

use crate::error::Result;

/// A held lock. Obtained from [`DistributedLockProvider::try_acquire`].
///
/// Implementations must also release on drop (for the in-process lock this is
/// the mutex guard's own drop; for remote locks, a spawned best-effort
/// release), so a caller whose future is cancelled mid-call never leaves the
/// lock held. Explicit `release` is still preferred: it reports failures and
/// completes before the caller observes the result.
#[async_trait]
pub trait DistributedLock: Send {
    /// Release the lock. Consumes the guard; safe to call exactly once.
    async fn release(self: Box<Self>) -> Result<()>;
}

/// Acquires named mutual-exclusion locks shared across processes.
#[async_trait]
pub trait DistributedLockProvider: Send + Sync {
    /// Try to acquire `lock_name`, waiting at most `budget`.
    ///
    /// Returns `Ok(None)` when the budget elapses without acquisition — the
    /// caller decides whether that is fatal. Acquisition failure must leave
    /// nothing to release.
    async fn try_acquire(
        &self,
        lock_name: &str,
        budget: Duration,
    ) -> Result<Option<Box<dyn DistributedLock>>>;
}
