//! Diagnostic events emitted by providers.
//!
//! Listeners are injected at provider construction rather than registered in
//! process-wide state, which keeps tests hermetic and lets two providers
//! report to different sinks.

/// A diagnostic event describing one provider operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheEvent {
    Hit { provider: String, key: String },
    Miss { provider: String, key: String },
    Set { provider: String, key: String },
    Removed { provider: String, key: String },
    Error {
        provider: String,
        operation: String,
        message: String,
    },
}

impl CacheEvent {
    pub fn provider(&self) -> &str {
        match self {
            Self::Hit { provider, .. }
            | Self::Miss { provider, .. }
            | Self::Set { provider, .. }
            | Self::Removed { provider, .. }
            | Self::Error { provider, .. } => provider,
        }
    }
}

/// Observer for provider diagnostics. Invoked inline on the calling task, so
/// implementations must be cheap and non-blocking.
pub trait CacheEventListener: Send + Sync {
    fn on_event(&self, event: &CacheEvent);
}

/// Listener that drops every event.
#[derive(Debug, Default)]
pub struct NoopListener;

impl CacheEventListener for NoopListener {
    fn on_event(&self, _event: &CacheEvent) {}
}

/// Listener that forwards events to `tracing`.
#[derive(Debug, Default)]
pub struct TracingListener;

impl CacheEventListener for TracingListener {
    fn on_event(&self, event: &CacheEvent) {
        match event {
            CacheEvent::Hit { provider, key } => {
                tracing::debug!(provider = %provider, key = %key, "cache hit");
            }
            CacheEvent::Miss { provider, key } => {
                tracing::debug!(provider = %provider, key = %key, "cache miss");
            }
            CacheEvent::Set { provider, key } => {
                tracing::debug!(provider = %provider, key = %key, "cache set");
            }
            CacheEvent::Removed { provider, key } => {
                tracing::debug!(provider = %provider, key = %key, "cache entry removed");
            }
            CacheEvent::Error {
                provider,
                operation,
                message,
            } => {
                tracing::warn!(
                    provider = %provider,
                    operation = %operation,
                    error = %message,
                    "cache operation error"
                );
            }
        }
    }
}
