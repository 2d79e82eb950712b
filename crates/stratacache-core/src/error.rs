use thiserror::Error;

/// Error source for retriever failures surfaced through `get_or_create`.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Core error types for cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("Invalid argument: {0}")]
    Argument(String),

    #[error("Timed out acquiring lock '{lock_name}' after {budget_ms}ms")]
    LockTimeout { lock_name: String, budget_ms: u64 },

    #[error("Retriever for key '{key}' exceeded the {budget_ms}ms lock-hold budget")]
    RetrieverTimeout { key: String, budget_ms: u64 },

    #[error("No cache provider registered under '{0}'")]
    ProviderNotFound(String),

    #[error("Backend error: {message}")]
    Backend {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Deserialization error: {0}")]
    Deserialization(String),

    #[error("Message bus error: {0}")]
    Bus(String),

    #[error("Retriever error: {0}")]
    Retriever(#[source] BoxError),
}

impl CacheError {
    /// Create a new Argument error
    pub fn argument(message: impl Into<String>) -> Self {
        Self::Argument(message.into())
    }

    /// Create a new LockTimeout error
    pub fn lock_timeout(lock_name: impl Into<String>, budget_ms: u64) -> Self {
        Self::LockTimeout {
            lock_name: lock_name.into(),
            budget_ms,
        }
    }

    /// Create a new RetrieverTimeout error
    pub fn retriever_timeout(key: impl Into<String>, budget_ms: u64) -> Self {
        Self::RetrieverTimeout {
            key: key.into(),
            budget_ms,
        }
    }

    /// Create a new Backend error from a message only
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend {
            message: message.into(),
            source: None,
        }
    }

    /// Create a new Backend error wrapping an underlying driver error
    pub fn backend_with(message: impl Into<String>, source: impl Into<BoxError>) -> Self {
        Self::Backend {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Create a new Bus error
    pub fn bus(message: impl Into<String>) -> Self {
        Self::Bus(message.into())
    }

    /// Create a new Serialization error
    pub fn serialization(message: impl Into<String>) -> Self {
        Self::Serialization(message.into())
    }

    /// Create a new Deserialization error
    pub fn deserialization(message: impl Into<String>) -> Self {
        Self::Deserialization(message.into())
    }

    /// True for both timeout flavors (lock acquisition and bounded retriever).
    pub fn is_timeout(&self) -> bool {
        matches!(
            self,
            Self::LockTimeout { .. } | Self::RetrieverTimeout { .. }
        )
    }

    /// True for errors raised by argument validation before any I/O.
    pub fn is_argument(&self) -> bool {
        matches!(self, Self::Argument(_))
    }

    /// Get error category for logging/monitoring
    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::Argument(_) => ErrorCategory::Validation,
            Self::LockTimeout { .. } | Self::RetrieverTimeout { .. } => ErrorCategory::Timeout,
            Self::ProviderNotFound(_) => ErrorCategory::NotFound,
            Self::Backend { .. } => ErrorCategory::Backend,
            Self::Serialization(_) | Self::Deserialization(_) => ErrorCategory::Codec,
            Self::Bus(_) => ErrorCategory::Bus,
            Self::Retriever(_) => ErrorCategory::Retriever,
        }
    }
}

/// Error categories for monitoring and classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Timeout,
    NotFound,
    Backend,
    Codec,
    Bus,
    Retriever,
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation => write!(f, "validation"),
            Self::Timeout => write!(f, "timeout"),
            Self::NotFound => write!(f, "not_found"),
            Self::Backend => write!(f, "backend"),
            Self::Codec => write!(f, "codec"),
            Self::Bus => write!(f, "bus"),
            Self::Retriever => write!(f, "retriever"),
        }
    }
}

/// Convenience result type for cache operations
pub type Result<T> = std::result::Result<T, CacheError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_argument_error() {
        let err = CacheError::argument("cache key must not be empty");
        assert_eq!(err.to_string(), "Invalid argument: cache key must not be empty");
        assert!(err.is_argument());
        assert!(!err.is_timeout());
        assert_eq!(err.category(), ErrorCategory::Validation);
    }

    #[test]
    fn test_timeout_errors_are_distinguishable_from_backend() {
        let lock = CacheError::lock_timeout("users:42:lock", 3000);
        let retriever = CacheError::retriever_timeout("users:42", 5000);
        let backend = CacheError::backend("connection refused");

        assert!(lock.is_timeout());
        assert!(retriever.is_timeout());
        assert!(!backend.is_timeout());
        assert_eq!(lock.category(), ErrorCategory::Timeout);
        assert_eq!(retriever.category(), ErrorCategory::Timeout);
        assert_eq!(backend.category(), ErrorCategory::Backend);
    }

    #[test]
    fn test_lock_timeout_message() {
        let err = CacheError::lock_timeout("orders:7:lock", 1500);
        assert_eq!(
            err.to_string(),
            "Timed out acquiring lock 'orders:7:lock' after 1500ms"
        );
    }

    #[test]
    fn test_backend_error_keeps_source() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset by peer");
        let err = CacheError::backend_with("redis GET failed", io);
        assert!(std::error::Error::source(&err).is_some());
        assert!(err.to_string().contains("redis GET failed"));
    }

    #[test]
    fn test_provider_not_found() {
        let err = CacheError::ProviderNotFound("redis-eu".to_string());
        assert_eq!(
            err.to_string(),
            "No cache provider registered under 'redis-eu'"
        );
        assert_eq!(err.category(), ErrorCategory::NotFound);
    }

    #[test]
    fn test_codec_errors_share_category() {
        assert_eq!(
            CacheError::serialization("bad value").category(),
            ErrorCategory::Codec
        );
        assert_eq!(
            CacheError::deserialization("truncated payload").category(),
            ErrorCategory::Codec
        );
    }

    #[test]
    fn test_category_display() {
        assert_eq!(ErrorCategory::Validation.to_string(), "validation");
        assert_eq!(ErrorCategory::Timeout.to_string(), "timeout");
        assert_eq!(ErrorCategory::NotFound.to_string(), "not_found");
        assert_eq!(ErrorCategory::Backend.to_string(), "backend");
        assert_eq!(ErrorCategory::Codec.to_string(), "codec");
        assert_eq!(ErrorCategory::Bus.to_string(), "bus");
        assert_eq!(ErrorCategory::Retriever.to_string(), "retriever");
    }
}
