//! Configuration for stratacache deployments.
//!
//! Settings load from an optional TOML file overlaid with
//! `STRATACACHE__`-prefixed environment variables (double underscore as the
//! nesting separator, e.g. `STRATACACHE__REDIS__URL`). Everything has a
//! working default; a file or environment only needs to name what differs.
//!
//! ```toml
//! [providers.users]
//! serializer = "json"
//!
//! [providers.users.options]
//! cache_nulls = true
//! max_random_second = 30
//!
//! [hybrid]
//! topic = "myapp:invalidate"
//! local_expiration_cap_secs = 120
//!
//! [redis]
//! url = "redis://cache.internal:6379"
//! pool_size = 32
//! ```

use std::collections::HashMap;
use std::path::Path;

use config::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use stratacache_core::codec::Codec;
use stratacache_core::options::ProviderOptions;

/// Prefix for environment variable overrides.
pub const ENV_PREFIX: &str = "STRATACACHE";

/// Error types for configuration loading and validation.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// Root settings for a deployment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Named cache providers and their tuning.
    pub providers: HashMap<String, ProviderSettings>,
    /// Two-tier coordinator settings.
    pub hybrid: HybridSettings,
    /// Redis connection settings shared by the Redis adapters.
    pub redis: RedisSettings,
}

/// Per-provider settings: payload codec plus the core tuning knobs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderSettings {
    /// Payload codec: `"msgpack"` or `"json"`.
    pub serializer: String,
    pub options: ProviderOptions,
}

impl Default for ProviderSettings {
    fn default() -> Self {
        Self {
            serializer: "msgpack".to_string(),
            options: ProviderOptions::default(),
        }
    }
}

impl ProviderSettings {
    /// The configured codec.
    ///
    /// Only meaningful after [`Settings::validate`] accepted the serializer
    /// name; unknown names fall back to the default codec here.
    pub fn codec(&self) -> Codec {
        match self.serializer.as_str() {
            "json" => Codec::Json,
            _ => Codec::MessagePack,
        }
    }
}

/// Settings for the hybrid coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HybridSettings {
    /// Invalidation topic shared by all instances of a deployment.
    pub topic: String,
    /// Cap, in seconds, on local-tier expirations.
    pub local_expiration_cap_secs: u64,
    /// Local expiration, in seconds, when the distributed TTL is unknown.
    pub ttl_probe_fallback_secs: u64,
    /// Registry name of the provider serving as the local tier.
    pub local_provider: String,
    /// Registry name of the provider serving as the distributed tier.
    pub distributed_provider: String,
}

impl Default for HybridSettings {
    fn default() -> Self {
        Self {
            topic: "stratacache:invalidate".to_string(),
            local_expiration_cap_secs: 300,
            ttl_probe_fallback_secs: 60,
            local_provider: "local".to_string(),
            distributed_provider: "distributed".to_string(),
        }
    }
}

/// Connection settings for the Redis adapters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RedisSettings {
    /// Connection URL, e.g. `redis://localhost:6379`.
    pub url: String,
    /// Maximum pooled connections.
    pub pool_size: usize,
    /// Connection timeout in milliseconds.
    pub timeout_ms: u64,
}

impl Default for RedisSettings {
    fn default() -> Self {
        Self {
            url: "redis://localhost:6379".to_string(),
            pool_size: 16,
            timeout_ms: 5_000,
        }
    }
}

impl Settings {
    /// Load settings from an optional TOML file overlaid with environment
    /// variables, then validate.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(path) = path {
            builder = builder.add_source(File::from(path));
        }
        let settings: Settings = builder
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()?;

        settings.validate()?;
        Ok(settings)
    }

    /// Parse settings from a TOML string, without environment overlay.
    pub fn from_toml_str(raw: &str) -> Result<Self, ConfigError> {
        let settings: Settings =
            toml::from_str(raw).map_err(|e| ConfigError::Parse(e.to_string()))?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject settings no provider or coordinator could be built from.
    pub fn validate(&self) -> Result<(), ConfigError> {
        for (name, provider) in &self.providers {
            if name.trim().is_empty() {
                return Err(ConfigError::Validation(
                    "provider names must not be empty".to_string(),
                ));
            }
            match provider.serializer.as_str() {
                "json" | "msgpack" => {}
                other => {
                    return Err(ConfigError::Validation(format!(
                        "provider '{name}': unknown serializer '{other}' (expected 'json' or 'msgpack')"
                    )));
                }
            }
            provider
                .options
                .validate()
                .map_err(|e| ConfigError::Validation(format!("provider '{name}': {e}")))?;
        }

        if self.hybrid.topic.trim().is_empty() {
            return Err(ConfigError::Validation(
                "hybrid.topic must not be empty".to_string(),
            ));
        }
        if self.hybrid.local_expiration_cap_secs == 0 {
            return Err(ConfigError::Validation(
                "hybrid.local_expiration_cap_secs must be > 0".to_string(),
            ));
        }
        if self.hybrid.ttl_probe_fallback_secs == 0 {
            return Err(ConfigError::Validation(
                "hybrid.ttl_probe_fallback_secs must be > 0".to_string(),
            ));
        }
        if self.hybrid.local_provider.trim().is_empty()
            || self.hybrid.distributed_provider.trim().is_empty()
        {
            return Err(ConfigError::Validation(
                "hybrid provider names must not be empty".to_string(),
            ));
        }

        if self.redis.url.trim().is_empty() {
            return Err(ConfigError::Validation(
                "redis.url must not be empty".to_string(),
            ));
        }
        if self.redis.pool_size == 0 {
            return Err(ConfigError::Validation(
                "redis.pool_size must be > 0".to_string(),
            ));
        }
        if self.redis.timeout_ms == 0 {
            return Err(ConfigError::Validation(
                "redis.timeout_ms must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write as _;

    #[test]
    fn test_defaults_validate() {
        let settings = Settings::default();
        settings.validate().unwrap();
        assert_eq!(settings.redis.url, "redis://localhost:6379");
        assert_eq!(settings.hybrid.topic, "stratacache:invalidate");
    }

    #[test]
    fn test_load_without_file_yields_defaults() {
        let settings = Settings::load(None).unwrap();
        assert!(settings.providers.is_empty());
        assert_eq!(settings.hybrid.local_provider, "local");
    }

    #[test]
    fn test_toml_round_trip_through_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        write!(
            file,
            r#"
            [providers.users]
            serializer = "json"

            [providers.users.options]
            cache_nulls = true
            max_random_second = 30

            [hybrid]
            topic = "myapp:invalidate"
            local_expiration_cap_secs = 120

            [redis]
            url = "redis://cache.internal:6379"
            pool_size = 32
            "#
        )
        .unwrap();

        let settings = Settings::load(Some(file.path())).unwrap();

        let users = &settings.providers["users"];
        assert_eq!(users.codec(), Codec::Json);
        assert!(users.options.cache_nulls);
        assert_eq!(users.options.max_random_second, 30);
        // Untouched fields keep their defaults.
        assert_eq!(users.options.sleep_ms_for_lock, 3_000);

        assert_eq!(settings.hybrid.topic, "myapp:invalidate");
        assert_eq!(settings.hybrid.local_expiration_cap_secs, 120);
        assert_eq!(settings.hybrid.ttl_probe_fallback_secs, 60);

        assert_eq!(settings.redis.url, "redis://cache.internal:6379");
        assert_eq!(settings.redis.pool_size, 32);
    }

    #[test]
    fn test_env_overrides_file() {
        let mut file = tempfile::Builder::new()
            .suffix(".toml")
            .tempfile()
            .unwrap();
        write!(
            file,
            r#"
            [redis]
            url = "redis://from-file:6379"
            "#
        )
        .unwrap();

        // SAFETY: test-only mutation, removed before the test returns.
        unsafe { std::env::set_var("STRATACACHE__REDIS__URL", "redis://from-env:6379") };
        let settings = Settings::load(Some(file.path()));
        unsafe { std::env::remove_var("STRATACACHE__REDIS__URL") };

        assert_eq!(settings.unwrap().redis.url, "redis://from-env:6379");
    }

    #[test]
    fn test_from_toml_str() {
        let settings = Settings::from_toml_str(
            r#"
            [hybrid]
            ttl_probe_fallback_secs = 15
            "#,
        )
        .unwrap();
        assert_eq!(settings.hybrid.ttl_probe_fallback_secs, 15);
    }

    #[test]
    fn test_unknown_serializer_rejected() {
        let err = Settings::from_toml_str(
            r#"
            [providers.users]
            serializer = "protobuf"
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
        assert!(err.to_string().contains("protobuf"));
    }

    #[test]
    fn test_invalid_provider_options_rejected_with_context() {
        let err = Settings::from_toml_str(
            r#"
            [providers.orders.options]
            sleep_ms_for_lock = 0
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("orders"));
    }

    #[test]
    fn test_zero_hybrid_cap_rejected() {
        let err = Settings::from_toml_str(
            r#"
            [hybrid]
            local_expiration_cap_secs = 0
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_empty_redis_url_rejected() {
        let err = Settings::from_toml_str(
            r#"
            [redis]
            url = ""
            "#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Validation(_)));
    }

    #[test]
    fn test_malformed_toml_is_a_parse_error() {
        let err = Settings::from_toml_str("[providers").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }
}
