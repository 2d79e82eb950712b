//! Name → provider lookup.
//!
//! The registry is assembled once at startup and immutable afterwards, so
//! concurrent lookups need no synchronization.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{CacheError, Result};
use crate::provider::CacheClient;

/// Immutable map of provider name to provider.
pub struct ProviderRegistry {
    providers: HashMap<String, Arc<CacheClient>>,
}

/// Builder collecting providers before the registry is frozen.
#[derive(Debug, Default)]
pub struct ProviderRegistryBuilder {
    providers: HashMap<String, Arc<CacheClient>>,
}

impl ProviderRegistryBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a provider under its own name. Registering the same name
    /// twice is a construction error.
    pub fn register(mut self, provider: Arc<CacheClient>) -> Result<Self> {
        let name = provider.name().to_string();
        if self.providers.contains_key(&name) {
            return Err(CacheError::argument(format!(
                "provider '{name}' is already registered"
            )));
        }
        self.providers.insert(name, provider);
        Ok(self)
    }

    pub fn build(self) -> ProviderRegistry {
        ProviderRegistry {
            providers: self.providers,
        }
    }
}

impl ProviderRegistry {
    pub fn builder() -> ProviderRegistryBuilder {
        ProviderRegistryBuilder::new()
    }

    /// Look up a provider by name.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::ProviderNotFound` when nothing was registered
    /// under `name`.
    pub fn get(&self, name: &str) -> Result<Arc<CacheClient>> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| CacheError::ProviderNotFound(name.to_string()))
    }

    /// Names of all registered providers, unordered.
    pub fn names(&self) -> Vec<&str> {
        self.providers.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.providers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.providers.is_empty()
    }
}
