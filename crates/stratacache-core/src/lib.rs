//! Core contracts and coordination logic for stratacache.
//!
//! This crate holds everything that is backend-agnostic:
//!
//! - the [`BackendStore`], [`DistributedLockProvider`] and [`MessageBus`]
//!   traits that adapter crates implement
//! - [`CacheClient`], the single provider with the stampede-protected
//!   get-or-create path
//! - [`ProviderRegistry`], the immutable name → provider map
//! - cache values, error taxonomy, stats counters, payload codecs,
//!   diagnostic events and bus decorators
//!
//! Backend adapters live in `stratacache-memory` and `stratacache-redis`;
//! the two-tier coordinator lives in `stratacache-hybrid`.

pub mod blocking;
pub mod bus;
pub mod codec;
pub mod decorator;
pub mod error;
pub mod events;
pub mod key;
pub mod lock;
pub mod options;
pub mod provider;
pub mod registry;
pub mod stats;
pub mod store;
pub mod value;

pub use blocking::BlockingCache;
pub use bus::{HybridMessage, MessageBus};
pub use codec::Codec;
pub use decorator::RetryBus;
pub use error::{BoxError, CacheError, ErrorCategory, Result};
pub use events::{CacheEvent, CacheEventListener, NoopListener, TracingListener};
pub use lock::{DistributedLock, DistributedLockProvider};
pub use options::{ProviderInfo, ProviderOptions};
pub use provider::{CacheClient, CacheClientBuilder};
pub use registry::{ProviderRegistry, ProviderRegistryBuilder};
pub use stats::{CacheStats, StatsCounter};
pub use store::BackendStore;
pub use value::CacheValue;
