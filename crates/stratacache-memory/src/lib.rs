//! In-process adapters for stratacache.
//!
//! Everything here lives inside the calling process:
//!
//! - [`MemoryStore`]: a DashMap-backed [`BackendStore`] with lazy TTL expiry
//! - [`MemoryBus`]: a broadcast-channel [`MessageBus`] for single-process
//!   deployments and tests
//! - [`MemoryLockProvider`]: per-name async mutexes behind the distributed
//!   lock contract
//!
//! These adapters serve two roles: the local tier of a hybrid cache, and
//! broker-free test doubles for everything built on the core contracts.
//!
//! [`BackendStore`]: stratacache_core::store::BackendStore
//! [`MessageBus`]: stratacache_core::bus::MessageBus

pub mod bus;
pub mod lock;
pub mod store;

pub use bus::MemoryBus;
pub use lock::MemoryLockProvider;
pub use store::MemoryStore;
