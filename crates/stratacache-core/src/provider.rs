//! The single cache provider: uniform CRUD over one backend store plus the
//! stampede-protected get-or-create path.
//!
//! ## Miss-path locking
//!
//! Without protection, concurrent misses on a hot key all invoke the (possibly
//! expensive) retriever at once. `get_or_create` therefore takes a per-key
//! distributed lock on the miss path and re-reads the backend under it, so one
//! concurrent miss group performs exactly one retrieval and one write. The
//! fast path (key present) never touches the lock.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use rand::Rng;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::codec::Codec;
use crate::error::{BoxError, CacheError, Result};
use crate::events::{CacheEvent, CacheEventListener, NoopListener, TracingListener};
use crate::key;
use crate::lock::DistributedLockProvider;
use crate::options::{ProviderInfo, ProviderOptions};
use crate::stats::{CacheStats, StatsCounter};
use crate::store::BackendStore;
use crate::value::CacheValue;

/// A named cache provider over one backend store.
///
/// Construct with [`CacheClient::builder`]. Providers are built once at
/// startup and shared (`Arc`) for the life of the process.
pub struct CacheClient {
    name: String,
    store: Arc<dyn BackendStore>,
    codec: Codec,
    lock_provider: Option<Arc<dyn DistributedLockProvider>>,
    listener: Arc<dyn CacheEventListener>,
    options: ProviderOptions,
    stats: StatsCounter,
}

impl std::fmt::Debug for CacheClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CacheClient")
            .field("name", &self.name)
            .field("codec", &self.codec)
            .field("options", &self.options)
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

/// Builder for [`CacheClient`].
pub struct CacheClientBuilder {
    name: String,
    store: Arc<dyn BackendStore>,
    codec: Codec,
    lock_provider: Option<Arc<dyn DistributedLockProvider>>,
    listener: Option<Arc<dyn CacheEventListener>>,
    options: ProviderOptions,
}

impl CacheClientBuilder {
    /// Payload codec. Defaults to MessagePack.
    pub fn codec(mut self, codec: Codec) -> Self {
        self.codec = codec;
        self
    }

    /// Distributed lock provider enabling stampede protection. Without one,
    /// `get_or_create` degrades to a best-effort read-retrieve-write that may
    /// race.
    pub fn lock_provider(mut self, provider: Arc<dyn DistributedLockProvider>) -> Self {
        self.lock_provider = Some(provider);
        self
    }

    /// Diagnostic event listener. Defaults to a tracing-backed listener when
    /// `enable_logging` is set, a no-op listener otherwise.
    pub fn listener(mut self, listener: Arc<dyn CacheEventListener>) -> Self {
        self.listener = Some(listener);
        self
    }

    pub fn options(mut self, options: ProviderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn build(self) -> Result<CacheClient> {
        key::ensure_key(&self.name)
            .map_err(|_| CacheError::argument("provider name must not be empty"))?;
        self.options.validate()?;

        let listener = self.listener.unwrap_or_else(|| {
            if self.options.enable_logging {
                Arc::new(TracingListener)
            } else {
                Arc::new(NoopListener)
            }
        });

        Ok(CacheClient {
            name: self.name,
            store: self.store,
            codec: self.codec,
            lock_provider: self.lock_provider,
            listener,
            options: self.options,
            stats: StatsCounter::new(),
        })
    }
}

impl CacheClient {
    pub fn builder(name: impl Into<String>, store: Arc<dyn BackendStore>) -> CacheClientBuilder {
        CacheClientBuilder {
            name: name.into(),
            store,
            codec: Codec::default(),
            lock_provider: None,
            listener: None,
            options: ProviderOptions::default(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Read-only descriptive metadata, fixed at construction.
    pub fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: self.name.clone(),
            backend: self.store.backend_name(),
            max_random_second: self.options.max_random_second,
            serializer_name: self.codec.name(),
        }
    }

    /// Hit/miss counters for this provider.
    pub fn stats(&self) -> CacheStats {
        self.stats.snapshot()
    }

    /// Get a value. A corrupt cached payload counts as a miss; the entry is
    /// left in place for its TTL to clear.
    pub async fn get<T: DeserializeOwned>(&self, cache_key: &str) -> Result<CacheValue<T>> {
        key::ensure_key(cache_key)?;
        let backend_key = key::namespaced(&self.name, cache_key);

        match self.read_entry::<T>(&backend_key).await? {
            Some(found) => {
                self.stats.record_hit();
                self.emit(CacheEvent::Hit {
                    provider: self.name.clone(),
                    key: cache_key.to_string(),
                });
                Ok(found)
            }
            None => {
                self.stats.record_miss();
                self.emit(CacheEvent::Miss {
                    provider: self.name.clone(),
                    key: cache_key.to_string(),
                });
                Ok(CacheValue::NoValue)
            }
        }
    }

    /// Set a value with the given expiration (jittered when configured).
    pub async fn set<T: Serialize>(
        &self,
        cache_key: &str,
        value: &T,
        expiration: Duration,
    ) -> Result<()> {
        key::ensure_key(cache_key)?;
        key::ensure_expiration(expiration)?;

        let backend_key = key::namespaced(&self.name, cache_key);
        let bytes = self.codec.encode(Some(value))?;
        self.store
            .set(&backend_key, bytes, self.jittered(expiration))
            .await?;
        self.emit(CacheEvent::Set {
            provider: self.name.clone(),
            key: cache_key.to_string(),
        });
        Ok(())
    }

    /// Get the value for `cache_key`, invoking `retriever` to populate it on a
    /// miss.
    ///
    /// With a lock provider configured, concurrent misses on the same key are
    /// collapsed: one caller acquires the per-key lock, re-checks the backend,
    /// runs the retriever (bounded by the lock-hold budget) and writes the
    /// result; the rest find the entry on their double-checked read.
    ///
    /// A `None` retriever result is returned as [`CacheValue::NoValue`]; with
    /// `cache_nulls` enabled it is also written back under the negative
    /// expiration so subsequent calls skip the retriever entirely.
    ///
    /// # Errors
    ///
    /// Backend errors propagate unchanged. Lock-budget exhaustion is
    /// `CacheError::LockTimeout`, a retriever exceeding the lock-hold budget
    /// is `CacheError::RetrieverTimeout`, and a failed retriever surfaces as
    /// `CacheError::Retriever` — in every case the lock is released first.
    pub async fn get_or_create<T, F, Fut>(
        &self,
        cache_key: &str,
        retriever: F,
        expiration: Duration,
    ) -> Result<CacheValue<T>>
    where
        T: Serialize + DeserializeOwned + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = std::result::Result<Option<T>, BoxError>> + Send,
    {
        key::ensure_key(cache_key)?;
        key::ensure_expiration(expiration)?;
        let backend_key = key::namespaced(&self.name, cache_key);

        // Fast path: no lock when the entry is already present.
        if let Some(found) = self.read_entry::<T>(&backend_key).await? {
            self.stats.record_hit();
            self.emit(CacheEvent::Hit {
                provider: self.name.clone(),
                key: cache_key.to_string(),
            });
            return Ok(found);
        }

        let Some(lock_provider) = self.lock_provider.clone() else {
            // No lock configured: best effort, concurrent misses may race.
            return self
                .retrieve_and_store(&backend_key, cache_key, retriever, expiration)
                .await;
        };

        let lock_name = key::lock_name(&self.name, cache_key);
        let guard = lock_provider
            .try_acquire(&lock_name, self.options.lock_budget())
            .await?
            .ok_or_else(|| {
                CacheError::lock_timeout(&lock_name, self.options.sleep_ms_for_lock)
            })?;

        let outcome = self
            .create_under_lock(&backend_key, cache_key, retriever, expiration)
            .await;

        // Release on every exit path; a release failure is logged, never
        // allowed to mask the call's own outcome.
        if let Err(e) = guard.release().await {
            tracing::warn!(lock_name = %lock_name, error = %e, "failed to release cache lock");
        }

        outcome
    }

    /// Remove a key. Removing a missing key succeeds.
    pub async fn remove(&self, cache_key: &str) -> Result<()> {
        key::ensure_key(cache_key)?;
        let backend_key = key::namespaced(&self.name, cache_key);
        self.store.remove(&backend_key).await?;
        self.emit(CacheEvent::Removed {
            provider: self.name.clone(),
            key: cache_key.to_string(),
        });
        Ok(())
    }

    /// Remove a batch of keys. The whole batch is validated before any I/O.
    pub async fn remove_all<'a, I>(&self, cache_keys: I) -> Result<()>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let keys: Vec<&str> = cache_keys.into_iter().collect();
        key::ensure_keys(keys.iter().copied())?;
        for cache_key in keys {
            self.remove(cache_key).await?;
        }
        Ok(())
    }

    /// Remove every key of this provider starting with `prefix`.
    pub async fn remove_by_prefix(&self, prefix: &str) -> Result<u64> {
        key::ensure_key(prefix)?;
        let removed = self
            .store
            .remove_by_prefix(&key::namespaced(&self.name, prefix))
            .await?;
        self.emit(CacheEvent::Removed {
            provider: self.name.clone(),
            key: prefix.to_string(),
        });
        Ok(removed)
    }

    /// Drop every entry in this provider's namespace.
    pub async fn flush(&self) -> Result<u64> {
        self.store
            .remove_by_prefix(&key::namespace_prefix(&self.name))
            .await
    }

    /// Whether a live entry exists for `cache_key`.
    pub async fn exists(&self, cache_key: &str) -> Result<bool> {
        key::ensure_key(cache_key)?;
        self.store
            .exists(&key::namespaced(&self.name, cache_key))
            .await
    }

    /// Remaining TTL of `cache_key`; `None` when missing or unknown.
    pub async fn ttl(&self, cache_key: &str) -> Result<Option<Duration>> {
        key::ensure_key(cache_key)?;
        self.store
            .get_ttl(&key::namespaced(&self.name, cache_key))
            .await
    }

    // ==================== miss-path internals ====================

    async fn create_under_lock<T, F, Fut>(
        &self,
        backend_key: &str,
        cache_key: &str,
        retriever: F,
        expiration: Duration,
    ) -> Result<CacheValue<T>>
    where
        T: Serialize + DeserializeOwned + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = std::result::Result<Option<T>, BoxError>> + Send,
    {
        // Double-checked read: another lock holder may have populated the key
        // while we were waiting.
        if let Some(found) = self.read_entry::<T>(backend_key).await? {
            self.stats.record_hit();
            self.emit(CacheEvent::Hit {
                provider: self.name.clone(),
                key: cache_key.to_string(),
            });
            return Ok(found);
        }

        self.retrieve_and_store(backend_key, cache_key, retriever, expiration)
            .await
    }

    async fn retrieve_and_store<T, F, Fut>(
        &self,
        backend_key: &str,
        cache_key: &str,
        retriever: F,
        expiration: Duration,
    ) -> Result<CacheValue<T>>
    where
        T: Serialize + DeserializeOwned + Send,
        F: FnOnce() -> Fut + Send,
        Fut: Future<Output = std::result::Result<Option<T>, BoxError>> + Send,
    {
        // The retriever is bounded so a hung data source cannot pin the lock.
        let retrieved =
            match tokio::time::timeout(self.options.retriever_budget(), retriever()).await {
                Ok(Ok(value)) => value,
                Ok(Err(e)) => return Err(CacheError::Retriever(e)),
                Err(_) => {
                    return Err(CacheError::retriever_timeout(
                        cache_key,
                        self.options.lock_ms,
                    ));
                }
            };

        let result = match retrieved {
            Some(value) => {
                let bytes = self.codec.encode(Some(&value))?;
                self.store
                    .set(backend_key, bytes, self.jittered(expiration))
                    .await?;
                self.emit(CacheEvent::Set {
                    provider: self.name.clone(),
                    key: cache_key.to_string(),
                });
                CacheValue::Value(value)
            }
            None if self.options.cache_nulls => {
                let bytes = self.codec.encode::<T>(None)?;
                self.store
                    .set(
                        backend_key,
                        bytes,
                        self.jittered(self.options.negative_expiration()),
                    )
                    .await?;
                self.emit(CacheEvent::Set {
                    provider: self.name.clone(),
                    key: cache_key.to_string(),
                });
                CacheValue::NoValue
            }
            None => CacheValue::NoValue,
        };

        self.stats.record_miss();
        self.emit(CacheEvent::Miss {
            provider: self.name.clone(),
            key: cache_key.to_string(),
        });
        Ok(result)
    }

    /// Decode a backend read. A decode failure is a miss, not a hard error;
    /// the entry is left for its TTL to clear.
    async fn read_entry<T: DeserializeOwned>(
        &self,
        backend_key: &str,
    ) -> Result<Option<CacheValue<T>>> {
        let Some(bytes) = self.store.get(backend_key).await? else {
            return Ok(None);
        };
        match self.codec.decode::<T>(&bytes) {
            Ok(Some(value)) => Ok(Some(CacheValue::Value(value))),
            // A stored negative result: a real entry that answers "nothing".
            Ok(None) => Ok(Some(CacheValue::NoValue)),
            Err(e) => {
                tracing::warn!(key = %backend_key, error = %e, "failed to decode cached payload");
                self.emit(CacheEvent::Error {
                    provider: self.name.clone(),
                    operation: "decode".to_string(),
                    message: e.to_string(),
                });
                Ok(None)
            }
        }
    }

    fn jittered(&self, expiration: Duration) -> Duration {
        if self.options.max_random_second == 0 {
            return expiration;
        }
        let jitter = rand::thread_rng().gen_range(0..=self.options.max_random_second);
        expiration + Duration::from_secs(jitter)
    }

    fn emit(&self, event: CacheEvent) {
        self.listener.on_event(&event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    /// Minimal in-memory store double; counts operations so tests can assert
    /// the backend was never touched on validation failures.
    #[derive(Default)]
    struct TestStore {
        entries: Mutex<HashMap<String, (Vec<u8>, Instant)>>,
        ops: AtomicU32,
    }

    impl TestStore {
        fn op_count(&self) -> u32 {
            self.ops.load(Ordering::SeqCst)
        }

        fn inject_raw(&self, key: &str, bytes: Vec<u8>) {
            self.entries.lock().unwrap().insert(
                key.to_string(),
                (bytes, Instant::now() + Duration::from_secs(60)),
            );
        }

        fn contains(&self, key: &str) -> bool {
            self.entries.lock().unwrap().contains_key(key)
        }
    }

    #[async_trait]
    impl BackendStore for TestStore {
        async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
            self.ops.fetch_add(1, Ordering::SeqCst);
            let entries = self.entries.lock().unwrap();
            Ok(entries
                .get(key)
                .filter(|(_, expires)| *expires > Instant::now())
                .map(|(bytes, _)| bytes.clone()))
        }

        async fn set(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<()> {
            self.ops.fetch_add(1, Ordering::SeqCst);
            self.entries
                .lock()
                .unwrap()
                .insert(key.to_string(), (value, Instant::now() + ttl));
            Ok(())
        }

        async fn remove(&self, key: &str) -> Result<()> {
            self.ops.fetch_add(1, Ordering::SeqCst);
            self.entries.lock().unwrap().remove(key);
            Ok(())
        }

        async fn remove_by_prefix(&self, prefix: &str) -> Result<u64> {
            self.ops.fetch_add(1, Ordering::SeqCst);
            let mut entries = self.entries.lock().unwrap();
            let before = entries.len();
            entries.retain(|k, _| !k.starts_with(prefix));
            Ok((before - entries.len()) as u64)
        }

        async fn exists(&self, key: &str) -> Result<bool> {
            self.ops.fetch_add(1, Ordering::SeqCst);
            Ok(self.get(key).await?.is_some())
        }

        async fn get_ttl(&self, key: &str) -> Result<Option<Duration>> {
            self.ops.fetch_add(1, Ordering::SeqCst);
            let entries = self.entries.lock().unwrap();
            Ok(entries
                .get(key)
                .map(|(_, expires)| expires.saturating_duration_since(Instant::now())))
        }

        fn backend_name(&self) -> &'static str {
            "test"
        }
    }

    /// Per-name async mutex lock double.
    #[derive(Default)]
    struct TestLockProvider {
        locks: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    }

    impl TestLockProvider {
        fn mutex_for(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
            self.locks
                .lock()
                .unwrap()
                .entry(name.to_string())
                .or_default()
                .clone()
        }
    }

    struct TestLockGuard {
        _guard: tokio::sync::OwnedMutexGuard<()>,
    }

    #[async_trait]
    impl crate::lock::DistributedLock for TestLockGuard {
        async fn release(self: Box<Self>) -> Result<()> {
            Ok(())
        }
    }

    #[async_trait]
    impl DistributedLockProvider for TestLockProvider {
        async fn try_acquire(
            &self,
            lock_name: &str,
            budget: Duration,
        ) -> Result<Option<Box<dyn crate::lock::DistributedLock>>> {
            let mutex = self.mutex_for(lock_name);
            match tokio::time::timeout(budget, mutex.lock_owned()).await {
                Ok(guard) => Ok(Some(Box::new(TestLockGuard { _guard: guard }))),
                Err(_) => Ok(None),
            }
        }
    }

    fn client(store: Arc<TestStore>, options: ProviderOptions) -> CacheClient {
        CacheClient::builder("users", store)
            .codec(Codec::Json)
            .lock_provider(Arc::new(TestLockProvider::default()))
            .options(options)
            .build()
            .unwrap()
    }

    type RetrieverFuture = std::pin::Pin<
        Box<dyn Future<Output = std::result::Result<Option<String>, BoxError>> + Send>,
    >;

    fn retriever_of(
        value: Option<&'static str>,
        calls: Arc<AtomicU32>,
    ) -> impl FnOnce() -> RetrieverFuture + Send {
        move || {
            Box::pin(async move {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(value.map(str::to_string))
            })
        }
    }

    #[tokio::test]
    async fn test_invalid_keys_never_reach_backend() {
        let store = Arc::new(TestStore::default());
        let cache = client(store.clone(), ProviderOptions::default());

        for bad in ["", "  ", "\t"] {
            assert!(cache.get::<String>(bad).await.unwrap_err().is_argument());
            assert!(
                cache
                    .set(bad, &"v", Duration::from_secs(1))
                    .await
                    .unwrap_err()
                    .is_argument()
            );
            assert!(cache.remove(bad).await.unwrap_err().is_argument());
            assert!(cache.exists(bad).await.unwrap_err().is_argument());
        }
        assert_eq!(store.op_count(), 0);
    }

    #[tokio::test]
    async fn test_zero_expiration_rejected_before_io() {
        let store = Arc::new(TestStore::default());
        let cache = client(store.clone(), ProviderOptions::default());

        let err = cache.set("k", &"v", Duration::ZERO).await.unwrap_err();
        assert!(err.is_argument());

        let calls = Arc::new(AtomicU32::new(0));
        let err = cache
            .get_or_create("k", retriever_of(Some("v"), calls.clone()), Duration::ZERO)
            .await
            .unwrap_err();
        assert!(err.is_argument());
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.op_count(), 0);
    }

    #[tokio::test]
    async fn test_set_then_get_round_trip() {
        let cache = client(Arc::new(TestStore::default()), ProviderOptions::default());

        cache.set("user:1", &"alice", Duration::from_secs(60)).await.unwrap();
        let got: CacheValue<String> = cache.get("user:1").await.unwrap();
        assert_eq!(got, CacheValue::Value("alice".to_string()));
    }

    #[tokio::test]
    async fn test_stats_count_hits_and_misses_exactly() {
        let cache = client(Arc::new(TestStore::default()), ProviderOptions::default());
        cache.set("present", &1u32, Duration::from_secs(60)).await.unwrap();

        for _ in 0..4 {
            let _ = cache.get::<u32>("present").await.unwrap();
        }
        for _ in 0..3 {
            let _ = cache.get::<u32>("absent").await.unwrap();
        }

        let stats = cache.stats();
        assert_eq!(stats.hit_count, 4);
        assert_eq!(stats.miss_count, 3);
    }

    #[tokio::test]
    async fn test_corrupt_payload_is_a_miss_and_entry_survives() {
        let store = Arc::new(TestStore::default());
        let cache = client(store.clone(), ProviderOptions::default());

        store.inject_raw("users:broken", b"{ not valid".to_vec());
        let got: CacheValue<String> = cache.get("broken").await.unwrap();
        assert_eq!(got, CacheValue::NoValue);
        assert_eq!(cache.stats().miss_count, 1);
        // Not proactively deleted.
        assert!(store.contains("users:broken"));
    }

    #[tokio::test]
    async fn test_get_or_create_hit_skips_retriever() {
        let cache = client(Arc::new(TestStore::default()), ProviderOptions::default());
        cache.set("k", &"cached", Duration::from_secs(60)).await.unwrap();

        let calls = Arc::new(AtomicU32::new(0));
        let got = cache
            .get_or_create(
                "k",
                retriever_of(Some("fresh"), calls.clone()),
                Duration::from_secs(60),
            )
            .await
            .unwrap();

        assert_eq!(got, CacheValue::Value("cached".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(cache.stats().hit_count, 1);
    }

    #[tokio::test]
    async fn test_get_or_create_miss_retrieves_and_writes() {
        let cache = client(Arc::new(TestStore::default()), ProviderOptions::default());

        let calls = Arc::new(AtomicU32::new(0));
        let got = cache
            .get_or_create(
                "k",
                retriever_of(Some("fresh"), calls.clone()),
                Duration::from_secs(60),
            )
            .await
            .unwrap();
        assert_eq!(got, CacheValue::Value("fresh".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Now cached: a second call is a hit without retrieval.
        let got: CacheValue<String> = cache
            .get_or_create(
                "k",
                retriever_of(Some("other"), calls.clone()),
                Duration::from_secs(60),
            )
            .await
            .unwrap();
        assert_eq!(got, CacheValue::Value("fresh".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_negative_result_not_cached_by_default() {
        let store = Arc::new(TestStore::default());
        let cache = client(store.clone(), ProviderOptions::default());

        let calls = Arc::new(AtomicU32::new(0));
        let got: CacheValue<String> = cache
            .get_or_create("gone", retriever_of(None, calls.clone()), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(got, CacheValue::NoValue);
        assert!(!store.contains("users:gone"));

        // Retriever runs again: nothing was written.
        let _: CacheValue<String> = cache
            .get_or_create("gone", retriever_of(None, calls.clone()), Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_cache_nulls_invokes_retriever_once() {
        let store = Arc::new(TestStore::default());
        let cache = client(
            store.clone(),
            ProviderOptions {
                cache_nulls: true,
                ..Default::default()
            },
        );

        let calls = Arc::new(AtomicU32::new(0));
        let first: CacheValue<String> = cache
            .get_or_create("gone", retriever_of(None, calls.clone()), Duration::from_secs(60))
            .await
            .unwrap();
        let second: CacheValue<String> = cache
            .get_or_create("gone", retriever_of(None, calls.clone()), Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(first, CacheValue::NoValue);
        assert_eq!(second, CacheValue::NoValue);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(store.contains("users:gone"));
    }

    #[tokio::test]
    async fn test_retriever_error_propagates_and_lock_is_released() {
        let cache = client(Arc::new(TestStore::default()), ProviderOptions::default());

        let err = cache
            .get_or_create::<String, _, _>(
                "k",
                || Box::pin(async { Err::<Option<String>, BoxError>("source down".into()) }),
                Duration::from_secs(60),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, CacheError::Retriever(_)));

        // Lock was released: a subsequent call can acquire it and succeed.
        let calls = Arc::new(AtomicU32::new(0));
        let got = cache
            .get_or_create(
                "k",
                retriever_of(Some("recovered"), calls.clone()),
                Duration::from_secs(60),
            )
            .await
            .unwrap();
        assert_eq!(got, CacheValue::Value("recovered".to_string()));
    }

    #[tokio::test]
    async fn test_slow_retriever_hits_lock_hold_budget() {
        let cache = client(
            Arc::new(TestStore::default()),
            ProviderOptions {
                lock_ms: 50,
                ..Default::default()
            },
        );

        let err = cache
            .get_or_create::<String, _, _>(
                "slow",
                || {
                    Box::pin(async {
                        tokio::time::sleep(Duration::from_secs(5)).await;
                        Ok(Some("late".to_string()))
                    })
                },
                Duration::from_secs(60),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, CacheError::RetrieverTimeout { .. }));
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_contended_lock_times_out_within_budget() {
        let store = Arc::new(TestStore::default());
        let lock_provider = Arc::new(TestLockProvider::default());
        let cache = CacheClient::builder("users", store)
            .codec(Codec::Json)
            .lock_provider(lock_provider.clone())
            .options(ProviderOptions {
                sleep_ms_for_lock: 50,
                ..Default::default()
            })
            .build()
            .unwrap();

        // Hold the per-key lock externally.
        let mutex = lock_provider.mutex_for("users:busy:lock");
        let _held = mutex.lock().await;

        let calls = Arc::new(AtomicU32::new(0));
        let err = cache
            .get_or_create(
                "busy",
                retriever_of(Some("v"), calls.clone()),
                Duration::from_secs(60),
            )
            .await
            .unwrap_err();

        assert!(matches!(err, CacheError::LockTimeout { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_concurrent_misses_invoke_retriever_once() {
        let store = Arc::new(TestStore::default());
        let cache = Arc::new(client(store, ProviderOptions::default()));

        let calls = Arc::new(AtomicU32::new(0));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let cache = Arc::clone(&cache);
            let calls = Arc::clone(&calls);
            handles.push(tokio::spawn(async move {
                cache
                    .get_or_create(
                        "hot",
                        move || {
                            Box::pin(async move {
                                calls.fetch_add(1, Ordering::SeqCst);
                                tokio::time::sleep(Duration::from_millis(50)).await;
                                Ok::<_, BoxError>(Some("computed".to_string()))
                            })
                        },
                        Duration::from_secs(60),
                    )
                    .await
                    .unwrap()
            }));
        }

        for handle in handles {
            let got = handle.await.unwrap();
            assert_eq!(got, CacheValue::Value("computed".to_string()));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_remove_by_prefix_scopes_to_namespace() {
        let store = Arc::new(TestStore::default());
        let cache = client(store.clone(), ProviderOptions::default());

        cache.set("user:1", &"a", Duration::from_secs(60)).await.unwrap();
        cache.set("user:2", &"b", Duration::from_secs(60)).await.unwrap();
        cache.set("order:1", &"c", Duration::from_secs(60)).await.unwrap();

        let removed = cache.remove_by_prefix("user:").await.unwrap();
        assert_eq!(removed, 2);
        assert!(!cache.exists("user:1").await.unwrap());
        assert!(cache.exists("order:1").await.unwrap());
    }

    #[tokio::test]
    async fn test_flush_clears_namespace() {
        let cache = client(Arc::new(TestStore::default()), ProviderOptions::default());
        cache.set("a", &1u32, Duration::from_secs(60)).await.unwrap();
        cache.set("b", &2u32, Duration::from_secs(60)).await.unwrap();

        let removed = cache.flush().await.unwrap();
        assert_eq!(removed, 2);
        assert!(!cache.exists("a").await.unwrap());
    }

    #[tokio::test]
    async fn test_info_reflects_construction() {
        let cache = client(
            Arc::new(TestStore::default()),
            ProviderOptions {
                max_random_second: 120,
                ..Default::default()
            },
        );
        let info = cache.info();
        assert_eq!(info.name, "users");
        assert_eq!(info.backend, "test");
        assert_eq!(info.max_random_second, 120);
        assert_eq!(info.serializer_name, "json");
    }
}
