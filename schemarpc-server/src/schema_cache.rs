//! Read-through schema cache
//!
//! [`SchemaCache`] sits in front of a [`SchemaStore`] and keeps compiled
//! schemas in a [`CacheBackend`], keyed by `(project, method)`.
//!
//! # Concurrency
//!
//! No lock is held across a load. Two requests missing on the same key both
//! load the schema and both write it back; the last write wins. Schema
//! documents are immutable, so both writes carry equivalent values and the
//! only cost is the duplicated load.
//!
//! # Disabling
//!
//! With `enabled: false` the backend is bypassed and every lookup loads from
//! the store. Behaviour is otherwise identical.

use crate::metrics::PipelineMetrics;
use crate::schema_store::{ParsedSchema, SchemaStore, SchemaStoreError};
use async_trait::async_trait;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// One year: effectively "until invalidated"
pub const DEFAULT_CACHE_TTL_SECS: u64 = 365 * 24 * 60 * 60;

/// Schema cache settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaCacheConfig {
    pub enabled: bool,
    /// Namespace for keys, so projects can share a backend
    pub project: String,
    pub ttl_ms: u64,
}

impl Default for SchemaCacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            project: "schemarpc".to_string(),
            ttl_ms: DEFAULT_CACHE_TTL_SECS * 1000,
        }
    }
}

impl SchemaCacheConfig {
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_project(mut self, project: impl Into<String>) -> Self {
        self.project = project.into();
        self
    }

    /// Set the entry lifetime, rounded up to the next millisecond
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl_ms = u64::try_from(ttl.as_nanos().div_ceil(1_000_000)).unwrap_or(u64::MAX);
        self
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }
}

/// Cache key for one method's schema within a project
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub project: String,
    pub method: String,
}

impl CacheKey {
    pub fn new(project: impl Into<String>, method: impl Into<String>) -> Self {
        Self {
            project: project.into(),
            method: method.into(),
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:schema:{}", self.project, self.method)
    }
}

/// A cached schema and when it stops being served
#[derive(Debug, Clone)]
pub struct SchemaCacheEntry {
    pub schema: Arc<ParsedSchema>,
    /// `None` when the TTL is too large to represent
    pub expires_at: Option<Instant>,
}

impl SchemaCacheEntry {
    pub fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map_or(false, |at| at <= now)
    }
}

/// Storage behind the schema cache
///
/// `set` must replace the whole entry at once; readers never observe a
/// partially written value.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &CacheKey) -> Option<Arc<ParsedSchema>>;

    async fn set(&self, key: CacheKey, schema: Arc<ParsedSchema>, ttl: Duration);

    async fn invalidate(&self, key: &CacheKey);

    async fn clear(&self);
}

/// Process-local backend
///
/// Expired entries count as misses and are dropped on the lookup that finds
/// them.
#[derive(Debug, Default)]
pub struct InMemoryCacheBackend {
    entries: DashMap<CacheKey, SchemaCacheEntry>,
}

impl InMemoryCacheBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries currently stored, expired ones included
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[async_trait]
impl CacheBackend for InMemoryCacheBackend {
    async fn get(&self, key: &CacheKey) -> Option<Arc<ParsedSchema>> {
        let now = Instant::now();
        let hit = self
            .entries
            .get(key)
            .and_then(|entry| (!entry.is_expired(now)).then(|| Arc::clone(&entry.schema)));

        if hit.is_none() {
            self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        }
        hit
    }

    async fn set(&self, key: CacheKey, schema: Arc<ParsedSchema>, ttl: Duration) {
        let entry = SchemaCacheEntry {
            schema,
            expires_at: Instant::now().checked_add(ttl),
        };
        self.entries.insert(key, entry);
    }

    async fn invalidate(&self, key: &CacheKey) {
        self.entries.remove(key);
    }

    async fn clear(&self) {
        self.entries.clear();
    }
}

/// Backend that stores nothing
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopCacheBackend;

#[async_trait]
impl CacheBackend for NoopCacheBackend {
    async fn get(&self, _key: &CacheKey) -> Option<Arc<ParsedSchema>> {
        None
    }

    async fn set(&self, _key: CacheKey, _schema: Arc<ParsedSchema>, _ttl: Duration) {}

    async fn invalidate(&self, _key: &CacheKey) {}

    async fn clear(&self) {}
}

/// Read-through cache of compiled schemas
pub struct SchemaCache {
    store: Arc<dyn SchemaStore>,
    backend: Arc<dyn CacheBackend>,
    config: SchemaCacheConfig,
    metrics: Option<Arc<PipelineMetrics>>,
}

impl std::fmt::Debug for SchemaCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaCache")
            .field("config", &self.config)
            .finish()
    }
}

impl SchemaCache {
    pub fn new(
        store: Arc<dyn SchemaStore>,
        backend: Arc<dyn CacheBackend>,
        config: SchemaCacheConfig,
    ) -> Self {
        Self {
            store,
            backend,
            config,
            metrics: None,
        }
    }

    /// In-memory backend with default settings
    pub fn in_memory(store: Arc<dyn SchemaStore>) -> Self {
        Self::new(
            store,
            Arc::new(InMemoryCacheBackend::new()),
            SchemaCacheConfig::default(),
        )
    }

    pub fn with_metrics(mut self, metrics: Arc<PipelineMetrics>) -> Self {
        self.metrics = Some(metrics);
        self
    }

    pub fn config(&self) -> &SchemaCacheConfig {
        &self.config
    }

    pub fn key(&self, method: &str) -> CacheKey {
        CacheKey::new(self.config.project.clone(), method)
    }

    /// Compiled schema for `method`, loading it on a miss
    ///
    /// # Errors
    ///
    /// Whatever the store reports; failures are not cached.
    pub async fn get(&self, method: &str) -> Result<Arc<ParsedSchema>, SchemaStoreError> {
        if !self.config.enabled {
            return self.store.load_schema(method).await;
        }

        let key = self.key(method);
        if let Some(schema) = self.backend.get(&key).await {
            tracing::debug!(%key, "Schema cache hit");
            if let Some(metrics) = &self.metrics {
                metrics.record_cache_hit(method);
            }
            return Ok(schema);
        }

        tracing::debug!(%key, "Schema cache miss");
        if let Some(metrics) = &self.metrics {
            metrics.record_cache_miss(method);
        }

        let schema = self.store.load_schema(method).await?;
        self.backend
            .set(key, Arc::clone(&schema), self.config.ttl())
            .await;
        Ok(schema)
    }

    /// Drop the cached schema for `method`; the next lookup reloads it
    pub async fn invalidate(&self, method: &str) {
        self.backend.invalidate(&self.key(method)).await;
    }

    /// Drop every cached schema
    pub async fn clear(&self) {
        self.backend.clear().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema_store::InMemorySchemaStore;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Store that counts loads
    struct CountingStore {
        inner: InMemorySchemaStore,
        loads: AtomicUsize,
    }

    impl CountingStore {
        fn new() -> Arc<Self> {
            Arc::new(Self {
                inner: InMemorySchemaStore::new()
                    .with_schema("user.get", json!({"type": "object"})),
                loads: AtomicUsize::new(0),
            })
        }

        fn loads(&self) -> usize {
            self.loads.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl SchemaStore for CountingStore {
        async fn load_schema(&self, method: &str) -> Result<Arc<ParsedSchema>, SchemaStoreError> {
            self.loads.fetch_add(1, Ordering::SeqCst);
            self.inner.load_schema(method).await
        }
    }

    fn cache(store: Arc<CountingStore>, config: SchemaCacheConfig) -> SchemaCache {
        SchemaCache::new(store, Arc::new(InMemoryCacheBackend::new()), config)
    }

    #[tokio::test]
    async fn test_hit_does_not_reload() {
        let store = CountingStore::new();
        let cache = cache(store.clone(), SchemaCacheConfig::default());

        let first = cache.get("user.get").await.unwrap();
        let second = cache.get("user.get").await.unwrap();

        assert_eq!(store.loads(), 1);
        assert!(Arc::ptr_eq(&first, &second));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reload_after_ttl() {
        let store = CountingStore::new();
        let config = SchemaCacheConfig::default().with_ttl(Duration::from_secs(60));
        let cache = cache(store.clone(), config);

        cache.get("user.get").await.unwrap();
        tokio::time::advance(Duration::from_secs(59)).await;
        cache.get("user.get").await.unwrap();
        assert_eq!(store.loads(), 1);

        tokio::time::advance(Duration::from_secs(2)).await;
        cache.get("user.get").await.unwrap();
        assert_eq!(store.loads(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_sub_second_ttl_still_caches() {
        let store = CountingStore::new();
        let config = SchemaCacheConfig::default().with_ttl(Duration::from_millis(500));
        assert_eq!(config.ttl(), Duration::from_millis(500));
        let cache = cache(store.clone(), config);

        cache.get("user.get").await.unwrap();
        cache.get("user.get").await.unwrap();
        assert_eq!(store.loads(), 1);

        tokio::time::advance(Duration::from_millis(501)).await;
        cache.get("user.get").await.unwrap();
        assert_eq!(store.loads(), 2);
    }

    #[test]
    fn test_ttl_rounds_up_to_millis() {
        let config = SchemaCacheConfig::default().with_ttl(Duration::from_micros(1));
        assert_eq!(config.ttl_ms, 1);
        let config = SchemaCacheConfig::default().with_ttl(Duration::from_secs(90));
        assert_eq!(config.ttl_ms, 90_000);
    }

    #[tokio::test]
    async fn test_disabled_always_loads() {
        let store = CountingStore::new();
        let cache = cache(store.clone(), SchemaCacheConfig::default().with_enabled(false));

        cache.get("user.get").await.unwrap();
        cache.get("user.get").await.unwrap();
        assert_eq!(store.loads(), 2);
    }

    #[tokio::test]
    async fn test_not_found_is_not_cached() {
        let store = CountingStore::new();
        let cache = cache(store.clone(), SchemaCacheConfig::default());

        assert!(cache.get("user.delete").await.unwrap_err().is_not_found());
        assert!(cache.get("user.delete").await.is_err());
        assert_eq!(store.loads(), 2);
    }

    #[tokio::test]
    async fn test_invalidate_and_clear() {
        let store = CountingStore::new();
        let cache = cache(store.clone(), SchemaCacheConfig::default());

        cache.get("user.get").await.unwrap();
        cache.invalidate("user.get").await;
        cache.get("user.get").await.unwrap();
        assert_eq!(store.loads(), 2);

        cache.clear().await;
        cache.get("user.get").await.unwrap();
        assert_eq!(store.loads(), 3);
    }

    #[tokio::test]
    async fn test_projects_are_isolated() {
        let backend: Arc<dyn CacheBackend> = Arc::new(InMemoryCacheBackend::new());
        let store = CountingStore::new();

        let billing = SchemaCache::new(
            store.clone(),
            Arc::clone(&backend),
            SchemaCacheConfig::default().with_project("billing"),
        );
        let shipping = SchemaCache::new(
            store.clone(),
            Arc::clone(&backend),
            SchemaCacheConfig::default().with_project("shipping"),
        );

        billing.get("user.get").await.unwrap();
        shipping.get("user.get").await.unwrap();
        assert_eq!(store.loads(), 2);
        assert_eq!(billing.key("user.get").to_string(), "billing:schema:user.get");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_misses_converge() {
        let store = CountingStore::new();
        let cache = Arc::new(cache(store.clone(), SchemaCacheConfig::default()));

        let tasks: Vec<_> = (0..16)
            .map(|_| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.get("user.get").await.is_ok() })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap());
        }

        // Duplicate loads are allowed, but the cache settles afterwards
        let loads = store.loads();
        assert!(loads >= 1 && loads <= 16);
        cache.get("user.get").await.unwrap();
        assert_eq!(store.loads(), loads);
    }

    #[tokio::test]
    async fn test_in_memory_backend_replaces_entry() {
        let backend = InMemoryCacheBackend::new();
        let key = CacheKey::new("p", "m");
        let a = Arc::new(ParsedSchema::compile("m", json!({"type": "object"})).unwrap());
        let b = Arc::new(ParsedSchema::compile("m", json!({"type": "array"})).unwrap());

        backend.set(key.clone(), a, Duration::from_secs(10)).await;
        backend.set(key.clone(), Arc::clone(&b), Duration::from_secs(10)).await;

        assert_eq!(backend.len(), 1);
        let current = backend.get(&key).await.unwrap();
        assert!(Arc::ptr_eq(&current, &b));
    }

    #[tokio::test]
    async fn test_noop_backend_never_hits() {
        let backend = NoopCacheBackend;
        let key = CacheKey::new("p", "m");
        let schema = Arc::new(ParsedSchema::compile("m", json!({})).unwrap());
        backend.set(key.clone(), schema, Duration::from_secs(10)).await;
        assert!(backend.get(&key).await.is_none());
    }
}
