//! Cache manager.

use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, info, warn};

use super::backend::{BackendKind, CacheBackend, MemoryBackend};
use super::config::CacheConfig;
use super::key::CacheKey;
use super::networked::RedisBackend;
use crate::error::{BackendError, BackendResult};
use crate::Result;

/// Operation counters, updated with relaxed ordering.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheCounters {
    pub hits: u64,
    pub misses: u64,
    pub sets: u64,
    pub deletes: u64,
    pub errors: u64,
}

impl CacheCounters {
    pub fn hit_ratio(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Snapshot returned by [`ResponseCache::stats`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    pub enabled: bool,
    pub backend_kind: BackendKind,
    pub ttl_seconds: u64,
    /// Best-effort; `None` when the backend could not be introspected.
    pub total_keys: Option<u64>,
    pub backend_details: BTreeMap<String, Value>,
    /// Why the networked backend was not used, if it was requested.
    pub degraded: Option<String>,
    pub counters: CacheCounters,
}

#[derive(Default)]
struct AtomicCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    sets: AtomicU64,
    deletes: AtomicU64,
    errors: AtomicU64,
}

impl AtomicCounters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CacheCounters {
        CacheCounters {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            sets: self.sets.load(Ordering::Relaxed),
            deletes: self.deletes.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
        }
    }
}

/// Best-effort response cache in front of the provider call.
///
/// The backend is chosen once in [`ResponseCache::connect`] and never changes.
/// Backend failures never reach the caller: reads degrade to a miss, writes
/// and invalidations to `false`, and each failure is logged with the
/// operation, key prefix and backend kind.
///
/// The type is `Send + Sync`; share it behind an `Arc`.
pub struct ResponseCache {
    config: CacheConfig,
    backend: Box<dyn CacheBackend>,
    degraded: Option<String>,
    counters: AtomicCounters,
}

impl ResponseCache {
    /// Build the cache, connecting to the networked backend when configured.
    ///
    /// Fails only on invalid configuration. An unreachable server is logged
    /// and the cache falls back to the in-process backend.
    pub async fn connect(config: CacheConfig) -> Result<Self> {
        config.validate()?;

        let local = || MemoryBackend::new().with_ttl_enforcement(config.enforce_local_ttl);

        if !config.wants_networked() {
            info!(
                enabled = config.enabled,
                ttl_secs = config.ttl_seconds(),
                "using local in-memory response cache"
            );
            return Ok(Self::assemble(config.clone(), Box::new(local()), None));
        }

        let url = config.connection_string.as_deref().unwrap_or_default();
        match RedisBackend::connect(url, config.connect_timeout, config.operation_timeout).await {
            Ok(redis) => {
                info!(
                    endpoint = redis.endpoint(),
                    ttl_secs = config.ttl_seconds(),
                    "connected to networked response cache"
                );
                Ok(Self::assemble(config.clone(), Box::new(redis), None))
            }
            Err(e) => {
                warn!(
                    error = %e,
                    "networked cache unavailable, falling back to local in-memory cache"
                );
                Ok(Self::assemble(
                    config.clone(),
                    Box::new(local()),
                    Some(e.to_string()),
                ))
            }
        }
    }

    /// Use a caller-supplied backend; no connection attempt is made.
    pub fn with_backend(config: CacheConfig, backend: Box<dyn CacheBackend>) -> Self {
        Self::assemble(config, backend, None)
    }

    fn assemble(
        config: CacheConfig,
        backend: Box<dyn CacheBackend>,
        degraded: Option<String>,
    ) -> Self {
        Self {
            config,
            backend,
            degraded,
            counters: AtomicCounters::default(),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn is_enabled(&self) -> bool {
        self.config.enabled
    }

    pub fn backend_kind(&self) -> BackendKind {
        self.backend.kind()
    }

    pub fn backend_name(&self) -> &'static str {
        self.backend.name()
    }

    /// Reason the networked backend was skipped at construction, if any.
    pub fn degraded_reason(&self) -> Option<&str> {
        self.degraded.as_deref()
    }

    /// Look up a cached payload. Any failure is reported as a miss.
    pub async fn get<T: DeserializeOwned>(&self, key: &CacheKey) -> Option<T> {
        if !self.config.enabled {
            return None;
        }
        let backend = self.backend.kind();
        let stored = self.storage_key(key);
        match self.backend.get(&stored).await {
            Ok(Some(data)) => match decode(&data) {
                Ok(value) => {
                    AtomicCounters::bump(&self.counters.hits);
                    debug!(op = "get", key = key.short(), %backend, "cache hit");
                    Some(value)
                }
                Err(e) => {
                    AtomicCounters::bump(&self.counters.errors);
                    warn!(
                        op = "get",
                        key = key.short(),
                        %backend,
                        error = %e,
                        "undecodable cache entry, treating as miss"
                    );
                    None
                }
            },
            Ok(None) => {
                AtomicCounters::bump(&self.counters.misses);
                debug!(op = "get", key = key.short(), %backend, "cache miss");
                None
            }
            Err(e) => {
                AtomicCounters::bump(&self.counters.errors);
                warn!(
                    op = "get",
                    key = key.short(),
                    %backend,
                    error = %e,
                    "cache read failed, treating as miss"
                );
                None
            }
        }
    }

    /// Store a payload under `key` with the configured TTL.
    pub async fn set<T: Serialize + ?Sized>(&self, key: &CacheKey, value: &T) -> bool {
        self.set_with_ttl(key, value, self.config.ttl).await
    }

    pub async fn set_with_ttl<T: Serialize + ?Sized>(
        &self,
        key: &CacheKey,
        value: &T,
        ttl: Duration,
    ) -> bool {
        if !self.config.enabled {
            return false;
        }
        let backend = self.backend.kind();
        let data = match encode(value) {
            Ok(data) => data,
            Err(e) => {
                AtomicCounters::bump(&self.counters.errors);
                warn!(
                    op = "set",
                    key = key.short(),
                    %backend,
                    error = %e,
                    "payload not serializable, skipping cache write"
                );
                return false;
            }
        };
        let stored = self.storage_key(key);
        match self.backend.set(&stored, &data, ttl).await {
            Ok(()) => {
                AtomicCounters::bump(&self.counters.sets);
                debug!(
                    op = "set",
                    key = key.short(),
                    %backend,
                    ttl_secs = ttl.as_secs(),
                    bytes = data.len(),
                    "cached response"
                );
                true
            }
            Err(e) => {
                AtomicCounters::bump(&self.counters.errors);
                warn!(
                    op = "set",
                    key = key.short(),
                    %backend,
                    error = %e,
                    "cache write failed"
                );
                false
            }
        }
    }

    /// Remove one entry, or everything when `key` is `None`.
    ///
    /// With the networked backend a full invalidation runs `FLUSHDB`: it wipes
    /// the whole logical database, including keys written by other caches or
    /// services sharing it. `key_prefix` does not narrow it.
    pub async fn invalidate(&self, key: Option<&CacheKey>) -> bool {
        if !self.config.enabled {
            return false;
        }
        let backend = self.backend.kind();
        match key {
            Some(key) => {
                let stored = self.storage_key(key);
                match self.backend.delete(&stored).await {
                    Ok(removed) => {
                        if removed {
                            AtomicCounters::bump(&self.counters.deletes);
                        }
                        debug!(
                            op = "invalidate",
                            key = key.short(),
                            %backend,
                            removed,
                            "invalidated cache entry"
                        );
                        true
                    }
                    Err(e) => {
                        AtomicCounters::bump(&self.counters.errors);
                        warn!(
                            op = "invalidate",
                            key = key.short(),
                            %backend,
                            error = %e,
                            "cache invalidation failed"
                        );
                        false
                    }
                }
            }
            None => match self.backend.clear().await {
                Ok(()) => {
                    info!(op = "invalidate", %backend, "flushed response cache");
                    true
                }
                Err(e) => {
                    AtomicCounters::bump(&self.counters.errors);
                    warn!(op = "invalidate", %backend, error = %e, "cache flush failed");
                    false
                }
            },
        }
    }

    /// Cache-aside: return the cached value or run `fetch` and store its result.
    ///
    /// Errors from `fetch` are returned as-is and nothing is stored. Cache
    /// failures only cost the lookup.
    pub async fn get_or_fetch<T, E, F, Fut>(
        &self,
        key: &CacheKey,
        fetch: F,
    ) -> std::result::Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        if let Some(hit) = self.get::<T>(key).await {
            return Ok(hit);
        }
        let value = fetch().await?;
        self.set(key, &value).await;
        Ok(value)
    }

    /// Descriptive snapshot. Never fails; introspection errors land in
    /// `backend_details["error"]`.
    pub async fn stats(&self) -> CacheStats {
        let mut backend_details = BTreeMap::new();
        let mut errors = Vec::new();

        let total_keys = match self.backend.len().await {
            Ok(n) => Some(n),
            Err(e) => {
                errors.push(format!("key count: {e}"));
                None
            }
        };
        match self.backend.details().await {
            Ok(details) => backend_details.extend(details),
            Err(e) => errors.push(format!("details: {e}")),
        }
        if !errors.is_empty() {
            warn!(
                op = "stats",
                backend = %self.backend.kind(),
                errors = ?errors,
                "cache introspection incomplete"
            );
            backend_details.insert("error".to_string(), Value::String(errors.join("; ")));
        }

        CacheStats {
            enabled: self.config.enabled,
            backend_kind: self.backend.kind(),
            ttl_seconds: self.config.ttl_seconds(),
            total_keys,
            backend_details,
            degraded: self.degraded.clone(),
            counters: self.counters.snapshot(),
        }
    }

    fn storage_key(&self, key: &CacheKey) -> String {
        key.prefixed(self.config.key_prefix.as_deref())
    }
}

fn encode<T: Serialize + ?Sized>(value: &T) -> BackendResult<Vec<u8>> {
    serde_json::to_vec(value).map_err(BackendError::from)
}

fn decode<T: DeserializeOwned>(data: &[u8]) -> BackendResult<T> {
    serde_json::from_slice(data).map_err(BackendError::from)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    /// Backend whose every call fails, to exercise the degradation paths.
    struct BrokenBackend;

    #[async_trait]
    impl CacheBackend for BrokenBackend {
        async fn get(&self, _: &str) -> BackendResult<Option<Vec<u8>>> {
            Err(BackendError::Timeout(Duration::from_millis(10)))
        }
        async fn set(&self, _: &str, _: &[u8], _: Duration) -> BackendResult<()> {
            Err(BackendError::Connection("refused".into()))
        }
        async fn delete(&self, _: &str) -> BackendResult<bool> {
            Err(BackendError::Connection("refused".into()))
        }
        async fn clear(&self) -> BackendResult<()> {
            Err(BackendError::command("FLUSHDB", "NOPERM"))
        }
        async fn len(&self) -> BackendResult<u64> {
            Err(BackendError::command("DBSIZE", "NOPERM"))
        }
        async fn details(&self) -> BackendResult<BTreeMap<String, Value>> {
            Err(BackendError::command("INFO", "NOPERM"))
        }
        fn kind(&self) -> BackendKind {
            BackendKind::Networked
        }
        fn name(&self) -> &'static str {
            "broken"
        }
    }

    fn local(config: CacheConfig) -> ResponseCache {
        ResponseCache::with_backend(config, Box::new(MemoryBackend::new()))
    }

    #[tokio::test]
    async fn test_broken_backend_never_propagates() {
        let cache = ResponseCache::with_backend(CacheConfig::new(), Box::new(BrokenBackend));
        let key = CacheKey::from("k");
        assert_eq!(cache.get::<Value>(&key).await, None);
        assert!(!cache.set(&key, &json!({"x": 1})).await);
        assert!(!cache.invalidate(Some(&key)).await);
        assert!(!cache.invalidate(None).await);

        let stats = cache.stats().await;
        assert_eq!(stats.total_keys, None);
        let error = stats.backend_details["error"].as_str().unwrap();
        assert!(error.contains("DBSIZE"));
        assert!(error.contains("INFO"));
        assert_eq!(stats.counters.errors, 4);
    }

    #[tokio::test]
    async fn test_undecodable_entry_is_a_miss() {
        let backend = MemoryBackend::new();
        backend
            .set("k", b"not json", Duration::from_secs(60))
            .await
            .unwrap();
        let cache = ResponseCache::with_backend(CacheConfig::new(), Box::new(backend));
        assert_eq!(cache.get::<Value>(&CacheKey::from("k")).await, None);
        assert_eq!(cache.stats().await.counters.errors, 1);
    }

    #[test]
    fn test_payload_codec_failures_are_codec_errors() {
        let err = decode::<Value>(b"not json").unwrap_err();
        assert!(matches!(err, BackendError::Codec(_)), "got {err:?}");

        // non-string map keys cannot become JSON object keys
        let mut map = BTreeMap::new();
        map.insert(vec![1u8], "v");
        let err = encode(&map).unwrap_err();
        assert!(matches!(err, BackendError::Codec(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn test_unserializable_payload_is_not_stored() {
        let cache = local(CacheConfig::new());
        let mut map = BTreeMap::new();
        map.insert(vec![1u8], "v");
        assert!(!cache.set(&CacheKey::from("k"), &map).await);
        let stats = cache.stats().await;
        assert_eq!(stats.total_keys, Some(0));
        assert_eq!(stats.counters.errors, 1);
    }

    #[tokio::test]
    async fn test_key_prefix_namespaces_storage() {
        let cache = local(CacheConfig::new().with_key_prefix("gw"));
        let key = CacheKey::from("abc");
        assert!(cache.set(&key, &json!(1)).await);
        assert_eq!(cache.storage_key(&key), "gw:abc");
        assert_eq!(cache.get::<Value>(&key).await, Some(json!(1)));
    }

    #[tokio::test]
    async fn test_counters_track_hits_and_misses() {
        let cache = local(CacheConfig::new());
        let key = CacheKey::from("k");
        assert_eq!(cache.get::<Value>(&key).await, None);
        cache.set(&key, &json!("v")).await;
        assert_eq!(cache.get::<Value>(&key).await, Some(json!("v")));
        assert!(cache.invalidate(Some(&key)).await);

        let counters = cache.stats().await.counters;
        assert_eq!(counters.hits, 1);
        assert_eq!(counters.misses, 1);
        assert_eq!(counters.sets, 1);
        assert_eq!(counters.deletes, 1);
        assert_eq!(counters.hit_ratio(), 0.5);
    }

    #[tokio::test]
    async fn test_get_or_fetch_propagates_fetch_error_without_storing() {
        let cache = local(CacheConfig::new());
        let key = CacheKey::from("k");
        let result: std::result::Result<Value, &str> =
            cache.get_or_fetch(&key, || async { Err("provider down") }).await;
        assert_eq!(result, Err("provider down"));
        assert_eq!(cache.stats().await.total_keys, Some(0));
    }
}
