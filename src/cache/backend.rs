//! Cache backend implementations.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::sync::RwLock;
use std::time::{Duration, Instant};

use crate::error::{BackendError, BackendResult};

/// Where cached entries live.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Shared key-value service, survives process restarts.
    Networked,
    /// Process-private map, lost on restart.
    Local,
}

impl BackendKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            BackendKind::Networked => "networked",
            BackendKind::Local => "local",
        }
    }
}

impl std::fmt::Display for BackendKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Storage capability used by [`super::ResponseCache`].
///
/// Keys arrive already namespaced. Implementations report failures as
/// [`BackendError`]; deciding what a failure means is left to the caller.
#[async_trait]
pub trait CacheBackend: Send + Sync {
    async fn get(&self, key: &str) -> BackendResult<Option<Vec<u8>>>;
    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> BackendResult<()>;
    /// Returns whether an entry was removed. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> BackendResult<bool>;
    /// Drops every entry the backend can see, not only the ones this cache wrote.
    async fn clear(&self) -> BackendResult<()>;
    async fn len(&self) -> BackendResult<u64>;
    /// Backend-specific introspection for stats.
    async fn details(&self) -> BackendResult<BTreeMap<String, Value>>;
    fn kind(&self) -> BackendKind;
    fn name(&self) -> &'static str;
}

#[derive(Clone)]
struct CacheEntry {
    data: Vec<u8>,
    created_at: Instant,
    ttl: Duration,
}

impl CacheEntry {
    fn new(data: Vec<u8>, ttl: Duration) -> Self {
        Self {
            data,
            created_at: Instant::now(),
            ttl,
        }
    }

    fn is_expired(&self) -> bool {
        self.created_at.elapsed() > self.ttl
    }
}

/// In-process fallback backend.
///
/// By default the TTL passed to [`CacheBackend::set`] is recorded but never
/// enforced: entries stay until deleted, cleared, or the process exits. This
/// differs from the networked backend, where the server expires them. With
/// [`MemoryBackend::with_ttl_enforcement`] expired entries are dropped lazily
/// when read; there is no background sweep either way.
pub struct MemoryBackend {
    entries: RwLock<HashMap<String, CacheEntry>>,
    enforce_ttl: bool,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            enforce_ttl: false,
        }
    }

    pub fn with_ttl_enforcement(mut self, enforce: bool) -> Self {
        self.enforce_ttl = enforce;
        self
    }

    pub fn enforces_ttl(&self) -> bool {
        self.enforce_ttl
    }

    fn live(&self, entry: &CacheEntry) -> bool {
        !self.enforce_ttl || !entry.is_expired()
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CacheBackend for MemoryBackend {
    async fn get(&self, key: &str) -> BackendResult<Option<Vec<u8>>> {
        {
            let entries = self.entries.read().map_err(|_| BackendError::Poisoned)?;
            match entries.get(key) {
                None => return Ok(None),
                Some(entry) if self.live(entry) => return Ok(Some(entry.data.clone())),
                Some(_) => {}
            }
        }
        // expired under enforcement; re-check under the write lock since a
        // concurrent set may have refreshed it
        let mut entries = self.entries.write().map_err(|_| BackendError::Poisoned)?;
        if let Some(entry) = entries.get(key) {
            if self.live(entry) {
                return Ok(Some(entry.data.clone()));
            }
            entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> BackendResult<()> {
        let mut entries = self.entries.write().map_err(|_| BackendError::Poisoned)?;
        entries.insert(key.to_string(), CacheEntry::new(value.to_vec(), ttl));
        Ok(())
    }

    async fn delete(&self, key: &str) -> BackendResult<bool> {
        let mut entries = self.entries.write().map_err(|_| BackendError::Poisoned)?;
        Ok(entries.remove(key).is_some())
    }

    async fn clear(&self) -> BackendResult<()> {
        self.entries
            .write()
            .map_err(|_| BackendError::Poisoned)?
            .clear();
        Ok(())
    }

    async fn len(&self) -> BackendResult<u64> {
        let entries = self.entries.read().map_err(|_| BackendError::Poisoned)?;
        Ok(entries.values().filter(|e| self.live(e)).count() as u64)
    }

    async fn details(&self) -> BackendResult<BTreeMap<String, Value>> {
        let mut details = BTreeMap::new();
        details.insert("enforces_ttl".to_string(), Value::Bool(self.enforce_ttl));
        Ok(details)
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Local
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_set_get_delete() {
        let backend = MemoryBackend::new();
        backend
            .set("k", b"{\"x\":1}", Duration::from_secs(60))
            .await
            .unwrap();
        assert_eq!(backend.get("k").await.unwrap().as_deref(), Some(&b"{\"x\":1}"[..]));
        assert_eq!(backend.len().await.unwrap(), 1);
        assert!(backend.delete("k").await.unwrap());
        assert!(!backend.delete("k").await.unwrap());
        assert_eq!(backend.get("k").await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_memory_ignores_ttl_by_default() {
        let backend = MemoryBackend::new();
        backend.set("k", b"1", Duration::ZERO).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert!(backend.get("k").await.unwrap().is_some());
        assert_eq!(backend.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_memory_lazy_expiry_when_enforced() {
        let backend = MemoryBackend::new().with_ttl_enforcement(true);
        backend.set("gone", b"1", Duration::ZERO).await.unwrap();
        backend.set("kept", b"2", Duration::from_secs(60)).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        assert_eq!(backend.len().await.unwrap(), 1);
        assert_eq!(backend.get("gone").await.unwrap(), None);
        assert!(backend.get("kept").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_memory_clear_and_details() {
        let backend = MemoryBackend::new();
        backend.set("a", b"1", Duration::from_secs(1)).await.unwrap();
        backend.set("b", b"2", Duration::from_secs(1)).await.unwrap();
        backend.clear().await.unwrap();
        assert_eq!(backend.len().await.unwrap(), 0);
        let details = backend.details().await.unwrap();
        assert_eq!(details["enforces_ttl"], Value::Bool(false));
        assert_eq!(backend.kind(), BackendKind::Local);
    }
}
