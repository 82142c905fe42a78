//! # Response Caching Module
//!
//! Best-effort response cache that sits between the request-dispatch layer
//! and the provider call. A hit returns the stored response and skips the
//! provider entirely; a miss lets the caller fetch and then store the result
//! under the same key with a TTL.
//!
//! ## Key Components
//!
//! | Component | Description |
//! |-----------|-------------|
//! | [`ResponseCache`] | Lookup/store/invalidate/stats over one backend, chosen at construction |
//! | [`CacheConfig`] | Explicit configuration, optionally read from the environment |
//! | [`CacheBackend`] | Storage capability shared by both backends |
//! | [`RedisBackend`] | Networked backend (Redis protocol), shared and persistent |
//! | [`MemoryBackend`] | Process-local fallback backend |
//! | [`compute_fingerprint`] | Deterministic SHA-256 key from model, messages and params |
//!
//! ## Backend selection
//!
//! When `prefer_networked` is set and a connection string is configured,
//! [`ResponseCache::connect`] tries the networked backend. If it cannot be
//! reached the cache falls back to [`MemoryBackend`] and records why in
//! [`CacheStats::degraded`]. The choice is final for the cache's lifetime.
//!
//! ## Known divergence
//!
//! The local backend does not expire entries unless
//! [`CacheConfig::with_local_ttl_enforcement`] is turned on. The networked
//! backend always honours the TTL.
//!
//! ## Example
//!
//! ```rust
//! use llm_gateway_cache::cache::{compute_fingerprint, CacheConfig, ResponseCache};
//! use llm_gateway_cache::types::Message;
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let cache = ResponseCache::connect(CacheConfig::new().with_ttl_secs(600))
//!     .await
//!     .unwrap();
//! let key = compute_fingerprint(
//!     "gpt-4o",
//!     &[Message::user("hi")],
//!     &json!({"temperature": 0.2}),
//! )
//! .unwrap();
//!
//! assert!(cache.set(&key, &json!({"content": "hello"})).await);
//! let hit: Option<serde_json::Value> = cache.get(&key).await;
//! assert_eq!(hit, Some(json!({"content": "hello"})));
//! # });
//! ```

mod backend;
mod config;
mod finite;
mod key;
mod manager;
mod networked;

pub use backend::{BackendKind, CacheBackend, MemoryBackend};
pub use config::CacheConfig;
pub use config::{
    ENV_CACHE_KEY_PREFIX, ENV_CACHE_OP_TIMEOUT_MS, ENV_CACHE_TTL, ENV_CACHE_USE_REDIS,
    ENV_ENABLE_CACHE, ENV_REDIS_URL,
};
pub use key::{compute_fingerprint, CacheKey};
pub(crate) use key::non_finite_param;
pub use manager::{CacheCounters, CacheStats, ResponseCache};
pub use networked::RedisBackend;
