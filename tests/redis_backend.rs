//! Integration tests against a live Redis-protocol server.
//!
//! Requires a disposable server (its current database gets flushed). Set
//! REDIS_URL=redis://localhost:6379/15 and run with:
//! cargo test --test redis_backend -- --ignored --test-threads=1

use llm_gateway_cache::cache::{BackendKind, CacheConfig, CacheKey, ResponseCache};
use serde_json::{json, Value};
use std::time::Duration;

async fn networked_cache(ttl_secs: u64) -> Option<ResponseCache> {
    let Ok(url) = std::env::var("REDIS_URL") else {
        eprintln!("REDIS_URL not set, skipping redis integration test");
        return None;
    };
    let config = CacheConfig::new()
        .with_connection_string(url)
        .with_prefer_networked(true)
        .with_ttl_secs(ttl_secs);
    let cache = ResponseCache::connect(config)
        .await
        .expect("valid configuration");
    assert_eq!(
        cache.backend_kind(),
        BackendKind::Networked,
        "redis unreachable: {:?}",
        cache.degraded_reason()
    );
    Some(cache)
}

#[tokio::test]
#[ignore = "requires a redis server; set REDIS_URL and run with --ignored"]
async fn test_round_trip_and_delete() {
    let Some(cache) = networked_cache(60).await else {
        return;
    };
    let key = CacheKey::from("llm-gateway-cache-test:round-trip");
    let payload = json!({"message": {"role": "assistant", "content": "hi"}, "usage": {"total": 2}});

    assert!(cache.set(&key, &payload).await);
    assert_eq!(cache.get::<Value>(&key).await, Some(payload));
    assert!(cache.invalidate(Some(&key)).await);
    assert_eq!(cache.get::<Value>(&key).await, None);
}

#[tokio::test]
#[ignore = "requires a redis server; set REDIS_URL and run with --ignored"]
async fn test_entries_expire_after_ttl() {
    let Some(cache) = networked_cache(2).await else {
        return;
    };
    let key = CacheKey::from("llm-gateway-cache-test:ttl");
    assert!(cache.set(&key, &json!({"x": 1})).await);
    assert_eq!(cache.get::<Value>(&key).await, Some(json!({"x": 1})));

    tokio::time::sleep(Duration::from_millis(3000)).await;
    assert_eq!(cache.get::<Value>(&key).await, None);
}

#[tokio::test]
#[ignore = "requires a redis server; set REDIS_URL and run with --ignored"]
async fn test_flush_and_stats() {
    let Some(cache) = networked_cache(60).await else {
        return;
    };
    for i in 0..3 {
        let key = CacheKey::from(format!("llm-gateway-cache-test:flush:{i}"));
        assert!(cache.set(&key, &json!(i)).await);
    }
    let stats = cache.stats().await;
    assert!(stats.total_keys.unwrap_or(0) >= 3);
    assert!(stats.backend_details.contains_key("server_version"));

    assert!(cache.invalidate(None).await);
    assert_eq!(cache.stats().await.total_keys, Some(0));
}
