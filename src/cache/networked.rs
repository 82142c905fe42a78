//! Redis-protocol backend (Redis, Valkey, KeyDB).

use ::redis::aio::ConnectionManager;
use ::redis::{Cmd, FromRedisValue, InfoDict};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

use super::backend::{BackendKind, CacheBackend};
use crate::error::{BackendError, BackendResult};

/// Shared, persistent backend reached through a connection string.
///
/// One multiplexed connection is opened at construction and cloned for every
/// call. Each command is bounded by the operation timeout; an elapsed timeout
/// is reported as [`BackendError::Timeout`].
pub struct RedisBackend {
    conn: ConnectionManager,
    op_timeout: Duration,
    endpoint: String,
}

impl RedisBackend {
    /// Connect and verify the server answers `PING` within `connect_timeout`.
    pub async fn connect(
        url: &str,
        connect_timeout: Duration,
        op_timeout: Duration,
    ) -> BackendResult<Self> {
        let client = ::redis::Client::open(url)
            .map_err(|e| BackendError::Connection(format!("invalid URL: {e}")))?;
        let conn = tokio::time::timeout(connect_timeout, ConnectionManager::new(client))
            .await
            .map_err(|_| BackendError::Timeout(connect_timeout))?
            .map_err(|e| BackendError::Connection(e.to_string()))?;

        let backend = Self {
            conn,
            op_timeout,
            endpoint: redact_endpoint(url),
        };
        let pong: String = backend.run("PING", ::redis::cmd("PING")).await?;
        debug!(endpoint = %backend.endpoint, %pong, "redis backend reachable");
        Ok(backend)
    }

    /// Connection string with any password removed.
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn run<T: FromRedisValue>(&self, command: &'static str, cmd: Cmd) -> BackendResult<T> {
        let mut conn = self.conn.clone();
        match tokio::time::timeout(self.op_timeout, cmd.query_async(&mut conn)).await {
            Ok(Ok(v)) => Ok(v),
            Ok(Err(e)) => Err(BackendError::command(command, e)),
            Err(_) => Err(BackendError::Timeout(self.op_timeout)),
        }
    }
}

#[async_trait]
impl CacheBackend for RedisBackend {
    async fn get(&self, key: &str) -> BackendResult<Option<Vec<u8>>> {
        let mut cmd = ::redis::cmd("GET");
        cmd.arg(key);
        self.run("GET", cmd).await
    }

    async fn set(&self, key: &str, value: &[u8], ttl: Duration) -> BackendResult<()> {
        // SETEX rejects a zero expiry
        let secs = ttl.as_secs().max(1);
        let mut cmd = ::redis::cmd("SETEX");
        cmd.arg(key).arg(secs).arg(value);
        self.run("SETEX", cmd).await
    }

    async fn delete(&self, key: &str) -> BackendResult<bool> {
        let mut cmd = ::redis::cmd("DEL");
        cmd.arg(key);
        let removed: u64 = self.run("DEL", cmd).await?;
        Ok(removed > 0)
    }

    async fn clear(&self) -> BackendResult<()> {
        self.run("FLUSHDB", ::redis::cmd("FLUSHDB")).await
    }

    async fn len(&self) -> BackendResult<u64> {
        self.run("DBSIZE", ::redis::cmd("DBSIZE")).await
    }

    async fn details(&self) -> BackendResult<BTreeMap<String, Value>> {
        let info: InfoDict = self.run("INFO", ::redis::cmd("INFO")).await?;
        let mut details = BTreeMap::new();
        details.insert("endpoint".to_string(), Value::String(self.endpoint.clone()));
        for (field, label) in [
            ("redis_version", "server_version"),
            ("used_memory_human", "used_memory"),
        ] {
            if let Some(v) = info.get::<String>(field) {
                details.insert(label.to_string(), Value::String(v));
            }
        }
        Ok(details)
    }

    fn kind(&self) -> BackendKind {
        BackendKind::Networked
    }

    fn name(&self) -> &'static str {
        "redis"
    }
}

pub(crate) fn redact_endpoint(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) => {
            if parsed.password().is_some() {
                let _ = parsed.set_password(Some("***"));
            }
            parsed.to_string()
        }
        Err(_) => "<unparsable>".to_string(),
    }
}
