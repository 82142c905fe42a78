//! Cache configuration.

use std::time::Duration;

use crate::error::ErrorContext;
use crate::{Error, Result};

pub const ENV_ENABLE_CACHE: &str = "ENABLE_CACHE";
pub const ENV_CACHE_TTL: &str = "CACHE_TTL";
pub const ENV_REDIS_URL: &str = "REDIS_URL";
pub const ENV_CACHE_USE_REDIS: &str = "CACHE_USE_REDIS";
pub const ENV_CACHE_KEY_PREFIX: &str = "CACHE_KEY_PREFIX";
pub const ENV_CACHE_OP_TIMEOUT_MS: &str = "CACHE_OP_TIMEOUT_MS";

const SUPPORTED_SCHEMES: [&str; 4] = ["redis", "rediss", "redis+unix", "unix"];

#[derive(Debug, Clone, PartialEq)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl: Duration,
    /// Try the networked backend when a connection string is present.
    pub prefer_networked: bool,
    pub connection_string: Option<String>,
    /// Namespace for stored keys (`{prefix}:{hash}`).
    pub key_prefix: Option<String>,
    pub connect_timeout: Duration,
    pub operation_timeout: Duration,
    /// Expire local entries on read. Off by default, see [`super::MemoryBackend`].
    pub enforce_local_ttl: bool,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl: Duration::from_secs(3600),
            prefer_networked: true,
            connection_string: None,
            key_prefix: None,
            connect_timeout: Duration::from_secs(5),
            operation_timeout: Duration::from_secs(2),
            enforce_local_ttl: false,
        }
    }
}

impl CacheConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_ttl_secs(self, secs: u64) -> Self {
        self.with_ttl(Duration::from_secs(secs))
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_prefer_networked(mut self, prefer: bool) -> Self {
        self.prefer_networked = prefer;
        self
    }

    pub fn with_connection_string(mut self, url: impl Into<String>) -> Self {
        self.connection_string = Some(url.into());
        self
    }

    pub fn with_key_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.key_prefix = Some(prefix.into());
        self
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_operation_timeout(mut self, timeout: Duration) -> Self {
        self.operation_timeout = timeout;
        self
    }

    pub fn with_local_ttl_enforcement(mut self, enforce: bool) -> Self {
        self.enforce_local_ttl = enforce;
        self
    }

    pub fn ttl_seconds(&self) -> u64 {
        self.ttl.as_secs()
    }

    /// Whether construction should attempt the networked backend.
    pub fn wants_networked(&self) -> bool {
        self.prefer_networked
            && self
                .connection_string
                .as_deref()
                .is_some_and(|s| !s.trim().is_empty())
    }

    /// Read configuration from the process environment.
    ///
    /// | Variable | Default |
    /// |----------|---------|
    /// | `ENABLE_CACHE` | `true` |
    /// | `CACHE_TTL` | `3600` |
    /// | `REDIS_URL` | unset |
    /// | `CACHE_USE_REDIS` | `true` |
    /// | `CACHE_KEY_PREFIX` | unset |
    /// | `CACHE_OP_TIMEOUT_MS` | `2000` |
    pub fn from_env() -> Result<Self> {
        Self::from_env_with(|name| std::env::var(name).ok())
    }

    /// Same as [`CacheConfig::from_env`] with an injectable lookup.
    pub fn from_env_with<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| {
            lookup(name)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };

        let mut cfg = Self::default();
        if let Some(v) = get(ENV_ENABLE_CACHE) {
            cfg.enabled = parse_bool(ENV_ENABLE_CACHE, &v)?;
        }
        if let Some(v) = get(ENV_CACHE_TTL) {
            cfg.ttl = Duration::from_secs(parse_u64(ENV_CACHE_TTL, &v)?);
        }
        if let Some(v) = get(ENV_CACHE_USE_REDIS) {
            cfg.prefer_networked = parse_bool(ENV_CACHE_USE_REDIS, &v)?;
        }
        if let Some(v) = get(ENV_CACHE_OP_TIMEOUT_MS) {
            let millis = parse_u64(ENV_CACHE_OP_TIMEOUT_MS, &v)?;
            cfg.operation_timeout = Duration::from_millis(millis);
        }
        cfg.connection_string = get(ENV_REDIS_URL);
        cfg.key_prefix = get(ENV_CACHE_KEY_PREFIX);
        cfg.validate()?;
        Ok(cfg)
    }

    /// Reject settings that can never work.
    ///
    /// An unreachable server is not a configuration error; a connection string
    /// that cannot be parsed is.
    pub fn validate(&self) -> Result<()> {
        if self.operation_timeout.is_zero() {
            return Err(Error::configuration_with_context(
                "operation timeout must be greater than zero",
                ErrorContext::new()
                    .with_field_path("operation_timeout")
                    .with_source("cache_config"),
            ));
        }
        if let Some(raw) = self.connection_string.as_deref() {
            validate_connection_string(raw)?;
        }
        Ok(())
    }
}

fn validate_connection_string(raw: &str) -> Result<()> {
    let ctx = || {
        ErrorContext::new()
            .with_field_path("connection_string")
            .with_source("cache_config")
    };
    let parsed = url::Url::parse(raw.trim()).map_err(|e| {
        Error::configuration_with_context(
            "malformed cache connection string",
            ctx().with_details(e.to_string()),
        )
    })?;
    if !SUPPORTED_SCHEMES.contains(&parsed.scheme()) {
        return Err(Error::configuration_with_context(
            format!("unsupported cache connection scheme '{}'", parsed.scheme()),
            ctx().with_details(format!("expected one of {}", SUPPORTED_SCHEMES.join(", "))),
        ));
    }
    let is_socket = parsed.scheme().ends_with("unix");
    if !is_socket && parsed.host_str().map_or(true, str::is_empty) {
        return Err(Error::configuration_with_context(
            "cache connection string has no host",
            ctx(),
        ));
    }
    Ok(())
}

fn parse_bool(var: &str, raw: &str) -> Result<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Ok(true),
        "false" | "0" | "no" | "off" => Ok(false),
        _ => Err(Error::configuration_with_context(
            format!("expected a boolean, got '{}'", raw),
            ErrorContext::new()
                .with_field_path(var)
                .with_source("cache_config"),
        )),
    }
}

fn parse_u64(var: &str, raw: &str) -> Result<u64> {
    raw.parse::<u64>().map_err(|e| {
        Error::configuration_with_context(
            format!("expected a non-negative integer, got '{}'", raw),
            ErrorContext::new()
                .with_field_path(var)
                .with_details(e.to_string())
                .with_source("cache_config"),
        )
    })
}
