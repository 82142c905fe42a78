//! Normalized chat request/response contracts.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use super::message::Message;
use crate::cache::{compute_fingerprint, non_finite_param, CacheKey};
use crate::Result;

fn default_temperature() -> Option<f64> {
    Some(0.7)
}

/// Chat request accepted by the gateway before provider translation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatRequest {
    pub messages: Vec<Message>,
    pub model: String,
    #[serde(default = "default_temperature")]
    pub temperature: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(default)]
    pub stream: bool,
}

impl ChatRequest {
    pub fn new(model: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            messages,
            model: model.into(),
            temperature: default_temperature(),
            max_tokens: None,
            stream: false,
        }
    }

    pub fn with_temperature(mut self, temperature: Option<f64>) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_stream(mut self, stream: bool) -> Self {
        self.stream = stream;
        self
    }

    /// Parameters that influence the generated content.
    ///
    /// `stream` is left out: streamed and non-streamed calls produce the same text.
    /// A NaN or infinite temperature is an `InvalidInput` error.
    pub fn cache_params(&self) -> Result<BTreeMap<String, Value>> {
        let mut params = BTreeMap::new();
        if let Some(t) = self.temperature {
            if !t.is_finite() {
                return Err(non_finite_param("params.temperature", t));
            }
            params.insert("temperature".to_string(), Value::from(t));
        }
        if let Some(m) = self.max_tokens {
            params.insert("max_tokens".to_string(), Value::from(m));
        }
        Ok(params)
    }

    pub fn cache_key(&self) -> Result<CacheKey> {
        compute_fingerprint(&self.model, &self.messages, &self.cache_params()?)
    }
}

/// Chat response returned to the caller; this is the payload stored in the cache.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub message: Message,
    pub model: String,
    #[serde(default)]
    pub usage: BTreeMap<String, u64>,
}

impl ChatResponse {
    pub fn new(model: impl Into<String>, message: Message) -> Self {
        Self {
            message,
            model: model.into(),
            usage: BTreeMap::new(),
        }
    }

    pub fn with_usage(mut self, name: impl Into<String>, tokens: u64) -> Self {
        self.usage.insert(name.into(), tokens);
        self
    }
}
