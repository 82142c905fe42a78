//! Cache key generation.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};

use super::finite::first_non_finite;
use crate::error::ErrorContext;
use crate::types::Message;
use crate::{Error, Result};

/// Length of the key prefix written to logs.
const LOG_PREFIX_LEN: usize = 12;

/// Hex-encoded SHA-256 fingerprint of a logical request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey {
    hash: String,
}

impl CacheKey {
    pub fn new(hash: impl Into<String>) -> Self {
        Self { hash: hash.into() }
    }

    pub fn as_str(&self) -> &str {
        &self.hash
    }

    /// Truncated form used in log lines.
    pub fn short(&self) -> &str {
        let end = self
            .hash
            .char_indices()
            .nth(LOG_PREFIX_LEN)
            .map(|(i, _)| i)
            .unwrap_or(self.hash.len());
        &self.hash[..end]
    }

    pub(crate) fn prefixed(&self, prefix: Option<&str>) -> String {
        match prefix {
            Some(p) => format!("{}:{}", p, self.hash),
            None => self.hash.clone(),
        }
    }
}

impl std::fmt::Display for CacheKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.hash)
    }
}

impl From<&str> for CacheKey {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for CacheKey {
    fn from(s: String) -> Self {
        Self::new(s)
    }
}

/// Fingerprint a request from its model, ordered messages and parameter set.
///
/// The triple is serialized as `{"messages":[..],"model":..,"params":{..}}` with
/// every object's keys sorted, so the insertion order of `params` never affects
/// the result. Message order is kept as given.
///
/// `params` must serialize to a JSON object (or `null`, treated as empty).
/// NaN and infinite floats anywhere in it are rejected: JSON has no encoding
/// for them.
pub fn compute_fingerprint<P>(model: &str, messages: &[Message], params: &P) -> Result<CacheKey>
where
    P: Serialize + ?Sized,
{
    if model.trim().is_empty() {
        return Err(Error::invalid_input_with_context(
            "model must not be empty",
            ErrorContext::new()
                .with_field_path("model")
                .with_source("fingerprint"),
        ));
    }

    if let Some(v) = first_non_finite(params) {
        return Err(non_finite_param("params", v));
    }
    let params = serde_json::to_value(params).map_err(|e| {
        Error::invalid_input_with_context(
            "request parameters are not serializable",
            ErrorContext::new()
                .with_field_path("params")
                .with_details(e.to_string())
                .with_source("fingerprint"),
        )
    })?;
    let params = match params {
        Value::Object(map) => Value::Object(map),
        Value::Null => Value::Object(Map::new()),
        other => {
            return Err(Error::invalid_input_with_context(
                "request parameters must be a string-keyed map",
                ErrorContext::new()
                    .with_field_path("params")
                    .with_details(format!("got {}", json_kind(&other)))
                    .with_source("fingerprint"),
            ))
        }
    };
    let messages = serde_json::to_value(messages).map_err(|e| {
        Error::invalid_input_with_context(
            "messages are not serializable",
            ErrorContext::new()
                .with_field_path("messages")
                .with_details(e.to_string())
                .with_source("fingerprint"),
        )
    })?;

    let mut triple = Map::new();
    triple.insert("messages".to_string(), messages);
    triple.insert("model".to_string(), Value::String(model.to_string()));
    triple.insert("params".to_string(), params);

    let canonical = serde_json::to_string(&canonicalize(Value::Object(triple)))?;
    let digest = Sha256::digest(canonical.as_bytes());
    Ok(CacheKey::new(format!("{:x}", digest)))
}

pub(crate) fn non_finite_param(field_path: &str, value: f64) -> Error {
    Error::invalid_input_with_context(
        "request parameters must not contain NaN or infinite numbers",
        ErrorContext::new()
            .with_field_path(field_path)
            .with_details(format!("got {value}"))
            .with_source("fingerprint"),
    )
}

/// Rebuild every object with its keys in lexicographic order.
///
/// Needed because `serde_json` keeps insertion order when `preserve_order` is on
/// anywhere in the dependency graph. Arrays keep their order.
fn canonicalize(value: Value) -> Value {
    match value {
        Value::Object(map) => {
            let mut entries: Vec<(String, Value)> = map.into_iter().collect();
            entries.sort_by(|a, b| a.0.cmp(&b.0));
            let mut sorted = Map::new();
            for (k, v) in entries {
                sorted.insert(k, canonicalize(v));
            }
            Value::Object(sorted)
        }
        Value::Array(items) => Value::Array(items.into_iter().map(canonicalize).collect()),
        other => other,
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::{BTreeMap, HashMap};

    #[test]
    fn test_key_is_256_bit_hex() {
        let key = compute_fingerprint("gpt-4o", &[Message::user("hi")], &json!({})).unwrap();
        assert_eq!(key.as_str().len(), 64);
        assert!(key.as_str().chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(key.short().len(), LOG_PREFIX_LEN);
    }

    #[test]
    fn test_param_order_is_irrelevant() {
        let mut a = HashMap::new();
        a.insert("temperature", json!(0.2));
        a.insert("max_tokens", json!(128));
        a.insert("top_p", json!(0.9));
        let mut b = BTreeMap::new();
        b.insert("top_p", json!(0.9));
        b.insert("max_tokens", json!(128));
        b.insert("temperature", json!(0.2));

        let msgs = [Message::user("hi")];
        assert_eq!(
            compute_fingerprint("gpt-4o", &msgs, &a).unwrap(),
            compute_fingerprint("gpt-4o", &msgs, &b).unwrap()
        );
    }

    #[test]
    fn test_nested_param_order_is_irrelevant() {
        let a = json!({"options": {"a": 1, "b": 2}});
        let b = json!({"options": {"b": 2, "a": 1}});
        assert_eq!(
            compute_fingerprint("llama3", &[], &a).unwrap(),
            compute_fingerprint("llama3", &[], &b).unwrap()
        );
    }

    #[test]
    fn test_message_order_matters() {
        let fwd = [Message::user("a"), Message::user("b")];
        let rev = [Message::user("b"), Message::user("a")];
        assert_ne!(
            compute_fingerprint("gpt-4o", &fwd, &json!({})).unwrap(),
            compute_fingerprint("gpt-4o", &rev, &json!({})).unwrap()
        );
    }

    #[test]
    fn test_null_params_equal_empty_params() {
        let msgs = [Message::user("hi")];
        assert_eq!(
            compute_fingerprint("gpt-4o", &msgs, &Value::Null).unwrap(),
            compute_fingerprint("gpt-4o", &msgs, &json!({})).unwrap()
        );
    }

    #[test]
    fn test_empty_model_rejected() {
        let err = compute_fingerprint("  ", &[], &json!({})).unwrap_err();
        assert!(err.is_invalid_input());
        assert_eq!(
            err.context().and_then(|c| c.field_path.as_deref()),
            Some("model")
        );
    }

    #[test]
    fn test_non_map_params_rejected() {
        let err = compute_fingerprint("gpt-4o", &[], &json!([1, 2])).unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_non_string_map_keys_rejected() {
        let mut params = HashMap::new();
        params.insert((1, 2), 3);
        let err = compute_fingerprint("gpt-4o", &[], &params).unwrap_err();
        assert!(err.is_invalid_input());
    }

    #[test]
    fn test_nan_params_rejected() {
        let mut params = HashMap::new();
        params.insert("temperature", f64::NAN);
        let err = compute_fingerprint("gpt-4o", &[Message::user("hi")], &params).unwrap_err();
        assert!(err.is_invalid_input());
        assert_eq!(
            err.context().and_then(|c| c.field_path.as_deref()),
            Some("params")
        );
    }

    #[test]
    fn test_infinite_params_rejected() {
        let msgs = [Message::user("hi")];
        for v in [f64::INFINITY, f64::NEG_INFINITY] {
            let mut params = BTreeMap::new();
            params.insert("options", vec![0.5, v]);
            let err = compute_fingerprint("gpt-4o", &msgs, &params).unwrap_err();
            assert!(err.is_invalid_input(), "{v} should be rejected");
        }

        // a null temperature is still a valid, distinct input
        let mut null_temp: BTreeMap<&str, Option<f64>> = BTreeMap::new();
        null_temp.insert("temperature", None);
        assert!(compute_fingerprint("gpt-4o", &msgs, &null_temp).is_ok());
    }

    #[test]
    fn test_short_handles_short_keys() {
        assert_eq!(CacheKey::from("abc").short(), "abc");
        assert_eq!(CacheKey::from("abc").prefixed(Some("gw")), "gw:abc");
        assert_eq!(CacheKey::from("abc").prefixed(None), "abc");
    }
}
