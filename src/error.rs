use std::time::Duration;
use thiserror::Error;

/// Structured error context for better error handling and debugging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    /// Field path or configuration key that caused the error (e.g., "CACHE_TTL", "params")
    pub field_path: Option<String>,
    /// Additional context about the error (e.g., expected type, actual value)
    pub details: Option<String>,
    /// Source of the error (e.g., "cache_config", "fingerprint")
    pub source: Option<String>,
}

impl ErrorContext {
    pub fn new() -> Self {
        Self {
            field_path: None,
            details: None,
            source: None,
        }
    }

    pub fn with_field_path(mut self, path: impl Into<String>) -> Self {
        self.field_path = Some(path.into());
        self
    }

    pub fn with_details(mut self, details: impl Into<String>) -> Self {
        self.details = Some(details.into());
        self
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors surfaced to callers of the cache.
///
/// Backend failures are deliberately absent: they are [`BackendError`]s and are
/// absorbed by [`crate::cache::ResponseCache`] instead of being returned.
#[derive(Debug, Error)]
pub enum Error {
    #[error("Configuration error: {message}{}", format_context(.context))]
    Configuration {
        message: String,
        context: ErrorContext,
    },

    #[error("Invalid input: {message}{}", format_context(.context))]
    InvalidInput {
        message: String,
        context: ErrorContext,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

// Helper function to format error context for display
fn format_context(ctx: &ErrorContext) -> String {
    let mut parts = Vec::new();
    if let Some(ref field) = ctx.field_path {
        parts.push(format!("field: {}", field));
    }
    if let Some(ref details) = ctx.details {
        parts.push(format!("details: {}", details));
    }
    if let Some(ref source) = ctx.source {
        parts.push(format!("source: {}", source));
    }
    if parts.is_empty() {
        String::new()
    } else {
        format!(" ({})", parts.join(", "))
    }
}

impl Error {
    pub fn configuration(msg: impl Into<String>) -> Self {
        Self::configuration_with_context(msg, ErrorContext::new())
    }

    /// Create a new configuration error with structured context
    pub fn configuration_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::Configuration {
            message: msg.into(),
            context,
        }
    }

    pub fn invalid_input(msg: impl Into<String>) -> Self {
        Self::invalid_input_with_context(msg, ErrorContext::new())
    }

    /// Create a new invalid-input error with structured context
    pub fn invalid_input_with_context(msg: impl Into<String>, context: ErrorContext) -> Self {
        Error::InvalidInput {
            message: msg.into(),
            context,
        }
    }

    /// Extract error context if available
    pub fn context(&self) -> Option<&ErrorContext> {
        match self {
            Error::Configuration { context, .. } | Error::InvalidInput { context, .. } => {
                Some(context)
            }
            _ => None,
        }
    }

    pub fn is_configuration(&self) -> bool {
        matches!(self, Error::Configuration { .. })
    }

    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Error::InvalidInput { .. })
    }
}

/// Transient backend failure. Always recovered inside the cache.
#[derive(Debug, Error)]
pub enum BackendError {
    #[error("backend connection failed: {0}")]
    Connection(String),

    #[error("backend operation timed out after {0:?}")]
    Timeout(Duration),

    #[error("backend command {command} failed: {message}")]
    Command {
        command: &'static str,
        message: String,
    },

    #[error("cache payload codec error: {0}")]
    Codec(#[from] serde_json::Error),

    #[error("local cache lock poisoned")]
    Poisoned,
}

impl BackendError {
    pub(crate) fn command(command: &'static str, err: impl std::fmt::Display) -> Self {
        BackendError::Command {
            command,
            message: err.to_string(),
        }
    }
}

pub type BackendResult<T> = std::result::Result<T, BackendError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_context_display() {
        let err = Error::configuration_with_context(
            "invalid value",
            ErrorContext::new()
                .with_field_path("CACHE_TTL")
                .with_source("cache_config"),
        );
        let msg = err.to_string();
        assert!(msg.starts_with("Configuration error: invalid value"));
        assert!(msg.contains("field: CACHE_TTL"));
        assert!(msg.contains("source: cache_config"));
        assert!(err.is_configuration());
    }

    #[test]
    fn test_error_without_context() {
        let err = Error::invalid_input("model must not be empty");
        assert_eq!(err.to_string(), "Invalid input: model must not be empty");
        assert!(err.is_invalid_input());
        assert_eq!(err.context(), Some(&ErrorContext::new()));
    }

    #[test]
    fn test_backend_error_display() {
        let err = BackendError::Timeout(Duration::from_millis(1500));
        assert_eq!(err.to_string(), "backend operation timed out after 1.5s");
        let err = BackendError::command("SETEX", "READONLY replica");
        assert_eq!(
            err.to_string(),
            "backend command SETEX failed: READONLY replica"
        );
    }

    #[test]
    fn test_codec_error_from_serde() {
        let serde_err = serde_json::from_slice::<serde_json::Value>(b"{oops").unwrap_err();
        let err = BackendError::from(serde_err);
        assert!(matches!(err, BackendError::Codec(_)));
        assert!(err.to_string().starts_with("cache payload codec error: "));
    }
}
