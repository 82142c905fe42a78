//! Provider inference and model selection.
//!
//! Pure logic: no network calls. The dispatch layer uses it to decide which
//! preferred model can actually be served with the credentials at hand.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use tracing::warn;

use crate::{Error, ErrorContext, Result};

/// Upstream provider family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    OpenAI,
    Anthropic,
    Gemini,
    DeepSeek,
    /// Locally hosted models; also the home of any model without a known prefix.
    Ollama,
}

impl Provider {
    pub const ALL: [Provider; 5] = [
        Provider::OpenAI,
        Provider::Anthropic,
        Provider::Gemini,
        Provider::DeepSeek,
        Provider::Ollama,
    ];

    pub fn id(&self) -> &'static str {
        match self {
            Provider::OpenAI => "openai",
            Provider::Anthropic => "anthropic",
            Provider::Gemini => "gemini",
            Provider::DeepSeek => "deepseek",
            Provider::Ollama => "ollama",
        }
    }

    /// Infer the provider from a model name prefix.
    pub fn for_model(model: &str) -> Self {
        let model = model.trim();
        if model.starts_with("gpt-") {
            Provider::OpenAI
        } else if model.starts_with("claude-") {
            Provider::Anthropic
        } else if model.starts_with("gemini-") {
            Provider::Gemini
        } else if model.starts_with("deepseek-") {
            Provider::DeepSeek
        } else {
            Provider::Ollama
        }
    }

    pub fn api_key_env(&self) -> String {
        format!("{}_API_KEY", self.id().to_uppercase())
    }

    pub fn base_url_env(&self) -> String {
        format!("{}_API_BASE", self.id().to_uppercase())
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            Provider::OpenAI => "https://api.openai.com/v1",
            Provider::Anthropic => "https://api.anthropic.com/v1",
            Provider::Gemini => "https://generativelanguage.googleapis.com/v1beta",
            Provider::DeepSeek => "https://api.deepseek.com/v1",
            Provider::Ollama => "http://localhost:11434/api",
        }
    }

    /// Base URL, preferring `<PROVIDER>_API_BASE` when set.
    pub fn base_url(&self) -> String {
        if let Ok(v) = std::env::var(self.base_url_env()) {
            let v = v.trim().to_string();
            if !v.is_empty() {
                return v;
            }
        }
        self.default_base_url().to_string()
    }
}

impl std::fmt::Display for Provider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

/// Which providers have a credential configured. Key values are not kept.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderCredentials {
    configured: BTreeSet<Provider>,
}

impl ProviderCredentials {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, provider: Provider) -> Self {
        self.configured.insert(provider);
        self
    }

    /// Detect credentials from `<PROVIDER>_API_KEY` variables.
    pub fn from_env() -> Self {
        Self::from_env_with(|name| std::env::var(name).ok())
    }

    pub fn from_env_with<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let configured = Provider::ALL
            .into_iter()
            .filter(|p| lookup(&p.api_key_env()).is_some_and(|v| !v.trim().is_empty()))
            .collect();
        Self { configured }
    }

    pub fn has(&self, provider: Provider) -> bool {
        self.configured.contains(&provider)
    }

    pub fn providers(&self) -> impl Iterator<Item = Provider> + '_ {
        self.configured.iter().copied()
    }
}

/// Pick the first preferred model whose provider has a credential.
///
/// An Ollama credential makes every model servable, since a local Ollama
/// instance is asked for whatever model name it is given.
///
/// If none qualifies the first preferred model is returned anyway and a
/// warning is logged; the provider call will most likely fail.
pub fn select_available_model<S: AsRef<str>>(
    preferred: &[S],
    credentials: &ProviderCredentials,
) -> Result<String> {
    let Some(first) = preferred.first() else {
        return Err(Error::invalid_input_with_context(
            "no preferred models given",
            ErrorContext::new()
                .with_field_path("preferred_models")
                .with_source("model_selection"),
        ));
    };

    if let Some(model) = preferred
        .iter()
        .map(AsRef::as_ref)
        .find(|m| {
            credentials.has(Provider::for_model(m)) || credentials.has(Provider::Ollama)
        })
    {
        return Ok(model.to_string());
    }

    let first = first.as_ref();
    warn!(
        model = first,
        provider = %Provider::for_model(first),
        "no credentials for any preferred model, falling back to the first one"
    );
    Ok(first.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_provider_for_model() {
        assert_eq!(Provider::for_model("gpt-4o"), Provider::OpenAI);
        assert_eq!(Provider::for_model("claude-3-opus"), Provider::Anthropic);
        assert_eq!(Provider::for_model("gemini-pro"), Provider::Gemini);
        assert_eq!(Provider::for_model("deepseek-chat"), Provider::DeepSeek);
        assert_eq!(Provider::for_model("llama3"), Provider::Ollama);
    }

    #[test]
    fn test_env_names() {
        assert_eq!(Provider::OpenAI.api_key_env(), "OPENAI_API_KEY");
        assert_eq!(Provider::DeepSeek.base_url_env(), "DEEPSEEK_API_BASE");
    }

    #[test]
    fn test_credentials_from_env_ignores_blank_values() {
        let creds = ProviderCredentials::from_env_with(|name| match name {
            "ANTHROPIC_API_KEY" => Some("sk-ant".to_string()),
            "OPENAI_API_KEY" => Some("   ".to_string()),
            _ => None,
        });
        assert!(creds.has(Provider::Anthropic));
        assert!(!creds.has(Provider::OpenAI));
        assert_eq!(creds.providers().collect::<Vec<_>>(), vec![Provider::Anthropic]);
    }

    #[test]
    fn test_select_first_available() {
        let creds = ProviderCredentials::new().with(Provider::Gemini);
        let picked =
            select_available_model(&["gpt-4o", "gemini-pro", "claude-3-opus"], &creds).unwrap();
        assert_eq!(picked, "gemini-pro");
    }

    #[test]
    fn test_ollama_credential_serves_any_model() {
        let creds = ProviderCredentials::new().with(Provider::Ollama);
        let picked = select_available_model(&["claude-3-opus", "llama3"], &creds).unwrap();
        assert_eq!(picked, "claude-3-opus");

        // a matching provider credential earlier in the list still wins
        let creds = creds.with(Provider::OpenAI);
        let picked = select_available_model(&["gpt-4o", "llama3"], &creds).unwrap();
        assert_eq!(picked, "gpt-4o");
    }

    #[test]
    fn test_select_falls_back_to_first() {
        let picked =
            select_available_model(&["gpt-4o", "llama3"], &ProviderCredentials::new()).unwrap();
        assert_eq!(picked, "gpt-4o");
    }

    #[test]
    fn test_select_empty_list_rejected() {
        let empty: [&str; 0] = [];
        let err = select_available_model(&empty, &ProviderCredentials::new()).unwrap_err();
        assert!(err.is_invalid_input());
    }
}
