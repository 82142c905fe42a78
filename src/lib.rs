//! # llm-gateway-cache
//!
//! Response cache for a gateway that fronts several LLM providers
//! (OpenAI-compatible, Anthropic, Gemini, DeepSeek, Ollama) behind one schema.
//!
//! ## Overview
//!
//! Every provider call the gateway makes can pass through a [`ResponseCache`]:
//! the request is fingerprinted from its model, message history and generation
//! parameters, looked up, and only forwarded to the provider on a miss. The
//! cache is strictly best-effort: backend failures turn into misses, never
//! into errors on the request path.
//!
//! ## Key Features
//!
//! - **Deterministic keys**: SHA-256 over a canonical serialization,
//!   see [`cache::compute_fingerprint`]
//! - **Two backends**: a shared Redis-protocol store, or a process-local map as fallback
//! - **Bounded latency**: every networked call carries a timeout
//! - **Explicit configuration**: [`CacheConfig`] built in code or read from the environment
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use llm_gateway_cache::{CacheConfig, ChatRequest, ChatResponse, Message, ResponseCache};
//!
//! #[tokio::main]
//! async fn main() -> llm_gateway_cache::Result<()> {
//!     let cache = ResponseCache::connect(CacheConfig::from_env()?).await?;
//!
//!     let request = ChatRequest::new("gpt-4o", vec![Message::user("Hello")]);
//!     let key = request.cache_key()?;
//!
//!     let response: Result<ChatResponse, std::io::Error> = cache
//!         .get_or_fetch(&key, || async {
//!             // call the provider here
//!             Ok(ChatResponse::new("gpt-4o", Message::assistant("Hi!")))
//!         })
//!         .await;
//!     println!("{:?}", response);
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`cache`] | Fingerprinting, backends and the response cache |
//! | [`types`] | Message and chat request/response contracts |
//! | [`routing`] | Provider inference and model selection |
//! | [`error`] | Error types |

pub mod cache;
pub mod error;
pub mod routing;
pub mod types;

pub use cache::{BackendKind, CacheConfig, CacheKey, CacheStats, ResponseCache};
pub use error::{BackendError, Error, ErrorContext};
pub use types::{ChatRequest, ChatResponse, Message, MessageRole};

/// Result type alias for the library
pub type Result<T> = std::result::Result<T, Error>;
