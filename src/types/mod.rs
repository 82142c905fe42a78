//! # Types Module
//!
//! Gateway-wide data contracts shared by the dispatch layer and the response
//! cache.
//!
//! ## Key Types
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Message`] | Chat message with role and plain-text content |
//! | [`MessageRole`] | Message role (system, user, assistant) |
//! | [`ChatRequest`] | Normalized chat request accepted by every provider |
//! | [`ChatResponse`] | Normalized chat response; this is what gets cached |
//!
//! ## Example
//!
//! ```rust
//! use llm_gateway_cache::types::{ChatRequest, Message};
//!
//! let request = ChatRequest::new(
//!     "gpt-4o",
//!     vec![Message::system("You are terse."), Message::user("hi")],
//! )
//! .with_max_tokens(64);
//! let key = request.cache_key().unwrap();
//! assert_eq!(key.as_str().len(), 64);
//! ```

pub mod chat;
pub mod message;

pub use chat::{ChatRequest, ChatResponse};
pub use message::{Message, MessageRole};
