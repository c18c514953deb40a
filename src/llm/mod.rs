//! LLM client layer: chat completion and embedding.
//!
//! Provider-agnostic message types plus the two remote-service seams
//! ([`ChatProvider`], [`Embedder`]) and their `OpenAI`-compatible
//! implementations. All remote calls carry their own retry budget and
//! timeout.

pub mod embedding;
pub mod message;
pub mod openai;
pub mod provider;
pub mod retry;

pub use embedding::{Embedder, HttpEmbedder};
pub use message::{ChatMessage, ChatReply, ChatRequest, ChatResponse, Role, TokenUsage};
pub use openai::OpenAiChat;
pub use provider::ChatProvider;
pub use retry::{RetryPolicy, retry_with_backoff};
