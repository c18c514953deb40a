//! Pluggable chat provider trait.
//!
//! Implementations translate provider-agnostic [`ChatRequest`]/[`ChatResponse`]
//! into provider-specific SDK calls, keeping the workflow decoupled from any
//! particular LLM vendor.

use async_trait::async_trait;

use super::message::{ChatRequest, ChatResponse};
use crate::error::ChatError;

/// Trait for chat completion backends.
///
/// Implementations handle the transport layer (HTTP, SDK calls, retries)
/// for a specific provider while presenting a uniform interface. The
/// engine returns one terminal answer per query; there is no streaming
/// surface.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Provider name (e.g., `"openai"`).
    fn name(&self) -> &'static str;

    /// Executes a chat completion request.
    ///
    /// # Errors
    ///
    /// Returns [`ChatError`] on API failures, timeouts, or parse errors
    /// after the provider's own retry budget is exhausted.
    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ChatError>;
}
