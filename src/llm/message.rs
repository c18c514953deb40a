//! Conversation messages exchanged between the workflow and the chat
//! service.
//!
//! One run's history follows a fixed shape: a user turn, then zero or more
//! rounds of assistant tool requests answered by tool observations, then a
//! terminal assistant answer. Observations carry both the originating tool
//! name and the call ID so later stages can tell which claims rest on
//! retrieval evidence.

use serde::{Deserialize, Serialize};

use crate::tools::{ToolCall, ToolDefinition};

/// Who produced a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Engine-supplied instructions.
    System,
    /// The engineer's query.
    User,
    /// Model output: a tool request or an answer.
    Assistant,
    /// A tool observation.
    Tool,
}

/// One entry in a run's message history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Who produced this message.
    pub role: Role,
    /// Text content; empty for a pure tool-request turn.
    pub content: String,
    /// Tool calls the assistant wants executed (assistant turns only).
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ToolCall>,
    /// Tool that produced this observation (tool turns only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_name: Option<String>,
    /// Call this observation answers (tool turns only).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

impl ChatMessage {
    fn plain(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_name: None,
            tool_call_id: None,
        }
    }

    /// An instruction turn.
    #[must_use]
    pub fn system(content: impl Into<String>) -> Self {
        Self::plain(Role::System, content)
    }

    /// The engineer's query turn.
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self::plain(Role::User, content)
    }

    /// A terminal assistant answer.
    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::plain(Role::Assistant, content)
    }

    /// An assistant turn requesting tool execution. Carries no text; the
    /// model answers only after seeing the observations.
    #[must_use]
    pub fn tool_request(calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: String::new(),
            tool_calls: calls,
            tool_name: None,
            tool_call_id: None,
        }
    }

    /// A tool observation answering `call_id`, attributed to `tool_name`.
    #[must_use]
    pub fn observation(
        call_id: &str,
        tool_name: &str,
        content: impl Into<String>,
    ) -> Self {
        Self {
            role: Role::Tool,
            content: content.into(),
            tool_calls: Vec::new(),
            tool_name: Some(tool_name.to_string()),
            tool_call_id: Some(call_id.to_string()),
        }
    }

    /// The tool this observation came from, when the message is one.
    #[must_use]
    pub fn observation_from(&self) -> Option<&str> {
        if self.role == Role::Tool {
            self.tool_name.as_deref()
        } else {
            None
        }
    }
}

/// A chat completion request.
#[derive(Debug, Clone)]
pub struct ChatRequest {
    /// Model identifier.
    pub model: String,
    /// Ordered conversation history.
    pub messages: Vec<ChatMessage>,
    /// Sampling temperature.
    pub temperature: Option<f32>,
    /// Constrain the reply to a JSON object (parameter extraction).
    pub json_mode: bool,
    /// Tools the model may request.
    pub tools: Vec<ToolDefinition>,
}

/// What the model decided to do with a turn: answer, or ask for tools.
#[derive(Debug, Clone)]
pub enum ChatReply {
    /// A terminal text answer.
    Answer(String),
    /// Tool calls to execute, in emission order, before the model will
    /// answer.
    ToolRequests(Vec<ToolCall>),
}

/// Token accounting for one completion.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Tokens consumed by the prompt.
    pub prompt: u32,
    /// Tokens generated in the reply.
    pub completion: u32,
}

impl TokenUsage {
    /// Total tokens spent on the call.
    #[must_use]
    pub const fn total(&self) -> u32 {
        self.prompt + self.completion
    }
}

/// A chat completion response.
#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// The model's decision for this turn.
    pub reply: ChatReply,
    /// Token accounting.
    pub usage: TokenUsage,
    /// Why the model stopped (e.g., `"stop"`, `"tool_calls"`, `"length"`).
    pub finish_reason: Option<String>,
}

impl ChatResponse {
    /// The answer text, when the model answered rather than requesting
    /// tools.
    #[must_use]
    pub fn text(&self) -> Option<&str> {
        match &self.reply {
            ChatReply::Answer(text) => Some(text),
            ChatReply::ToolRequests(_) => None,
        }
    }
}
