//! `OpenAI`-compatible chat provider using the `async-openai` crate.
//!
//! Supports any `OpenAI`-compatible API (vLLM, local proxies, gateways)
//! via the base URL override in [`EngineConfig`]. Transport errors are
//! retried with bounded exponential backoff before surfacing as
//! [`ChatError`].
//!
//! The wire model and ours disagree in one place: the API couples a tool
//! result to the assistant turn that requested it, while our history may
//! have dropped that turn during pruning. Orphaned observations are
//! therefore downgraded to user-role text instead of being sent as tool
//! messages the API would reject.

use async_openai::Client;
use async_openai::config::OpenAIConfig;
use async_openai::types::{
    ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessage,
    ChatCompletionRequestAssistantMessageContent as AssistantContent,
    ChatCompletionRequestMessage, ChatCompletionRequestSystemMessage,
    ChatCompletionRequestSystemMessageContent as SystemContent,
    ChatCompletionRequestToolMessage,
    ChatCompletionRequestToolMessageContent as ToolContent,
    ChatCompletionRequestUserMessage,
    ChatCompletionRequestUserMessageContent as UserContent, ChatCompletionTool,
    ChatCompletionToolChoiceOption, ChatCompletionToolType, CreateChatCompletionRequest,
    FunctionCall, FunctionObject, ResponseFormat,
};
use async_trait::async_trait;
use std::collections::HashSet;
use std::time::Duration;

use crate::config::EngineConfig;
use crate::error::ChatError;
use crate::llm::message::{ChatMessage, ChatReply, ChatRequest, ChatResponse, Role, TokenUsage};
use crate::llm::provider::ChatProvider;
use crate::llm::retry::{RetryPolicy, retry_with_backoff};
use crate::tools::ToolCall;

/// `OpenAI`-compatible chat provider.
pub struct OpenAiChat {
    client: Client<OpenAIConfig>,
    policy: RetryPolicy,
    timeout: Duration,
}

/// Maps one of our tool calls onto the SDK's function-call shape.
fn sdk_tool_call(call: &ToolCall) -> ChatCompletionMessageToolCall {
    ChatCompletionMessageToolCall {
        id: call.id.clone(),
        r#type: ChatCompletionToolType::Function,
        function: FunctionCall {
            name: call.name.clone(),
            arguments: call.arguments.clone(),
        },
    }
}

impl OpenAiChat {
    /// Creates a new provider from engine configuration.
    #[must_use]
    pub fn new(config: &EngineConfig) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(&config.chat_api_key)
            .with_api_base(&config.chat_api_base);

        Self {
            client: Client::with_config(openai_config),
            policy: RetryPolicy::with_retries(config.max_retries),
            timeout: config.remote_timeout,
        }
    }

    /// Converts one history entry to the SDK's message type.
    ///
    /// `known_call_ids` holds the call IDs emitted by assistant turns seen
    /// so far; an observation whose ID is not among them lost its
    /// requesting turn to pruning and is downgraded to user-role text.
    fn convert_message(
        msg: &ChatMessage,
        known_call_ids: &HashSet<String>,
    ) -> ChatCompletionRequestMessage {
        match msg.role {
            Role::System => ChatCompletionRequestSystemMessage {
                content: SystemContent::Text(msg.content.clone()),
                name: None,
            }
            .into(),
            Role::User => Self::user_text(msg.content.clone()),
            Role::Assistant => {
                let tool_calls = (!msg.tool_calls.is_empty())
                    .then(|| msg.tool_calls.iter().map(sdk_tool_call).collect());
                let content = (!msg.content.is_empty())
                    .then(|| AssistantContent::Text(msg.content.clone()));
                // The SDK still carries the legacy function-calling fields;
                // they stay unset.
                #[allow(deprecated)]
                ChatCompletionRequestAssistantMessage {
                    content,
                    tool_calls,
                    name: None,
                    refusal: None,
                    audio: None,
                    function_call: None,
                }
                .into()
            }
            Role::Tool => {
                let call_id = msg.tool_call_id.clone().unwrap_or_default();
                if known_call_ids.contains(&call_id) {
                    ChatCompletionRequestToolMessage {
                        content: ToolContent::Text(msg.content.clone()),
                        tool_call_id: call_id,
                    }
                    .into()
                } else {
                    let tool = msg.observation_from().unwrap_or("tool");
                    Self::user_text(format!("[observation from {tool}]\n{}", msg.content))
                }
            }
        }
    }

    /// A user-role message with plain text content. Also the downgrade
    /// target for orphaned observations.
    fn user_text(content: String) -> ChatCompletionRequestMessage {
        ChatCompletionRequestUserMessage {
            content: UserContent::Text(content),
            name: None,
        }
        .into()
    }

    /// Builds an `OpenAI` chat completion request from our generic request.
    fn build_request(request: &ChatRequest) -> CreateChatCompletionRequest {
        let mut known_call_ids: HashSet<String> = HashSet::new();
        let mut messages = Vec::with_capacity(request.messages.len());
        for msg in &request.messages {
            if msg.role == Role::Assistant {
                known_call_ids.extend(msg.tool_calls.iter().map(|tc| tc.id.clone()));
            }
            messages.push(Self::convert_message(msg, &known_call_ids));
        }

        let response_format = request.json_mode.then_some(ResponseFormat::JsonObject);

        let (tools, tool_choice) = if request.tools.is_empty() {
            (None, None)
        } else {
            let tools = request
                .tools
                .iter()
                .map(|td| ChatCompletionTool {
                    r#type: ChatCompletionToolType::Function,
                    function: FunctionObject {
                        name: td.name.clone(),
                        description: Some(td.description.clone()),
                        parameters: Some(td.parameters.clone()),
                        strict: None,
                    },
                })
                .collect();
            (Some(tools), Some(ChatCompletionToolChoiceOption::Auto))
        };

        CreateChatCompletionRequest {
            model: request.model.clone(),
            messages,
            temperature: request.temperature,
            response_format,
            tools,
            tool_choice,
            ..Default::default()
        }
    }
}

impl std::fmt::Debug for OpenAiChat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OpenAiChat")
            .field("client", &"<async-openai::Client>")
            .field("policy", &self.policy)
            .finish()
    }
}

/// Whether an `async-openai` error is worth retrying: transport timeouts,
/// connection failures, and 5xx-shaped API errors.
fn is_transient(err: &async_openai::error::OpenAIError) -> bool {
    match err {
        async_openai::error::OpenAIError::Reqwest(e) => {
            e.is_timeout() || e.is_connect() || e.status().is_some_and(|s| s.is_server_error())
        }
        async_openai::error::OpenAIError::ApiError(api) => {
            let message = api.message.to_lowercase();
            message.contains("server error")
                || message.contains("overloaded")
                || message.contains("service unavailable")
        }
        _ => false,
    }
}

#[async_trait]
impl ChatProvider for OpenAiChat {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ChatError> {
        let openai_request = Self::build_request(request);

        // Each attempt carries its own timeout; the retry budget covers
        // timeouts and transient API failures alike.
        let attempt_transient = |e: &AttemptError| match e {
            AttemptError::Timeout => true,
            AttemptError::Api(api) => is_transient(api),
        };
        let response = retry_with_backoff(&self.policy, "chat", attempt_transient, || async {
            match tokio::time::timeout(
                self.timeout,
                self.client.chat().create(openai_request.clone()),
            )
            .await
            {
                Ok(Ok(response)) => Ok(response),
                Ok(Err(e)) => Err(AttemptError::Api(e)),
                Err(_) => Err(AttemptError::Timeout),
            }
        })
        .await
        .map_err(|e| match e {
            AttemptError::Timeout => ChatError::Timeout {
                seconds: self.timeout.as_secs(),
            },
            AttemptError::Api(api) => ChatError::Request {
                message: api.to_string(),
            },
        })?;

        let choice = response.choices.first();

        // A turn with tool calls is a tool request regardless of any
        // preamble text; otherwise it is the terminal answer.
        let tool_calls: Vec<ToolCall> = choice
            .and_then(|c| c.message.tool_calls.as_ref())
            .map(|tcs| {
                tcs.iter()
                    .map(|tc| ToolCall {
                        id: tc.id.clone(),
                        name: tc.function.name.clone(),
                        arguments: tc.function.arguments.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default();

        let reply = if tool_calls.is_empty() {
            let content = choice
                .and_then(|c| c.message.content.as_ref())
                .cloned()
                .unwrap_or_default();
            ChatReply::Answer(content)
        } else {
            ChatReply::ToolRequests(tool_calls)
        };

        let finish_reason = choice.and_then(|c| {
            c.finish_reason
                .as_ref()
                .map(|fr| format!("{fr:?}").to_lowercase())
        });

        let usage = response.usage.map_or_else(TokenUsage::default, |u| TokenUsage {
            prompt: u.prompt_tokens,
            completion: u.completion_tokens,
        });

        Ok(ChatResponse {
            reply,
            usage,
            finish_reason,
        })
    }
}

/// Per-attempt failure inside the retry loop.
enum AttemptError {
    /// The SDK call failed.
    Api(async_openai::error::OpenAIError),
    /// The attempt exceeded the per-call timeout.
    Timeout,
}

impl std::fmt::Display for AttemptError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Api(e) => write!(f, "{e}"),
            Self::Timeout => write!(f, "attempt timed out"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolDefinition;

    #[test]
    fn test_convert_system_message() {
        let msg = ChatMessage::system("route the query");
        let converted = OpenAiChat::convert_message(&msg, &HashSet::new());
        assert!(matches!(converted, ChatCompletionRequestMessage::System(_)));
    }

    #[test]
    fn test_convert_observation_with_requesting_turn() {
        let msg = ChatMessage::observation("call_1", "metadata_search", "=== 文件 ===");
        let ids: HashSet<String> = ["call_1".to_string()].into();
        let converted = OpenAiChat::convert_message(&msg, &ids);
        assert!(matches!(converted, ChatCompletionRequestMessage::Tool(_)));
    }

    #[test]
    fn test_orphan_observation_downgraded_to_user() {
        let msg = ChatMessage::observation("call_lost", "article_lookup", "第 24 條 ...");
        let converted = OpenAiChat::convert_message(&msg, &HashSet::new());
        match converted {
            ChatCompletionRequestMessage::User(u) => {
                let UserContent::Text(text) = u.content else {
                    panic!("expected text content");
                };
                assert!(text.contains("article_lookup"));
                assert!(text.contains("第 24 條"));
            }
            other => panic!("expected User message, got {other:?}"),
        }
    }

    #[test]
    fn test_convert_tool_request_turn() {
        let msg = ChatMessage::tool_request(vec![ToolCall {
            id: "call_7".to_string(),
            name: "python_calculator".to_string(),
            arguments: "{}".to_string(),
        }]);
        let converted = OpenAiChat::convert_message(&msg, &HashSet::new());
        match converted {
            ChatCompletionRequestMessage::Assistant(a) => {
                assert!(a.content.is_none());
                assert_eq!(a.tool_calls.as_ref().map_or(0, Vec::len), 1);
            }
            other => panic!("expected Assistant message, got {other:?}"),
        }
    }

    #[test]
    fn test_build_request_with_tools_sets_auto_choice() {
        let request = ChatRequest {
            model: "gpt-test".to_string(),
            messages: vec![ChatMessage::user("what is FLTCON?")],
            temperature: Some(0.0),
            json_mode: false,
            tools: vec![ToolDefinition {
                name: "retrieve_datcom_archive".to_string(),
                description: "Semantic retrieval".to_string(),
                parameters: serde_json::json!({"type": "object", "properties": {}}),
            }],
        };
        let built = OpenAiChat::build_request(&request);
        assert_eq!(built.tools.as_ref().map_or(0, Vec::len), 1);
        assert!(matches!(
            built.tool_choice,
            Some(ChatCompletionToolChoiceOption::Auto)
        ));
        assert_eq!(built.temperature, Some(0.0));
    }

    #[test]
    fn test_build_request_json_mode() {
        let request = ChatRequest {
            model: "gpt-test".to_string(),
            messages: vec![ChatMessage::user("extract parameters")],
            temperature: Some(0.0),
            json_mode: true,
            tools: Vec::new(),
        };
        let built = OpenAiChat::build_request(&request);
        assert!(built.response_format.is_some());
        assert!(built.tools.is_none());
    }

    #[test]
    fn test_observation_keeps_wire_form_after_its_requesting_turn() {
        let request = ChatRequest {
            model: "gpt-test".to_string(),
            messages: vec![
                ChatMessage::user("q"),
                ChatMessage::tool_request(vec![ToolCall {
                    id: "call_7".to_string(),
                    name: "python_calculator".to_string(),
                    arguments: "{}".to_string(),
                }]),
                ChatMessage::observation("call_7", "python_calculator", "計算結果: 4"),
            ],
            temperature: Some(0.0),
            json_mode: false,
            tools: Vec::new(),
        };
        let built = OpenAiChat::build_request(&request);
        assert!(matches!(
            built.messages[2],
            ChatCompletionRequestMessage::Tool(_)
        ));
    }
}
