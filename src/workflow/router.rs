//! Intent router: classifies a query into one of the two execution
//! branches.
//!
//! One temperature-0 chat call with a fixed rule prompt. Ambiguous or
//! unparseable replies default to the general branch, and a chat failure
//! is non-fatal for the same reason: the reasoning agent can handle any
//! query, while the DATCOM pipeline only makes sense when the router is
//! confident.

use std::sync::Arc;

use tracing::{debug, warn};

use crate::llm::message::{ChatMessage, ChatRequest};
use crate::llm::provider::ChatProvider;
use crate::workflow::prompt::ROUTER_SYSTEM_PROMPT;
use crate::workflow::state::{Intent, WorkflowState};

/// Classifies queries by intent.
pub struct IntentRouter {
    chat: Arc<dyn ChatProvider>,
    model: String,
}

impl IntentRouter {
    /// Creates a router over the shared chat provider.
    #[must_use]
    pub fn new(chat: Arc<dyn ChatProvider>, model: impl Into<String>) -> Self {
        Self {
            chat,
            model: model.into(),
        }
    }

    /// Parses the model's single-token reply into an intent.
    fn parse_reply(reply: &str) -> Option<Intent> {
        let route = reply.trim().to_lowercase();
        if route.contains("datcom") {
            Some(Intent::DatcomGeneration)
        } else if route.contains("general") {
            Some(Intent::GeneralQuery)
        } else {
            None
        }
    }

    /// Classifies the state's question, seeds the user turn, and writes
    /// `intent` exactly once.
    pub async fn classify(&self, state: &mut WorkflowState) -> Intent {
        state.seed_user_turn();

        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage::system(ROUTER_SYSTEM_PROMPT),
                ChatMessage::user(state.question.clone()),
            ],
            temperature: Some(0.0),
            json_mode: false,
            tools: Vec::new(),
        };

        // The router sends no tool schemas, so anything but a parseable
        // text answer falls through to the general branch.
        let intent = match self.chat.complete(&request).await {
            Ok(response) => match response.text().and_then(Self::parse_reply) {
                Some(intent) => intent,
                None => {
                    warn!(
                        reply = response.text().unwrap_or("<tool request>").trim(),
                        "unclear routing reply, defaulting to general_query"
                    );
                    Intent::GeneralQuery
                }
            },
            Err(e) => {
                warn!(error = %e, "router chat failed, defaulting to general_query");
                Intent::GeneralQuery
            }
        };

        debug!(intent = intent.as_str(), "routing decision");
        state.intent = Some(intent);
        intent
    }
}
