//! Workflow state: the single value that flows between components.
//!
//! One `WorkflowState` is created per query, mutated only by the component
//! sequence the engine defines, and discarded after return. `messages` is
//! append-only for the duration of a run; concurrent runs never share a
//! state value.

use serde::{Deserialize, Serialize};

use crate::llm::message::ChatMessage;
use crate::store::RetrievedDoc;

/// Routing intent, set exactly once by the intent router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    /// Fixed-sequence DATCOM input-file generation.
    DatcomGeneration,
    /// Tool-using retrieval and reasoning.
    GeneralQuery,
}

impl Intent {
    /// The wire token for this intent.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::DatcomGeneration => "datcom_generation",
            Self::GeneralQuery => "general_query",
        }
    }
}

/// State for one query run.
#[derive(Debug, Clone)]
pub struct WorkflowState {
    /// Ordered message history; append-only within a run.
    pub messages: Vec<ChatMessage>,
    /// The raw user query.
    pub question: String,
    /// Routing intent; written before either branch executes.
    pub intent: Option<Intent>,
    /// Selected document collection, or empty when the agent picks it
    /// dynamically.
    pub collection: String,
    /// Documents retrieved during the run (observability only).
    pub retrieved_docs: Vec<RetrievedDoc>,
    /// The final user-visible answer; set exactly once on success.
    pub generation: String,
}

impl WorkflowState {
    /// Creates a fresh state for a query.
    #[must_use]
    pub fn new(question: impl Into<String>) -> Self {
        Self {
            messages: Vec::new(),
            question: question.into(),
            intent: None,
            collection: String::new(),
            retrieved_docs: Vec::new(),
            generation: String::new(),
        }
    }

    /// Seeds the message history with the user turn if it is empty.
    pub fn seed_user_turn(&mut self) {
        if self.messages.is_empty() {
            self.messages.push(ChatMessage::user(self.question.clone()));
        }
    }

    /// Appends a message (the only mutation `messages` supports).
    pub fn push_message(&mut self, message: ChatMessage) {
        self.messages.push(message);
    }
}
