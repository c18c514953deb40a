//! aerorag: an intent-routed retrieval engine for UAV/DATCOM aerodynamic
//! design queries.
//!
//! A query enters the [`workflow::WorkflowEngine`], is classified by the
//! intent router, and runs through exactly one of two branches: the
//! fixed-sequence DATCOM generator ([`datcom::DatcomPipeline`]) or the
//! tool-using reasoning agent ([`workflow::ReasoningAgent`]). Both share
//! the vector retrieval subsystem ([`store`]), the typed tool registry
//! ([`tools`]), and the message-passing state ([`workflow::WorkflowState`]).

pub mod cli;
pub mod config;
pub mod datcom;
pub mod error;
pub mod llm;
pub mod store;
pub mod tools;
pub mod workflow;

#[cfg(test)]
pub(crate) mod testutil;

pub use config::EngineConfig;
pub use error::{ChatError, EmbedError, EngineError, Result, StoreError, ToolError};
pub use store::{RetrievedDoc, VectorSearch};
pub use tools::{ToolCall, ToolDefinition, ToolRegistry, ToolResult};
pub use workflow::{Intent, WorkflowEngine, WorkflowState};
