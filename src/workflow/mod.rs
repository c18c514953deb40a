//! Query-time orchestration: intent routing, the two execution branches,
//! and the engine that composes them.
//!
//! ```text
//! question → WorkflowEngine
//!   ├── IntentRouter (one chat call, sets intent exactly once)
//!   ├── intent = datcom_generation → DatcomPipeline (fixed sequence)
//!   └── intent = general_query     → ReasoningAgent (bounded tool loop)
//! ```

pub mod engine;
pub mod prompt;
pub mod react;
pub mod router;
pub mod state;

pub use engine::WorkflowEngine;
pub use react::ReasoningAgent;
pub use router::IntentRouter;
pub use state::{Intent, WorkflowState};
