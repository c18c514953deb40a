//! Workflow engine: routes one query through exactly one execution branch.
//!
//! Composition: intent router → branch on intent → DATCOM pipeline or
//! reasoning agent → terminal. State updates merge by field; `messages`
//! merges by append. Every query runs under a deadline and a cancellation
//! token; on cancellation partial messages are discarded and nothing is
//! written for the user.

use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::config::EngineConfig;
use crate::datcom::DatcomPipeline;
use crate::error::EngineError;
use crate::llm::embedding::Embedder;
use crate::llm::provider::ChatProvider;
use crate::store::VectorSearch;
use crate::tools::{ToolExecutor, ToolRegistry};
use crate::workflow::react::ReasoningAgent;
use crate::workflow::router::IntentRouter;
use crate::workflow::state::{Intent, WorkflowState};

/// The query-time orchestration engine.
pub struct WorkflowEngine {
    router: IntentRouter,
    pipeline: DatcomPipeline,
    agent: ReasoningAgent,
    deadline: Duration,
}

impl WorkflowEngine {
    /// Wires the engine over the shared backends.
    ///
    /// Builds the frozen tool registry and the executor once; both are
    /// shared read-only by every query this engine serves.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Tool`] if the registry factories collide.
    pub fn new(
        chat: Arc<dyn ChatProvider>,
        embedder: Arc<dyn Embedder>,
        store: Arc<dyn VectorSearch>,
        config: EngineConfig,
    ) -> Result<Self, EngineError> {
        let registry = ToolRegistry::build()?;
        let executor = Arc::new(ToolExecutor::new(
            Arc::clone(&chat),
            embedder,
            store,
            config.clone(),
        ));

        Ok(Self {
            router: IntentRouter::new(Arc::clone(&chat), config.chat_model.clone()),
            pipeline: DatcomPipeline::new(Arc::clone(&chat), &config),
            agent: ReasoningAgent::new(chat, executor, &registry, &config),
            deadline: config.query_deadline,
        })
    }

    /// Runs one query to completion.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::User`] for an empty question,
    /// [`EngineError::DeadlineExceeded`] when the per-query deadline
    /// elapses, and [`EngineError::Cancelled`] when the token fires. On
    /// success the returned state carries a non-empty `generation` and a
    /// message list that prefix-extends the input's.
    pub async fn run(
        &self,
        state: WorkflowState,
        cancel: &CancellationToken,
    ) -> Result<WorkflowState, EngineError> {
        let deadline = self.deadline;
        tokio::select! {
            // Cancellation wins over a simultaneously-ready result.
            biased;
            () = cancel.cancelled() => Err(EngineError::Cancelled),
            outcome = tokio::time::timeout(deadline, self.run_inner(state)) => {
                outcome.map_err(|_| EngineError::DeadlineExceeded {
                    seconds: deadline.as_secs(),
                })?
            }
        }
    }

    async fn run_inner(&self, mut state: WorkflowState) -> Result<WorkflowState, EngineError> {
        if state.question.trim().is_empty() {
            return Err(EngineError::user("question must not be empty"));
        }

        let intent = self.router.classify(&mut state).await;
        debug!(intent = intent.as_str(), "dispatching");

        match intent {
            Intent::DatcomGeneration => self.pipeline.run(&mut state).await,
            Intent::GeneralQuery => self.agent.run(&mut state).await,
        }

        // Both branches write prose even on failure; this is the final
        // backstop for the non-empty-generation invariant.
        if state.generation.trim().is_empty() {
            state.generation = "抱歉，這次查詢沒有產生任何結果，請換個方式再試一次。".to_string();
        }
        Ok(state)
    }
}
