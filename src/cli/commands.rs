//! CLI command implementations.
//!
//! Wires configuration, backends, and the workflow engine together for one
//! query, and maps outcomes onto the documented exit codes (0 success,
//! 2 user error, 3 configuration error, 4 fatal runtime error).

use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::cli::parser::{Cli, Commands};
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::llm::embedding::{Embedder, HttpEmbedder};
use crate::llm::openai::OpenAiChat;
use crate::store::{PgVectorStore, VectorSearch};
use crate::workflow::{WorkflowEngine, WorkflowState};

/// Executes the parsed CLI command, returning the text for stdout.
///
/// # Errors
///
/// Returns [`EngineError`] with the exit-code mapping the binary uses.
pub async fn execute(cli: &Cli) -> Result<String, EngineError> {
    match &cli.command {
        Commands::Query {
            query,
            collection,
            top_k,
            retrieve_only,
        } => {
            cmd_query(QueryParams {
                query,
                collection: collection.as_deref(),
                top_k: *top_k,
                retrieve_only: *retrieve_only,
            })
            .await
        }
    }
}

/// Parameters for the query command.
#[derive(Debug, Clone)]
struct QueryParams<'a> {
    query: &'a str,
    collection: Option<&'a str>,
    top_k: Option<usize>,
    retrieve_only: bool,
}

async fn cmd_query(params: QueryParams<'_>) -> Result<String, EngineError> {
    if params.query.trim().is_empty() {
        return Err(EngineError::user("query text must not be empty"));
    }

    let mut builder = EngineConfig::builder().from_env();
    if let Some(top_k) = params.top_k {
        builder = builder.top_k(top_k);
    }
    let config = builder.build()?;

    let store = connect_store(&config).await?;
    let embedder: Arc<dyn Embedder> = Arc::new(HttpEmbedder::new(&config)?);

    if params.retrieve_only {
        return retrieve_only(&config, params, store.as_ref(), embedder.as_ref()).await;
    }

    let chat = Arc::new(OpenAiChat::new(&config));
    let engine = WorkflowEngine::new(chat, embedder, store, config)?;

    // Ctrl-C cancels the in-flight query; partial output is discarded.
    let cancel = CancellationToken::new();
    let signal_guard = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_guard.cancel();
        }
    });

    let mut state = WorkflowState::new(params.query);
    if let Some(collection) = params.collection {
        state.collection = collection.to_string();
    }

    let state = engine.run(state, &cancel).await?;
    debug!(
        messages = state.messages.len(),
        docs = state.retrieved_docs.len(),
        "query complete"
    );
    Ok(state.generation)
}

/// Retrieve-only mode: embed, search, print documents as JSON. No LLM
/// calls are made.
async fn retrieve_only(
    config: &EngineConfig,
    params: QueryParams<'_>,
    store: &dyn VectorSearch,
    embedder: &dyn Embedder,
) -> Result<String, EngineError> {
    let Some(collection) = params.collection else {
        return Err(EngineError::user(
            "--retrieve-only requires --collection",
        ));
    };

    let vector = embedder.embed_query(params.query).await?;
    let docs = store
        .similarity_search(collection, &vector, config.top_k, &Vec::new())
        .await?;

    serde_json::to_string_pretty(&docs).map_err(|e| EngineError::Internal {
        message: format!("failed to serialize documents: {e}"),
    })
}

/// Connects to the vector store, mapping URL problems to configuration
/// errors and connectivity problems to runtime errors.
async fn connect_store(config: &EngineConfig) -> Result<Arc<dyn VectorSearch>, EngineError> {
    match PgVectorStore::connect(&config.vector_db_url, config.pool_size).await {
        Ok(store) => Ok(Arc::new(store)),
        Err(crate::error::StoreError::Database(sqlx::Error::Configuration(e))) => Err(
            EngineError::config(format!("invalid VECTOR_DB_URL: {e}")),
        ),
        Err(e) => Err(e.into()),
    }
}
