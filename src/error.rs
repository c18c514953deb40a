//! Error types for the query engine.
//!
//! Each subsystem (embedding, chat, vector store, tools) has its own error
//! enum so retry policies and observation formatting can match on concrete
//! failure kinds. [`EngineError`] is the top-level type surfaced by the CLI
//! and carries the process exit-code mapping.

use thiserror::Error;

/// Crate-wide result alias.
pub type Result<T, E = EngineError> = std::result::Result<T, E>;

/// Errors from the embedding client.
#[derive(Debug, Error)]
pub enum EmbedError {
    /// Transport-level failure (connection refused, DNS, TLS).
    #[error("embedding request failed: {message}")]
    Request {
        /// Underlying transport error text.
        message: String,
    },

    /// The service answered with a non-2xx status after all retries.
    #[error("embedding service returned status {status}: {message}")]
    Status {
        /// HTTP status code.
        status: u16,
        /// Response body excerpt.
        message: String,
    },

    /// The service returned a different number of vectors than texts sent.
    #[error("embedding count mismatch: sent {sent} texts, received {received} vectors")]
    CountMismatch {
        /// Texts in the request batch.
        sent: usize,
        /// Vectors in the response.
        received: usize,
    },

    /// A vector's dimension disagrees with the first vector seen this process.
    #[error("embedding dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch {
        /// Dimension discovered at first call.
        expected: usize,
        /// Dimension of the offending vector.
        actual: usize,
    },

    /// The request exceeded its timeout budget.
    #[error("embedding request timed out after {seconds}s")]
    Timeout {
        /// Budget that was exceeded.
        seconds: u64,
    },
}

/// Errors from the chat completion client.
#[derive(Debug, Error)]
pub enum ChatError {
    /// Remote API failure after all retries.
    #[error("chat completion failed: {message}")]
    Request {
        /// Underlying API error text.
        message: String,
    },

    /// The model's reply could not be parsed into the expected shape.
    #[error("chat response could not be parsed: {message}")]
    ResponseParse {
        /// Diagnostic describing the parse failure.
        message: String,
    },

    /// The request exceeded its timeout budget.
    #[error("chat request timed out after {seconds}s")]
    Timeout {
        /// Budget that was exceeded.
        seconds: u64,
    },
}

/// Errors from the vector store adapter.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The named collection does not exist.
    #[error("unknown collection: {name}")]
    UnknownCollection {
        /// Collection name that failed to resolve.
        name: String,
    },

    /// Database-level failure (connectivity, SQL, pool exhaustion).
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The query exceeded its timeout budget.
    #[error("store query timed out after {seconds}s")]
    Timeout {
        /// Budget that was exceeded.
        seconds: u64,
    },
}

impl StoreError {
    /// Whether a retry with backoff may succeed.
    ///
    /// Unknown collections and SQL errors are deterministic; connectivity
    /// and pool-acquire failures are transient.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::UnknownCollection { .. } => false,
            Self::Database(e) => matches!(e, sqlx::Error::Io(_) | sqlx::Error::PoolTimedOut),
            Self::Timeout { .. } => true,
        }
    }
}

/// Errors from tool registration and execution.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Arguments failed to deserialize or violated a documented bound.
    #[error("tool {name}: invalid arguments: {message}")]
    InvalidArguments {
        /// Tool that rejected the call.
        name: String,
        /// What was wrong.
        message: String,
    },

    /// The handler itself failed.
    #[error("tool {name}: {message}")]
    Execution {
        /// Tool that failed.
        name: String,
        /// Failure description.
        message: String,
    },

    /// The requested tool name is not in the registry.
    #[error("unknown tool: {name}")]
    Unknown {
        /// Name the model requested.
        name: String,
    },

    /// The handler exceeded its wall-clock budget.
    #[error("tool {name} timed out after {seconds}s")]
    Timeout {
        /// Tool that timed out.
        name: String,
        /// Budget that was exceeded.
        seconds: u64,
    },

    /// Two tools were registered under the same name at startup.
    #[error("duplicate tool registration: {name}")]
    DuplicateName {
        /// The colliding name.
        name: String,
    },
}

/// Top-level engine error, surfaced by the CLI.
#[derive(Debug, Error)]
pub enum EngineError {
    /// Malformed user input (empty query, conflicting flags).
    #[error("{message}")]
    User {
        /// What the user must fix.
        message: String,
    },

    /// Missing or invalid configuration (environment variables, URLs).
    #[error("configuration error: {message}")]
    Config {
        /// What is missing or invalid.
        message: String,
    },

    /// Embedding subsystem failure.
    #[error(transparent)]
    Embed(#[from] EmbedError),

    /// Chat subsystem failure.
    #[error(transparent)]
    Chat(#[from] ChatError),

    /// Vector store failure.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// Tool registry or execution failure.
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// The per-query deadline elapsed before a terminal answer.
    #[error("query deadline of {seconds}s exceeded")]
    DeadlineExceeded {
        /// Deadline that elapsed.
        seconds: u64,
    },

    /// The query was cancelled; partial output is discarded.
    #[error("query cancelled")]
    Cancelled,

    /// Unexpected internal failure.
    #[error("internal error: {message}")]
    Internal {
        /// What went wrong.
        message: String,
    },
}

impl EngineError {
    /// Process exit code when this error terminates the CLI.
    ///
    /// `2` for user errors, `3` for configuration errors, `4` for
    /// everything else (fatal runtime failures).
    #[must_use]
    pub const fn exit_code(&self) -> i32 {
        match self {
            Self::User { .. } => 2,
            Self::Config { .. } => 3,
            _ => 4,
        }
    }

    /// Shorthand constructor for user errors.
    #[must_use]
    pub fn user(message: impl Into<String>) -> Self {
        Self::User {
            message: message.into(),
        }
    }

    /// Shorthand constructor for configuration errors.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }
}
