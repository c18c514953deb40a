//! Engine configuration with builder pattern and environment variable support.
//!
//! Configuration is resolved in order: explicit values → environment variables → defaults.

use std::time::Duration;

use crate::error::EngineError;

/// Default embedding batch size per remote call.
const DEFAULT_EMBED_BATCH_SIZE: usize = 8;
/// Default number of documents retrieved per search.
const DEFAULT_TOP_K: usize = 10;
/// Default truncation length for retrieved document content.
const DEFAULT_CONTENT_MAX_LENGTH: usize = 800;
/// Default sampling temperature (deterministic).
const DEFAULT_TEMPERATURE: f32 = 0.0;
/// Default retry attempts for remote calls.
const DEFAULT_MAX_RETRIES: u32 = 3;
/// Default reasoning-loop iteration cap.
const DEFAULT_MAX_ITERATIONS: usize = 10;
/// Default per-query deadline in seconds.
const DEFAULT_QUERY_DEADLINE_SECS: u64 = 300;
/// Default timeout for retrieval tools in seconds.
const DEFAULT_RETRIEVAL_TIMEOUT_SECS: u64 = 30;
/// Default timeout for embedding and chat calls in seconds.
const DEFAULT_REMOTE_TIMEOUT_SECS: u64 = 120;
/// Default wall-clock cap for the calculator in seconds.
const DEFAULT_CALCULATOR_TIMEOUT_SECS: u64 = 5;
/// Default database connection pool size.
const DEFAULT_POOL_SIZE: u32 = 8;

/// Configuration for the query engine.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// PostgreSQL connection string for the vector store.
    pub vector_db_url: String,
    /// Embedding API base URL.
    pub embed_api_base: String,
    /// Embedding API key.
    pub embed_api_key: String,
    /// Embedding model name.
    pub embed_model: String,
    /// Texts per embedding request.
    pub embed_batch_size: usize,
    /// Chat API base URL.
    pub chat_api_base: String,
    /// Chat API key.
    pub chat_api_key: String,
    /// Chat model name.
    pub chat_model: String,
    /// Documents retrieved per search.
    pub top_k: usize,
    /// Truncation length for retrieved document content.
    pub content_max_length: usize,
    /// Sampling temperature for chat calls.
    pub temperature: f32,
    /// Verify TLS certificates on outbound requests.
    pub verify_ssl: bool,
    /// Retry attempts for remote calls.
    pub max_retries: u32,
    /// Reasoning-loop iteration cap.
    pub max_iterations: usize,
    /// Total per-query deadline.
    pub query_deadline: Duration,
    /// Timeout for retrieval tools.
    pub retrieval_timeout: Duration,
    /// Timeout for embedding and chat calls.
    pub remote_timeout: Duration,
    /// Wall-clock cap for the calculator tool.
    pub calculator_timeout: Duration,
    /// Database connection pool size.
    pub pool_size: u32,
}

impl EngineConfig {
    /// Creates a new builder for `EngineConfig`.
    #[must_use]
    pub fn builder() -> EngineConfigBuilder {
        EngineConfigBuilder::default()
    }

    /// Creates configuration from environment variables with defaults.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] naming the first missing required
    /// variable.
    pub fn from_env() -> Result<Self, EngineError> {
        Self::builder().from_env().build()
    }
}

/// Builder for [`EngineConfig`].
#[derive(Debug, Clone, Default)]
pub struct EngineConfigBuilder {
    vector_db_url: Option<String>,
    embed_api_base: Option<String>,
    embed_api_key: Option<String>,
    embed_model: Option<String>,
    embed_batch_size: Option<usize>,
    chat_api_base: Option<String>,
    chat_api_key: Option<String>,
    chat_model: Option<String>,
    top_k: Option<usize>,
    content_max_length: Option<usize>,
    temperature: Option<f32>,
    verify_ssl: Option<bool>,
    max_retries: Option<u32>,
    max_iterations: Option<usize>,
    query_deadline: Option<Duration>,
    pool_size: Option<u32>,
}

impl EngineConfigBuilder {
    /// Populates unset fields from environment variables.
    #[must_use]
    pub fn from_env(mut self) -> Self {
        if self.vector_db_url.is_none() {
            self.vector_db_url = std::env::var("VECTOR_DB_URL").ok();
        }
        if self.embed_api_base.is_none() {
            self.embed_api_base = std::env::var("EMBED_API_BASE").ok();
        }
        if self.embed_api_key.is_none() {
            self.embed_api_key = std::env::var("EMBED_API_KEY").ok();
        }
        if self.embed_model.is_none() {
            self.embed_model = std::env::var("EMBED_MODEL").ok();
        }
        if self.embed_batch_size.is_none() {
            self.embed_batch_size = std::env::var("EMBED_BATCH_SIZE")
                .ok()
                .and_then(|v| v.parse().ok());
        }
        if self.chat_api_base.is_none() {
            self.chat_api_base = std::env::var("CHAT_API_BASE").ok();
        }
        if self.chat_api_key.is_none() {
            self.chat_api_key = std::env::var("CHAT_API_KEY").ok();
        }
        if self.chat_model.is_none() {
            self.chat_model = std::env::var("CHAT_MODEL").ok();
        }
        if self.top_k.is_none() {
            self.top_k = std::env::var("DEFAULT_TOP_K").ok().and_then(|v| v.parse().ok());
        }
        if self.content_max_length.is_none() {
            self.content_max_length = std::env::var("CONTENT_MAX_LENGTH")
                .ok()
                .and_then(|v| v.parse().ok());
        }
        if self.temperature.is_none() {
            self.temperature = std::env::var("TEMPERATURE").ok().and_then(|v| v.parse().ok());
        }
        if self.verify_ssl.is_none() {
            self.verify_ssl = std::env::var("VERIFY_SSL").ok().and_then(|v| v.parse().ok());
        }
        self
    }

    /// Sets the vector store connection string.
    #[must_use]
    pub fn vector_db_url(mut self, url: impl Into<String>) -> Self {
        self.vector_db_url = Some(url.into());
        self
    }

    /// Sets the embedding API base URL.
    #[must_use]
    pub fn embed_api_base(mut self, url: impl Into<String>) -> Self {
        self.embed_api_base = Some(url.into());
        self
    }

    /// Sets the embedding API key.
    #[must_use]
    pub fn embed_api_key(mut self, key: impl Into<String>) -> Self {
        self.embed_api_key = Some(key.into());
        self
    }

    /// Sets the embedding model name.
    #[must_use]
    pub fn embed_model(mut self, model: impl Into<String>) -> Self {
        self.embed_model = Some(model.into());
        self
    }

    /// Sets the embedding batch size.
    #[must_use]
    pub const fn embed_batch_size(mut self, n: usize) -> Self {
        self.embed_batch_size = Some(n);
        self
    }

    /// Sets the chat API base URL.
    #[must_use]
    pub fn chat_api_base(mut self, url: impl Into<String>) -> Self {
        self.chat_api_base = Some(url.into());
        self
    }

    /// Sets the chat API key.
    #[must_use]
    pub fn chat_api_key(mut self, key: impl Into<String>) -> Self {
        self.chat_api_key = Some(key.into());
        self
    }

    /// Sets the chat model name.
    #[must_use]
    pub fn chat_model(mut self, model: impl Into<String>) -> Self {
        self.chat_model = Some(model.into());
        self
    }

    /// Sets the retrieval depth.
    #[must_use]
    pub const fn top_k(mut self, n: usize) -> Self {
        self.top_k = Some(n);
        self
    }

    /// Sets the content truncation length.
    #[must_use]
    pub const fn content_max_length(mut self, n: usize) -> Self {
        self.content_max_length = Some(n);
        self
    }

    /// Sets the sampling temperature.
    #[must_use]
    pub const fn temperature(mut self, t: f32) -> Self {
        self.temperature = Some(t);
        self
    }

    /// Sets TLS certificate verification.
    #[must_use]
    pub const fn verify_ssl(mut self, verify: bool) -> Self {
        self.verify_ssl = Some(verify);
        self
    }

    /// Sets the remote-call retry budget.
    #[must_use]
    pub const fn max_retries(mut self, n: u32) -> Self {
        self.max_retries = Some(n);
        self
    }

    /// Sets the reasoning-loop iteration cap.
    #[must_use]
    pub const fn max_iterations(mut self, n: usize) -> Self {
        self.max_iterations = Some(n);
        self
    }

    /// Sets the total per-query deadline.
    #[must_use]
    pub const fn query_deadline(mut self, d: Duration) -> Self {
        self.query_deadline = Some(d);
        self
    }

    /// Sets the database connection pool size.
    #[must_use]
    pub const fn pool_size(mut self, n: u32) -> Self {
        self.pool_size = Some(n);
        self
    }

    /// Builds the [`EngineConfig`].
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Config`] naming the first missing required
    /// value.
    pub fn build(self) -> Result<EngineConfig, EngineError> {
        fn required(value: Option<String>, var: &str) -> Result<String, EngineError> {
            value.ok_or_else(|| EngineError::config(format!("{var} is not set")))
        }

        Ok(EngineConfig {
            vector_db_url: required(self.vector_db_url, "VECTOR_DB_URL")?,
            embed_api_base: required(self.embed_api_base, "EMBED_API_BASE")?,
            embed_api_key: required(self.embed_api_key, "EMBED_API_KEY")?,
            embed_model: required(self.embed_model, "EMBED_MODEL")?,
            embed_batch_size: self.embed_batch_size.unwrap_or(DEFAULT_EMBED_BATCH_SIZE).max(1),
            chat_api_base: required(self.chat_api_base, "CHAT_API_BASE")?,
            chat_api_key: required(self.chat_api_key, "CHAT_API_KEY")?,
            chat_model: required(self.chat_model, "CHAT_MODEL")?,
            top_k: self.top_k.unwrap_or(DEFAULT_TOP_K).max(1),
            content_max_length: self.content_max_length.unwrap_or(DEFAULT_CONTENT_MAX_LENGTH),
            temperature: self.temperature.unwrap_or(DEFAULT_TEMPERATURE),
            verify_ssl: self.verify_ssl.unwrap_or(true),
            max_retries: self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            max_iterations: self.max_iterations.unwrap_or(DEFAULT_MAX_ITERATIONS),
            query_deadline: self
                .query_deadline
                .unwrap_or(Duration::from_secs(DEFAULT_QUERY_DEADLINE_SECS)),
            retrieval_timeout: Duration::from_secs(DEFAULT_RETRIEVAL_TIMEOUT_SECS),
            remote_timeout: Duration::from_secs(DEFAULT_REMOTE_TIMEOUT_SECS),
            calculator_timeout: Duration::from_secs(DEFAULT_CALCULATOR_TIMEOUT_SECS),
            pool_size: self.pool_size.unwrap_or(DEFAULT_POOL_SIZE),
        })
    }
}
