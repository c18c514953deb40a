//! Remote embedding client with batching, retries, and dimension checking.
//!
//! Speaks the `OpenAI`-shaped `/embeddings` contract:
//! request `{model, input, encoding_format}` → response
//! `{data: [{embedding: [f32]}]}`. Texts are sent in batches of at most
//! the configured size; each batch has its own retry budget. The vector
//! dimension is discovered on the first successful call and every later
//! vector must agree with it.

use std::sync::OnceLock;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tracing::debug;

use crate::config::EngineConfig;
use crate::error::EmbedError;
use crate::llm::retry::{RetryPolicy, retry_with_backoff};

/// Cap on concurrent embedding requests across all in-flight queries.
const MAX_IN_FLIGHT_REQUESTS: usize = 32;

/// Trait for embedding backends.
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embeds a list of texts, preserving order.
    ///
    /// # Errors
    ///
    /// Returns [`EmbedError`] on remote failure after retries, count
    /// mismatch, or dimension disagreement.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError>;

    /// Embeds a single query text.
    ///
    /// # Errors
    ///
    /// Returns [`EmbedError`] as for [`Embedder::embed_batch`].
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbedError>;
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
    encoding_format: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmbedResponse {
    data: Vec<EmbedData>,
}

#[derive(Debug, Deserialize)]
struct EmbedData {
    embedding: Vec<f32>,
}

/// HTTP embedding client.
pub struct HttpEmbedder {
    client: reqwest::Client,
    api_base: String,
    api_key: String,
    model: String,
    batch_size: usize,
    policy: RetryPolicy,
    timeout: Duration,
    /// Bounds concurrent requests across all in-flight queries.
    in_flight: Semaphore,
    /// Vector dimension, discovered at first call and cached for the process.
    dimension: OnceLock<usize>,
}

impl HttpEmbedder {
    /// Creates a new embedder from engine configuration.
    ///
    /// # Errors
    ///
    /// Returns [`EmbedError::Request`] if the HTTP client cannot be built.
    pub fn new(config: &EngineConfig) -> Result<Self, EmbedError> {
        let client = reqwest::Client::builder()
            .timeout(config.remote_timeout)
            .connect_timeout(Duration::from_secs(10))
            .danger_accept_invalid_certs(!config.verify_ssl)
            .build()
            .map_err(|e| EmbedError::Request {
                message: format!("failed to build HTTP client: {e}"),
            })?;

        Ok(Self {
            client,
            api_base: config.embed_api_base.trim_end_matches('/').to_string(),
            api_key: config.embed_api_key.clone(),
            model: config.embed_model.clone(),
            batch_size: config.embed_batch_size.max(1),
            policy: RetryPolicy::with_retries(config.max_retries),
            timeout: config.remote_timeout,
            in_flight: Semaphore::new(MAX_IN_FLIGHT_REQUESTS),
            dimension: OnceLock::new(),
        })
    }

    /// The cached vector dimension, if any call has succeeded yet.
    #[must_use]
    pub fn dimension(&self) -> Option<usize> {
        self.dimension.get().copied()
    }

    /// Sends one batch to the remote service.
    async fn send_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let _permit = self
            .in_flight
            .acquire()
            .await
            .map_err(|e| EmbedError::Request {
                message: format!("request limiter closed: {e}"),
            })?;
        let url = format!("{}/embeddings", self.api_base);
        let body = EmbedRequest {
            model: &self.model,
            input: texts,
            encoding_format: "float",
        };

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    EmbedError::Timeout {
                        seconds: self.timeout.as_secs(),
                    }
                } else {
                    EmbedError::Request {
                        message: e.to_string(),
                    }
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(EmbedError::Status {
                status: status.as_u16(),
                message: message.chars().take(300).collect(),
            });
        }

        let parsed: EmbedResponse = response.json().await.map_err(|e| EmbedError::Request {
            message: format!("invalid embedding response: {e}"),
        })?;

        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    /// Verifies vector count and dimensional consistency for one batch.
    fn check_batch(&self, sent: usize, vectors: &[Vec<f32>]) -> Result<(), EmbedError> {
        if vectors.len() != sent {
            return Err(EmbedError::CountMismatch {
                sent,
                received: vectors.len(),
            });
        }
        for vector in vectors {
            let expected = *self.dimension.get_or_init(|| vector.len());
            if vector.len() != expected {
                return Err(EmbedError::DimensionMismatch {
                    expected,
                    actual: vector.len(),
                });
            }
        }
        Ok(())
    }
}

/// Whether an embedding failure is worth retrying.
fn is_transient(err: &EmbedError) -> bool {
    match err {
        EmbedError::Status { status, .. } => *status >= 500,
        EmbedError::Timeout { .. } | EmbedError::Request { .. } => true,
        EmbedError::CountMismatch { .. } | EmbedError::DimensionMismatch { .. } => false,
    }
}

#[async_trait]
impl Embedder for HttpEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        let mut all = Vec::with_capacity(texts.len());
        let batches = texts.len().div_ceil(self.batch_size);

        for (i, batch) in texts.chunks(self.batch_size).enumerate() {
            debug!(batch = i + 1, of = batches, size = batch.len(), "embedding batch");
            let vectors =
                retry_with_backoff(&self.policy, "embed", is_transient, || self.send_batch(batch))
                    .await?;
            self.check_batch(batch.len(), &vectors)?;
            all.extend(vectors);
        }

        Ok(all)
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors.pop().ok_or(EmbedError::CountMismatch {
            sent: 1,
            received: 0,
        })
    }
}

impl std::fmt::Debug for HttpEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpEmbedder")
            .field("api_base", &self.api_base)
            .field("model", &self.model)
            .field("batch_size", &self.batch_size)
            .field("dimension", &self.dimension.get())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> EngineConfig {
        EngineConfig::builder()
            .vector_db_url("postgres://localhost/archive")
            .embed_api_base("https://embed.local/v1/")
            .embed_api_key("ek")
            .embed_model("nvidia/nv-embed-v2")
            .chat_api_base("https://chat.local/v1")
            .chat_api_key("ck")
            .chat_model("gpt-test")
            .embed_batch_size(8)
            .build()
            .unwrap_or_else(|_| unreachable!())
    }

    #[test]
    fn test_base_url_trailing_slash_trimmed() {
        let embedder = HttpEmbedder::new(&test_config()).unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(embedder.api_base, "https://embed.local/v1");
    }

    #[test]
    fn test_check_batch_count_mismatch() {
        let embedder = HttpEmbedder::new(&test_config()).unwrap_or_else(|e| panic!("{e}"));
        let vectors = vec![vec![0.1, 0.2]];
        let err = embedder.check_batch(2, &vectors).unwrap_err();
        assert!(matches!(
            err,
            EmbedError::CountMismatch {
                sent: 2,
                received: 1
            }
        ));
    }

    #[test]
    fn test_check_batch_dimension_cached_from_first_vector() {
        let embedder = HttpEmbedder::new(&test_config()).unwrap_or_else(|e| panic!("{e}"));
        assert!(embedder.dimension().is_none());
        embedder
            .check_batch(2, &[vec![0.0; 4], vec![0.0; 4]])
            .unwrap_or_else(|e| panic!("{e}"));
        assert_eq!(embedder.dimension(), Some(4));

        let err = embedder.check_batch(1, &[vec![0.0; 3]]).unwrap_err();
        assert!(matches!(
            err,
            EmbedError::DimensionMismatch {
                expected: 4,
                actual: 3
            }
        ));
    }

    #[test]
    fn test_transiency_classification() {
        assert!(is_transient(&EmbedError::Status {
            status: 503,
            message: String::new()
        }));
        assert!(!is_transient(&EmbedError::Status {
            status: 401,
            message: String::new()
        }));
        assert!(is_transient(&EmbedError::Timeout { seconds: 120 }));
        assert!(!is_transient(&EmbedError::CountMismatch {
            sent: 1,
            received: 0
        }));
    }

    #[test]
    fn test_request_serialization_shape() {
        let input = vec!["wing area".to_string()];
        let req = EmbedRequest {
            model: "nvidia/nv-embed-v2",
            input: &input,
            encoding_format: "float",
        };
        let json = serde_json::to_value(&req).unwrap_or_default();
        assert_eq!(json["model"], "nvidia/nv-embed-v2");
        assert_eq!(json["encoding_format"], "float");
        assert!(json["input"].is_array());
    }
}
