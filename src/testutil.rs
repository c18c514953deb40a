//! Shared mock backends for unit tests.
//!
//! Mirrors the trait seams: a scripted [`ChatProvider`], a deterministic
//! [`Embedder`], and an in-memory [`VectorSearch`] so the workflow can be
//! exercised end-to-end without any network or database.

use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::config::EngineConfig;
use crate::error::{ChatError, EmbedError, StoreError};
use crate::llm::embedding::Embedder;
use crate::llm::message::{ChatReply, ChatRequest, ChatResponse, TokenUsage};
use crate::llm::provider::ChatProvider;
use crate::store::{CollectionStat, MetadataFilter, RetrievedDoc, VectorSearch};
use crate::tools::ToolCall;

/// A minimal valid configuration for tests.
pub(crate) fn test_config() -> EngineConfig {
    EngineConfig::builder()
        .vector_db_url("postgres://localhost/test")
        .embed_api_base("https://embed.test/v1")
        .embed_api_key("test-key")
        .embed_model("test-embed")
        .chat_api_base("https://chat.test/v1")
        .chat_api_key("test-key")
        .chat_model("test-chat")
        .build()
        .unwrap_or_else(|e| panic!("test config: {e}"))
}

/// Builds a terminal-answer chat response.
pub(crate) fn text_response(content: &str) -> ChatResponse {
    ChatResponse {
        reply: ChatReply::Answer(content.to_string()),
        usage: TokenUsage::default(),
        finish_reason: Some("stop".to_string()),
    }
}

/// Builds a tool-requesting chat response.
pub(crate) fn tool_call_response(calls: &[(&str, &str)]) -> ChatResponse {
    ChatResponse {
        reply: ChatReply::ToolRequests(
            calls
                .iter()
                .enumerate()
                .map(|(i, (name, arguments))| ToolCall {
                    id: format!("call_{i}"),
                    name: (*name).to_string(),
                    arguments: (*arguments).to_string(),
                })
                .collect(),
        ),
        usage: TokenUsage::default(),
        finish_reason: Some("tool_calls".to_string()),
    }
}

#[derive(Clone)]
enum ScriptedReply {
    Response(ChatResponse),
    Failure,
}

/// Scripted chat provider: plays back a fixed sequence of responses,
/// repeating the final entry once the script is exhausted. Records every
/// request for assertions.
pub(crate) struct MockChat {
    script: Vec<ScriptedReply>,
    cursor: Mutex<usize>,
    /// Every request seen, in order.
    pub requests: Mutex<Vec<ChatRequest>>,
}

impl MockChat {
    /// Scripted plain-text replies.
    pub fn with_replies(texts: &[&str]) -> Self {
        Self::with_responses(texts.iter().map(|t| text_response(t)).collect())
    }

    /// Scripted full responses.
    pub fn with_responses(responses: Vec<ChatResponse>) -> Self {
        Self {
            script: responses.into_iter().map(ScriptedReply::Response).collect(),
            cursor: Mutex::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// A provider that always fails.
    pub fn failing() -> Self {
        Self {
            script: vec![ScriptedReply::Failure],
            cursor: Mutex::new(0),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Number of completed calls.
    #[allow(dead_code)]
    pub fn call_count(&self) -> usize {
        self.requests.lock().map(|r| r.len()).unwrap_or(0)
    }
}

#[async_trait]
impl ChatProvider for MockChat {
    fn name(&self) -> &'static str {
        "mock"
    }

    async fn complete(&self, request: &ChatRequest) -> Result<ChatResponse, ChatError> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }
        let index = {
            let mut cursor = self.cursor.lock().unwrap_or_else(std::sync::PoisonError::into_inner);
            let index = *cursor;
            *cursor += 1;
            index
        };
        let reply = self
            .script
            .get(index)
            .or_else(|| self.script.last())
            .cloned();
        match reply {
            Some(ScriptedReply::Response(r)) => Ok(r),
            Some(ScriptedReply::Failure) | None => Err(ChatError::Request {
                message: "mock chat failure".to_string(),
            }),
        }
    }
}

/// Deterministic embedder: hashes text into a fixed-dimension vector.
pub(crate) struct MockEmbedder {
    dimension: usize,
}

impl MockEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }

    fn vector_for(&self, text: &str) -> Vec<f32> {
        let mut seed = 0u64;
        for b in text.bytes() {
            seed = seed.wrapping_mul(31).wrapping_add(u64::from(b));
        }
        (0..self.dimension)
            .map(|i| {
                let v = seed.wrapping_add(i as u64).wrapping_mul(2_654_435_761) % 1_000;
                (v as f32) / 1_000.0
            })
            .collect()
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>, EmbedError> {
        Ok(texts.iter().map(|t| self.vector_for(t)).collect())
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        Ok(self.vector_for(text))
    }
}

/// In-memory vector store with the adapter's contract: unknown collections
/// error, empty collections return empty, results descend by similarity.
pub(crate) struct MockStore {
    collections: BTreeMap<String, Vec<RetrievedDoc>>,
}

impl MockStore {
    pub fn empty() -> Self {
        Self {
            collections: BTreeMap::new(),
        }
    }

    /// Registers a collection with no documents.
    pub fn add_collection(&mut self, name: &str) {
        self.collections.entry(name.to_string()).or_default();
    }

    /// Adds a document with flat metadata and a fixed similarity score.
    pub fn add_doc(
        &mut self,
        collection: &str,
        content: &str,
        metadata: &[(&str, &str)],
        similarity: f64,
    ) {
        let metadata: BTreeMap<String, String> = metadata
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        let source = RetrievedDoc::derive_source(&metadata);
        self.collections
            .entry(collection.to_string())
            .or_default()
            .push(RetrievedDoc {
                content: content.to_string(),
                metadata,
                similarity,
                source,
            });
    }

    fn collection(&self, name: &str) -> Result<&Vec<RetrievedDoc>, StoreError> {
        self.collections
            .get(name)
            .ok_or_else(|| StoreError::UnknownCollection {
                name: name.to_string(),
            })
    }

    fn matches(doc: &RetrievedDoc, filter: &MetadataFilter) -> bool {
        filter
            .iter()
            .all(|(key, value)| doc.metadata.get(key).is_some_and(|v| v == value))
    }
}

#[async_trait]
impl VectorSearch for MockStore {
    async fn list_collections(&self) -> Result<Vec<CollectionStat>, StoreError> {
        Ok(self
            .collections
            .iter()
            .map(|(name, docs)| CollectionStat {
                name: name.clone(),
                document_count: docs.len() as i64,
            })
            .collect())
    }

    async fn similarity_search(
        &self,
        collection: &str,
        _query_vector: &[f32],
        k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<RetrievedDoc>, StoreError> {
        let mut docs: Vec<RetrievedDoc> = self
            .collection(collection)?
            .iter()
            .filter(|d| Self::matches(d, filter))
            .cloned()
            .collect();
        docs.sort_by(|a, b| {
            b.similarity
                .partial_cmp(&a.similarity)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        docs.truncate(k.max(1));
        Ok(docs)
    }

    async fn metadata_lookup(
        &self,
        collection: &str,
        filter: &MetadataFilter,
        limit: usize,
    ) -> Result<Vec<RetrievedDoc>, StoreError> {
        let mut docs: Vec<RetrievedDoc> = self
            .collection(collection)?
            .iter()
            .filter(|d| Self::matches(d, filter))
            .cloned()
            .collect();
        docs.truncate(limit.max(1));
        Ok(docs)
    }
}
