//! Vector store adapter over PostgreSQL + pgvector.
//!
//! Reference schema (one deployment = one database):
//!
//! ```sql
//! CREATE TABLE collection (id bigserial PRIMARY KEY, name text UNIQUE NOT NULL);
//! CREATE TABLE embedding (
//!     id bigserial PRIMARY KEY,
//!     collection_id bigint NOT NULL REFERENCES collection(id),
//!     document_text text NOT NULL,
//!     metadata jsonb NOT NULL DEFAULT '{}',
//!     embedding vector(D) NOT NULL
//! );
//! ```
//!
//! Metadata keys written by ingestion: `file_name`, `section`, `article`,
//! `page`, `chunk_id`. Similarity is cosine (`1 - (embedding <=> $vec)`),
//! returned in descending order.

use std::collections::BTreeMap;

use async_trait::async_trait;
use pgvector::Vector;
use serde::{Deserialize, Serialize};
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Row};
use tracing::debug;

use crate::error::StoreError;
use crate::llm::retry::{RetryPolicy, retry_with_backoff};

/// A conjunction of equality constraints on metadata fields.
pub type MetadataFilter = Vec<(String, String)>;

/// A document retrieved from the vector store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievedDoc {
    /// Document text (possibly a chunk of a larger file).
    pub content: String,
    /// Flattened metadata fields.
    pub metadata: BTreeMap<String, String>,
    /// Cosine similarity in `[0, 1]`; `0` for pure metadata lookups.
    pub similarity: f64,
    /// Human-readable citation key derived from metadata.
    pub source: String,
}

impl RetrievedDoc {
    /// Derives the citation key from metadata: `file_name§section` when a
    /// section is known, else `file_name#chunk_id`, else the file name.
    #[must_use]
    pub fn derive_source(metadata: &BTreeMap<String, String>) -> String {
        let file = metadata
            .get("file_name")
            .or_else(|| metadata.get("source"))
            .map_or("unknown", String::as_str);
        if let Some(section) = metadata.get("section")
            && !section.is_empty()
        {
            return format!("{file}§{section}");
        }
        if let Some(chunk) = metadata.get("chunk_id")
            && !chunk.is_empty()
        {
            return format!("{file}#{chunk}");
        }
        file.to_string()
    }
}

/// Per-collection statistics.
#[derive(Debug, Clone, Serialize)]
pub struct CollectionStat {
    /// Collection name.
    pub name: String,
    /// Number of documents in the collection.
    pub document_count: i64,
}

/// Trait for vector store backends.
#[async_trait]
pub trait VectorSearch: Send + Sync {
    /// Lists all collections with their document counts.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on database failure after retries.
    async fn list_collections(&self) -> Result<Vec<CollectionStat>, StoreError>;

    /// Top-k cosine similarity search within a collection.
    ///
    /// An empty collection yields an empty sequence; an unknown collection
    /// fails with [`StoreError::UnknownCollection`]. Results are in
    /// descending similarity order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on database failure after retries.
    async fn similarity_search(
        &self,
        collection: &str,
        query_vector: &[f32],
        k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<RetrievedDoc>, StoreError>;

    /// Pure structured lookup by metadata equality, no vector involved.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] on database failure after retries.
    async fn metadata_lookup(
        &self,
        collection: &str,
        filter: &MetadataFilter,
        limit: usize,
    ) -> Result<Vec<RetrievedDoc>, StoreError>;
}

/// PostgreSQL + pgvector store adapter.
pub struct PgVectorStore {
    pool: PgPool,
    policy: RetryPolicy,
}

impl PgVectorStore {
    /// Connects to the store with a bounded connection pool.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the URL is invalid or the initial
    /// connection fails.
    pub async fn connect(url: &str, pool_size: u32) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(pool_size.max(1))
            .connect(url)
            .await?;
        Ok(Self {
            pool,
            policy: RetryPolicy::default(),
        })
    }

    /// Wraps an existing pool (used by integration harnesses).
    #[must_use]
    pub fn from_pool(pool: PgPool) -> Self {
        Self {
            pool,
            policy: RetryPolicy::default(),
        }
    }

    /// Resolves a collection name to its ID.
    async fn collection_id(&self, name: &str) -> Result<i64, StoreError> {
        let row = sqlx::query("SELECT id FROM collection WHERE name = $1")
            .bind(name)
            .fetch_optional(&self.pool)
            .await?;
        row.map(|r| r.get::<i64, _>("id"))
            .ok_or_else(|| StoreError::UnknownCollection {
                name: name.to_string(),
            })
    }

    /// Builds the `AND metadata->>$n = $m` clause for a filter, starting at
    /// placeholder `first_index`.
    fn filter_clause(filter: &MetadataFilter, first_index: usize) -> String {
        let mut clause = String::new();
        let mut idx = first_index;
        for _ in filter {
            clause.push_str(&format!(" AND e.metadata->>${idx} = ${}", idx + 1));
            idx += 2;
        }
        clause
    }

    /// Converts a jsonb metadata value into a flat string map.
    fn flatten_metadata(value: &serde_json::Value) -> BTreeMap<String, String> {
        let mut map = BTreeMap::new();
        if let Some(object) = value.as_object() {
            for (key, val) in object {
                let text = match val {
                    serde_json::Value::String(s) => s.clone(),
                    other => other.to_string(),
                };
                map.insert(key.clone(), text);
            }
        }
        map
    }

    fn row_to_doc(row: &sqlx::postgres::PgRow, similarity: f64) -> RetrievedDoc {
        let content: String = row.get("document_text");
        let metadata_json: serde_json::Value = row.get("metadata");
        let metadata = Self::flatten_metadata(&metadata_json);
        let source = RetrievedDoc::derive_source(&metadata);
        RetrievedDoc {
            content,
            metadata,
            similarity,
            source,
        }
    }
}

#[async_trait]
impl VectorSearch for PgVectorStore {
    async fn list_collections(&self) -> Result<Vec<CollectionStat>, StoreError> {
        let rows = retry_with_backoff(&self.policy, "store", StoreError::is_transient, || async {
            sqlx::query(
                "SELECT c.name, COUNT(e.id) AS document_count \
                 FROM collection c \
                 LEFT JOIN embedding e ON e.collection_id = c.id \
                 GROUP BY c.name ORDER BY c.name",
            )
            .fetch_all(&self.pool)
            .await
            .map_err(StoreError::from)
        })
        .await?;

        Ok(rows
            .iter()
            .map(|row| CollectionStat {
                name: row.get("name"),
                document_count: row.get("document_count"),
            })
            .collect())
    }

    async fn similarity_search(
        &self,
        collection: &str,
        query_vector: &[f32],
        k: usize,
        filter: &MetadataFilter,
    ) -> Result<Vec<RetrievedDoc>, StoreError> {
        let collection_id = self.collection_id(collection).await?;
        let k = k.max(1);

        let sql = format!(
            "SELECT e.document_text, e.metadata, \
                    1 - (e.embedding <=> $1) AS similarity \
             FROM embedding e \
             WHERE e.collection_id = $2{} \
             ORDER BY e.embedding <=> $1 \
             LIMIT {k}",
            Self::filter_clause(filter, 3),
        );
        debug!(collection, k, filters = filter.len(), "similarity search");

        let vector = Vector::from(query_vector.to_vec());
        let rows = retry_with_backoff(&self.policy, "store", StoreError::is_transient, || async {
            let mut query = sqlx::query(&sql).bind(vector.clone()).bind(collection_id);
            for (key, value) in filter {
                query = query.bind(key).bind(value);
            }
            query.fetch_all(&self.pool).await.map_err(StoreError::from)
        })
        .await?;

        Ok(rows
            .iter()
            .map(|row| {
                let similarity: f64 = row.get("similarity");
                Self::row_to_doc(row, similarity.clamp(0.0, 1.0))
            })
            .collect())
    }

    async fn metadata_lookup(
        &self,
        collection: &str,
        filter: &MetadataFilter,
        limit: usize,
    ) -> Result<Vec<RetrievedDoc>, StoreError> {
        let collection_id = self.collection_id(collection).await?;
        let limit = limit.max(1);

        let sql = format!(
            "SELECT e.document_text, e.metadata \
             FROM embedding e \
             WHERE e.collection_id = $1{} \
             ORDER BY e.metadata->>'section', e.id \
             LIMIT {limit}",
            Self::filter_clause(filter, 2),
        );
        debug!(collection, limit, filters = filter.len(), "metadata lookup");

        let rows = retry_with_backoff(&self.policy, "store", StoreError::is_transient, || async {
            let mut query = sqlx::query(&sql).bind(collection_id);
            for (key, value) in filter {
                query = query.bind(key).bind(value);
            }
            query.fetch_all(&self.pool).await.map_err(StoreError::from)
        })
        .await?;

        Ok(rows.iter().map(|row| Self::row_to_doc(row, 0.0)).collect())
    }
}

impl std::fmt::Debug for PgVectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgVectorStore")
            .field("pool", &"<sqlx::PgPool>")
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn meta(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect()
    }

    #[test]
    fn test_source_prefers_section() {
        let m = meta(&[
            ("file_name", "datcom_manual.pdf"),
            ("section", "article_24"),
            ("chunk_id", "7"),
        ]);
        assert_eq!(RetrievedDoc::derive_source(&m), "datcom_manual.pdf§article_24");
    }

    #[test]
    fn test_source_falls_back_to_chunk_id() {
        let m = meta(&[("file_name", "f4_winddata.csv"), ("chunk_id", "12")]);
        assert_eq!(RetrievedDoc::derive_source(&m), "f4_winddata.csv#12");
    }

    #[test]
    fn test_source_unknown_when_no_file() {
        let m = meta(&[("page", "3")]);
        assert_eq!(RetrievedDoc::derive_source(&m), "unknown");
    }

    #[test]
    fn test_source_accepts_legacy_source_key() {
        let m = meta(&[("source", "懲罰法.md"), ("section", "第 24 條")]);
        assert_eq!(RetrievedDoc::derive_source(&m), "懲罰法.md§第 24 條");
    }

    #[test]
    fn test_filter_clause_placeholders() {
        let filter = vec![
            ("section".to_string(), "article_24".to_string()),
            ("page".to_string(), "5".to_string()),
        ];
        let clause = PgVectorStore::filter_clause(&filter, 3);
        assert_eq!(
            clause,
            " AND e.metadata->>$3 = $4 AND e.metadata->>$5 = $6"
        );
        assert!(PgVectorStore::filter_clause(&Vec::new(), 3).is_empty());
    }

    #[test]
    fn test_flatten_metadata_stringifies_non_strings() {
        let value = serde_json::json!({
            "file_name": "manual.pdf",
            "page": 5,
            "nested": {"a": 1}
        });
        let flat = PgVectorStore::flatten_metadata(&value);
        assert_eq!(flat.get("file_name").map(String::as_str), Some("manual.pdf"));
        assert_eq!(flat.get("page").map(String::as_str), Some("5"));
        assert_eq!(flat.get("nested").map(String::as_str), Some(r#"{"a":1}"#));
    }
}
