//! Vector store access layer.

pub mod vector;

pub use vector::{CollectionStat, MetadataFilter, PgVectorStore, RetrievedDoc, VectorSearch};
