//! Legal document ingestion and a persisted exact-search vector index.

pub mod document;
pub mod flat_index;
pub mod metric;
pub mod vector_store;

pub use flat_index::FlatIndex;
pub use metric::Metric;
pub use vector_store::{ChunkPayload, ScoredVectorPoint, VectorPoint, VectorStore, VectorStoreError};
