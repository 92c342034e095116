use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;

use serde::{Deserialize, Serialize};

#[derive(Debug, thiserror::Error)]
pub enum VectorStoreError {
    #[error("dimension mismatch: index holds {expected}-dimensional vectors, got {actual}")]
    Dimension { expected: usize, actual: usize },
    #[error("empty vector")]
    EmptyVector,
    #[error("vector index not found at {}", .0.display())]
    NotFound(PathBuf),
    #[error("incompatible index file: {0}")]
    Incompatible(String),
    #[error("index IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("index lock poisoned")]
    Poisoned,
}

/// Retrieval payload stored next to each vector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkPayload {
    pub text: String,
    /// File name of the source document.
    pub source: String,
    /// 1-based page number.
    pub page: u32,
    pub chunk_index: usize,
}

impl ChunkPayload {
    /// Human-readable citation, e.g. `ipc.pdf, page 12`.
    #[must_use]
    pub fn citation(&self) -> String {
        format!("{}, page {}", self.source, self.page)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorPoint {
    pub id: String,
    pub vector: Vec<f32>,
    pub payload: ChunkPayload,
}

impl VectorPoint {
    /// Build a point whose id is the content hash of its payload, so that
    /// re-ingesting an unchanged chunk replaces rather than duplicates it.
    #[must_use]
    pub fn new(vector: Vec<f32>, payload: ChunkPayload) -> Self {
        Self {
            id: point_id(&payload),
            vector,
            payload,
        }
    }
}

#[must_use]
pub fn point_id(payload: &ChunkPayload) -> String {
    let mut hasher = blake3::Hasher::new();
    hasher.update(payload.source.as_bytes());
    hasher.update(&[0]);
    hasher.update(&payload.page.to_le_bytes());
    hasher.update(&(payload.chunk_index as u64).to_le_bytes());
    hasher.update(payload.text.as_bytes());
    hasher.finalize().to_hex().to_string()
}

#[derive(Debug, Clone)]
pub struct ScoredVectorPoint {
    pub id: String,
    /// Higher is more similar.
    pub score: f32,
    pub payload: ChunkPayload,
}

pub(crate) type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait VectorStore: Send + Sync {
    /// Insert points, replacing any existing point with the same id in place.
    fn upsert(&self, points: Vec<VectorPoint>) -> BoxFuture<'_, Result<(), VectorStoreError>>;

    /// Return at most `limit` points ordered from most to least similar.
    fn search(
        &self,
        vector: Vec<f32>,
        limit: usize,
    ) -> BoxFuture<'_, Result<Vec<ScoredVectorPoint>, VectorStoreError>>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Dimension fixed by the first stored vector, if any.
    fn dimension(&self) -> Option<usize>;
}
