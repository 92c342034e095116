use serde::{Deserialize, Serialize};

use crate::vector_store::ChunkPayload;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    /// File name the text came from.
    pub source: String,
    /// 1-based page number; plain-text files are a single page.
    pub page: u32,
    pub content_type: String,
}

/// The extracted text of one page.
#[derive(Debug, Clone)]
pub struct Document {
    pub content: String,
    pub metadata: DocumentMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chunk {
    pub content: String,
    pub metadata: DocumentMetadata,
    pub chunk_index: usize,
    /// Offset of the first character within the page text, counted in chars.
    pub start: usize,
}

impl Chunk {
    /// Length in characters.
    #[must_use]
    pub fn char_len(&self) -> usize {
        self.content.chars().count()
    }

    #[must_use]
    pub fn payload(&self) -> ChunkPayload {
        ChunkPayload {
            text: self.content.clone(),
            source: self.metadata.source.clone(),
            page: self.metadata.page,
            chunk_index: self.chunk_index,
        }
    }
}
