use std::path::PathBuf;

/// Why a single file could not be ingested.
#[derive(Debug, thiserror::Error)]
pub enum DocumentError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("no loader for {0}")]
    UnsupportedFormat(String),

    #[error("file is {size} bytes, limit is {limit}")]
    FileTooLarge { size: u64, limit: u64 },

    #[error("{} is not valid UTF-8", .0.display())]
    Encoding(PathBuf),

    #[error("PDF extraction failed: {0}")]
    Pdf(String),

    #[error("embedding failed: {0}")]
    Embedding(#[from] lawontip_llm::LlmError),

    #[error("index write failed: {0}")]
    Storage(#[from] crate::vector_store::VectorStoreError),
}
