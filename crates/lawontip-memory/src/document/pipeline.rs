use std::path::{Path, PathBuf};
use std::sync::Arc;

use lawontip_llm::{EmbedTask, Embedder, LlmError};

use super::{Document, DocumentError, TextSplitter, loader::DirectoryLoader};
use crate::vector_store::{VectorPoint, VectorStore};

const DEFAULT_BATCH_SIZE: usize = 64;

/// A file that was skipped during ingestion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFailure {
    pub path: PathBuf,
    pub error: String,
}

#[derive(Debug, Clone, Default)]
pub struct IngestReport {
    /// Files loaded successfully.
    pub files: usize,
    pub pages: usize,
    pub chunks: usize,
    pub failures: Vec<FileFailure>,
}

/// Split -> embed -> store.
pub struct IngestionPipeline<E> {
    splitter: TextSplitter,
    embedder: E,
    store: Arc<dyn VectorStore>,
    batch_size: usize,
}

impl<E: Embedder> IngestionPipeline<E> {
    pub fn new(splitter: TextSplitter, embedder: E, store: Arc<dyn VectorStore>) -> Self {
        Self {
            splitter,
            embedder,
            store,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    #[must_use]
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Ingest one page. Whitespace-only chunks are skipped. Returns the number
    /// of chunks stored.
    ///
    /// # Errors
    ///
    /// Returns an error if embedding or storage fails.
    pub async fn ingest(&self, document: &Document) -> Result<usize, DocumentError> {
        let chunks: Vec<_> = self
            .splitter
            .chunks(document)
            .filter(|c| !c.content.trim().is_empty())
            .collect();

        for batch in chunks.chunks(self.batch_size) {
            let texts: Vec<String> = batch.iter().map(|c| c.content.clone()).collect();
            let vectors = self
                .embedder
                .embed_batch(&texts, EmbedTask::Document)
                .await?;
            if vectors.len() != batch.len() {
                return Err(DocumentError::Embedding(LlmError::Other(format!(
                    "{} returned {} vectors for {} chunks",
                    self.embedder.name(),
                    vectors.len(),
                    batch.len()
                ))));
            }
            let points = batch
                .iter()
                .zip(vectors)
                .map(|(chunk, vector)| VectorPoint::new(vector, chunk.payload()))
                .collect();
            self.store.upsert(points).await?;
        }

        Ok(chunks.len())
    }

    /// Load and ingest every supported file in `dir`. A file that cannot be
    /// loaded is logged and recorded in the report; embedding and storage
    /// failures abort the run.
    ///
    /// # Errors
    ///
    /// Returns an error if the directory cannot be listed, or if embedding or
    /// storage fails.
    pub async fn ingest_directory(
        &self,
        loader: &DirectoryLoader,
        dir: &Path,
    ) -> Result<IngestReport, DocumentError> {
        let files = loader.files(dir).await?;
        tracing::info!(dir = %dir.display(), count = files.len(), "ingesting documents");

        let mut report = IngestReport::default();
        for path in files {
            let documents = match loader.load(&path).await {
                Ok(docs) => docs,
                Err(e) => {
                    tracing::warn!(path = %path.display(), "skipping file: {e}");
                    report.failures.push(FileFailure {
                        path,
                        error: e.to_string(),
                    });
                    continue;
                }
            };

            let mut chunks = 0;
            for doc in &documents {
                chunks += self.ingest(doc).await?;
            }
            tracing::info!(
                path = %path.display(),
                pages = documents.len(),
                chunks,
                "ingested"
            );
            report.files += 1;
            report.pages += documents.len();
            report.chunks += chunks;
        }

        Ok(report)
    }
}
