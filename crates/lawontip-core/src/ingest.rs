//! Offline ingestion: documents directory to persisted index.

use std::sync::Arc;

use anyhow::{Context, bail};
use lawontip_llm::Embedder;
use lawontip_memory::document::{DirectoryLoader, IngestReport, IngestionPipeline, TextSplitter};
use lawontip_memory::{FlatIndex, VectorStore};

use crate::config::Config;

/// Rebuild the index from `config.documents.dir` and persist it to
/// `config.index.dir`, replacing the previous index atomically.
///
/// # Errors
///
/// Returns an error if the documents directory cannot be read, no text could
/// be extracted from any file, embedding fails, or the index cannot be written.
pub async fn run_ingestion<E: Embedder>(config: &Config, embedder: E) -> anyhow::Result<IngestReport> {
    let docs_dir = &config.documents.dir;
    let index = Arc::new(FlatIndex::new(config.index.metric, embedder.model()));
    let store: Arc<dyn VectorStore> = index.clone();
    let loader = DirectoryLoader::new(
        config.documents.max_file_size,
        config.documents.include_text_files,
    );
    let pipeline = IngestionPipeline::new(
        TextSplitter::new(config.splitter.to_splitter_config()),
        embedder,
        store,
    )
    .with_batch_size(config.embedding.batch_size);

    let report = pipeline
        .ingest_directory(&loader, docs_dir)
        .await
        .with_context(|| format!("failed to ingest documents from {}", docs_dir.display()))?;

    for failure in &report.failures {
        tracing::warn!(path = %failure.path.display(), error = %failure.error, "file skipped");
    }
    if report.chunks == 0 {
        bail!(
            "no text extracted from {} ({} file(s) failed); existing index left untouched",
            docs_dir.display(),
            report.failures.len()
        );
    }

    let path = index
        .persist(&config.index.dir)
        .with_context(|| format!("failed to write index to {}", config.index.dir.display()))?;
    tracing::info!(
        files = report.files,
        pages = report.pages,
        chunks = report.chunks,
        failed = report.failures.len(),
        index = %path.display(),
        "ingestion complete"
    );
    Ok(report)
}
