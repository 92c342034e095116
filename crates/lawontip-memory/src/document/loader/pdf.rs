use std::path::Path;
use std::pin::Pin;

use super::super::{
    DEFAULT_MAX_FILE_SIZE, Document, DocumentError, DocumentLoader, DocumentMetadata,
};
use super::{read_limited, source_name};

/// Extracts one [`Document`] per page.
pub struct PdfLoader {
    pub max_file_size: u64,
}

impl Default for PdfLoader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

impl DocumentLoader for PdfLoader {
    fn load(
        &self,
        path: &Path,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Vec<Document>, DocumentError>> + Send + '_>>
    {
        let path = path.to_path_buf();
        Box::pin(async move {
            let bytes = read_limited(&path, self.max_file_size).await?;
            // pdf-extract panics on some malformed files; the blocking task
            // contains the panic and surfaces it as a join error.
            let pages = tokio::task::spawn_blocking(move || {
                pdf_extract::extract_text_from_mem_by_pages(&bytes)
                    .map_err(|e| DocumentError::Pdf(e.to_string()))
            })
            .await
            .map_err(|e| DocumentError::Pdf(format!("extraction aborted: {e}")))??;

            let source = source_name(&path);
            Ok(pages
                .into_iter()
                .zip(1u32..)
                .map(|(content, page)| Document {
                    content,
                    metadata: DocumentMetadata {
                        source: source.clone(),
                        page,
                        content_type: "application/pdf".to_owned(),
                    },
                })
                .collect())
        })
    }

    fn supported_extensions(&self) -> &[&str] {
        &["pdf"]
    }
}
