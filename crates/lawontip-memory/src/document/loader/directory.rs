use std::path::{Path, PathBuf};

use super::super::{DEFAULT_MAX_FILE_SIZE, Document, DocumentError, DocumentLoader};
use super::{PdfLoader, TextLoader};

/// Selects the files of a documents directory and dispatches each to the
/// loader for its extension.
pub struct DirectoryLoader {
    pdf: PdfLoader,
    text: Option<TextLoader>,
}

impl Default for DirectoryLoader {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_FILE_SIZE, false)
    }
}

impl DirectoryLoader {
    #[must_use]
    pub fn new(max_file_size: u64, include_text_files: bool) -> Self {
        Self {
            pdf: PdfLoader { max_file_size },
            text: include_text_files.then_some(TextLoader { max_file_size }),
        }
    }

    #[must_use]
    pub fn loader_for(&self, path: &Path) -> Option<&dyn DocumentLoader> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        let loaders: [Option<&dyn DocumentLoader>; 2] = [
            Some(&self.pdf),
            self.text.as_ref().map(|t| t as &dyn DocumentLoader),
        ];
        loaders
            .into_iter()
            .flatten()
            .find(|l| l.supported_extensions().contains(&ext.as_str()))
    }

    /// Supported files directly inside `dir`, sorted by path.
    ///
    /// # Errors
    ///
    /// Returns an IO error if `dir` does not exist or cannot be listed.
    pub async fn files(&self, dir: &Path) -> Result<Vec<PathBuf>, DocumentError> {
        let mut entries = tokio::fs::read_dir(dir).await?;
        let mut files = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_file() && self.loader_for(&path).is_some() {
                files.push(path);
            } else {
                tracing::debug!(path = %path.display(), "skipping");
            }
        }
        files.sort();
        Ok(files)
    }

    /// # Errors
    ///
    /// Returns `UnsupportedFormat` for an unknown extension, otherwise whatever
    /// the matching loader returns.
    pub async fn load(&self, path: &Path) -> Result<Vec<Document>, DocumentError> {
        let loader = self
            .loader_for(path)
            .ok_or_else(|| DocumentError::UnsupportedFormat(path.display().to_string()))?;
        loader.load(path).await
    }
}
