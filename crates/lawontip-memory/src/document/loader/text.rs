use std::path::Path;
use std::pin::Pin;

use super::super::{
    DEFAULT_MAX_FILE_SIZE, Document, DocumentError, DocumentLoader, DocumentMetadata,
};
use super::{read_limited, source_name};

/// Plain text and Markdown, loaded as a single page with line endings
/// normalised to `\n`.
pub struct TextLoader {
    pub max_file_size: u64,
}

impl Default for TextLoader {
    fn default() -> Self {
        Self {
            max_file_size: DEFAULT_MAX_FILE_SIZE,
        }
    }
}

fn content_type(path: &Path) -> &'static str {
    let is_markdown = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("md") || e.eq_ignore_ascii_case("markdown"));
    if is_markdown { "text/markdown" } else { "text/plain" }
}

fn decode(path: &Path, bytes: Vec<u8>) -> Result<String, DocumentError> {
    let text = String::from_utf8(bytes).map_err(|_| DocumentError::Encoding(path.to_owned()))?;
    let text = text.strip_prefix('\u{feff}').unwrap_or(&text);
    Ok(text.replace("\r\n", "\n"))
}

impl DocumentLoader for TextLoader {
    fn load(
        &self,
        path: &Path,
    ) -> Pin<Box<dyn std::future::Future<Output = Result<Vec<Document>, DocumentError>> + Send + '_>>
    {
        let path = path.to_path_buf();
        Box::pin(async move {
            let bytes = read_limited(&path, self.max_file_size).await?;
            let content = decode(&path, bytes)?;
            Ok(vec![Document {
                content,
                metadata: DocumentMetadata {
                    source: source_name(&path),
                    page: 1,
                    content_type: content_type(&path).to_owned(),
                },
            }])
        })
    }

    fn supported_extensions(&self) -> &[&str] {
        &["txt", "md", "markdown"]
    }
}
