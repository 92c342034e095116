mod directory;
mod pdf;
mod text;

pub use directory::DirectoryLoader;
pub use pdf::PdfLoader;
pub use text::TextLoader;

use std::path::Path;

use super::DocumentError;

/// File name used as the citation source.
pub(crate) fn source_name(path: &Path) -> String {
    path.file_name().map_or_else(
        || path.display().to_string(),
        |n| n.to_string_lossy().into_owned(),
    )
}

/// Read `path` unless it is larger than `limit` bytes.
pub(crate) async fn read_limited(path: &Path, limit: u64) -> Result<Vec<u8>, DocumentError> {
    let size = tokio::fs::metadata(path).await?.len();
    if size > limit {
        return Err(DocumentError::FileTooLarge { size, limit });
    }
    Ok(tokio::fs::read(path).await?)
}
