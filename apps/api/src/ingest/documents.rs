//! Document decoding: PDF, plain text and Markdown résumés / job descriptions to text.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;
use tracing::debug;

/// Extensions the decoder understands, lowercase.
pub const SUPPORTED_EXTENSIONS: &[&str] = &["pdf", "txt", "md"];

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("unsupported document type: {0}")]
    Unsupported(PathBuf),

    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("failed to extract PDF text from {path}: {message}")]
    Pdf { path: PathBuf, message: String },

    #[error("document has no text: {0}")]
    Empty(PathBuf),
}

fn extension(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
}

pub fn is_supported(path: &Path) -> bool {
    extension(path).is_some_and(|ext| SUPPORTED_EXTENSIONS.contains(&ext.as_str()))
}

/// UTF-8, falling back to Latin-1 (every byte maps to the code point of the same value).
pub fn decode_text(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => bytes.iter().map(|&b| b as char).collect(),
    }
}

/// Reads a document and returns its text. PDF extraction runs on the blocking pool.
pub async fn read_document_text(path: &Path) -> Result<String, DocumentError> {
    let ext = extension(path).ok_or_else(|| DocumentError::Unsupported(path.to_path_buf()))?;
    let bytes = fs::read(path).await.map_err(|source| DocumentError::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let text = match ext.as_str() {
        "pdf" => {
            let pdf_error = |message: String| DocumentError::Pdf {
                path: path.to_path_buf(),
                message,
            };
            tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
                .await
                .map_err(|e| pdf_error(format!("extraction task failed: {e}")))?
                .map_err(|e| pdf_error(e.to_string()))?
        }
        "txt" | "md" => decode_text(&bytes),
        _ => return Err(DocumentError::Unsupported(path.to_path_buf())),
    };

    if text.trim().is_empty() {
        return Err(DocumentError::Empty(path.to_path_buf()));
    }
    debug!(path = %path.display(), chars = text.len(), "document decoded");
    Ok(text)
}

/// Supported documents directly inside `folder`, sorted by file name.
pub async fn list_documents(folder: &Path) -> Result<Vec<PathBuf>, DocumentError> {
    let io_error = |source| DocumentError::Io {
        path: folder.to_path_buf(),
        source,
    };
    let mut entries = fs::read_dir(folder).await.map_err(io_error)?;
    let mut documents = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(io_error)? {
        let path = entry.path();
        let is_file = entry.file_type().await.map_err(io_error)?.is_file();
        if is_file && is_supported(&path) {
            documents.push(path);
        }
    }
    documents.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(documents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_decode_text_falls_back_to_latin1() {
        assert_eq!(decode_text("café".as_bytes()), "café");
        assert_eq!(decode_text(&[0x63, 0x61, 0x66, 0xE9]), "café");
    }

    #[test]
    fn test_is_supported_ignores_case() {
        assert!(is_supported(Path::new("a/Resume.PDF")));
        assert!(is_supported(Path::new("notes.md")));
        assert!(!is_supported(Path::new("photo.png")));
        assert!(!is_supported(Path::new("README")));
    }

    #[tokio::test]
    async fn test_read_text_document() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("jd.txt");
        fs::write(&path, "Senior Backend Engineer\n").await.unwrap();
        assert_eq!(
            read_document_text(&path).await.unwrap(),
            "Senior Backend Engineer\n"
        );
    }

    #[tokio::test]
    async fn test_read_rejects_blank_and_unsupported() {
        let tmp = TempDir::new().unwrap();
        let blank = tmp.path().join("blank.md");
        fs::write(&blank, "  \n\t").await.unwrap();
        assert!(matches!(
            read_document_text(&blank).await,
            Err(DocumentError::Empty(_))
        ));

        let docx = tmp.path().join("cv.docx");
        fs::write(&docx, "binary").await.unwrap();
        assert!(matches!(
            read_document_text(&docx).await,
            Err(DocumentError::Unsupported(_))
        ));
    }

    #[tokio::test]
    async fn test_read_invalid_pdf_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("broken.pdf");
        fs::write(&path, "not a pdf").await.unwrap();
        assert!(matches!(
            read_document_text(&path).await,
            Err(DocumentError::Pdf { .. })
        ));
    }

    #[tokio::test]
    async fn test_list_documents_sorted_and_filtered() {
        let tmp = TempDir::new().unwrap();
        for name in ["b.pdf", "a.txt", "c.png", "d.md"] {
            fs::write(tmp.path().join(name), "x").await.unwrap();
        }
        fs::create_dir(tmp.path().join("nested.pdf")).await.unwrap();

        let names: Vec<_> = list_documents(tmp.path())
            .await
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, ["a.txt", "b.pdf", "d.md"]);
    }
}
