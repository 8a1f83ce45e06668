//! Side-car metadata lookup: `<metadata_dir>/<resume stem>.json`.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tokio::fs;

use crate::models::resume::ResumeMetadata;

#[derive(Debug, Error)]
pub enum MetadataError {
    #[error("failed to read metadata {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("invalid metadata JSON in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub fn metadata_path(resume_stem: &str, metadata_dir: &Path) -> PathBuf {
    metadata_dir.join(format!("{resume_stem}.json"))
}

/// `Ok(None)` when the directory or file does not exist. Absence is not an error.
pub async fn find_metadata(
    resume_stem: &str,
    metadata_dir: &Path,
) -> Result<Option<ResumeMetadata>, MetadataError> {
    let path = metadata_path(resume_stem, metadata_dir);
    let raw = match fs::read_to_string(&path).await {
        Ok(raw) => raw,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => return Err(MetadataError::Io { path, source }),
    };
    serde_json::from_str(&raw)
        .map(Some)
        .map_err(|source| MetadataError::Json { path, source })
}
