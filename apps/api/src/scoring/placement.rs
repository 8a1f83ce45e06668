//! Placement of qualifying résumés into the output directory.
//!
//! Destination names encode the score: `{score:.1}` with `.` → `_`, then `_`, then the
//! original base name (`83.5`, `jane_doe.pdf` → `83_5_jane_doe.pdf`). Distinct source files
//! in one batch therefore never share a destination.

use std::io;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::fs;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum PlacementError {
    #[error("source file not found: {0}")]
    SourceMissing(PathBuf),

    #[error("source is not a regular file: {0}")]
    NotAFile(PathBuf),

    #[error("source document is empty: {0}")]
    EmptySource(PathBuf),

    #[error("destination directory does not exist: {0}")]
    DestinationMissing(PathBuf),

    #[error("destination already exists: {0}")]
    DestinationExists(PathBuf),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

impl PlacementError {
    fn io(path: &Path, source: io::Error) -> Self {
        PlacementError::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

/// `83.5` + `jane_doe.pdf` → `83_5_jane_doe.pdf`.
pub fn placement_file_name(score: f64, original_name: &str) -> String {
    let score = format!("{score:.1}").replace('.', "_");
    format!("{score}_{original_name}")
}

/// Side effect applied to every qualifying résumé.
#[async_trait]
pub trait Placement: Send + Sync {
    /// Places `source` and returns its new path.
    async fn place(&self, source: &Path, score: f64) -> Result<PathBuf, PlacementError>;
}

/// Moves files into `output_dir`, creating it on demand when `create_dirs` is set.
#[derive(Debug, Clone)]
pub struct FilesystemPlacement {
    output_dir: PathBuf,
    create_dirs: bool,
}

impl FilesystemPlacement {
    pub fn new(output_dir: impl Into<PathBuf>, create_dirs: bool) -> Self {
        Self {
            output_dir: output_dir.into(),
            create_dirs,
        }
    }

    async fn validate_source(&self, source: &Path) -> Result<(), PlacementError> {
        let meta = match fs::metadata(source).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(PlacementError::SourceMissing(source.to_path_buf()))
            }
            Err(e) => return Err(PlacementError::io(source, e)),
        };
        if !meta.is_file() {
            return Err(PlacementError::NotAFile(source.to_path_buf()));
        }
        if meta.len() == 0 {
            return Err(PlacementError::EmptySource(source.to_path_buf()));
        }
        Ok(())
    }

    async fn ensure_output_dir(&self) -> Result<(), PlacementError> {
        if self.create_dirs {
            // create_dir_all succeeds when another worker created it first.
            return fs::create_dir_all(&self.output_dir)
                .await
                .map_err(|e| PlacementError::io(&self.output_dir, e));
        }
        match fs::metadata(&self.output_dir).await {
            Ok(meta) if meta.is_dir() => Ok(()),
            _ => Err(PlacementError::DestinationMissing(self.output_dir.clone())),
        }
    }
}

#[async_trait]
impl Placement for FilesystemPlacement {
    async fn place(&self, source: &Path, score: f64) -> Result<PathBuf, PlacementError> {
        self.validate_source(source).await?;
        self.ensure_output_dir().await?;

        let name = source
            .file_name()
            .and_then(|n| n.to_str())
            .ok_or_else(|| PlacementError::NotAFile(source.to_path_buf()))?;
        let destination = self.output_dir.join(placement_file_name(score, name));

        if fs::try_exists(&destination)
            .await
            .map_err(|e| PlacementError::io(&destination, e))?
        {
            return Err(PlacementError::DestinationExists(destination));
        }

        move_file(source, &destination)
            .await
            .map_err(|e| PlacementError::io(&destination, e))?;
        debug!(source = %source.display(), destination = %destination.display(), "resume placed");
        Ok(destination)
    }
}

/// Rename, falling back to copy + remove when the rename crosses filesystems.
async fn move_file(source: &Path, destination: &Path) -> io::Result<()> {
    if fs::rename(source, destination).await.is_ok() {
        return Ok(());
    }
    if let Err(e) = fs::copy(source, destination).await {
        let _ = fs::remove_file(destination).await;
        return Err(e);
    }
    if let Err(e) = fs::remove_file(source).await {
        warn!(source = %source.display(), error = %e, "copied resume but could not remove source");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn write(dir: &Path, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, bytes).await.unwrap();
        path
    }

    #[test]
    fn test_placement_file_name_is_bit_exact() {
        assert_eq!(placement_file_name(83.5, "jane_doe.pdf"), "83_5_jane_doe.pdf");
        assert_eq!(placement_file_name(80.0, "r1.pdf"), "80_0_r1.pdf");
        assert_eq!(placement_file_name(100.0, "a.pdf"), "100_0_a.pdf");
        assert_eq!(placement_file_name(76.25, "b.pdf"), "76_2_b.pdf");
    }

    #[tokio::test]
    async fn test_place_moves_file_and_creates_directory() {
        let tmp = TempDir::new().unwrap();
        let source = write(tmp.path(), "jane_doe.pdf", b"%PDF-1.4 resume").await;
        let out = tmp.path().join("out").join("nested");

        let placement = FilesystemPlacement::new(&out, true);
        let dest = placement.place(&source, 83.5).await.unwrap();

        assert_eq!(dest, out.join("83_5_jane_doe.pdf"));
        assert!(fs::try_exists(&dest).await.unwrap());
        assert!(!fs::try_exists(&source).await.unwrap());
    }

    #[tokio::test]
    async fn test_place_missing_source() {
        let tmp = TempDir::new().unwrap();
        let placement = FilesystemPlacement::new(tmp.path().join("out"), true);
        let err = placement
            .place(&tmp.path().join("ghost.pdf"), 90.0)
            .await
            .unwrap_err();
        assert!(matches!(err, PlacementError::SourceMissing(_)));
    }

    #[tokio::test]
    async fn test_place_rejects_empty_document() {
        let tmp = TempDir::new().unwrap();
        let source = write(tmp.path(), "empty.pdf", b"").await;
        let placement = FilesystemPlacement::new(tmp.path().join("out"), true);
        let err = placement.place(&source, 90.0).await.unwrap_err();
        assert!(matches!(err, PlacementError::EmptySource(_)));
        assert!(fs::try_exists(&source).await.unwrap());
    }

    #[tokio::test]
    async fn test_place_without_create_dirs_requires_directory() {
        let tmp = TempDir::new().unwrap();
        let source = write(tmp.path(), "a.pdf", b"data").await;
        let placement = FilesystemPlacement::new(tmp.path().join("missing"), false);
        let err = placement.place(&source, 90.0).await.unwrap_err();
        assert!(matches!(err, PlacementError::DestinationMissing(_)));
    }

    #[tokio::test]
    async fn test_place_never_overwrites() {
        let tmp = TempDir::new().unwrap();
        let out = tmp.path().join("out");
        fs::create_dir_all(&out).await.unwrap();
        write(&out, "90_0_a.pdf", b"existing").await;
        let source = write(tmp.path(), "a.pdf", b"new").await;

        let placement = FilesystemPlacement::new(&out, false);
        let err = placement.place(&source, 90.0).await.unwrap_err();
        assert!(matches!(err, PlacementError::DestinationExists(_)));
        assert_eq!(fs::read(out.join("90_0_a.pdf")).await.unwrap(), b"existing");
    }
}
