//! # Temporary Artifacts
//!
//! Scoped ownership of the per-request temp files. A [`TempArtifact`] deletes
//! its file when dropped, so every exit path out of the pipeline (success,
//! early `?` return, panic unwinding) releases what it acquired.

use std::io;
use std::path::{Path, PathBuf};

#[derive(Debug)]
pub struct TempArtifact {
    path: PathBuf,
}

impl TempArtifact {
    /// Take ownership of a file some other component already created.
    pub fn adopt(path: PathBuf) -> Self {
        Self { path }
    }

    /// Write `bytes` to `path` and own the result. A partial write is removed.
    pub async fn write(path: PathBuf, bytes: Vec<u8>) -> io::Result<Self> {
        let artifact = Self::adopt(path);
        tokio::fs::write(&artifact.path, bytes).await?;
        tracing::debug!(path = %artifact.path.display(), "Stored temporary file");
        Ok(artifact)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TempArtifact {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!(path = %self.path.display(), "Removed temporary file"),
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(
                path = %self.path.display(),
                error = %e,
                "Failed to remove temporary file"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[actix_web::test]
    async fn test_written_file_is_removed_on_drop() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("upload.ogg");

        let artifact = TempArtifact::write(path.clone(), b"abc".to_vec()).await.unwrap();
        assert_eq!(std::fs::read(artifact.path()).unwrap(), b"abc");

        drop(artifact);
        assert!(!path.exists());
    }

    #[actix_web::test]
    async fn test_failed_write_leaves_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("upload.ogg");

        assert!(TempArtifact::write(path.clone(), b"abc".to_vec()).await.is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_adopted_file_is_removed_and_missing_file_is_fine() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("converted.wav");
        std::fs::write(&path, b"x").unwrap();

        drop(TempArtifact::adopt(path.clone()));
        assert!(!path.exists());

        // Already gone: dropping again is a no-op.
        drop(TempArtifact::adopt(path));
    }
}
