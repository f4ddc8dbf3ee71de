//! Upload Lifecycle
//!
//! An uploaded file is a `RawArtifact` in memory. When a flow needs it on
//! disk (reputation submission), it is staged into a uniquely named temp
//! file that is deleted when the `StagedUpload` is dropped or released.

use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tempfile::NamedTempFile;

use crate::constants::UPLOAD_PREFIX;

// ============================================================================
// RAW ARTIFACT
// ============================================================================

/// Uploaded bytes and the filename the client declared
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawArtifact {
    file_name: String,
    bytes: Vec<u8>,
}

impl RawArtifact {
    pub fn new(file_name: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            bytes,
        }
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn len(&self) -> usize {
        self.bytes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bytes.is_empty()
    }

    /// Lowercase hex SHA-256 of the content
    pub fn sha256(&self) -> String {
        sha256_hex(&self.bytes)
    }
}

fn sha256_hex(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

// ============================================================================
// STAGED UPLOAD
// ============================================================================

/// Artifact written to a collision-free temp file.
///
/// The file exists exactly as long as this value.
#[derive(Debug)]
pub struct StagedUpload {
    file: NamedTempFile,
    file_name: String,
}

impl StagedUpload {
    /// Write `artifact` into `dir` under a random name
    pub async fn stage(dir: &Path, artifact: &RawArtifact) -> io::Result<Self> {
        tokio::fs::create_dir_all(dir).await?;

        let prefix = format!("{}{}-", UPLOAD_PREFIX, uuid::Uuid::new_v4().simple());
        let target = dir.to_path_buf();
        let file = tokio::task::spawn_blocking(move || {
            tempfile::Builder::new()
                .prefix(&prefix)
                .suffix(".bin")
                .tempfile_in(target)
        })
        .await
        .map_err(io::Error::other)??;
        // Dropping the handle on a failed write removes the file
        tokio::fs::write(file.path(), artifact.bytes()).await?;

        log::debug!(
            "Staged upload {} ({} bytes) at {}",
            artifact.file_name(),
            artifact.len(),
            file.path().display()
        );

        Ok(Self {
            file,
            file_name: artifact.file_name().to_string(),
        })
    }

    pub fn path(&self) -> &Path {
        self.file.path()
    }

    pub fn file_name(&self) -> &str {
        &self.file_name
    }

    /// Read the staged bytes back
    pub async fn read_bytes(&self) -> io::Result<Vec<u8>> {
        tokio::fs::read(self.file.path()).await
    }

    /// Delete the backing file now, reporting any I/O error
    pub fn release(self) -> io::Result<PathBuf> {
        let path = self.file.path().to_path_buf();
        self.file.close()?;
        log::debug!("Released staged upload {}", path.display());
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sha256_known_value() {
        let artifact = RawArtifact::new("abc.txt", b"abc".to_vec());
        assert_eq!(
            artifact.sha256(),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[tokio::test]
    async fn test_stage_and_release() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = RawArtifact::new("sample.exe", vec![1, 2, 3, 4]);

        let staged = StagedUpload::stage(dir.path(), &artifact).await.unwrap();
        let path = staged.path().to_path_buf();
        assert!(path.exists());
        assert!(path.starts_with(dir.path()));
        assert_eq!(staged.read_bytes().await.unwrap(), vec![1, 2, 3, 4]);
        assert_eq!(staged.file_name(), "sample.exe");

        let released = staged.release().unwrap();
        assert_eq!(released, path);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_drop_deletes_file() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = RawArtifact::new("sample.exe", vec![0u8; 64]);

        let path = {
            let staged = StagedUpload::stage(dir.path(), &artifact).await.unwrap();
            staged.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_concurrent_names_do_not_collide() {
        let dir = tempfile::tempdir().unwrap();
        let artifact = RawArtifact::new("same.exe", vec![9; 8]);

        let (a, b) = tokio::join!(
            StagedUpload::stage(dir.path(), &artifact),
            StagedUpload::stage(dir.path(), &artifact)
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_ne!(a.path(), b.path());
        let name = a.path().file_name().unwrap().to_string_lossy().to_string();
        assert!(name.starts_with(UPLOAD_PREFIX));
    }

    #[tokio::test]
    async fn test_creates_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        let nested = dir.path().join("a").join("b");
        let artifact = RawArtifact::new("x", vec![1]);
        let staged = StagedUpload::stage(&nested, &artifact).await.unwrap();
        assert!(staged.path().starts_with(&nested));
    }
}
