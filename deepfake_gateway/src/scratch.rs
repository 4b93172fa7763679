use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum ScratchError {
    #[error("Failed to create scratch directory {0:?}: {1}")]
    CreateDir(PathBuf, std::io::Error),
    #[error("Failed to write scratch file {0:?}: {1}")]
    Write(PathBuf, std::io::Error),
}

/// An uploaded file persisted under a unique name. The file is removed when
/// the guard is dropped.
#[derive(Debug)]
pub struct ScratchFile {
    path: PathBuf,
}

/// Keeps a short alphanumeric extension from the client file name so that
/// container probing still has a hint.
fn sanitized_extension(original_name: Option<&str>) -> Option<String> {
    let ext = Path::new(original_name?).extension()?.to_str()?;
    if ext.is_empty() || ext.len() > 8 || !ext.chars().all(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(ext.to_ascii_lowercase())
}

impl ScratchFile {
    pub async fn persist(
        dir: &Path,
        original_name: Option<&str>,
        bytes: &[u8],
    ) -> Result<Self, ScratchError> {
        tokio::fs::create_dir_all(dir)
            .await
            .map_err(|e| ScratchError::CreateDir(dir.to_path_buf(), e))?;

        let file_name = match sanitized_extension(original_name) {
            Some(ext) => format!("{}.{}", Uuid::new_v4(), ext),
            None => Uuid::new_v4().to_string(),
        };
        let scratch = Self {
            path: dir.join(file_name),
        };

        tokio::fs::write(&scratch.path, bytes)
            .await
            .map_err(|e| ScratchError::Write(scratch.path.clone(), e))?;

        tracing::debug!("Saved {} bytes to {:?}", bytes.len(), scratch.path);
        Ok(scratch)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ScratchFile {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => tracing::debug!("Removed scratch file {:?}", self.path),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!("Failed to remove scratch file {:?}: {}", self.path, e),
        }
    }
}
