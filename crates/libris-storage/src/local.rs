//! Local disk storage backend

use async_trait::async_trait;
use bytes::Bytes;
use std::path::{Path, PathBuf};
use tokio::fs;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::backend::{CoverFormat, CoverStorage, validate_name};
use crate::error::StorageError;

/// Local disk storage backend
///
/// Stores covers flat in a single directory as `<uuid>.<ext>`.
pub struct LocalStorage {
    base_path: PathBuf,
}

impl LocalStorage {
    /// Create a new local storage backend
    pub async fn new(base_path: impl AsRef<Path>) -> Result<Self, StorageError> {
        let base_path = base_path.as_ref().to_path_buf();

        fs::create_dir_all(&base_path).await?;

        info!("Initialized cover storage at {:?}", base_path);

        Ok(Self { base_path })
    }

    /// Get the file path for a cover name
    fn cover_path(&self, name: &str) -> Result<PathBuf, StorageError> {
        validate_name(name)?;
        Ok(self.base_path.join(name))
    }
}

#[async_trait]
impl CoverStorage for LocalStorage {
    async fn save(&self, data: Bytes, format: CoverFormat) -> Result<String, StorageError> {
        let name = format!("{}.{}", Uuid::new_v4(), format.extension());
        let path = self.cover_path(&name)?;
        debug!("Writing cover to {:?}", path);

        write_atomic(&path, &data).await?;

        Ok(name)
    }

    async fn read(&self, name: &str) -> Result<Bytes, StorageError> {
        let path = self.cover_path(name)?;
        debug!("Reading cover from {:?}", path);

        let data = fs::read(&path).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                StorageError::NotFound(name.to_string())
            } else {
                StorageError::Io(e)
            }
        })?;

        Ok(Bytes::from(data))
    }

    async fn delete(&self, name: &str) -> Result<bool, StorageError> {
        let path = self.cover_path(name)?;
        debug!("Deleting cover at {:?}", path);

        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(StorageError::Io(e)),
        }
    }
}

/// Write through a temp file and rename it into place; the temp file is
/// removed again if either step fails
async fn write_atomic(path: &Path, data: &[u8]) -> Result<(), StorageError> {
    let temp_path = path.with_extension("tmp");

    let result = match fs::write(&temp_path, data).await {
        Ok(()) => fs::rename(&temp_path, path).await,
        Err(e) => Err(e),
    };

    if let Err(e) = result {
        if let Err(cleanup) = fs::remove_file(&temp_path).await
            && cleanup.kind() != std::io::ErrorKind::NotFound
        {
            warn!("Failed to remove temp file {:?}: {}", temp_path, cleanup);
        }
        return Err(StorageError::Io(e));
    }

    Ok(())
}
