//! Cover storage trait

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::StorageError;

/// Image formats accepted as book covers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CoverFormat {
    Png,
    Jpeg,
}

impl CoverFormat {
    /// File extension used for stored covers of this format
    pub fn extension(&self) -> &'static str {
        match self {
            CoverFormat::Png => "png",
            CoverFormat::Jpeg => "jpg",
        }
    }

    /// Match an uploaded filename's extension (`jpg`, `jpeg`, `png`)
    pub fn from_filename(filename: &str) -> Option<Self> {
        let (_, ext) = filename.rsplit_once('.')?;
        match ext.to_ascii_lowercase().as_str() {
            "png" => Some(CoverFormat::Png),
            "jpg" | "jpeg" => Some(CoverFormat::Jpeg),
            _ => None,
        }
    }

    /// Detect the format from the file's leading magic bytes
    pub fn sniff(data: &[u8]) -> Option<Self> {
        const PNG_MAGIC: &[u8] = b"\x89PNG\r\n\x1a\n";
        const JPEG_MAGIC: &[u8] = &[0xFF, 0xD8, 0xFF];

        if data.starts_with(PNG_MAGIC) {
            Some(CoverFormat::Png)
        } else if data.starts_with(JPEG_MAGIC) {
            Some(CoverFormat::Jpeg)
        } else {
            None
        }
    }
}

/// Storage backend for cover images
///
/// Implementations own the naming of stored files: `save` returns the
/// generated name, and every other call addresses a cover by that name.
#[async_trait]
pub trait CoverStorage: Send + Sync {
    /// Store a cover and return its generated name
    async fn save(&self, data: Bytes, format: CoverFormat) -> Result<String, StorageError>;

    /// Read a cover fully into memory
    async fn read(&self, name: &str) -> Result<Bytes, StorageError>;

    /// Delete a cover; returns false if it was already gone
    async fn delete(&self, name: &str) -> Result<bool, StorageError>;
}

/// Reject names that could escape the cover directory
pub fn validate_name(name: &str) -> Result<(), StorageError> {
    let valid = !name.is_empty()
        && !name.starts_with('.')
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.');
    if valid {
        Ok(())
    } else {
        Err(StorageError::InvalidName(name.to_string()))
    }
}
