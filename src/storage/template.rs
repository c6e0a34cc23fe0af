use std::io;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The filename resolves to somewhere outside of the storage root.
    #[error("invalid filename: {0:?}")]
    InvalidPath(String),

    #[error(transparent)]
    Io(#[from] io::Error),
}

/// A single file currently held by a storage backend.
#[derive(Debug, Clone)]
pub struct StoredFile {
    pub filename: String,
    pub modified: DateTime<Utc>,
    pub size: u64,
}

#[async_trait]
pub trait StorageBackend: Sync + Send + 'static {
    /// Writes the given data, replacing any existing file with the same name.
    async fn store(&self, filename: &str, data: Bytes) -> Result<(), StorageError>;

    async fn fetch(&self, filename: &str) -> Result<Option<Bytes>, StorageError>;

    /// Lists every stored file with a recognised image extension.
    ///
    /// No ordering is guaranteed.
    async fn list(&self) -> Result<Vec<StoredFile>, StorageError>;

    /// Removes the file, returning `false` if it did not exist.
    async fn delete(&self, filename: &str) -> Result<bool, StorageError>;
}
