//! Blob storage for originals and variants
//!
//! Every backend (local disk, S3-compatible remote disk, in-memory mock)
//! implements [`StorageService`]. Backends are registered under a disk
//! identifier in [`Disks`], so the upload and delete paths never branch on
//! the kind of disk they talk to.

pub mod local;
pub mod mock;
pub mod s3;

pub use local::LocalStorage;
pub use mock::MockStorage;
pub use s3::S3Storage;

use crate::{Error, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;

/// Storage operation errors
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("Write failed: {0}")]
    WriteFailed(String),

    #[error("Delete failed: {0}")]
    DeleteFailed(String),

    #[error("Invalid storage key: {0}")]
    InvalidKey(String),

    #[error("Storage backend error: {0}")]
    BackendError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

pub type StorageResult<T> = std::result::Result<T, StorageError>;

#[async_trait]
pub trait StorageService: Send + Sync {
    /// Store `data` under `key` and return the public URL of the blob.
    async fn write(&self, key: &str, data: &[u8], content_type: &str) -> StorageResult<String>;

    /// Remove the blob at `key`. Removing a missing blob succeeds.
    async fn delete(&self, key: &str) -> StorageResult<()>;

    /// Create `directory` for backends that need it before a write.
    async fn ensure_directory(&self, _directory: &str) -> StorageResult<()> {
        Ok(())
    }

    async fn exists(&self, key: &str) -> StorageResult<bool>;
}

/// Storage backends keyed by disk identifier.
#[derive(Clone, Default)]
pub struct Disks {
    disks: HashMap<String, Arc<dyn StorageService>>,
}

impl Disks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_disk(mut self, name: impl Into<String>, storage: Arc<dyn StorageService>) -> Self {
        self.insert(name, storage);
        self
    }

    pub fn insert(&mut self, name: impl Into<String>, storage: Arc<dyn StorageService>) {
        self.disks.insert(name.into(), storage);
    }

    pub fn get(&self, name: &str) -> Result<&Arc<dyn StorageService>> {
        self.disks
            .get(name)
            .ok_or_else(|| Error::UnknownDisk(name.to_string()))
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.disks.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disks_lookup() {
        let disks = Disks::new()
            .with_disk("local", Arc::new(MockStorage::new()))
            .with_disk("s3", Arc::new(MockStorage::new()));

        assert!(disks.get("local").is_ok());
        assert_eq!(disks.names(), vec!["local", "s3"]);
    }

    #[test]
    fn test_unknown_disk() {
        let disks = Disks::new().with_disk("local", Arc::new(MockStorage::new()));

        match disks.get("disk9") {
            Err(Error::UnknownDisk(name)) => assert_eq!(name, "disk9"),
            Err(other) => panic!("unexpected error: {}", other),
            Ok(_) => panic!("disk9 should not resolve"),
        }
    }
}
