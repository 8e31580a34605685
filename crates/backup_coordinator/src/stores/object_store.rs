//! Trait for remote object storage backends

use chrono::{DateTime, Utc};

use crate::models::error::StorageError;

/// One entry of a remote folder listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteEntry {
    pub name: String,
    pub size: u64,
    pub modified: DateTime<Utc>,
}

#[async_trait::async_trait]
pub trait ObjectStore: Send + Sync {
    /// Short backend identifier for logs.
    fn backend_name(&self) -> &'static str;

    /// Upload a whole object under `name` in the configured folder
    async fn upload(&self, name: &str, data: Vec<u8>) -> Result<(), StorageError>;

    /// Download an object, `StorageError::NotFound` when absent
    async fn download(&self, name: &str) -> Result<Vec<u8>, StorageError>;

    /// List the files of the configured folder
    async fn list_folder(&self) -> Result<Vec<RemoteEntry>, StorageError>;
}
