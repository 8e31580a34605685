//! Storage implementations

pub mod dropbox;
pub mod memory;
pub mod object_store;
pub mod s3;

use std::sync::Arc;

use crate::config::{StorageBackend, StorageConfig};
use crate::models::error::ConfigError;

pub use object_store::{ObjectStore, RemoteEntry};

/// Builds the store selected by `storage.backend`.
pub async fn build_store(config: &StorageConfig) -> Result<Arc<dyn ObjectStore>, ConfigError> {
    let store: Arc<dyn ObjectStore> = match config.backend {
        StorageBackend::Dropbox => {
            let token = config
                .dropbox
                .access_token
                .clone()
                .ok_or(ConfigError::Missing("storage.dropbox.access_token (DROPBOX_TOKEN)"))?;
            Arc::new(
                dropbox::DropboxStore::new(&config.dropbox, token, &config.folder)
                    .map_err(|e| ConfigError::Invalid(e.to_string()))?,
            )
        }
        StorageBackend::S3 => {
            let s3 = config
                .s3
                .as_ref()
                .ok_or(ConfigError::Missing("storage.s3.bucket"))?;
            Arc::new(
                s3::S3ObjectStore::new(s3, &config.folder)
                    .await
                    .map_err(|e| ConfigError::Invalid(e.to_string()))?,
            )
        }
        StorageBackend::Memory => Arc::new(memory::MemoryObjectStore::new()),
    };

    Ok(store)
}
