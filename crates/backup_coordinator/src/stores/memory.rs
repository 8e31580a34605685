//! In-process object store

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

use crate::models::error::StorageError;
use crate::stores::object_store::{ObjectStore, RemoteEntry};

#[derive(Debug, Clone)]
struct StoredObject {
    data: Vec<u8>,
    modified: DateTime<Utc>,
}

/// Keeps objects in a map. Contents are lost on restart.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
    uploads: Arc<RwLock<Vec<String>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed an object without recording an upload.
    pub async fn insert(&self, name: impl Into<String>, data: Vec<u8>) {
        let mut objects = self.objects.write().await;
        objects.insert(
            name.into(),
            StoredObject {
                data,
                modified: Utc::now(),
            },
        );
    }

    /// Names passed to `upload`, in call order.
    pub async fn uploads(&self) -> Vec<String> {
        self.uploads.read().await.clone()
    }

    pub async fn contains(&self, name: &str) -> bool {
        self.objects.read().await.contains_key(name)
    }
}

#[async_trait::async_trait]
impl ObjectStore for MemoryObjectStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn upload(&self, name: &str, data: Vec<u8>) -> Result<(), StorageError> {
        let size = data.len();
        self.insert(name, data).await;
        self.uploads.write().await.push(name.to_string());
        info!(object = %name, size = size, "Object stored in memory");
        Ok(())
    }

    async fn download(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        let objects = self.objects.read().await;
        objects
            .get(name)
            .map(|o| o.data.clone())
            .ok_or_else(|| StorageError::NotFound(name.to_string()))
    }

    async fn list_folder(&self) -> Result<Vec<RemoteEntry>, StorageError> {
        let objects = self.objects.read().await;
        Ok(objects
            .iter()
            .map(|(name, o)| RemoteEntry {
                name: name.clone(),
                size: o.data.len() as u64,
                modified: o.modified,
            })
            .collect())
    }
}
