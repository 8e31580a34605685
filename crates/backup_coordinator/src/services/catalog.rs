//! Remote backup listing

use std::sync::Arc;
use tracing::{debug, error};

use crate::models::error::CoordinatorError;
use crate::models::types::BackupArtifact;
use crate::services::naming::is_archive;
use crate::stores::ObjectStore;

pub struct BackupCatalog {
    store: Arc<dyn ObjectStore>,
}

impl BackupCatalog {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Archives present in the remote folder, in store order.
    pub async fn list_backups(&self) -> Result<Vec<BackupArtifact>, CoordinatorError> {
        let entries = self.store.list_folder().await.map_err(|e| {
            error!(backend = self.store.backend_name(), error = %e, "Listing backups failed");
            CoordinatorError::ListingFailed(e)
        })?;

        let total = entries.len();
        let backups: Vec<BackupArtifact> = entries
            .into_iter()
            .filter(|entry| is_archive(&entry.name))
            .map(|entry| BackupArtifact {
                name: entry.name,
                size: entry.size,
                modified: entry.modified,
            })
            .collect();

        debug!(total = total, archives = backups.len(), "Listed remote backups");
        Ok(backups)
    }
}
