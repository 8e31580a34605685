//! Download an archive and feed it to the external restore binary

use secrecy::{ExposeSecret, SecretString};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::fs;
use tracing::{error, info, instrument, warn};

use crate::models::error::CoordinatorError;
use crate::services::command::{CommandRunner, CommandSpec};
use crate::services::naming::{staging_path, validate_artifact_name};
use crate::stores::ObjectStore;
use crate::utils::metrics::get_metrics;

pub struct RestorePipeline {
    database_uri: SecretString,
    restore_command: String,
    staging_dir: PathBuf,
    runner: Arc<dyn CommandRunner>,
    store: Arc<dyn ObjectStore>,
}

impl RestorePipeline {
    pub fn new(
        database_uri: SecretString,
        restore_command: String,
        staging_dir: PathBuf,
        runner: Arc<dyn CommandRunner>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            database_uri,
            restore_command,
            staging_dir,
            runner,
            store,
        }
    }

    fn restore_command(&self, archive: &Path) -> CommandSpec {
        CommandSpec::new(&self.restore_command)
            .arg(format!("--uri={}", self.database_uri.expose_secret()))
            .arg(format!("--archive={}", archive.display()))
            .arg("--gzip")
            .arg("--drop")
    }

    /// Replaces the database contents with the named archive.
    #[instrument(skip(self))]
    pub async fn restore_backup(&self, name: &str) -> Result<(), CoordinatorError> {
        let started = Instant::now();
        let result = self.download_and_restore(name).await;
        let elapsed = started.elapsed().as_secs_f64();

        match &result {
            Ok(()) => {
                get_metrics().record_restore("success", elapsed);
                info!(backup = %name, duration_secs = elapsed, "Database restored");
            }
            Err(e) => {
                get_metrics().record_restore("failure", elapsed);
                get_metrics().record_error(e.kind());
                error!(backup = %name, error = %e, "Restore failed");
            }
        }

        result
    }

    async fn download_and_restore(&self, name: &str) -> Result<(), CoordinatorError> {
        validate_artifact_name(name)?;

        let data = self
            .store
            .download(name)
            .await
            .map_err(CoordinatorError::DownloadFailed)?;
        info!(backup = %name, size = data.len(), "Backup downloaded");

        let staged = staging_path(&self.staging_dir, name);
        let result = self.stage_and_restore(&staged, data).await;

        // Cleanup failures never change the restore outcome.
        if let Err(e) = remove_staged(&staged).await {
            warn!(
                backup = %name,
                path = %staged.display(),
                error = %e,
                restored = result.is_ok(),
                "Staged archive left behind"
            );
        }

        result
    }

    async fn stage_and_restore(&self, staged: &Path, data: Vec<u8>) -> Result<(), CoordinatorError> {
        fs::write(staged, data).await.map_err(|e| {
            CoordinatorError::RestoreFailed(format!(
                "failed to stage archive at {}: {}",
                staged.display(),
                e
            ))
        })?;

        let output = self
            .runner
            .run(&self.restore_command(staged))
            .await
            .map_err(|e| CoordinatorError::RestoreFailed(e.to_string()))?;

        if !output.success() {
            return Err(CoordinatorError::RestoreFailed(output.diagnostics()));
        }
        Ok(())
    }
}

/// Removes the staged archive. A file that was never written is not an error.
async fn remove_staged(path: &Path) -> Result<(), std::io::Error> {
    match fs::remove_file(path).await {
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        other => other,
    }
}
