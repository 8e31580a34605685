//! Wiring of the backup lifecycle components

use std::sync::Arc;
use tokio::fs;
use tracing::info;

use crate::config::Config;
use crate::middleware::auth::AuthGate;
use crate::models::error::ConfigError;
use crate::services::catalog::BackupCatalog;
use crate::services::command::CommandRunner;
use crate::services::dump::DumpPipeline;
use crate::services::naming::{ArtifactNamer, Clock, SystemClock};
use crate::services::restore::RestorePipeline;
use crate::services::schedule::ScheduleController;
use crate::stores::ObjectStore;

/// Coordinator components shared by the HTTP handlers and the scheduler.
#[derive(Clone)]
pub struct Coordinator {
    pub auth: Arc<AuthGate>,
    pub dump: Arc<DumpPipeline>,
    pub restore: Arc<RestorePipeline>,
    pub catalog: Arc<BackupCatalog>,
    pub schedule: Arc<ScheduleController>,
}

impl Coordinator {
    /// Validate the configuration, prepare the staging directory and build the components.
    pub async fn initialize(
        config: &Config,
        store: Arc<dyn ObjectStore>,
        runner: Arc<dyn CommandRunner>,
    ) -> Result<Self, ConfigError> {
        Self::initialize_with_clock(config, store, runner, Arc::new(SystemClock)).await
    }

    pub async fn initialize_with_clock(
        config: &Config,
        store: Arc<dyn ObjectStore>,
        runner: Arc<dyn CommandRunner>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let database_uri = config
            .database
            .uri
            .clone()
            .ok_or(ConfigError::Missing("database.uri (MONGO_URI)"))?;

        let staging_dir = config.staging.dir.clone();
        fs::create_dir_all(&staging_dir).await?;

        let auth = Arc::new(AuthGate::from_base64_secret(config.auth.jwt_secret.as_ref())?);

        let dump = Arc::new(DumpPipeline::new(
            database_uri.clone(),
            config.database.dump_command.clone(),
            staging_dir.clone(),
            config.staging.keep_local_copies,
            ArtifactNamer::new(Arc::clone(&clock)),
            Arc::clone(&runner),
            Arc::clone(&store),
        ));

        let restore = Arc::new(RestorePipeline::new(
            database_uri,
            config.database.restore_command.clone(),
            staging_dir.clone(),
            runner,
            Arc::clone(&store),
        ));

        let catalog = Arc::new(BackupCatalog::new(Arc::clone(&store)));
        let schedule = Arc::new(ScheduleController::new(dump.clone(), clock));

        info!(
            staging_dir = %staging_dir.display(),
            backend = store.backend_name(),
            "Backup coordinator initialized"
        );

        Ok(Self {
            auth,
            dump,
            restore,
            catalog,
            schedule,
        })
    }
}
