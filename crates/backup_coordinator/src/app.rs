//! Application initialization and setup

use backup_coordinator::config::Config;
use backup_coordinator::ConfigError;
use backup_coordinator::services::command::TokioCommandRunner;
use backup_coordinator::stores::build_store;
use backup_coordinator::Coordinator;
use std::sync::Arc;

/// Application components
pub struct App {
    pub coordinator: Coordinator,
}

impl App {
    /// Validate configuration and build the coordinator against the configured store
    pub async fn initialize(config: &Config) -> Result<Self, ConfigError> {
        config.validate()?;

        let store = build_store(&config.storage).await?;
        let coordinator =
            Coordinator::initialize(config, store, Arc::new(TokioCommandRunner)).await?;

        Ok(App { coordinator })
    }
}
