mod app;

use actix_web::{web, App as ActixApp, HttpServer};
use backup_coordinator::config::{self, LogFormat, LoggingConfig};
use backup_coordinator::routes::api;
use tokio::signal;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(logging.level.as_str()));

    match logging.format {
        LogFormat::Json => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init(),
        LogFormat::Pretty => tracing_subscriber::fmt().with_env_filter(filter).init(),
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenv::dotenv().ok();

    // Load configuration
    let config_path = std::env::var("BACKUP_CONFIG")
        .unwrap_or_else(|_| config::DEFAULT_CONFIG_PATH.to_string());

    let config = match config::Config::load(Some(&config_path)) {
        Ok(config) => {
            init_tracing(&config.logging);
            config
        }
        Err(e) => {
            init_tracing(&LoggingConfig::default());
            error!("Failed to load config: {}", e);
            return Err(e.into());
        }
    };

    info!(config_path = %config_path, "Starting backup coordinator");

    // Initialize application
    let app = app::App::initialize(&config).await.map_err(|e| {
        error!("Startup aborted: {}", e);
        e
    })?;

    // Start HTTP server
    let coordinator = app.coordinator.clone();
    let metrics_enabled = config.metrics.enabled;
    let server_addr = format!("{}:{}", config.server.host, config.server.port);

    let server = HttpServer::new(move || {
        let app_state = api::AppState {
            coordinator: coordinator.clone(),
            metrics_enabled,
        };
        ActixApp::new()
            .app_data(web::Data::new(app_state))
            .configure(api::configure)
    })
    .bind(&server_addr)
    .map_err(|e| {
        error!("Failed to bind {}: {}", server_addr, e);
        e
    })?
    .disable_signals()
    .run();

    let server_handle = server.handle();
    let server_task = tokio::spawn(server);
    info!("Listening on {}", server_addr);

    // Wait for shutdown signal
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received shutdown signal");
        }
        Err(err) => {
            error!("Unable to listen for shutdown signal: {}", err);
        }
    }

    // Graceful shutdown
    info!("Initiating graceful shutdown");
    if let Some(interval) = app.coordinator.schedule.stop().await {
        info!(interval = %interval, "Cancelled backup schedule");
    }
    server_handle.stop(true).await;

    match server_task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Server exited with error: {}", e),
        Err(e) => warn!("Server task failed: {}", e),
    }

    info!("Backup coordinator stopped");
    Ok(())
}
