use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Deserializer};
use std::path::PathBuf;
use std::time::Duration;

use crate::models::error::ConfigError;

pub const DEFAULT_CONFIG_PATH: &str = "/etc/backup-coordinator/config.yaml";

// Custom deserializer for Duration that accepts integer seconds
fn deserialize_duration<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let secs = u64::deserialize(deserializer)?;
    Ok(Duration::from_secs(secs))
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub staging: StagingConfig,
    #[serde(default)]
    pub auth: AuthConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    3000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Connection URI handed to the dump and restore binaries.
    #[serde(default)]
    pub uri: Option<SecretString>,
    #[serde(default = "default_dump_command")]
    pub dump_command: String,
    #[serde(default = "default_restore_command")]
    pub restore_command: String,
}

fn default_dump_command() -> String {
    "mongodump".to_string()
}

fn default_restore_command() -> String {
    "mongorestore".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            uri: None,
            dump_command: default_dump_command(),
            restore_command: default_restore_command(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Dropbox,
    S3,
    Memory,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
    #[serde(default)]
    pub backend: StorageBackend,
    /// Remote folder (Dropbox) or key prefix (S3) holding the archives. Empty means root.
    #[serde(default)]
    pub folder: String,
    #[serde(default)]
    pub dropbox: DropboxConfig,
    #[serde(default)]
    pub s3: Option<S3Config>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DropboxConfig {
    #[serde(default)]
    pub access_token: Option<SecretString>,
    #[serde(default = "default_dropbox_api_url")]
    pub api_url: String,
    #[serde(default = "default_dropbox_content_url")]
    pub content_url: String,
    #[serde(
        default = "default_transfer_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub timeout: Duration,
}

fn default_dropbox_api_url() -> String {
    "https://api.dropboxapi.com".to_string()
}

fn default_dropbox_content_url() -> String {
    "https://content.dropboxapi.com".to_string()
}

fn default_transfer_timeout() -> Duration {
    Duration::from_secs(300)
}

impl Default for DropboxConfig {
    fn default() -> Self {
        Self {
            access_token: None,
            api_url: default_dropbox_api_url(),
            content_url: default_dropbox_content_url(),
            timeout: default_transfer_timeout(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct S3Config {
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    #[serde(default)]
    pub endpoint: Option<String>,
    #[serde(default)]
    pub access_key_id: Option<String>,
    #[serde(default)]
    pub secret_access_key: Option<SecretString>,
    #[serde(default)]
    pub path_style: bool,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

#[derive(Debug, Clone, Deserialize)]
pub struct StagingConfig {
    #[serde(default = "default_staging_dir")]
    pub dir: PathBuf,
    /// Keep the staged dump on disk after a successful upload.
    #[serde(default = "default_keep_local_copies")]
    pub keep_local_copies: bool,
}

fn default_staging_dir() -> PathBuf {
    PathBuf::from("./backups")
}

fn default_keep_local_copies() -> bool {
    true
}

impl Default for StagingConfig {
    fn default() -> Self {
        Self {
            dir: default_staging_dir(),
            keep_local_copies: default_keep_local_copies(),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct AuthConfig {
    /// Base64 encoded HS256 signing key.
    #[serde(default)]
    pub jwt_secret: Option<SecretString>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}

impl Config {
    /// Loads the optional config file, `BACKUP__*` variables and the plain
    /// `MONGO_URI`, `DROPBOX_TOKEN` and `JWT_SECRET` variables, in that order.
    pub fn load(path: Option<&str>) -> Result<Self, ConfigError> {
        let config_path = path.unwrap_or(DEFAULT_CONFIG_PATH);
        let settings = config::Config::builder()
            .add_source(config::File::with_name(config_path).required(false))
            .add_source(
                config::Environment::with_prefix("BACKUP")
                    .prefix_separator("__")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("database.uri", non_empty_env("MONGO_URI"))?
            .set_override_option(
                "storage.dropbox.access_token",
                non_empty_env("DROPBOX_TOKEN"),
            )?
            .set_override_option("auth.jwt_secret", non_empty_env("JWT_SECRET"))?
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Fails when the database URI or the selected store's credential is absent.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if is_blank(self.database.uri.as_ref()) {
            return Err(ConfigError::Missing("database.uri (MONGO_URI)"));
        }

        match self.storage.backend {
            StorageBackend::Dropbox => {
                if is_blank(self.storage.dropbox.access_token.as_ref()) {
                    return Err(ConfigError::Missing(
                        "storage.dropbox.access_token (DROPBOX_TOKEN)",
                    ));
                }
            }
            StorageBackend::S3 => match &self.storage.s3 {
                Some(s3) if !s3.bucket.trim().is_empty() => {}
                _ => return Err(ConfigError::Missing("storage.s3.bucket")),
            },
            StorageBackend::Memory => {}
        }

        if self.database.dump_command.trim().is_empty()
            || self.database.restore_command.trim().is_empty()
        {
            return Err(ConfigError::Invalid(
                "database.dump_command and database.restore_command must not be empty"
                    .to_string(),
            ));
        }

        Ok(())
    }
}

fn non_empty_env(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn is_blank(secret: Option<&SecretString>) -> bool {
    secret.map_or(true, |s| s.expose_secret().trim().is_empty())
}
