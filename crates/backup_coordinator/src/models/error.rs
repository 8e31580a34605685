use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use serde_json::json;
use thiserror::Error;

/// Failures surfaced by the backup coordinator to HTTP callers and scheduled runs.
#[derive(Debug, Error)]
pub enum CoordinatorError {
    #[error("Missing bearer token in Authorization header")]
    AuthenticationMissing,

    #[error("Invalid credential: {0}")]
    AuthenticationInvalid(String),

    #[error("Role '{0}' is not allowed to perform this operation")]
    AuthorizationDenied(String),

    #[error("Invalid interval '{0}'. Use daily, weekly, or monthly.")]
    InvalidSchedule(String),

    #[error("Invalid backup name: {0}")]
    InvalidArtifactName(String),

    #[error("Dump failed: {0}")]
    DumpFailed(String),

    #[error("Upload failed: {0}")]
    UploadFailed(#[source] StorageError),

    #[error("Download failed: {0}")]
    DownloadFailed(#[source] StorageError),

    #[error("Restore failed: {0}")]
    RestoreFailed(String),

    #[error("Listing failed: {0}")]
    ListingFailed(#[source] StorageError),
}

impl CoordinatorError {
    /// Short label used for metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            CoordinatorError::AuthenticationMissing => "authentication_missing",
            CoordinatorError::AuthenticationInvalid(_) => "authentication_invalid",
            CoordinatorError::AuthorizationDenied(_) => "authorization_denied",
            CoordinatorError::InvalidSchedule(_) => "invalid_schedule",
            CoordinatorError::InvalidArtifactName(_) => "invalid_artifact_name",
            CoordinatorError::DumpFailed(_) => "dump_failed",
            CoordinatorError::UploadFailed(_) => "upload_failed",
            CoordinatorError::DownloadFailed(_) => "download_failed",
            CoordinatorError::RestoreFailed(_) => "restore_failed",
            CoordinatorError::ListingFailed(_) => "listing_failed",
        }
    }
}

impl ResponseError for CoordinatorError {
    fn status_code(&self) -> StatusCode {
        match self {
            CoordinatorError::AuthenticationMissing | CoordinatorError::AuthenticationInvalid(_) => {
                StatusCode::UNAUTHORIZED
            }
            CoordinatorError::AuthorizationDenied(_) => StatusCode::FORBIDDEN,
            CoordinatorError::InvalidSchedule(_) | CoordinatorError::InvalidArtifactName(_) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({
            "error": self.to_string()
        }))
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Object {0} not found")]
    NotFound(String),

    #[error("Storage API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("{0}")]
    Backend(String),
}

#[derive(Debug, Error)]
pub enum CommandError {
    #[error("Failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required configuration: {0}")]
    Missing(&'static str),

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
