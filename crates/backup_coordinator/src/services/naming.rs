//! Backup artifact naming and staging paths

use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use uuid::Uuid;

use crate::models::error::CoordinatorError;

/// Extension of the gzip-compressed archives written by the dump binary.
pub const ARCHIVE_EXTENSION: &str = "gz";

const NAME_PREFIX: &str = "backup_";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d_%H-%M-%S";

/// Source of the current time, replaceable in tests.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

pub struct FixedClock(pub DateTime<Utc>);

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.0
    }
}

#[derive(Clone)]
pub struct ArtifactNamer {
    clock: Arc<dyn Clock>,
}

impl ArtifactNamer {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self { clock }
    }

    /// `backup_YYYY-MM-DD_HH-mm-ss.gz` for the current second.
    pub fn next_name(&self) -> String {
        format!(
            "{}{}.{}",
            NAME_PREFIX,
            self.clock.now().format(TIMESTAMP_FORMAT),
            ARCHIVE_EXTENSION
        )
    }
}

pub fn is_archive(name: &str) -> bool {
    Path::new(name)
        .extension()
        .is_some_and(|ext| ext == ARCHIVE_EXTENSION)
}

/// Local path for one pipeline run. Unique per call so concurrent runs never share a file.
pub fn staging_path(staging_dir: &Path, artifact_name: &str) -> PathBuf {
    staging_dir.join(format!("{}-{}", Uuid::new_v4().simple(), artifact_name))
}

/// Rejects names that could escape the staging directory or the remote folder.
pub fn validate_artifact_name(name: &str) -> Result<(), CoordinatorError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(CoordinatorError::InvalidArtifactName(
            "name must not be empty".to_string(),
        ));
    }
    if name.contains('/') || name.contains('\\') || name.contains("..") || name.contains('\0') {
        return Err(CoordinatorError::InvalidArtifactName(format!(
            "'{}' must be a plain file name",
            name
        )));
    }
    Ok(())
}
