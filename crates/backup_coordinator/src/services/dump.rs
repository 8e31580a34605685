//! Dump the database with the external dump binary and upload the archive

use secrecy::{ExposeSecret, SecretString};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::fs;
use tracing::{debug, error, info, instrument, warn};

use crate::models::error::{CoordinatorError, StorageError};
use crate::services::command::{CommandRunner, CommandSpec};
use crate::services::naming::{staging_path, ArtifactNamer};
use crate::services::schedule::ScheduledJob;
use crate::stores::ObjectStore;
use crate::utils::metrics::get_metrics;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupTrigger {
    Manual,
    Scheduled,
}

impl BackupTrigger {
    fn as_str(&self) -> &'static str {
        match self {
            BackupTrigger::Manual => "manual",
            BackupTrigger::Scheduled => "scheduled",
        }
    }
}

pub struct DumpPipeline {
    database_uri: SecretString,
    dump_command: String,
    staging_dir: PathBuf,
    keep_local_copies: bool,
    namer: ArtifactNamer,
    runner: Arc<dyn CommandRunner>,
    store: Arc<dyn ObjectStore>,
}

impl DumpPipeline {
    pub fn new(
        database_uri: SecretString,
        dump_command: String,
        staging_dir: PathBuf,
        keep_local_copies: bool,
        namer: ArtifactNamer,
        runner: Arc<dyn CommandRunner>,
        store: Arc<dyn ObjectStore>,
    ) -> Self {
        Self {
            database_uri,
            dump_command,
            staging_dir,
            keep_local_copies,
            namer,
            runner,
            store,
        }
    }

    fn dump_command(&self, archive: &Path) -> CommandSpec {
        CommandSpec::new(&self.dump_command)
            .arg(format!("--uri={}", self.database_uri.expose_secret()))
            .arg(format!("--archive={}", archive.display()))
            .arg("--gzip")
    }

    /// Dump, then upload. Returns the artifact name.
    pub async fn create_backup(&self) -> Result<String, CoordinatorError> {
        self.run_pipeline(BackupTrigger::Manual).await
    }

    #[instrument(skip(self))]
    pub async fn run_pipeline(&self, trigger: BackupTrigger) -> Result<String, CoordinatorError> {
        let started = Instant::now();
        let result = self.dump_and_upload().await;
        let elapsed = started.elapsed().as_secs_f64();

        match &result {
            Ok(name) => {
                get_metrics().record_backup("success", trigger.as_str(), elapsed);
                info!(backup = %name, duration_secs = elapsed, "Backup completed");
            }
            Err(e) => {
                get_metrics().record_backup("failure", trigger.as_str(), elapsed);
                get_metrics().record_error(e.kind());
                error!(error = %e, "Backup failed");
            }
        }

        result
    }

    async fn dump_and_upload(&self) -> Result<String, CoordinatorError> {
        let name = self.namer.next_name();
        let staged = staging_path(&self.staging_dir, &name);

        info!(backup = %name, program = %self.dump_command, "Starting database dump");
        let output = self
            .runner
            .run(&self.dump_command(&staged))
            .await
            .map_err(|e| CoordinatorError::DumpFailed(e.to_string()));

        let output = match output {
            Ok(output) if output.success() => output,
            Ok(output) => {
                discard_partial_dump(&staged).await;
                return Err(CoordinatorError::DumpFailed(output.diagnostics()));
            }
            Err(e) => {
                discard_partial_dump(&staged).await;
                return Err(e);
            }
        };
        debug!(backup = %name, stderr = %output.stderr.trim(), "Dump finished");
        info!(backup = %name, "Backup created");

        let data = fs::read(&staged).await.map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CoordinatorError::DumpFailed(format!(
                    "dump reported success but produced no archive at {}",
                    staged.display()
                ))
            } else {
                CoordinatorError::UploadFailed(StorageError::IoError(e))
            }
        })?;

        if let Err(e) = self.store.upload(&name, data).await {
            warn!(
                backup = %name,
                path = %staged.display(),
                "Upload failed, keeping staged archive as local copy"
            );
            return Err(CoordinatorError::UploadFailed(e));
        }
        info!(backup = %name, backend = self.store.backend_name(), "Backup uploaded");

        if !self.keep_local_copies {
            if let Err(e) = fs::remove_file(&staged).await {
                warn!(path = %staged.display(), error = %e, "Failed to remove staged archive");
            }
        }

        Ok(name)
    }
}

#[async_trait::async_trait]
impl ScheduledJob for DumpPipeline {
    async fn run(&self) -> Result<String, CoordinatorError> {
        self.run_pipeline(BackupTrigger::Scheduled).await
    }
}

async fn discard_partial_dump(path: &Path) {
    match fs::remove_file(path).await {
        Ok(()) => debug!(path = %path.display(), "Removed partial dump"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => warn!(path = %path.display(), error = %e, "Failed to remove partial dump"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::error::CommandError;
    use crate::services::command::CommandOutput;
    use crate::services::naming::FixedClock;
    use crate::stores::memory::MemoryObjectStore;
    use crate::stores::RemoteEntry;
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;

    /// Writes the archive named by `--archive=` and exits with `status`.
    struct FakeDump {
        status: i32,
        write_archive: bool,
        calls: Mutex<Vec<CommandSpec>>,
    }

    impl FakeDump {
        fn new(status: i32, write_archive: bool) -> Self {
            Self {
                status,
                write_archive,
                calls: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait::async_trait]
    impl CommandRunner for FakeDump {
        async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
            self.calls.lock().unwrap().push(spec.clone());
            if self.write_archive {
                let archive = spec.flag_value("archive").unwrap();
                fs::write(archive, b"archive-bytes").await.unwrap();
            }
            Ok(CommandOutput {
                status: Some(self.status),
                stdout: String::new(),
                stderr: if self.status == 0 { String::new() } else { "auth error".into() },
            })
        }
    }

    struct FailingUploads;

    #[async_trait::async_trait]
    impl ObjectStore for FailingUploads {
        fn backend_name(&self) -> &'static str {
            "failing"
        }

        async fn upload(&self, _name: &str, _data: Vec<u8>) -> Result<(), StorageError> {
            Err(StorageError::Api {
                status: 507,
                message: "insufficient_space".into(),
            })
        }

        async fn download(&self, name: &str) -> Result<Vec<u8>, StorageError> {
            Err(StorageError::NotFound(name.into()))
        }

        async fn list_folder(&self) -> Result<Vec<RemoteEntry>, StorageError> {
            Ok(Vec::new())
        }
    }

    fn pipeline(
        dir: &Path,
        runner: Arc<dyn CommandRunner>,
        store: Arc<dyn ObjectStore>,
        keep_local_copies: bool,
    ) -> DumpPipeline {
        let clock = FixedClock(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap());
        DumpPipeline::new(
            SecretString::new("mongodb://db:27017/app".into()),
            "mongodump".into(),
            dir.to_path_buf(),
            keep_local_copies,
            ArtifactNamer::new(Arc::new(clock)),
            runner,
            store,
        )
    }

    fn staged_files(dir: &Path) -> Vec<PathBuf> {
        std::fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect()
    }

    #[tokio::test]
    async fn successful_backup_uploads_under_artifact_name() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(FakeDump::new(0, true));
        let store = Arc::new(MemoryObjectStore::new());
        let pipeline = pipeline(dir.path(), runner.clone(), store.clone(), true);

        let name = pipeline.create_backup().await.unwrap();

        assert_eq!(name, "backup_2024-01-01_00-00-00.gz");
        assert_eq!(store.uploads().await, vec![name.clone()]);
        assert_eq!(store.download(&name).await.unwrap(), b"archive-bytes");

        let calls = runner.calls.lock().unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].program, "mongodump");
        assert_eq!(calls[0].flag_value("uri"), Some("mongodb://db:27017/app"));
        assert!(calls[0].args.contains(&"--gzip".to_string()));

        // local copy kept by default
        assert_eq!(staged_files(dir.path()).len(), 1);
    }

    #[tokio::test]
    async fn local_copy_removed_when_not_kept() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryObjectStore::new());
        let pipeline = pipeline(dir.path(), Arc::new(FakeDump::new(0, true)), store.clone(), false);

        pipeline.create_backup().await.unwrap();
        assert!(staged_files(dir.path()).is_empty());
        assert_eq!(store.uploads().await.len(), 1);
    }

    #[tokio::test]
    async fn upload_failure_keeps_staged_file() {
        let dir = tempfile::tempdir().unwrap();
        let pipeline = pipeline(dir.path(), Arc::new(FakeDump::new(0, true)), Arc::new(FailingUploads), false);

        let err = pipeline.create_backup().await.unwrap_err();
        assert!(matches!(err, CoordinatorError::UploadFailed(_)));

        let files = staged_files(dir.path());
        assert_eq!(files.len(), 1);
        assert!(files[0].to_string_lossy().ends_with("backup_2024-01-01_00-00-00.gz"));
    }

    #[tokio::test]
    async fn dump_failure_skips_upload_and_removes_partial_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryObjectStore::new());
        let pipeline = pipeline(dir.path(), Arc::new(FakeDump::new(1, true)), store.clone(), true);

        let err = pipeline.create_backup().await.unwrap_err();
        match err {
            CoordinatorError::DumpFailed(msg) => assert!(msg.contains("auth error")),
            other => panic!("unexpected error: {other}"),
        }
        assert!(store.uploads().await.is_empty());
        assert!(staged_files(dir.path()).is_empty());
    }

    #[tokio::test]
    async fn success_without_archive_is_a_dump_failure() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(MemoryObjectStore::new());
        let pipeline = pipeline(dir.path(), Arc::new(FakeDump::new(0, false)), store.clone(), true);

        assert!(matches!(
            pipeline.create_backup().await,
            Err(CoordinatorError::DumpFailed(_))
        ));
        assert!(store.uploads().await.is_empty());
    }
}
