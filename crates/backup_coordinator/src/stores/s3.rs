//! S3-compatible object storage

use aws_sdk_s3::config::{BehaviorVersion, Credentials, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use chrono::{DateTime, Utc};
use secrecy::ExposeSecret;
use tracing::info;

use crate::config::S3Config;
use crate::models::error::StorageError;
use crate::stores::object_store::{ObjectStore, RemoteEntry};

pub struct S3ObjectStore {
    s3_client: S3Client,
    bucket: String,
    prefix: String,
}

impl S3ObjectStore {
    pub async fn new(config: &S3Config, folder: &str) -> Result<Self, StorageError> {
        let mut s3_config_builder = aws_sdk_s3::config::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new(config.region.clone()));

        if let Some(endpoint) = &config.endpoint {
            s3_config_builder = s3_config_builder.endpoint_url(endpoint);
        }

        if let (Some(ak), Some(sk)) = (&config.access_key_id, &config.secret_access_key) {
            s3_config_builder = s3_config_builder.credentials_provider(Credentials::new(
                ak.clone(),
                sk.expose_secret().clone(),
                None,
                None,
                "backup-coordinator",
            ));
        }

        if config.path_style {
            s3_config_builder = s3_config_builder.force_path_style(true);
        }

        let s3_client = S3Client::from_conf(s3_config_builder.build());

        // Verify bucket exists
        s3_client
            .head_bucket()
            .bucket(&config.bucket)
            .send()
            .await
            .map_err(|e| {
                StorageError::Backend(format!(
                    "Failed to access S3 bucket {}: {}",
                    config.bucket, e
                ))
            })?;

        info!(bucket = %config.bucket, "S3 object store initialized");

        Ok(Self {
            s3_client,
            bucket: config.bucket.clone(),
            prefix: normalize_prefix(folder),
        })
    }

    fn object_key(&self, name: &str) -> String {
        format!("{}{}", self.prefix, name)
    }
}

#[async_trait::async_trait]
impl ObjectStore for S3ObjectStore {
    fn backend_name(&self) -> &'static str {
        "s3"
    }

    async fn upload(&self, name: &str, data: Vec<u8>) -> Result<(), StorageError> {
        let key = self.object_key(name);
        let size = data.len();

        self.s3_client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| StorageError::Backend(format!("S3 upload failed: {}", e)))?;

        info!(bucket = %self.bucket, key = %key, size = size, "Object uploaded to S3");
        Ok(())
    }

    async fn download(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        let key = self.object_key(name);

        let response = self
            .s3_client
            .get_object()
            .bucket(&self.bucket)
            .key(&key)
            .send()
            .await
            .map_err(|e| {
                if e.as_service_error().is_some_and(|se| se.is_no_such_key()) {
                    StorageError::NotFound(key.clone())
                } else {
                    StorageError::Backend(format!("S3 download of {} failed: {}", key, e))
                }
            })?;

        let mut data = Vec::new();
        let mut body = response.body;
        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| {
                StorageError::Backend(format!("Failed to read S3 object: {}", e))
            })?;
            data.extend_from_slice(&chunk);
        }

        Ok(data)
    }

    async fn list_folder(&self) -> Result<Vec<RemoteEntry>, StorageError> {
        let mut entries = Vec::new();
        let mut continuation: Option<String> = None;

        loop {
            let mut request = self
                .s3_client
                .list_objects_v2()
                .bucket(&self.bucket)
                .delimiter("/");
            if !self.prefix.is_empty() {
                request = request.prefix(&self.prefix);
            }
            if let Some(token) = continuation.take() {
                request = request.continuation_token(token);
            }

            let page = request
                .send()
                .await
                .map_err(|e| StorageError::Backend(format!("S3 listing failed: {}", e)))?;

            for object in page.contents() {
                let Some(key) = object.key() else { continue };
                let name = key.strip_prefix(self.prefix.as_str()).unwrap_or(key);
                let modified = object
                    .last_modified()
                    .and_then(|t| DateTime::<Utc>::from_timestamp(t.secs(), t.subsec_nanos()))
                    .unwrap_or_default();
                entries.push(RemoteEntry {
                    name: name.to_string(),
                    size: object.size().unwrap_or(0).max(0) as u64,
                    modified,
                });
            }

            match page.next_continuation_token() {
                Some(token) if page.is_truncated().unwrap_or(false) => {
                    continuation = Some(token.to_string())
                }
                _ => break,
            }
        }

        Ok(entries)
    }
}

/// Keys are `<folder>/<name>`, or just `<name>` for an empty folder.
fn normalize_prefix(folder: &str) -> String {
    let trimmed = folder.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}/", trimmed)
    }
}
