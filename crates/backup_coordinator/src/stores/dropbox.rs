//! Dropbox-backed object storage over the v2 HTTP API

use chrono::{DateTime, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info, warn};

use crate::config::DropboxConfig;
use crate::models::error::StorageError;
use crate::stores::object_store::{ObjectStore, RemoteEntry};

const API_ARG_HEADER: &str = "Dropbox-API-Arg";

pub struct DropboxStore {
    http_client: Client,
    access_token: SecretString,
    api_url: String,
    content_url: String,
    folder: String,
}

#[derive(Debug, Deserialize)]
struct ListFolderResponse {
    entries: Vec<ListFolderEntry>,
    cursor: String,
    has_more: bool,
}

#[derive(Debug, Deserialize)]
struct ListFolderEntry {
    #[serde(rename = ".tag")]
    tag: String,
    name: String,
    #[serde(default)]
    size: Option<u64>,
    #[serde(default)]
    server_modified: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error_summary: String,
}

impl DropboxStore {
    pub fn new(
        config: &DropboxConfig,
        access_token: SecretString,
        folder: &str,
    ) -> Result<Self, StorageError> {
        let http_client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(StorageError::NetworkError)?;

        info!(folder = %folder, "Dropbox store initialized");

        Ok(Self {
            http_client,
            access_token,
            api_url: config.api_url.trim_end_matches('/').to_string(),
            content_url: config.content_url.trim_end_matches('/').to_string(),
            folder: normalize_folder(folder),
        })
    }

    fn object_path(&self, name: &str) -> String {
        format!("{}/{}", self.folder, name)
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder.bearer_auth(self.access_token.expose_secret())
    }

    async fn check(response: Response, path: &str) -> Result<Response, StorageError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let summary = serde_json::from_str::<ApiErrorBody>(&body)
            .map(|e| e.error_summary)
            .unwrap_or_else(|_| body.clone());

        if status == StatusCode::CONFLICT && summary.contains("not_found") {
            return Err(StorageError::NotFound(path.to_string()));
        }

        warn!(path = %path, status = status.as_u16(), error = %summary, "Dropbox request failed");
        Err(StorageError::Api {
            status: status.as_u16(),
            message: summary,
        })
    }

    async fn list_page(&self, endpoint: &str, body: serde_json::Value) -> Result<ListFolderResponse, StorageError> {
        let url = format!("{}/2/files/{}", self.api_url, endpoint);
        let response = self
            .authorized(self.http_client.post(&url))
            .json(&body)
            .send()
            .await?;
        let response = Self::check(response, &self.folder).await?;
        Ok(response.json::<ListFolderResponse>().await?)
    }
}

#[async_trait::async_trait]
impl ObjectStore for DropboxStore {
    fn backend_name(&self) -> &'static str {
        "dropbox"
    }

    async fn upload(&self, name: &str, data: Vec<u8>) -> Result<(), StorageError> {
        let path = self.object_path(name);
        let size = data.len();
        let arg = json!({
            "path": path,
            "mode": "add",
            "autorename": false,
            "mute": true,
        });

        let response = self
            .authorized(self.http_client.post(format!("{}/2/files/upload", self.content_url)))
            .header(API_ARG_HEADER, api_arg(&arg))
            .header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
            .body(data)
            .send()
            .await?;
        Self::check(response, &path).await?;

        info!(path = %path, size = size, "Object uploaded to Dropbox");
        Ok(())
    }

    async fn download(&self, name: &str) -> Result<Vec<u8>, StorageError> {
        let path = self.object_path(name);
        let arg = json!({ "path": path });

        let response = self
            .authorized(self.http_client.post(format!("{}/2/files/download", self.content_url)))
            .header(API_ARG_HEADER, api_arg(&arg))
            .send()
            .await?;
        let response = Self::check(response, &path).await?;
        let bytes = response.bytes().await?;

        debug!(path = %path, size = bytes.len(), "Object downloaded from Dropbox");
        Ok(bytes.to_vec())
    }

    async fn list_folder(&self) -> Result<Vec<RemoteEntry>, StorageError> {
        let first = self
            .list_page("list_folder", json!({ "path": self.folder, "recursive": false }))
            .await;
        // The folder only appears with the first upload.
        let mut page = match first {
            Ok(page) => page,
            Err(StorageError::NotFound(_)) => {
                debug!(folder = %self.folder, "Backup folder does not exist yet");
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };
        let mut entries = Vec::new();

        loop {
            entries.extend(page.entries.into_iter().filter_map(into_remote_entry));
            if !page.has_more {
                break;
            }
            page = self
                .list_page("list_folder/continue", json!({ "cursor": page.cursor }))
                .await?;
        }

        Ok(entries)
    }
}

fn into_remote_entry(entry: ListFolderEntry) -> Option<RemoteEntry> {
    if entry.tag != "file" {
        return None;
    }
    Some(RemoteEntry {
        name: entry.name,
        size: entry.size.unwrap_or(0),
        modified: entry.server_modified.unwrap_or_default(),
    })
}

/// JSON for the `Dropbox-API-Arg` header. Header values must be ASCII, so
/// everything else is written as `\uXXXX` escapes.
fn api_arg(arg: &serde_json::Value) -> String {
    let mut out = String::new();
    for c in arg.to_string().chars() {
        if c.is_ascii() {
            out.push(c);
        } else {
            let mut units = [0u16; 2];
            for unit in c.encode_utf16(&mut units) {
                out.push_str(&format!("\\u{:04x}", unit));
            }
        }
    }
    out
}

/// Dropbox addresses the root folder as "" and everything else as "/a/b".
fn normalize_folder(folder: &str) -> String {
    let trimmed = folder.trim().trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("/{}", trimmed)
    }
}
