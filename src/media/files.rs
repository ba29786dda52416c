//! Remote file storage on the Gemini Files API.
//!
//! Uploads use the resumable protocol: a start request announces size and
//! MIME type and returns an upload URL, then a single upload+finalize
//! request sends the bytes.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::debug;

use crate::error::Error;
use crate::gemini::{ensure_success, GEMINI_BASE_URL};
use crate::Result;

/// Processing state of an uploaded file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum FileState {
    #[default]
    Unspecified,
    Processing,
    Active,
    Failed,
}

impl FileState {
    pub fn as_str(&self) -> &'static str {
        match self {
            FileState::Unspecified => "STATE_UNSPECIFIED",
            FileState::Processing => "PROCESSING",
            FileState::Active => "ACTIVE",
            FileState::Failed => "FAILED",
        }
    }
}

impl From<String> for FileState {
    fn from(s: String) -> Self {
        match s.as_str() {
            "PROCESSING" => FileState::Processing,
            "ACTIVE" => FileState::Active,
            "FAILED" => FileState::Failed,
            _ => FileState::Unspecified,
        }
    }
}

impl From<FileState> for String {
    fn from(state: FileState) -> Self {
        state.as_str().to_string()
    }
}

/// Error attached to a file whose processing failed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileError {
    #[serde(default)]
    pub code: i32,
    #[serde(default)]
    pub message: String,
}

/// File metadata as reported by the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteFile {
    /// Resource name, `files/<id>`
    pub name: String,

    #[serde(default)]
    pub display_name: Option<String>,

    #[serde(default)]
    pub mime_type: String,

    /// int64 encoded as a string on the wire
    #[serde(default)]
    pub size_bytes: Option<String>,

    /// URI the model refers to the file by
    #[serde(default)]
    pub uri: String,

    #[serde(default)]
    pub state: FileState,

    #[serde(default)]
    pub create_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub expiration_time: Option<DateTime<Utc>>,

    #[serde(default)]
    pub error: Option<FileError>,
}

impl RemoteFile {
    pub fn size(&self) -> Option<u64> {
        self.size_bytes.as_deref().and_then(|s| s.parse().ok())
    }

    pub fn is_active(&self) -> bool {
        self.state == FileState::Active
    }
}

#[derive(Debug, Deserialize)]
struct UploadResponse {
    file: RemoteFile,
}

/// Remote file storage used for media attachments.
#[async_trait]
pub trait FileService: Send + Sync {
    /// Upload a local file.
    async fn upload(&self, path: &Path, mime_type: &str, display_name: &str) -> Result<RemoteFile>;

    /// Fetch current metadata for a file by resource name.
    async fn get(&self, name: &str) -> Result<RemoteFile>;

    /// Delete a file by resource name.
    async fn delete(&self, name: &str) -> Result<()>;
}

/// Files API client using API key authentication.
#[derive(Clone)]
pub struct GeminiFiles {
    api_key: String,
    base_url: String,
    client: Client,
}

impl GeminiFiles {
    pub fn new(api_key: &str) -> Self {
        Self::with_base_url(api_key, GEMINI_BASE_URL)
    }

    pub fn with_base_url(api_key: &str, base_url: &str) -> Self {
        Self {
            api_key: api_key.to_string(),
            base_url: base_url.trim_end_matches('/').to_string(),
            client: Client::new(),
        }
    }

    fn upload_url(&self) -> String {
        format!("{}/upload/v1beta/files?key={}", self.base_url, self.api_key)
    }

    fn file_url(&self, name: &str) -> String {
        format!("{}/v1beta/{}?key={}", self.base_url, name, self.api_key)
    }
}

#[async_trait]
impl FileService for GeminiFiles {
    async fn upload(&self, path: &Path, mime_type: &str, display_name: &str) -> Result<RemoteFile> {
        let bytes = tokio::fs::read(path).await?;
        debug!("Uploading {:?} ({} bytes, {})", path, bytes.len(), mime_type);

        let start = self
            .client
            .post(self.upload_url())
            .header("X-Goog-Upload-Protocol", "resumable")
            .header("X-Goog-Upload-Command", "start")
            .header("X-Goog-Upload-Header-Content-Length", bytes.len().to_string())
            .header("X-Goog-Upload-Header-Content-Type", mime_type)
            .json(&json!({ "file": { "display_name": display_name } }))
            .send()
            .await?;
        let start = ensure_success(start).await?;

        let session_url = start
            .headers()
            .get("x-goog-upload-url")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string)
            .ok_or_else(|| Error::Other("Upload session URL missing from response".to_string()))?;

        let response = self
            .client
            .post(session_url)
            .header("X-Goog-Upload-Offset", "0")
            .header("X-Goog-Upload-Command", "upload, finalize")
            .body(bytes)
            .send()
            .await?;
        let response = ensure_success(response).await?;

        let uploaded: UploadResponse = response.json().await?;
        debug!("Uploaded as {} ({})", uploaded.file.name, uploaded.file.state.as_str());
        Ok(uploaded.file)
    }

    async fn get(&self, name: &str) -> Result<RemoteFile> {
        let response = self.client.get(self.file_url(name)).send().await?;
        let response = ensure_success(response).await?;
        Ok(response.json().await?)
    }

    async fn delete(&self, name: &str) -> Result<()> {
        let response = self.client.delete(self.file_url(name)).send().await?;
        ensure_success(response).await?;
        Ok(())
    }
}

/// Fake file service for testing.
///
/// Every upload yields the same file name; `get` replays the scripted states
/// in order and repeats the last one once they run out.
#[cfg(test)]
pub struct FakeFileService {
    initial: FileState,
    states: std::sync::Mutex<std::collections::VecDeque<FileState>>,
    pub uploads: std::sync::Mutex<Vec<(std::path::PathBuf, String)>>,
    pub gets: std::sync::atomic::AtomicUsize,
}

#[cfg(test)]
impl FakeFileService {
    pub fn new(initial: FileState, then: Vec<FileState>) -> Self {
        Self {
            initial,
            states: std::sync::Mutex::new(then.into()),
            uploads: std::sync::Mutex::new(Vec::new()),
            gets: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    pub fn get_count(&self) -> usize {
        self.gets.load(std::sync::atomic::Ordering::SeqCst)
    }

    fn file(&self, state: FileState, mime_type: &str) -> RemoteFile {
        RemoteFile {
            name: "files/fake".to_string(),
            display_name: None,
            mime_type: mime_type.to_string(),
            size_bytes: None,
            uri: "https://example.invalid/v1beta/files/fake".to_string(),
            state,
            create_time: None,
            expiration_time: None,
            error: None,
        }
    }
}

#[cfg(test)]
#[async_trait]
impl FileService for FakeFileService {
    async fn upload(&self, path: &Path, mime_type: &str, _display_name: &str) -> Result<RemoteFile> {
        self.uploads
            .lock()
            .unwrap()
            .push((path.to_path_buf(), mime_type.to_string()));
        Ok(self.file(self.initial, mime_type))
    }

    async fn get(&self, _name: &str) -> Result<RemoteFile> {
        self.gets.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        let mut states = self.states.lock().unwrap();
        let state = if states.len() > 1 {
            states.pop_front().unwrap_or(self.initial)
        } else {
            states.front().copied().unwrap_or(self.initial)
        };
        let mime_type = self
            .uploads
            .lock()
            .unwrap()
            .last()
            .map(|(_, mime)| mime.clone())
            .unwrap_or_default();
        Ok(self.file(state, &mime_type))
    }

    async fn delete(&self, _name: &str) -> Result<()> {
        Ok(())
    }
}
