//! Media ingestion port
//!
//! Uploaded images and videos are handed to a [`MediaStore`] together with
//! a logical path and come back as a durable public URL. Two backends are
//! provided: files under the service root folder, and an object storage
//! service reached over HTTP.

use std::path::PathBuf;

use async_trait::async_trait;
use materia_common::{Error, Result};
use tracing::debug;
use uuid::Uuid;

/// One uploaded file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaBlob {
    pub file_name: String,
    /// Content type declared by the client, if any
    pub content_type: Option<String>,
    pub data: Vec<u8>,
}

impl MediaBlob {
    pub fn new(file_name: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            content_type: None,
            data,
        }
    }
}

#[async_trait]
pub trait MediaStore: Send + Sync {
    /// Store a blob under `logical_path` and return its public URL
    async fn upload(&self, blob: &MediaBlob, logical_path: &str) -> Result<String>;
}

/// Keep only the final path component, with spaces replaced by `_`
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(|c: char| c == '/' || c == '\\').next().unwrap_or_default().trim();
    let cleaned = base.replace(' ', "_");
    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        "upload".to_string()
    } else {
        cleaned
    }
}

/// Which media slot of a step a blob fills
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepMediaKind {
    Image,
    Video,
}

impl StepMediaKind {
    fn segment(self) -> &'static str {
        match self {
            StepMediaKind::Image => "image",
            StepMediaKind::Video => "video",
        }
    }
}

/// `materials/<id>/<index>-<file>`
pub fn gallery_path(material_id: Uuid, index: usize, file_name: &str) -> String {
    format!("materials/{}/{}-{}", material_id, index, sanitize_file_name(file_name))
}

/// `materials/<id>/steps/<ordinal>/<image|video>/<file>`
pub fn step_path(material_id: Uuid, ordinal: i64, kind: StepMediaKind, file_name: &str) -> String {
    format!(
        "materials/{}/steps/{}/{}/{}",
        material_id,
        ordinal,
        kind.segment(),
        sanitize_file_name(file_name)
    )
}

/// Content type from magic bytes, then the declared type, then the extension
pub fn detect_content_type(blob: &MediaBlob) -> String {
    if let Some(kind) = infer::get(&blob.data) {
        return kind.mime_type().to_string();
    }
    if let Some(declared) = blob
        .content_type
        .as_deref()
        .filter(|ct| !ct.is_empty() && *ct != "application/octet-stream")
    {
        return declared.to_string();
    }

    let extension = blob
        .file_name
        .rsplit_once('.')
        .map(|(_, ext)| ext.to_ascii_lowercase())
        .unwrap_or_default();

    match extension.as_str() {
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        "gif" => "image/gif",
        "webp" => "image/webp",
        "mp4" => "video/mp4",
        "mov" => "video/quicktime",
        _ => "application/octet-stream",
    }
    .to_string()
}

/// Files under a local directory, served back under `public_base_url`
#[derive(Debug, Clone)]
pub struct LocalMediaStore {
    root: PathBuf,
    public_base_url: String,
}

impl LocalMediaStore {
    pub fn new(root: impl Into<PathBuf>, public_base_url: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            public_base_url: public_base_url.into(),
        }
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn upload(&self, blob: &MediaBlob, logical_path: &str) -> Result<String> {
        let target = self.root.join(logical_path);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::Dependency(format!("Create {} failed: {}", parent.display(), e)))?;
        }
        tokio::fs::write(&target, &blob.data)
            .await
            .map_err(|e| Error::Dependency(format!("Write {} failed: {}", target.display(), e)))?;

        debug!(path = %logical_path, bytes = blob.data.len(), "Stored media locally");
        Ok(format!(
            "{}/{}",
            self.public_base_url.trim_end_matches('/'),
            logical_path
        ))
    }
}

/// Object storage reached over HTTP
///
/// Uploads are `POST <endpoint>/object/<bucket>/<path>` with the service
/// key as bearer token; the public URL is
/// `<endpoint>/object/public/<bucket>/<path>`.
#[derive(Debug, Clone)]
pub struct HttpMediaStore {
    client: reqwest::Client,
    endpoint: String,
    bucket: String,
    service_key: String,
}

impl HttpMediaStore {
    pub fn new(
        endpoint: impl Into<String>,
        bucket: impl Into<String>,
        service_key: impl Into<String>,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .build()
            .map_err(|e| Error::Config(format!("HTTP client setup failed: {}", e)))?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
            bucket: bucket.into(),
            service_key: service_key.into(),
        })
    }

    pub fn public_url(&self, logical_path: &str) -> String {
        format!("{}/object/public/{}/{}", self.endpoint, self.bucket, logical_path)
    }
}

#[async_trait]
impl MediaStore for HttpMediaStore {
    async fn upload(&self, blob: &MediaBlob, logical_path: &str) -> Result<String> {
        let url = format!("{}/object/{}/{}", self.endpoint, self.bucket, logical_path);
        let content_type = detect_content_type(blob);

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.service_key)
            .header("x-upsert", "true")
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(blob.data.clone())
            .send()
            .await
            .map_err(|e| Error::Dependency(format!("Upload of {} failed: {}", logical_path, e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Dependency(format!(
                "Upload of {} rejected ({}): {}",
                logical_path, status, body
            )));
        }

        debug!(path = %logical_path, bytes = blob.data.len(), "Uploaded media");
        Ok(self.public_url(logical_path))
    }
}
