//! HTTP asset store using the Cloudinary unsigned upload protocol.
//!
//! The file is streamed as a multipart part in fixed-size chunks; progress is
//! reported as each chunk is handed to the HTTP stack.

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use credcheck_core::{AssetRef, LocalFile, UploadConfig};
use futures::StreamExt;
use rand::distr::Alphanumeric;
use rand::Rng;
use reqwest::multipart::{Form, Part};
use reqwest::{Body, Client};
use serde::Deserialize;

use crate::progress::ProgressReporter;
use crate::traits::{AssetStore, UploadError, UploadResult};

#[derive(Debug, Deserialize)]
struct CloudUploadResponse {
    secure_url: Option<String>,
    public_id: Option<String>,
    format: Option<String>,
    bytes: Option<u64>,
    width: Option<u32>,
    height: Option<u32>,
    resource_type: Option<String>,
    created_at: Option<String>,
}

#[derive(Clone, Debug)]
pub struct CloudAssetStore {
    client: Client,
    endpoint: String,
    upload_preset: String,
    folder: String,
    chunk_size: usize,
}

impl CloudAssetStore {
    pub fn new(config: &UploadConfig) -> UploadResult<Self> {
        let cloud_name = config.cloud_name.as_deref().ok_or_else(|| {
            UploadError::Config("UPLOAD_CLOUD_NAME must be set to upload files".to_string())
        })?;

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| UploadError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            endpoint: format!(
                "{}/v1_1/{}/upload",
                config.base_url.trim_end_matches('/'),
                cloud_name
            ),
            upload_preset: config.upload_preset.clone(),
            folder: config.folder.clone(),
            chunk_size: config.chunk_size.max(1),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn chunks(&self, data: &Bytes) -> Vec<Bytes> {
        (0..data.len())
            .step_by(self.chunk_size)
            .map(|start| data.slice(start..(start + self.chunk_size).min(data.len())))
            .collect()
    }
}

/// `cert_{unix_ms}_{9 random chars}`, unique per upload.
pub fn generate_public_id() -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(9)
        .map(char::from)
        .collect();
    format!(
        "cert_{}_{}",
        Utc::now().timestamp_millis(),
        suffix.to_lowercase()
    )
}

fn error_message(body: &str) -> Option<String> {
    let value: serde_json::Value = serde_json::from_str(body).ok()?;
    value
        .pointer("/error/message")
        .or_else(|| value.get("message"))
        .and_then(|m| m.as_str())
        .map(str::to_string)
}

#[async_trait]
impl AssetStore for CloudAssetStore {
    async fn upload(
        &self,
        file: &LocalFile,
        progress: &ProgressReporter,
    ) -> UploadResult<AssetRef> {
        let total = file.data.len() as u64;
        let reporter = progress.clone();
        let mut sent: u64 = 0;
        let stream = futures::stream::iter(self.chunks(&file.data)).map(move |chunk| {
            sent += chunk.len() as u64;
            reporter.report_bytes(sent, total);
            Ok::<Bytes, std::io::Error>(chunk)
        });

        let part = Part::stream_with_length(Body::wrap_stream(stream), total)
            .file_name(file.name.clone())
            .mime_str(&file.content_type)
            .map_err(|e| UploadError::Config(format!("Invalid content type: {}", e)))?;

        let public_id = generate_public_id();
        let form = Form::new()
            .text("upload_preset", self.upload_preset.clone())
            .text("folder", self.folder.clone())
            .text("resource_type", "auto")
            .text("public_id", public_id.clone())
            .part("file", part);

        tracing::debug!(
            endpoint = %self.endpoint,
            file_name = %file.name,
            bytes = total,
            public_id = %public_id,
            "Uploading asset"
        );

        let started = std::time::Instant::now();
        let response = self
            .client
            .post(&self.endpoint)
            .multipart(form)
            .send()
            .await
            .map_err(|e| UploadError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| UploadError::Transport(e.to_string()))?;

        if !status.is_success() {
            let message = error_message(&body)
                .unwrap_or_else(|| format!("Upload failed with status: {}", status.as_u16()));
            return Err(UploadError::Service {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: CloudUploadResponse =
            serde_json::from_str(&body).map_err(|e| UploadError::Malformed(e.to_string()))?;

        let (url, public_id) = match (parsed.secure_url, parsed.public_id) {
            (Some(url), Some(id)) if !url.is_empty() && !id.is_empty() => (url, id),
            _ => {
                return Err(UploadError::Malformed(
                    "response is missing secure_url or public_id".to_string(),
                ))
            }
        };

        tracing::info!(
            public_id = %public_id,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Asset uploaded"
        );

        Ok(AssetRef {
            url,
            public_id,
            format: parsed.format,
            bytes: parsed.bytes,
            width: parsed.width,
            height: parsed.height,
            resource_type: parsed.resource_type,
            created_at: parsed.created_at,
        })
    }
}
