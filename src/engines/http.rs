//! Direct HTTP download for URLs that already point at a media file

use async_trait::async_trait;
use reqwest::{Client, Response};
use std::sync::Arc;
use tracing::{debug, info, warn};

use super::traits::{ExtractionError, Extractor};
use super::types::{Artifact, ExtractionJob, HTTP};
use crate::config::HttpEngineConfig;
use crate::humanize::ByteSize;
use crate::storage::{ArtifactWriter, StorageClient};

/// Single-shot HTTP downloader; no internal retries
pub struct HttpExtractor {
    client: Client,
    max_bytes: ByteSize,
    storage: Arc<StorageClient>,
}

impl HttpExtractor {
    pub fn new(config: &HttpEngineConfig, storage: Arc<StorageClient>) -> Result<Self, ExtractionError> {
        let client = Client::builder()
            .connect_timeout(config.connect_timeout.as_duration())
            .timeout(config.request_timeout.as_duration())
            .user_agent(&config.user_agent)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| ExtractionError::Http(e.to_string()))?;

        Ok(Self {
            client,
            max_bytes: config.max_bytes,
            storage,
        })
    }

    fn too_large(&self) -> ExtractionError {
        ExtractionError::TooLarge { limit: self.max_bytes }
    }

    /// Copy the response body chunk by chunk, enforcing `max_bytes` as it goes
    async fn copy_body(&self, response: &mut Response, writer: &mut ArtifactWriter) -> Result<(), ExtractionError> {
        let limit = self.max_bytes.as_u64();

        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| ExtractionError::Http(format!("Failed to read body: {}", e)))?
        {
            if writer.written() + chunk.len() as u64 > limit {
                return Err(self.too_large());
            }
            writer.write(&chunk).await?;
        }

        Ok(())
    }
}

#[async_trait]
impl Extractor for HttpExtractor {
    fn engine(&self) -> &str {
        HTTP
    }

    async fn extract(&self, job: &ExtractionJob<'_>) -> Result<Artifact, ExtractionError> {
        if job.params.trim.is_some() {
            return Err(ExtractionError::Unsupported {
                engine: HTTP.to_string(),
                feature: "trimming".to_string(),
            });
        }

        debug!(job_id = job.job_id, url = job.url, "Starting download");

        let mut response = self.client.get(job.url).send().await.map_err(|e| {
            if e.is_timeout() {
                ExtractionError::Http("connection timeout".to_string())
            } else if e.is_redirect() {
                ExtractionError::Http("too many redirects".to_string())
            } else {
                ExtractionError::Http(e.to_string())
            }
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ExtractionError::Http(format!(
                "HTTP {}: {}",
                status.as_u16(),
                status.canonical_reason().unwrap_or("Unknown")
            )));
        }

        if response.content_length().is_some_and(|len| len > self.max_bytes.as_u64()) {
            return Err(self.too_large());
        }

        let ext = url_extension(job.url).unwrap_or_else(|| job.params.format.extension().to_string());
        let key = format!("{}.{}", job.job_id, ext);

        let mut writer = self.storage.writer(&key).await?;
        if let Err(e) = self.copy_body(&mut response, &mut writer).await {
            if let Err(abort_err) = writer.abort().await {
                warn!(job_id = job.job_id, key, error = %abort_err, "Failed to discard partial download");
            }
            return Err(e);
        }
        let uploaded = writer.finish().await?;

        info!(job_id = job.job_id, key, size = uploaded.size, "HTTP download finished");

        Ok(Artifact {
            key,
            size: Some(uploaded.size),
        })
    }
}

/// Extension of the last path segment, if it looks like one
fn url_extension(raw: &str) -> Option<String> {
    let url = url::Url::parse(raw).ok()?;
    let segment = url.path_segments()?.next_back()?;
    let (_, ext) = segment.rsplit_once('.')?;

    let plausible = (1..=5).contains(&ext.len()) && ext.chars().all(|c| c.is_ascii_alphanumeric());
    plausible.then(|| ext.to_ascii_lowercase())
}
