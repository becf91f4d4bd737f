use async_trait::async_trait;
use thiserror::Error;

use super::types::{Artifact, ExtractionJob, MediaInfo};
use crate::humanize::{ByteSize, HumanDuration};
use crate::storage::StorageError;

/// Failure of a single engine attempt
#[derive(Debug, Error)]
pub enum ExtractionError {
    #[error("{engine} does not support {feature}")]
    Unsupported { engine: String, feature: String },

    #[error("failed to launch {binary}: {source}")]
    Spawn {
        binary: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{engine} timed out after {timeout}")]
    Timeout { engine: String, timeout: HumanDuration },

    #[error("{engine} exited with {status}: {stderr}")]
    ProcessFailed {
        engine: String,
        status: String,
        stderr: String,
    },

    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("artifact exceeds size limit of {limit}")]
    TooLarge { limit: ByteSize },

    #[error("no artifact produced: {0}")]
    NoArtifact(String),

    #[error("invalid metadata: {0}")]
    Metadata(String),

    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

/// A download backend able to turn a URL into a stored artifact
///
/// Implementations must not retry internally; the fallback executor owns
/// ordering and retry-by-next-engine.
#[async_trait]
pub trait Extractor: Send + Sync {
    /// Identifier this extractor is registered under
    fn engine(&self) -> &str;

    /// Download `job.url` into storage
    async fn extract(&self, job: &ExtractionJob<'_>) -> Result<Artifact, ExtractionError>;

    /// Report the backend version, or why it cannot run here
    async fn check_available(&self) -> Result<String, ExtractionError> {
        Ok(String::from("built-in"))
    }
}

/// Metadata lookup without downloading
#[async_trait]
pub trait MediaProber: Send + Sync {
    async fn probe(&self, url: &str) -> Result<MediaInfo, ExtractionError>;
}
