//! Queue payloads, stored as JSON

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::engines::{DownloadParams, EngineId};

/// One accepted download job as handed to the worker pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadTask {
    pub job_id: String,
    pub video_url: String,
    pub params: DownloadParams,
    #[serde(default)]
    pub requested_engine: Option<String>,
    pub correlation_id: String,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub enqueued_at: DateTime<Utc>,
}

impl DownloadTask {
    pub fn new(
        job_id: impl Into<String>,
        video_url: impl Into<String>,
        params: DownloadParams,
        requested_engine: Option<String>,
        correlation_id: impl Into<String>,
    ) -> Self {
        Self {
            job_id: job_id.into(),
            video_url: video_url.into(),
            params,
            requested_engine,
            correlation_id: correlation_id.into(),
            enqueued_at: Utc::now(),
        }
    }
}

/// A job every engine failed on, kept for inspection
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeadLetterTask {
    pub task: DownloadTask,
    pub failure_message: String,
    pub attempted_engines: Vec<EngineId>,
    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub failed_at: DateTime<Utc>,
}
