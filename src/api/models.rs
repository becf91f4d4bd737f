//! API models for mediabox download and status endpoints.
//!
//! - `POST /api/v1/video/download` accepts a [`DownloadRequest`]
//! - Status endpoints render a stored [`JobSnapshot`] as [`TaskStatusData`]
//! - Every success body is wrapped in [`ApiResponse`] (`{"success": true, "data": ...}`)
//!
//! # Download request
//!
//! ```json
//! {
//!   "video_url": "https://www.youtube.com/watch?v=aqz-KE-bpKQ",
//!   "format": "mp4",
//!   "engine": "yt-dlp",
//!   "audio_only": false,
//!   "start_time": "00:01:00",
//!   "end_time": "00:02:30"
//! }
//! ```
//!
//! `engine` is only a hint; unknown engines are ignored and the domain
//! routing decides.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use crate::engines::{Artifact, DownloadParams, EngineId};

#[derive(Debug, Deserialize, Clone)]
pub struct DownloadRequest {
    #[serde(alias = "url")]
    pub video_url: String,
    pub format: String,
    #[serde(default)]
    pub engine: Option<String>,
    #[serde(default)]
    pub audio_only: bool,
    #[serde(default)]
    pub start_time: Option<String>,
    #[serde(default)]
    pub end_time: Option<String>,
}

/// Success envelope
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub data: T,
}

impl<T> ApiResponse<T> {
    pub fn ok(data: T) -> Self {
        Self { success: true, data }
    }
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TaskAccepted {
    pub task_id: String,
    pub status: TaskStatus,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TaskStatusData {
    pub task_id: String,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub progress: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub download_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub engine_used: Option<EngineId>,
    pub attempted_engines: Vec<EngineId>,
}

impl TaskStatusData {
    pub fn from_snapshot(snapshot: &JobSnapshot) -> Self {
        let download_url = (snapshot.status == TaskStatus::Completed)
            .then(|| format!("/api/v1/download/{}", snapshot.task_id));

        Self {
            task_id: snapshot.task_id.clone(),
            status: snapshot.status,
            progress: snapshot.status.progress(),
            download_url,
            error: snapshot.error.clone(),
            engine_used: snapshot.engine_used.clone(),
            attempted_engines: snapshot.attempted_engines.clone(),
        }
    }
}

/// `GET /api/v1/video/info` payload
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct VideoInfo {
    pub title: String,
    pub thumbnail_url: Option<String>,
    /// `m:ss` or `h:mm:ss`
    pub duration: Option<String>,
    pub author: Option<String>,
    /// Compact form such as `1.2M`
    pub view_count: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct InfoQuery {
    pub url: Option<String>,
}

/// Persisted state of one download job
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JobSnapshot {
    pub task_id: String,
    pub status: TaskStatus,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub updated_at: DateTime<Utc>,
    pub video_url: String,
    pub params: DownloadParams,
    pub requested_engine: Option<String>,
    pub correlation_id: String,
    #[serde(default)]
    pub engine_used: Option<EngineId>,
    #[serde(default)]
    pub attempted_engines: Vec<EngineId>,
    #[serde(default)]
    pub artifact: Option<Artifact>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Error)]
#[error("invalid status transition {from:?} -> {to:?}")]
pub struct TransitionError {
    pub from: TaskStatus,
    pub to: TaskStatus,
}

impl JobSnapshot {
    pub fn pending(
        task_id: impl Into<String>,
        video_url: impl Into<String>,
        params: DownloadParams,
        requested_engine: Option<String>,
        correlation_id: impl Into<String>,
    ) -> Self {
        let now = Utc::now();
        Self {
            task_id: task_id.into(),
            status: TaskStatus::Pending,
            created_at: now,
            updated_at: now,
            video_url: video_url.into(),
            params,
            requested_engine,
            correlation_id: correlation_id.into(),
            engine_used: None,
            attempted_engines: Vec::new(),
            artifact: None,
            error: None,
        }
    }

    fn transition(&mut self, to: TaskStatus) -> Result<(), TransitionError> {
        if !self.status.can_transition_to(to) {
            return Err(TransitionError { from: self.status, to });
        }
        self.status = to;
        self.updated_at = Utc::now();
        Ok(())
    }

    pub fn mark_processing(&mut self) -> Result<(), TransitionError> {
        self.transition(TaskStatus::Processing)
    }

    pub fn mark_completed(
        &mut self,
        engine: EngineId,
        artifact: Artifact,
        attempted: Vec<EngineId>,
    ) -> Result<(), TransitionError> {
        self.transition(TaskStatus::Completed)?;
        self.engine_used = Some(engine);
        self.artifact = Some(artifact);
        self.attempted_engines = attempted;
        self.error = None;
        Ok(())
    }

    pub fn mark_failed(&mut self, message: String, attempted: Vec<EngineId>) -> Result<(), TransitionError> {
        self.transition(TaskStatus::Failed)?;
        self.error = Some(message);
        self.attempted_engines = attempted;
        Ok(())
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl TaskStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, TaskStatus::Completed | TaskStatus::Failed)
    }

    /// pending → processing → completed | failed
    pub fn can_transition_to(&self, next: TaskStatus) -> bool {
        matches!(
            (self, next),
            (TaskStatus::Pending, TaskStatus::Processing)
                | (TaskStatus::Processing, TaskStatus::Completed)
                | (TaskStatus::Processing, TaskStatus::Failed)
        )
    }

    /// Coarse progress reported to clients; engines do not stream progress
    pub fn progress(&self) -> Option<u8> {
        match self {
            TaskStatus::Pending => Some(0),
            TaskStatus::Processing => Some(50),
            TaskStatus::Completed => Some(100),
            TaskStatus::Failed => None,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub code: &'static str,
    pub message: String,
}

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: HashMap<String, String>,
    pub version: String,
}
