use axum::{
    Json,
    body::Body,
    extract::{Path, Query, State},
    http::{HeaderMap, HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use std::collections::HashMap;
use tracing::{info, warn};
use uuid::Uuid;

use super::{
    error::ApiError,
    models::{
        ApiResponse, DownloadRequest, HealthResponse, InfoQuery, JobSnapshot, TaskAccepted, TaskStatus,
        TaskStatusData, VideoInfo,
    },
    state::AppState,
    utils::{self, IDEMPOTENCY_KEY_HEADER},
    validation::validate_download,
};
use crate::engines::{DownloadParams, MediaFormat, MediaInfo};
use crate::queue::DownloadTask;

/// Job submission endpoint (POST /api/v1/video/download)
///
/// ## Flow:
/// 1. Validate Content-Type
/// 2. Idempotency: a known `X-Mediabox-Idempotency-Key` returns the existing job
/// 3. Read body, enforce `server.api.max_payload_bytes`
/// 4. Validate URL, format and trim window into `DownloadParams`
/// 5. Generate UUIDv7 job id and claim the idempotency key atomically
/// 6. Persist a pending snapshot and enqueue the task; a failure releases the key
/// 7. Return 202 Accepted
///
/// The engine hint is stored as given; unsupported hints are dropped by the
/// selector when the worker picks the job up.
pub async fn submit_download(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: Body,
) -> Result<impl IntoResponse, ApiError> {
    let content_type = utils::header_value(&headers, header::CONTENT_TYPE.as_str())
        .ok_or_else(|| ApiError::InvalidPayload("missing Content-Type header".into()))?;
    utils::parse_content_type(content_type)?;

    let correlation_id = utils::correlation_id(&headers);
    let idempotency_key = utils::header_value(&headers, IDEMPOTENCY_KEY_HEADER).map(str::to_owned);

    if let Some(key) = &idempotency_key {
        if let Some(existing_id) = state.store.get_idempotent(key)? {
            if let Some(existing) = state.store.get(&existing_id)? {
                info!(correlation_id = %correlation_id, task_id = %existing.task_id, "Idempotent resubmission");
                return Ok(accepted(existing.task_id, existing.status));
            }
        }
    }

    let max_payload = state.config.server.api.max_payload_bytes.as_u64() as usize;
    let body_bytes = utils::read_body_limited(body, max_payload).await?;

    let request: DownloadRequest = serde_json::from_slice(&body_bytes)?;
    let params = validate_download(&request).map_err(|e| ApiError::InvalidPayload(e.to_string()))?;
    let requested_engine = request
        .engine
        .map(|engine| engine.trim().to_string())
        .filter(|engine| !engine.is_empty());

    let task_id = Uuid::now_v7().to_string();
    let video_url = request.video_url.trim().to_string();

    // A concurrent submit may have claimed the key since the fast path above
    if let Some(key) = &idempotency_key {
        if let Some(existing_id) = state.store.claim_idempotency(key, &task_id)? {
            // The owner may not have written its snapshot yet; it is pending either way
            let status = state
                .store
                .get(&existing_id)?
                .map_or(TaskStatus::Pending, |existing| existing.status);
            info!(correlation_id = %correlation_id, task_id = %existing_id, "Idempotent resubmission");
            return Ok(accepted(existing_id, status));
        }
    }

    let created = create_job(&state, &task_id, &video_url, params, requested_engine, &correlation_id).await;
    let seq = match created {
        Ok(seq) => seq,
        Err(e) => {
            if let Some(key) = &idempotency_key {
                if let Err(release_err) = state.store.release_idempotency(key, &task_id) {
                    warn!(key = %key, error = %release_err, "Failed to release idempotency key");
                }
            }
            return Err(e);
        }
    };
    state.metrics.job_accepted();

    info!(correlation_id = %correlation_id, task_id = %task_id, seq, url = %video_url, "Download job accepted");

    Ok(accepted(task_id, TaskStatus::Pending))
}

/// Persist the pending snapshot and hand the task to the broker
async fn create_job(
    state: &AppState,
    task_id: &str,
    video_url: &str,
    params: DownloadParams,
    requested_engine: Option<String>,
    correlation_id: &str,
) -> Result<u64, ApiError> {
    let snapshot = JobSnapshot::pending(task_id, video_url, params.clone(), requested_engine.clone(), correlation_id);
    state.store.upsert(&snapshot)?;

    let task = DownloadTask::new(task_id, video_url, params, requested_engine, correlation_id);
    Ok(state.broker.enqueue(task).await?)
}

fn accepted(task_id: String, status: TaskStatus) -> (StatusCode, Json<ApiResponse<TaskAccepted>>) {
    (
        StatusCode::ACCEPTED,
        Json(ApiResponse::ok(TaskAccepted { task_id, status })),
    )
}

/// Job status endpoint (GET /api/v1/video/task/{task_id})
pub async fn task_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let snapshot = load_job(&state, &task_id)?;
    Ok(Json(ApiResponse::ok(TaskStatusData::from_snapshot(&snapshot))))
}

/// Artifact download (GET /api/v1/download/{task_id})
///
/// Streams the stored file as `download-{task_id}.{ext}`. 409 until the job
/// has completed.
pub async fn download_artifact(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<Response, ApiError> {
    let snapshot = load_job(&state, &task_id)?;

    if snapshot.status != TaskStatus::Completed {
        let detail = match &snapshot.error {
            Some(error) => format!("task {task_id} failed: {error}"),
            None => format!("task {task_id} is not completed yet"),
        };
        return Err(ApiError::Conflict(detail));
    }

    let artifact = snapshot
        .artifact
        .ok_or_else(|| ApiError::Internal(format!("task {task_id} completed without an artifact")))?;

    let extension = artifact
        .extension()
        .unwrap_or_else(|| snapshot.params.format.extension())
        .to_ascii_lowercase();
    let content_type = extension
        .parse::<MediaFormat>()
        .map(|format| format.mime_type())
        .unwrap_or("application/octet-stream");

    let object = state.storage.get(&artifact.key).await?;
    let size = object.meta.size;

    let mut response = Body::from_stream(object.into_stream()).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    headers.insert(header::CONTENT_LENGTH, HeaderValue::from(size));
    if let Ok(disposition) = HeaderValue::from_str(&format!("attachment; filename=\"download-{task_id}.{extension}\"")) {
        headers.insert(header::CONTENT_DISPOSITION, disposition);
    }

    info!(task_id = %task_id, key = %artifact.key, size, "Serving artifact");
    Ok(response)
}

/// Metadata probe (GET /api/v1/video/info?url=...)
pub async fn video_info(
    State(state): State<AppState>,
    Query(query): Query<InfoQuery>,
) -> Result<impl IntoResponse, ApiError> {
    let url = query
        .url
        .as_deref()
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .ok_or_else(|| ApiError::InvalidPayload("query parameter 'url' is required".into()))?;

    let parsed = url::Url::parse(url).map_err(|_| ApiError::InvalidPayload(format!("invalid url: {url}")))?;
    if !matches!(parsed.scheme(), "http" | "https") {
        return Err(ApiError::InvalidPayload("url must use http or https".into()));
    }

    let prober = state
        .prober
        .as_ref()
        .ok_or_else(|| ApiError::Unavailable("no metadata engine configured".into()))?;

    let info = prober.probe(url).await.map_err(|e| {
        warn!(url, error = %e, "Metadata probe failed");
        ApiError::UpstreamFailed(e.to_string())
    })?;

    Ok(Json(ApiResponse::ok(video_info_view(info))))
}

pub(crate) fn video_info_view(info: MediaInfo) -> VideoInfo {
    VideoInfo {
        title: info.title,
        thumbnail_url: info.thumbnail,
        duration: info.duration_secs.map(utils::format_duration),
        author: info.author,
        view_count: info.view_count.map(utils::compact_count),
    }
}

/// Operator counters (GET /operators/metrics)
pub async fn metrics(State(state): State<AppState>) -> impl IntoResponse {
    Json(ApiResponse::ok(state.metrics.snapshot()))
}

/// Health check endpoint (GET /health, GET /api/v1/health)
///
/// Returns 503 Service Unavailable if any component is unhealthy.
pub async fn health(State(state): State<AppState>) -> impl IntoResponse {
    let mut components = HashMap::new();

    let status = |healthy: bool| (if healthy { "healthy" } else { "unhealthy" }).to_string();

    components.insert("api".to_string(), status(true));
    components.insert("fjall".to_string(), status(state.store.health_check().is_ok()));
    components.insert(
        "task_broker".to_string(),
        status(state.broker.health_check() && state.broker.queue().health_check().is_ok()),
    );
    components.insert("storage".to_string(), status(state.storage.is_healthy()));

    let all_healthy = components.values().all(|s| s == "healthy");
    let status_code = if all_healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    let response = HealthResponse {
        status: status(all_healthy),
        components,
        version: env!("CARGO_PKG_VERSION").to_string(),
    };

    (status_code, Json(response))
}

fn load_job(state: &AppState, task_id: &str) -> Result<JobSnapshot, ApiError> {
    state
        .store
        .get(task_id)?
        .ok_or_else(|| ApiError::NotFound(format!("task {task_id}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_info_view() {
        let view = video_info_view(MediaInfo {
            title: "Clip".to_string(),
            thumbnail: Some("https://img.test/t.jpg".to_string()),
            duration_secs: Some(624),
            author: Some("Someone".to_string()),
            view_count: Some(1_200_000),
        });

        assert_eq!(view.duration.as_deref(), Some("10:24"));
        assert_eq!(view.view_count.as_deref(), Some("1.2M"));

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["thumbnailUrl"], "https://img.test/t.jpg");
        assert_eq!(json["viewCount"], "1.2M");
    }
}
