use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Request, StatusCode, header},
    response::Response,
};
use bytes::Bytes;
use flate2::{Compression, write::GzEncoder};
use serde_json::{Value, json};
use std::io::Write;
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::mpsc;
use tower::ServiceExt; // for `oneshot`

use mediabox::api::{AppState, router};
use mediabox::api::models::JobSnapshot;
use mediabox::config::Config;
use mediabox::engines::{Artifact, DownloadParams, EngineId, ExtractionError, MediaFormat, MediaInfo, MediaProber};
use mediabox::ledger::FjallStore;
use mediabox::observability::Metrics;
use mediabox::queue::{FjallQueue, TaskBroker, TaskEnvelope};
use mediabox::storage::StorageClient;

/// Isolated dependencies; receivers are held so the broker stays healthy
struct TestApp {
    app: Router,
    store: Arc<FjallStore>,
    storage: Arc<StorageClient>,
    receivers: Vec<mpsc::Receiver<TaskEnvelope>>,
    _temp_dir: TempDir,
}

struct StaticProber;

#[async_trait]
impl MediaProber for StaticProber {
    async fn probe(&self, url: &str) -> Result<MediaInfo, ExtractionError> {
        if url.contains("broken") {
            return Err(ExtractionError::Metadata("no formats".to_string()));
        }
        Ok(MediaInfo {
            title: "Big Buck Bunny".to_string(),
            thumbnail: Some("https://img.test/bbb.jpg".to_string()),
            duration_secs: Some(596),
            author: Some("Blender".to_string()),
            view_count: Some(1_234_567),
        })
    }
}

fn build_test_app(api_keys: &[&str], with_prober: bool) -> TestApp {
    let temp_dir = TempDir::new().expect("Failed to create temp dir");

    let store = Arc::new(FjallStore::open(temp_dir.path().join("ledger")).expect("Failed to open test Fjall store"));
    let queue = Arc::new(FjallQueue::open(temp_dir.path().join("queue")).expect("Failed to open test queue"));
    let storage = Arc::new(StorageClient::local(temp_dir.path().join("downloads")).expect("Failed to open storage"));

    let (broker, receivers) = TaskBroker::new(queue, 2, 100);

    let mut config = Config::default();
    config.security.api_keys = api_keys.iter().map(|k| k.to_string()).collect();

    let mut state = AppState::new(
        Arc::new(config),
        store.clone(),
        storage.clone(),
        Arc::new(broker),
        Arc::new(Metrics::new()),
    );
    if with_prober {
        state = state.with_prober(Arc::new(StaticProber));
    }

    TestApp {
        app: router(state),
        store,
        storage,
        receivers,
        _temp_dir: temp_dir,
    }
}

fn download_request(body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/video/download")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn json_body(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn test_submit_download_success() {
    let mut t = build_test_app(&[], false);

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/video/download")
        .header(header::CONTENT_TYPE, "application/json; charset=utf-8")
        .header("X-Correlation-ID", "corr-123")
        .body(Body::from(
            json!({
                "video_url": "https://www.youtube.com/watch?v=aqz-KE-bpKQ",
                "format": "mp4",
                "engine": "yt-dlp",
                "start_time": "00:00:10",
                "end_time": "00:00:20"
            })
            .to_string(),
        ))
        .unwrap();

    let response = t.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::ACCEPTED);
    assert_eq!(response.headers()["x-correlation-id"], "corr-123");

    let body = json_body(response).await;
    assert_eq!(body["success"], true);
    assert_eq!(body["data"]["status"], "pending");
    let task_id = body["data"]["task_id"].as_str().unwrap().to_string();

    let snapshot = t.store.get(&task_id).unwrap().unwrap();
    assert_eq!(snapshot.correlation_id, "corr-123");
    assert_eq!(snapshot.requested_engine.as_deref(), Some("yt-dlp"));
    assert_eq!(snapshot.params.trim.unwrap().start_secs, Some(10));

    // Round-robin puts the first task on worker 0
    let envelope = t.receivers[0].recv().await.unwrap();
    assert_eq!(envelope.task.job_id, task_id);
}

#[tokio::test]
async fn test_submit_generates_correlation_id() {
    let t = build_test_app(&[], false);

    let response = t
        .app
        .clone()
        .oneshot(download_request(json!({"url": "https://vimeo.com/1", "format": "webm"})))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let header = response.headers()["x-correlation-id"].to_str().unwrap();
    assert!(uuid::Uuid::parse_str(header).is_ok());
}

#[tokio::test]
async fn test_submit_idempotency() {
    let t = build_test_app(&[], false);

    let request = || {
        Request::builder()
            .method("POST")
            .uri("/api/v1/video/download")
            .header(header::CONTENT_TYPE, "application/json")
            .header("X-Mediabox-Idempotency-Key", "same-key")
            .body(Body::from(
                json!({"video_url": "https://youtu.be/abc", "format": "mp3"}).to_string(),
            ))
            .unwrap()
    };

    let first = json_body(t.app.clone().oneshot(request()).await.unwrap()).await;
    let second = json_body(t.app.clone().oneshot(request()).await.unwrap()).await;

    assert_eq!(first["data"]["task_id"], second["data"]["task_id"]);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_submits_with_same_key_create_one_job() {
    let mut t = build_test_app(&[], false);

    let handles: Vec<_> = (0..8)
        .map(|_| {
            let app = t.app.clone();
            tokio::spawn(async move {
                let request = Request::builder()
                    .method("POST")
                    .uri("/api/v1/video/download")
                    .header(header::CONTENT_TYPE, "application/json")
                    .header("X-Mediabox-Idempotency-Key", "racing-key")
                    .body(Body::from(
                        json!({"video_url": "https://youtu.be/abc", "format": "mp4"}).to_string(),
                    ))
                    .unwrap();
                let response = app.oneshot(request).await.unwrap();
                assert_eq!(response.status(), StatusCode::ACCEPTED);
                json_body(response).await["data"]["task_id"].clone()
            })
        })
        .collect();

    let mut task_ids = Vec::new();
    for handle in handles {
        task_ids.push(handle.await.unwrap());
    }
    assert!(task_ids.iter().all(|id| *id == task_ids[0]), "{task_ids:?}");

    let enqueued: usize = t
        .receivers
        .iter_mut()
        .map(|rx| std::iter::from_fn(|| rx.try_recv().ok()).count())
        .sum();
    assert_eq!(enqueued, 1);
}

#[tokio::test]
async fn test_submit_rejects_wrong_content_type() {
    let t = build_test_app(&[], false);

    let request = Request::builder()
        .method("POST")
        .uri("/api/v1/video/download")
        .header(header::CONTENT_TYPE, "text/plain")
        .body(Body::from("{}"))
        .unwrap();

    let response = t.app.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let body = json_body(response).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["code"], "INVALID_PAYLOAD");
}

#[tokio::test]
async fn test_submit_rejects_invalid_payloads() {
    let t = build_test_app(&[], false);

    let cases = [
        json!({"video_url": "https://youtu.be/abc", "format": "exe"}),
        json!({"video_url": "not a url", "format": "mp4"}),
        json!({"video_url": "ftp://example.com/a.mp4", "format": "mp4"}),
        json!({"video_url": "https://youtu.be/abc", "format": "mp4", "start_time": "00:02:00", "end_time": "00:01:00"}),
        json!({"video_url": "https://youtu.be/abc", "format": "mp4", "start_time": "2 minutes"}),
        json!({"format": "mp4"}),
    ];

    for case in cases {
        let response = t.app.clone().oneshot(download_request(case.clone())).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{case}");
    }
}

#[tokio::test]
async fn test_submit_rejects_oversized_body() {
    let t = build_test_app(&[], false);

    let padding = "x".repeat(128 * 1024);
    let response = t
        .app
        .clone()
        .oneshot(download_request(json!({
            "video_url": format!("https://example.com/{padding}"),
            "format": "mp4"
        })))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

fn gzip(data: &[u8]) -> Vec<u8> {
    let mut encoder = GzEncoder::new(Vec::new(), Compression::best());
    encoder.write_all(data).unwrap();
    encoder.finish().unwrap()
}

fn gzip_download_request(compressed: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/v1/video/download")
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::CONTENT_ENCODING, "gzip")
        .body(Body::from(compressed))
        .unwrap()
}

#[tokio::test]
async fn test_submit_accepts_gzip_body() {
    let t = build_test_app(&[], false);

    let body = json!({"video_url": "https://youtu.be/abc", "format": "mp4"}).to_string();
    let response = t
        .app
        .clone()
        .oneshot(gzip_download_request(gzip(body.as_bytes())))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
}

#[tokio::test]
async fn test_submit_rejects_body_inflating_past_limit() {
    let t = build_test_app(&[], false);

    // 16 MB of spaces compresses to a few KB, well under the 64KB cap on the wire
    let compressed = gzip(&vec![b' '; 16 * 1024 * 1024]);
    assert!(compressed.len() < 64 * 1024);

    let response = t.app.clone().oneshot(gzip_download_request(compressed)).await.unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let body = json_body(response).await;
    assert_eq!(body["code"], "PAYLOAD_TOO_LARGE");
}

#[tokio::test]
async fn test_task_status() {
    let t = build_test_app(&[], false);

    let accepted = json_body(
        t.app
            .clone()
            .oneshot(download_request(json!({"video_url": "https://youtu.be/abc", "format": "mp4"})))
            .await
            .unwrap(),
    )
    .await;
    let task_id = accepted["data"]["task_id"].as_str().unwrap();

    let response = t
        .app
        .clone()
        .oneshot(get(&format!("/api/v1/video/task/{task_id}")))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["data"]["task_id"], task_id);
    assert_eq!(body["data"]["status"], "pending");
    assert_eq!(body["data"]["progress"], 0);
    assert!(body["data"].get("download_url").is_none());
}

#[tokio::test]
async fn test_task_status_not_found() {
    let t = build_test_app(&[], false);

    let response = t.app.clone().oneshot(get("/api/v1/video/task/nope")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(json_body(response).await["code"], "NOT_FOUND");
}

#[tokio::test]
async fn test_download_artifact() {
    let t = build_test_app(&[], false);

    let mut snapshot = JobSnapshot::pending(
        "job-42",
        "https://youtu.be/abc",
        DownloadParams::new(MediaFormat::Mp3),
        None,
        "cid",
    );
    t.store.upsert(&snapshot).unwrap();

    // Not finished yet
    let response = t.app.clone().oneshot(get("/api/v1/download/job-42")).await.unwrap();
    assert_eq!(response.status(), StatusCode::CONFLICT);

    t.storage
        .upload("job-42.mp3", Bytes::from_static(b"ID3 fake audio"))
        .await
        .unwrap();
    snapshot.mark_processing().unwrap();
    snapshot
        .mark_completed(
            EngineId::from("yt-dlp"),
            Artifact {
                key: "job-42.mp3".to_string(),
                size: Some(14),
            },
            vec![EngineId::from("yt-dlp")],
        )
        .unwrap();
    t.store.upsert(&snapshot).unwrap();

    let response = t.app.clone().oneshot(get("/api/v1/download/job-42")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()[header::CONTENT_TYPE], "audio/mpeg");
    assert_eq!(
        response.headers()[header::CONTENT_DISPOSITION],
        "attachment; filename=\"download-job-42.mp3\""
    );

    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    assert_eq!(&bytes[..], b"ID3 fake audio");
}

#[tokio::test]
async fn test_download_unknown_task() {
    let t = build_test_app(&[], false);

    let response = t.app.clone().oneshot(get("/api/v1/download/missing")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_api_key_required() {
    let t = build_test_app(&["secret"], false);

    let response = t.app.clone().oneshot(get("/api/v1/video/task/x")).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let wrong = Request::builder()
        .uri("/api/v1/video/task/x")
        .header("X-API-Key", "guess")
        .body(Body::empty())
        .unwrap();
    let response = t.app.clone().oneshot(wrong).await.unwrap();
    assert_eq!(response.status(), StatusCode::FORBIDDEN);
    assert_eq!(json_body(response).await["code"], "FORBIDDEN");

    let right = Request::builder()
        .uri("/api/v1/video/task/x")
        .header("X-API-Key", "secret")
        .body(Body::empty())
        .unwrap();
    let response = t.app.clone().oneshot(right).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Health stays public
    let response = t.app.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_video_info() {
    let t = build_test_app(&[], true);

    let response = t
        .app
        .clone()
        .oneshot(get("/api/v1/video/info?url=https%3A%2F%2Fyoutu.be%2Fabc"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = json_body(response).await;
    assert_eq!(body["data"]["title"], "Big Buck Bunny");
    assert_eq!(body["data"]["thumbnailUrl"], "https://img.test/bbb.jpg");
    assert_eq!(body["data"]["duration"], "9:56");
    assert_eq!(body["data"]["viewCount"], "1.2M");

    let response = t.app.clone().oneshot(get("/api/v1/video/info")).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = t
        .app
        .clone()
        .oneshot(get("/api/v1/video/info?url=https%3A%2F%2Fbroken.test%2Fv"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
}

#[tokio::test]
async fn test_video_info_without_prober() {
    let t = build_test_app(&[], false);

    let response = t
        .app
        .clone()
        .oneshot(get("/api/v1/video/info?url=https%3A%2F%2Fyoutu.be%2Fabc"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_health_endpoint() {
    let t = build_test_app(&[], false);

    for uri in ["/health", "/api/v1/health"] {
        let response = t.app.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = json_body(response).await;
        assert_eq!(body["status"], "healthy");
        for component in ["api", "fjall", "task_broker", "storage"] {
            assert_eq!(body["components"][component], "healthy", "{component}");
        }
        assert_eq!(body["version"], env!("CARGO_PKG_VERSION"));
    }
}

#[tokio::test]
async fn test_operator_metrics() {
    let t = build_test_app(&[], false);

    t.app
        .clone()
        .oneshot(download_request(json!({"video_url": "https://youtu.be/abc", "format": "mp4"})))
        .await
        .unwrap();

    let response = t.app.clone().oneshot(get("/operators/metrics")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(json_body(response).await["data"]["jobs_accepted"], 1);
}
