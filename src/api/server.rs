use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router, middleware,
    routing::{get, post},
};
use axum::http::{HeaderValue, Method};
use tokio::net::TcpListener;
use tower::limit::ConcurrencyLimitLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::decompression::RequestDecompressionLayer;
use tracing::{error, info, warn};

use super::{
    auth::{propagate_correlation_id, require_api_key},
    services::{download_artifact, health, metrics, submit_download, task_status, video_info},
    state::AppState,
};
use crate::config::{Config, CorsConfig};
use crate::engines::BuiltinEngines;
use crate::ledger::{FjallStore, RetentionPolicy};
use crate::observability::Metrics;
use crate::queue::{FjallQueue, TaskBroker};
use crate::storage::StorageClient;
use crate::worker::{FallbackExecutor, WorkerContext, spawn_workers};

type AnyError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// HTTP routes with auth, CORS, decompression and the global concurrency cap
pub fn router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/v1/video/download", post(submit_download))
        .route("/api/v1/video/task/{task_id}", get(task_status))
        .route("/api/v1/video/info", get(video_info))
        .route("/api/v1/download/{task_id}", get(download_artifact))
        .route("/operators/metrics", get(metrics))
        .route_layer(middleware::from_fn_with_state(state.clone(), require_api_key));

    let cors = cors_layer(&state.config.cors);
    let max_concurrent = state.config.server.max_concurrent_requests;

    Router::new()
        .route("/health", get(health))
        .route("/api/v1/health", get(health))
        .merge(protected)
        .with_state(state)
        .layer(middleware::from_fn(propagate_correlation_id))
        // Handles Content-Encoding transparently before handlers read the body
        .layer(RequestDecompressionLayer::new())
        .layer(cors)
        .layer(ConcurrencyLimitLayer::new(max_concurrent))
}

fn cors_layer(config: &CorsConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .allowed_origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                warn!(origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers(Any)
}

/// Open stores, start workers, recover pending tasks and serve until shutdown
pub async fn run(config: Config, address_override: Option<SocketAddr>) -> Result<(), AnyError> {
    let address = address_override.unwrap_or(config.server.bind_addr);
    let config = Arc::new(config);

    info!(path = %config.server.fjall_path.display(), "Opening Fjall store");
    let store = Arc::new(
        FjallStore::open(&config.server.fjall_path).map_err(|e| format!("Failed to open Fjall store: {}", e))?,
    );

    info!(path = %config.server.queue_path.display(), "Opening FjallQueue");
    let queue = Arc::new(
        FjallQueue::open(&config.server.queue_path).map_err(|e| format!("Failed to open queue: {}", e))?,
    );

    let storage = Arc::new(
        StorageClient::local(&config.storage.download_dir)
            .map_err(|e| format!("Failed to open download directory: {}", e))?,
    );
    info!(root = %storage.root().display(), "Artifact storage ready");

    let registry = Arc::new(config.engine_registry()?);
    let engines = BuiltinEngines::from_config(&config.engines, storage.clone())?;
    engines.extractors.check_all().await;

    let (broker, worker_receivers) =
        TaskBroker::new(queue.clone(), config.worker.num_workers, config.worker.channel_size);
    let broker = Arc::new(broker);
    let metrics = Arc::new(Metrics::new());

    let worker_ctx = Arc::new(WorkerContext {
        registry,
        executor: Arc::new(FallbackExecutor::new(engines.extractors)),
        store: store.clone(),
        broker: broker.clone(),
        metrics: metrics.clone(),
    });
    let workers = spawn_workers(worker_ctx, worker_receivers);
    info!(count = workers.len(), "Workers started");

    // Workers must be consuming before redelivery, or a full channel blocks startup
    broker.recover().await?;

    spawn_pruner(store.clone(), queue, &config);

    let mut state = AppState::new(config.clone(), store.clone(), storage, broker, metrics);
    if let Some(prober) = engines.prober {
        state = state.with_prober(prober);
    }
    if !state.api_keys.is_enabled() {
        warn!("No API keys configured, authentication is disabled");
    }

    let app = router(state);

    let listener = TcpListener::bind(address).await?;
    info!(%address, "mediabox API listening");

    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    if let Err(e) = store.persist() {
        error!(error = %e, "Failed to flush ledger on shutdown");
    }
    info!("Server stopped");

    Ok(())
}

/// Periodic retention pass over the ledger and the dead-letter partition
fn spawn_pruner(store: Arc<FjallStore>, queue: Arc<FjallQueue>, config: &Config) {
    let policy = RetentionPolicy::from(&config.retention);
    let period = config.retention.prune_interval.as_duration();

    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        loop {
            ticker.tick().await;
            match store.prune_expired(policy) {
                Ok(stats) => info!(
                    jobs = stats.jobs_pruned,
                    idempotency = stats.idempotency_pruned,
                    "Pruned expired ledger entries"
                ),
                Err(e) => error!(error = %e, "Ledger pruning failed"),
            }
            if let Err(e) = queue.prune_dlq(chrono::Utc::now() - policy.job_ttl) {
                error!(error = %e, "Dead-letter pruning failed");
            }
        }
    });
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};
        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutdown signal received");
}
