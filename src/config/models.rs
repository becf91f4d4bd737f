use crate::engines::types::{BUILTIN_ENGINES, GALLERY_DL, HTTP, YT_DLP};
use crate::humanize::{ByteSize, HumanDuration};
use serde::{Deserialize, Serialize};
use std::net::{Ipv4Addr, SocketAddr};
use std::path::PathBuf;

/// Top-level configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub engines: EnginesConfig,
    #[serde(default)]
    pub worker: WorkerConfig,
    #[serde(default)]
    pub security: SecurityConfig,
    #[serde(default)]
    pub cors: CorsConfig,
    #[serde(default)]
    pub retention: RetentionConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Server configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: SocketAddr,
    /// Job ledger location
    #[serde(default = "default_fjall_path")]
    pub fjall_path: PathBuf,
    /// Durable work queue location
    #[serde(default = "default_queue_path")]
    pub queue_path: PathBuf,
    #[serde(default = "default_max_concurrent_requests")]
    pub max_concurrent_requests: usize,
    #[serde(default)]
    pub api: ApiLimits,
}

/// API request limits
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ApiLimits {
    #[serde(default = "default_max_payload_bytes")]
    pub max_payload_bytes: ByteSize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
            fjall_path: default_fjall_path(),
            queue_path: default_queue_path(),
            max_concurrent_requests: default_max_concurrent_requests(),
            api: ApiLimits::default(),
        }
    }
}

impl Default for ApiLimits {
    fn default() -> Self {
        Self {
            max_payload_bytes: default_max_payload_bytes(),
        }
    }
}

fn default_bind_addr() -> SocketAddr {
    SocketAddr::from((Ipv4Addr::UNSPECIFIED, 8080))
}

fn default_fjall_path() -> PathBuf {
    PathBuf::from("data/ledger")
}

fn default_queue_path() -> PathBuf {
    PathBuf::from("data/queue")
}

fn default_max_concurrent_requests() -> usize {
    256
}

fn default_max_payload_bytes() -> ByteSize {
    ByteSize(64 * 1024) // 64 KB
}

/// Where finished artifacts are written
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StorageConfig {
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
        }
    }
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("data/downloads")
}

/// Engine catalogue and domain routing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EnginesConfig {
    /// Engines clients may request; also the set of extractors built at startup
    #[serde(default = "default_supported")]
    pub supported: Vec<String>,
    /// Fallback list for hosts without a route
    #[serde(default = "default_engine_list")]
    pub default_engines: Vec<String>,
    #[serde(default = "default_routes")]
    pub routes: Vec<EngineRoute>,
    /// Timeout for `--version` checks and metadata probes
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout: HumanDuration,
    #[serde(default = "default_ytdlp")]
    pub ytdlp: ProcessEngineConfig,
    #[serde(default = "default_gallery_dl")]
    pub gallery_dl: ProcessEngineConfig,
    #[serde(default)]
    pub http: HttpEngineConfig,
}

/// `[[engines.routes]]` entry
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct EngineRoute {
    pub domain: String,
    pub engines: Vec<String>,
}

/// Settings for an engine driven through an external binary
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProcessEngineConfig {
    pub binary: String,
    #[serde(default = "default_process_timeout")]
    pub timeout: HumanDuration,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct HttpEngineConfig {
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: HumanDuration,
    #[serde(default = "default_process_timeout")]
    pub request_timeout: HumanDuration,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_max_download_bytes")]
    pub max_bytes: ByteSize,
}

impl Default for EnginesConfig {
    fn default() -> Self {
        Self {
            supported: default_supported(),
            default_engines: default_engine_list(),
            routes: default_routes(),
            probe_timeout: default_probe_timeout(),
            ytdlp: default_ytdlp(),
            gallery_dl: default_gallery_dl(),
            http: HttpEngineConfig::default(),
        }
    }
}

impl Default for HttpEngineConfig {
    fn default() -> Self {
        Self {
            connect_timeout: default_connect_timeout(),
            request_timeout: default_process_timeout(),
            user_agent: default_user_agent(),
            max_bytes: default_max_download_bytes(),
        }
    }
}

fn default_supported() -> Vec<String> {
    BUILTIN_ENGINES.iter().map(|e| e.to_string()).collect()
}

fn default_engine_list() -> Vec<String> {
    vec![YT_DLP.to_string(), GALLERY_DL.to_string(), HTTP.to_string()]
}

fn default_routes() -> Vec<EngineRoute> {
    ["youtube.com", "youtu.be", "vimeo.com"]
        .into_iter()
        .map(|domain| EngineRoute {
            domain: domain.to_string(),
            engines: vec![YT_DLP.to_string()],
        })
        .collect()
}

fn default_probe_timeout() -> HumanDuration {
    HumanDuration::from_secs(30)
}

fn default_process_timeout() -> HumanDuration {
    HumanDuration::from_secs(30 * 60)
}

fn default_connect_timeout() -> HumanDuration {
    HumanDuration::from_secs(10)
}

fn default_ytdlp() -> ProcessEngineConfig {
    ProcessEngineConfig {
        binary: YT_DLP.to_string(),
        timeout: default_process_timeout(),
    }
}

fn default_gallery_dl() -> ProcessEngineConfig {
    ProcessEngineConfig {
        binary: GALLERY_DL.to_string(),
        timeout: HumanDuration::from_secs(10 * 60),
    }
}

fn default_user_agent() -> String {
    format!("mediabox/{}", env!("CARGO_PKG_VERSION"))
}

fn default_max_download_bytes() -> ByteSize {
    ByteSize(2 * 1024 * 1024 * 1024) // 2 GB
}

/// Worker pool sizing
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct WorkerConfig {
    #[serde(default = "default_num_workers")]
    pub num_workers: usize,
    /// Per-worker channel capacity
    #[serde(default = "default_channel_size")]
    pub channel_size: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            num_workers: default_num_workers(),
            channel_size: default_channel_size(),
        }
    }
}

fn default_num_workers() -> usize {
    4
}

fn default_channel_size() -> usize {
    100
}

/// API key authentication
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct SecurityConfig {
    /// Accepted `X-API-Key` values (loaded from environment, not from config file).
    /// Empty disables authentication.
    #[serde(skip)]
    pub api_keys: Vec<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct CorsConfig {
    #[serde(default = "default_allowed_origins")]
    pub allowed_origins: Vec<String>,
}

impl Default for CorsConfig {
    fn default() -> Self {
        Self {
            allowed_origins: default_allowed_origins(),
        }
    }
}

fn default_allowed_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:3001".to_string(),
    ]
}

/// Retention configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetentionConfig {
    /// Terminal job snapshots older than this are pruned
    #[serde(default = "default_job_ttl_days")]
    pub job_ttl_days: u32,
    #[serde(default = "default_idempotency_ttl_days")]
    pub idempotency_ttl_days: u32,
    #[serde(default = "default_prune_interval")]
    pub prune_interval: HumanDuration,
}

impl Default for RetentionConfig {
    fn default() -> Self {
        Self {
            job_ttl_days: default_job_ttl_days(),
            idempotency_ttl_days: default_idempotency_ttl_days(),
            prune_interval: default_prune_interval(),
        }
    }
}

fn default_job_ttl_days() -> u32 {
    30
}

fn default_idempotency_ttl_days() -> u32 {
    14
}

fn default_prune_interval() -> HumanDuration {
    HumanDuration::from_secs(3600)
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Telemetry configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    /// Used when `RUST_LOG` is not set
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
