//! Download engines and engine selection
//!
//! ## Key Components
//!
//! - [`EngineRegistry`] - Picks the ordered engine list for a URL
//! - [`Extractor`] - Trait implemented by each download backend
//! - [`ExtractorSet`] - Engine id → extractor lookup used by workers
//! - [`YtDlpExtractor`], [`GalleryDlExtractor`], [`HttpExtractor`] - Built-in backends
//!
//! ## Example
//!
//! ```rust,ignore
//! use mediabox::engines::EngineRegistry;
//!
//! let registry = EngineRegistry::from_config(&config.engines)?;
//! let engines = registry.select_engines("https://youtu.be/abc", Some("http"), None);
//! // ["http"]: a supported hint is the only engine tried
//! ```

mod extractors;
mod gallery_dl;
mod http;
mod process;
mod registry;
mod traits;
pub mod types;
mod ytdlp;

pub use extractors::{BuiltinEngines, ExtractorSet};
pub use gallery_dl::GalleryDlExtractor;
pub use http::HttpExtractor;
pub use registry::{DEFAULT_KEY, EngineRegistry, RegistryError, normalize_host};
pub use traits::{ExtractionError, Extractor, MediaProber};
pub use types::{
    Artifact, BUILTIN_ENGINES, DownloadParams, EngineId, ExtractionJob, MediaFormat, MediaInfo,
    TrimRange,
};
pub use ytdlp::YtDlpExtractor;
