use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{info, warn};

use super::gallery_dl::GalleryDlExtractor;
use super::http::HttpExtractor;
use super::traits::{ExtractionError, Extractor, MediaProber};
use super::types::{EngineId, GALLERY_DL, HTTP, YT_DLP};
use super::ytdlp::YtDlpExtractor;
use crate::config::EnginesConfig;
use crate::storage::StorageClient;

/// Engine id → extractor instance
#[derive(Clone, Default)]
pub struct ExtractorSet {
    extractors: BTreeMap<EngineId, Arc<dyn Extractor>>,
}

impl ExtractorSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, extractor: Arc<dyn Extractor>) {
        self.extractors
            .insert(EngineId::new(extractor.engine()), extractor);
    }

    pub fn with(mut self, extractor: Arc<dyn Extractor>) -> Self {
        self.register(extractor);
        self
    }

    pub fn get(&self, engine: &str) -> Option<Arc<dyn Extractor>> {
        self.extractors.get(engine).cloned()
    }

    pub fn engines(&self) -> impl Iterator<Item = &EngineId> {
        self.extractors.keys()
    }

    pub fn len(&self) -> usize {
        self.extractors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.extractors.is_empty()
    }

    /// Run every extractor's availability check
    pub async fn check_all(&self) -> Vec<(EngineId, Result<String, ExtractionError>)> {
        let mut results = Vec::with_capacity(self.extractors.len());
        for (id, extractor) in &self.extractors {
            let result = extractor.check_available().await;
            match &result {
                Ok(version) => info!(engine = %id, version, "Engine available"),
                Err(e) => warn!(engine = %id, error = %e, "Engine unavailable"),
            }
            results.push((id.clone(), result));
        }
        results
    }
}

/// Built-in extractors for every supported engine, plus the yt-dlp prober
pub struct BuiltinEngines {
    pub extractors: ExtractorSet,
    pub prober: Option<Arc<dyn MediaProber>>,
}

impl BuiltinEngines {
    pub fn from_config(config: &EnginesConfig, storage: Arc<StorageClient>) -> Result<Self, ExtractionError> {
        let mut extractors = ExtractorSet::new();
        let mut prober: Option<Arc<dyn MediaProber>> = None;

        for engine in &config.supported {
            match engine.as_str() {
                YT_DLP => {
                    let ytdlp = Arc::new(YtDlpExtractor::new(&config.ytdlp, config.probe_timeout, storage.clone()));
                    prober = Some(ytdlp.clone());
                    extractors.register(ytdlp);
                }
                GALLERY_DL => extractors.register(Arc::new(GalleryDlExtractor::new(
                    &config.gallery_dl,
                    config.probe_timeout,
                    storage.clone(),
                ))),
                HTTP => extractors.register(Arc::new(HttpExtractor::new(&config.http, storage.clone())?)),
                other => warn!(engine = other, "No built-in extractor for engine"),
            }
        }

        Ok(Self { extractors, prober })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_builtin_follows_supported_list() {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(StorageClient::local(dir.path()).unwrap());

        let builtin = BuiltinEngines::from_config(&EnginesConfig::default(), storage.clone()).unwrap();
        let ids: Vec<&str> = builtin.extractors.engines().map(EngineId::as_str).collect();
        assert_eq!(ids, vec!["gallery-dl", "http", "yt-dlp"]);
        assert!(builtin.prober.is_some());

        let config = EnginesConfig {
            supported: vec!["http".to_string()],
            default_engines: vec!["http".to_string()],
            routes: Vec::new(),
            ..EnginesConfig::default()
        };
        let builtin = BuiltinEngines::from_config(&config, storage).unwrap();
        assert_eq!(builtin.extractors.len(), 1);
        assert!(builtin.extractors.get("http").is_some());
        assert!(builtin.prober.is_none());
    }
}
