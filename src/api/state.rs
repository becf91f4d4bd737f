use std::sync::Arc;

use super::auth::ApiKeys;
use crate::config::Config;
use crate::engines::MediaProber;
use crate::ledger::FjallStore;
use crate::observability::Metrics;
use crate::queue::TaskBroker;
use crate::storage::StorageClient;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub store: Arc<FjallStore>,
    pub storage: Arc<StorageClient>,
    pub broker: Arc<TaskBroker>,
    pub metrics: Arc<Metrics>,
    pub prober: Option<Arc<dyn MediaProber>>,
    pub api_keys: ApiKeys,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        store: Arc<FjallStore>,
        storage: Arc<StorageClient>,
        broker: Arc<TaskBroker>,
        metrics: Arc<Metrics>,
    ) -> Self {
        let api_keys = ApiKeys::new(config.security.api_keys.iter().cloned());

        Self {
            config,
            store,
            storage,
            broker,
            metrics,
            prober: None,
            api_keys,
        }
    }

    /// Enable `GET /api/v1/video/info`
    pub fn with_prober(mut self, prober: Arc<dyn MediaProber>) -> Self {
        self.prober = Some(prober);
        self
    }
}
