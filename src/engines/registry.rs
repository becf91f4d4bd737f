use std::collections::{BTreeSet, HashMap};
use thiserror::Error;
use tracing::{debug, error, warn};
use url::Url;

use super::types::EngineId;
use crate::config::EnginesConfig;

/// Reserved key holding the fallback engine list
pub const DEFAULT_KEY: &str = "DEFAULT";

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("the {DEFAULT_KEY} engine list must not be empty")]
    EmptyDefault,

    #[error("engine list for '{entry}' is empty")]
    EmptyRoute { entry: String },

    #[error("engine '{engine}' listed for '{entry}' is not supported")]
    UnsupportedEngine { entry: String, engine: String },
}

/// Domain → ordered engine preference, plus the set of engines a client may request
#[derive(Debug, Clone)]
pub struct EngineRegistry {
    supported: BTreeSet<EngineId>,
    domains: HashMap<String, Vec<EngineId>>,
    default: Vec<EngineId>,
}

impl EngineRegistry {
    /// Build a registry from routes and the default list
    ///
    /// Domain keys are normalized the same way request hosts are, so
    /// `"WWW.YouTube.com"` and `"youtube.com"` name the same route.
    pub fn new<S, R>(supported: S, routes: R, default: Vec<EngineId>) -> Result<Self, RegistryError>
    where
        S: IntoIterator<Item = EngineId>,
        R: IntoIterator<Item = (String, Vec<EngineId>)>,
    {
        let supported: BTreeSet<EngineId> = supported.into_iter().collect();

        if default.is_empty() {
            return Err(RegistryError::EmptyDefault);
        }
        check_supported(&supported, DEFAULT_KEY, &default)?;

        let mut domains = HashMap::new();
        for (domain, engines) in routes {
            if engines.is_empty() {
                return Err(RegistryError::EmptyRoute { entry: domain });
            }
            check_supported(&supported, &domain, &engines)?;
            domains.insert(normalize_host(&domain), engines);
        }

        Ok(Self {
            supported,
            domains,
            default,
        })
    }

    /// Build from a flat map where the [`DEFAULT_KEY`] entry is the fallback list
    pub fn from_map<S, M>(supported: S, map: M) -> Result<Self, RegistryError>
    where
        S: IntoIterator<Item = EngineId>,
        M: IntoIterator<Item = (String, Vec<EngineId>)>,
    {
        let mut default = Vec::new();
        let mut routes = Vec::new();
        for (key, engines) in map {
            if key.eq_ignore_ascii_case(DEFAULT_KEY) {
                default = engines;
            } else {
                routes.push((key, engines));
            }
        }
        Self::new(supported, routes, default)
    }

    pub fn from_config(config: &EnginesConfig) -> Result<Self, RegistryError> {
        let to_ids = |names: &[String]| names.iter().map(|n| EngineId::new(n.as_str())).collect::<Vec<_>>();

        Self::new(
            to_ids(&config.supported),
            config
                .routes
                .iter()
                .map(|route| (route.domain.clone(), to_ids(&route.engines))),
            to_ids(&config.default_engines),
        )
    }

    pub fn is_supported(&self, engine: &str) -> bool {
        self.supported.contains(engine)
    }

    pub fn supported(&self) -> impl Iterator<Item = &EngineId> {
        self.supported.iter()
    }

    pub fn default_engines(&self) -> &[EngineId] {
        &self.default
    }

    /// Route list registered for an already-normalized host
    pub fn route(&self, host: &str) -> Option<&[EngineId]> {
        self.domains.get(host).map(Vec::as_slice)
    }

    /// Ordered engines to try for `url`
    ///
    /// A supported `requested` engine is authoritative and returned alone.
    /// Otherwise the exact-match domain route, or the default list. Never
    /// returns an empty list and never fails: unparseable URLs and unknown
    /// engines degrade to automatic selection.
    pub fn select_engines(
        &self,
        url: &str,
        requested: Option<&str>,
        correlation_id: Option<&str>,
    ) -> Vec<EngineId> {
        let cid = correlation_id.unwrap_or("-");

        if let Some(requested) = requested.map(str::trim).filter(|r| !r.is_empty()) {
            if self.is_supported(requested) {
                debug!(correlation_id = cid, engine = requested, "Using requested engine");
                return vec![EngineId::new(requested)];
            }
            warn!(
                correlation_id = cid,
                engine = requested,
                "Requested engine is not supported, ignoring hint"
            );
        }

        self.base_list(url, cid).to_vec()
    }

    fn base_list(&self, url: &str, cid: &str) -> &[EngineId] {
        let parsed = match Url::parse(url) {
            Ok(parsed) => parsed,
            Err(e) => {
                error!(correlation_id = cid, url, error = %e, "Failed to parse URL, using default engines");
                return &self.default;
            }
        };

        let Some(host) = parsed.host_str() else {
            debug!(correlation_id = cid, url, "URL has no host, using default engines");
            return &self.default;
        };

        let host = normalize_host(host);
        match self.route(&host) {
            Some(engines) => {
                debug!(correlation_id = cid, host, "Matched domain route");
                engines
            }
            None => &self.default,
        }
    }
}

/// Lowercase and drop a single leading `www.`
pub fn normalize_host(host: &str) -> String {
    let lower = host.to_lowercase();
    match lower.strip_prefix("www.") {
        Some(rest) => rest.to_string(),
        None => lower,
    }
}

fn check_supported(
    supported: &BTreeSet<EngineId>,
    entry: &str,
    engines: &[EngineId],
) -> Result<(), RegistryError> {
    match engines.iter().find(|e| !supported.contains(*e)) {
        Some(engine) => Err(RegistryError::UnsupportedEngine {
            entry: entry.to_string(),
            engine: engine.to_string(),
        }),
        None => Ok(()),
    }
}
