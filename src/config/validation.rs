use super::models::Config;
use crate::engines::normalize_host;
use crate::engines::types::BUILTIN_ENGINES;
use std::collections::HashSet;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("No default engines configured (engines.default_engines must not be empty)")]
    NoDefaultEngines,

    #[error("Unknown engine '{engine}' in engines.supported, expected one of {known}")]
    UnknownEngine { engine: String, known: String },

    #[error("'{entry}' references engine '{engine}' which is not in engines.supported")]
    UnsupportedEngineReference { entry: String, engine: String },

    #[error("Route for '{domain}' has no engines")]
    EmptyRoute { domain: String },

    #[error("Duplicate route for domain '{domain}'")]
    DuplicateRoute { domain: String },

    #[error("Engine binary for '{engine}' must not be empty")]
    EmptyBinary { engine: String },

    #[error("max_payload_bytes ({actual}) exceeds limit of 1MB ({limit})")]
    PayloadSizeExceedsLimit { actual: u64, limit: u64 },

    #[error("Worker setting must be positive: {field}")]
    InvalidWorkerPool { field: String },

    #[error("server.max_concurrent_requests must be positive")]
    InvalidConcurrencyLimit,

    #[error("Retention TTL must be positive: {field} = {value}")]
    InvalidRetentionTTL { field: String, value: u32 },
}

/// Validate the entire configuration
pub fn validate(config: &Config) -> Result<(), ValidationError> {
    validate_engines(config)?;
    validate_routes(config)?;
    validate_payload_size(config)?;
    validate_worker(config)?;
    validate_retention(config)?;
    Ok(())
}

/// Supported engines must be built-ins; the default list must reference them
fn validate_engines(config: &Config) -> Result<(), ValidationError> {
    let engines = &config.engines;

    for engine in &engines.supported {
        if !BUILTIN_ENGINES.contains(&engine.as_str()) {
            return Err(ValidationError::UnknownEngine {
                engine: engine.clone(),
                known: BUILTIN_ENGINES.join(", "),
            });
        }
    }

    if engines.default_engines.is_empty() {
        return Err(ValidationError::NoDefaultEngines);
    }
    check_references(config, "engines.default_engines", &engines.default_engines)?;

    for (engine, process) in [("yt-dlp", &engines.ytdlp), ("gallery-dl", &engines.gallery_dl)] {
        if process.binary.trim().is_empty() {
            return Err(ValidationError::EmptyBinary {
                engine: engine.to_string(),
            });
        }
    }

    Ok(())
}

/// Every route needs a non-empty list of supported engines, one route per normalized domain
fn validate_routes(config: &Config) -> Result<(), ValidationError> {
    let mut seen = HashSet::new();

    for route in &config.engines.routes {
        if route.engines.is_empty() {
            return Err(ValidationError::EmptyRoute {
                domain: route.domain.clone(),
            });
        }
        check_references(config, &route.domain, &route.engines)?;

        if !seen.insert(normalize_host(&route.domain)) {
            return Err(ValidationError::DuplicateRoute {
                domain: route.domain.clone(),
            });
        }
    }

    Ok(())
}

fn check_references(config: &Config, entry: &str, engines: &[String]) -> Result<(), ValidationError> {
    match engines.iter().find(|e| !config.engines.supported.contains(e)) {
        Some(engine) => Err(ValidationError::UnsupportedEngineReference {
            entry: entry.to_string(),
            engine: engine.clone(),
        }),
        None => Ok(()),
    }
}

/// Download requests are tiny; keep the body cap well below anything abusive
fn validate_payload_size(config: &Config) -> Result<(), ValidationError> {
    const MAX_PAYLOAD_BYTES: u64 = 1024 * 1024; // 1 MB

    if config.server.api.max_payload_bytes.as_u64() > MAX_PAYLOAD_BYTES {
        return Err(ValidationError::PayloadSizeExceedsLimit {
            actual: config.server.api.max_payload_bytes.as_u64(),
            limit: MAX_PAYLOAD_BYTES,
        });
    }

    Ok(())
}

fn validate_worker(config: &Config) -> Result<(), ValidationError> {
    if config.worker.num_workers == 0 {
        return Err(ValidationError::InvalidWorkerPool {
            field: "worker.num_workers".to_string(),
        });
    }
    if config.worker.channel_size == 0 {
        return Err(ValidationError::InvalidWorkerPool {
            field: "worker.channel_size".to_string(),
        });
    }
    if config.server.max_concurrent_requests == 0 {
        return Err(ValidationError::InvalidConcurrencyLimit);
    }
    Ok(())
}

/// Ensure retention TTLs are positive
fn validate_retention(config: &Config) -> Result<(), ValidationError> {
    if config.retention.job_ttl_days == 0 {
        return Err(ValidationError::InvalidRetentionTTL {
            field: "job_ttl_days".to_string(),
            value: config.retention.job_ttl_days,
        });
    }

    if config.retention.idempotency_ttl_days == 0 {
        return Err(ValidationError::InvalidRetentionTTL {
            field: "idempotency_ttl_days".to_string(),
            value: config.retention.idempotency_ttl_days,
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::models::EngineRoute;
    use crate::humanize::ByteSize;

    fn route(domain: &str, engines: &[&str]) -> EngineRoute {
        EngineRoute {
            domain: domain.to_string(),
            engines: engines.iter().map(|e| e.to_string()).collect(),
        }
    }

    #[test]
    fn test_default_config_is_valid() {
        assert!(validate(&Config::default()).is_ok());
    }

    #[test]
    fn test_unknown_engine() {
        let mut config = Config::default();
        config.engines.supported.push("aria2".to_string());

        assert!(matches!(
            validate(&config),
            Err(ValidationError::UnknownEngine { engine, .. }) if engine == "aria2"
        ));
    }

    #[test]
    fn test_empty_default_engines() {
        let mut config = Config::default();
        config.engines.default_engines.clear();

        assert!(matches!(validate(&config), Err(ValidationError::NoDefaultEngines)));
    }

    #[test]
    fn test_default_references_unsupported_engine() {
        let mut config = Config::default();
        config.engines.supported = vec!["yt-dlp".to_string()];
        config.engines.default_engines = vec!["http".to_string()];

        assert!(matches!(
            validate(&config),
            Err(ValidationError::UnsupportedEngineReference { engine, .. }) if engine == "http"
        ));
    }

    #[test]
    fn test_route_references_unsupported_engine() {
        let mut config = Config::default();
        config.engines.supported = vec!["yt-dlp".to_string()];
        config.engines.default_engines = vec!["yt-dlp".to_string()];
        config.engines.routes = vec![route("imgur.com", &["gallery-dl"])];

        assert!(matches!(
            validate(&config),
            Err(ValidationError::UnsupportedEngineReference { entry, .. }) if entry == "imgur.com"
        ));
    }

    #[test]
    fn test_empty_route() {
        let mut config = Config::default();
        config.engines.routes.push(route("imgur.com", &[]));

        assert!(matches!(validate(&config), Err(ValidationError::EmptyRoute { .. })));
    }

    #[test]
    fn test_duplicate_route_after_normalization() {
        let mut config = Config::default();
        config.engines.routes.push(route("WWW.YouTube.com", &["http"]));

        assert!(matches!(
            validate(&config),
            Err(ValidationError::DuplicateRoute { domain }) if domain == "WWW.YouTube.com"
        ));
    }

    #[test]
    fn test_payload_limit() {
        let mut config = Config::default();
        config.server.api.max_payload_bytes = ByteSize(2 * 1024 * 1024);

        assert!(matches!(
            validate(&config),
            Err(ValidationError::PayloadSizeExceedsLimit { .. })
        ));
    }

    #[test]
    fn test_zero_workers() {
        let mut config = Config::default();
        config.worker.num_workers = 0;

        assert!(matches!(validate(&config), Err(ValidationError::InvalidWorkerPool { .. })));
    }

    #[test]
    fn test_zero_ttl() {
        let mut config = Config::default();
        config.retention.job_ttl_days = 0;

        assert!(matches!(
            validate(&config),
            Err(ValidationError::InvalidRetentionTTL { field, .. }) if field == "job_ttl_days"
        ));
    }
}
