//! Request middleware: API key check and correlation id propagation

use axum::{
    extract::{Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use std::collections::HashSet;
use std::sync::Arc;

use super::error::ApiError;
use super::state::AppState;
use super::utils::{API_KEY_HEADER, CORRELATION_ID_HEADER, correlation_id, header_value};

/// Accepted API keys; an empty set disables authentication
#[derive(Debug, Clone, Default)]
pub struct ApiKeys {
    keys: Arc<HashSet<String>>,
}

impl ApiKeys {
    pub fn new(keys: impl IntoIterator<Item = String>) -> Self {
        Self {
            keys: Arc::new(keys.into_iter().collect()),
        }
    }

    pub fn is_enabled(&self) -> bool {
        !self.keys.is_empty()
    }

    /// Missing key → 401, unknown key → 403
    pub fn check(&self, presented: Option<&str>) -> Result<(), ApiError> {
        if !self.is_enabled() {
            return Ok(());
        }

        match presented {
            Some(key) if self.keys.contains(key) => Ok(()),
            Some(_) => {
                tracing::warn!("Invalid API key provided");
                Err(ApiError::Forbidden)
            }
            None => {
                tracing::warn!("Missing API key in request");
                Err(ApiError::Unauthorized)
            }
        }
    }
}

pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    state
        .api_keys
        .check(header_value(request.headers(), API_KEY_HEADER))?;
    Ok(next.run(request).await)
}

/// Make sure every request carries a correlation id and echo it back
pub async fn propagate_correlation_id(mut request: Request, next: Next) -> Response {
    let id = correlation_id(request.headers());
    let value = HeaderValue::from_str(&id).ok();

    if let Some(value) = &value {
        request.headers_mut().insert(CORRELATION_ID_HEADER, value.clone());
    }

    let mut response = next.run(request).await;
    if let Some(value) = value {
        response.headers_mut().insert(CORRELATION_ID_HEADER, value);
    }
    response
}
