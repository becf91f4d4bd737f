//! API utility functions
//!
//! Stateless helpers for HTTP request processing, kept out of
//! services.rs so they can be unit tested.

use axum::{body::Body, http::HeaderMap};
use bytes::Bytes;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use uuid::Uuid;

use crate::api::error::ApiError;

pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";
pub const IDEMPOTENCY_KEY_HEADER: &str = "x-mediabox-idempotency-key";
pub const API_KEY_HEADER: &str = "x-api-key";

/// Parses and validates Content-Type header for application/json
///
/// Accepts:
/// - `application/json`
/// - `application/json; charset=utf-8`
///
/// Rejects:
/// - `application/jsonp`
/// - `application/json-patch+json`
/// - `text/json`
/// - Malformed media types
pub fn parse_content_type(content_type: &str) -> Result<mime::Mime, ApiError> {
    let media_type: mime::Mime = content_type
        .parse()
        .map_err(|_| ApiError::InvalidPayload(format!("invalid Content-Type: {}", content_type)))?;

    if media_type.type_() != mime::APPLICATION || media_type.subtype() != mime::JSON {
        return Err(ApiError::InvalidPayload(format!(
            "Content-Type must be application/json, got: {}/{}",
            media_type.type_(),
            media_type.subtype()
        )));
    }

    Ok(media_type)
}

/// Collect at most `max_size` bytes of `body`
///
/// The cap applies to the decoded stream, so a compressed body stops
/// inflating as soon as it crosses the limit.
pub async fn read_body_limited(body: Body, max_size: usize) -> Result<Bytes, ApiError> {
    let collected = Limited::new(body, max_size).collect().await.map_err(|err| {
        if err.downcast_ref::<LengthLimitError>().is_some() {
            ApiError::PayloadTooLarge(max_size)
        } else {
            ApiError::InvalidPayload(err.to_string())
        }
    })?;

    Ok(collected.to_bytes())
}

/// Non-empty header value, trimmed
pub fn header_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

/// Client-supplied correlation id, or a fresh UUIDv4
pub fn correlation_id(headers: &HeaderMap) -> String {
    header_value(headers, CORRELATION_ID_HEADER)
        .map(str::to_owned)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// `m:ss` below an hour, `h:mm:ss` above
pub fn format_duration(total_secs: u64) -> String {
    let (hours, minutes, seconds) = (total_secs / 3600, (total_secs % 3600) / 60, total_secs % 60);
    if hours > 0 {
        format!("{hours}:{minutes:02}:{seconds:02}")
    } else {
        format!("{minutes}:{seconds:02}")
    }
}

/// Short count for display: `950`, `12.3K`, `1.2M`, `3B`
pub fn compact_count(count: u64) -> String {
    const UNITS: [(u64, &str); 3] = [(1_000_000_000, "B"), (1_000_000, "M"), (1_000, "K")];

    for (scale, suffix) in UNITS {
        if count >= scale {
            let tenths = count * 10 / scale;
            return if tenths % 10 == 0 {
                format!("{}{suffix}", tenths / 10)
            } else {
                format!("{}.{}{suffix}", tenths / 10, tenths % 10)
            };
        }
    }
    count.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    #[test]
    fn test_parse_content_type_valid() {
        assert!(parse_content_type("application/json").is_ok());
        assert!(parse_content_type("application/json; charset=utf-8").is_ok());
        assert!(parse_content_type("application/json; charset=UTF-8").is_ok());
    }

    #[test]
    fn test_parse_content_type_invalid() {
        assert!(parse_content_type("application/jsonp").is_err());
        assert!(parse_content_type("application/json-patch+json").is_err());
        assert!(parse_content_type("text/json").is_err());
        assert!(parse_content_type("invalid").is_err());
        assert!(parse_content_type("").is_err());
    }

    #[tokio::test]
    async fn test_read_body_limited() {
        let data = vec![0u8; 1000];
        let bytes = read_body_limited(Body::from(data.clone()), 1000).await.unwrap();
        assert_eq!(bytes.len(), 1000);
        assert!(read_body_limited(Body::empty(), 100).await.unwrap().is_empty());

        match read_body_limited(Body::from(data), 999).await {
            Err(ApiError::PayloadTooLarge(limit)) => assert_eq!(limit, 999),
            other => panic!("Expected PayloadTooLarge error, got {other:?}"),
        }
    }

    #[test]
    fn test_correlation_id_passthrough_or_generated() {
        let mut headers = HeaderMap::new();
        let generated = correlation_id(&headers);
        assert!(Uuid::parse_str(&generated).is_ok());

        headers.insert(CORRELATION_ID_HEADER, HeaderValue::from_static("  req-42 "));
        assert_eq!(correlation_id(&headers), "req-42");

        headers.insert(CORRELATION_ID_HEADER, HeaderValue::from_static(""));
        assert_ne!(correlation_id(&headers), "");
    }

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(0), "0:00");
        assert_eq!(format_duration(624), "10:24");
        assert_eq!(format_duration(3600), "1:00:00");
        assert_eq!(format_duration(3725), "1:02:05");
    }

    #[test]
    fn test_compact_count() {
        assert_eq!(compact_count(950), "950");
        assert_eq!(compact_count(1_000), "1K");
        assert_eq!(compact_count(12_345), "12.3K");
        assert_eq!(compact_count(1_234_567), "1.2M");
        assert_eq!(compact_count(3_000_000_000), "3B");
    }
}
