use thiserror::Error;
use url::Url;

use super::models::DownloadRequest;
use crate::engines::{DownloadParams, MediaFormat, TrimRange};

#[derive(Debug, Error, PartialEq)]
pub enum RequestValidationError {
    #[error("video_url must be an http/https URL with a host")]
    InvalidUrl,
    #[error("format '{0}' is not allowed (expected one of mp4, mp3, avi, mkv, webm, m4a, aac, ogg, wav, flv)")]
    UnsupportedFormat(String),
    #[error("{field} must use the HH:MM:SS format")]
    InvalidTime { field: &'static str },
    #[error("end_time must be greater than start_time")]
    EmptyTrimRange,
}

/// Check a download request and turn it into typed job parameters
///
/// The `engine` hint is passed through untouched: the selector ignores
/// engines it does not know.
pub fn validate_download(request: &DownloadRequest) -> Result<DownloadParams, RequestValidationError> {
    let url = Url::parse(request.video_url.trim()).map_err(|_| RequestValidationError::InvalidUrl)?;
    if !matches!(url.scheme(), "http" | "https") || url.host_str().is_none_or(str::is_empty) {
        return Err(RequestValidationError::InvalidUrl);
    }

    let format: MediaFormat = request
        .format
        .parse()
        .map_err(|_| RequestValidationError::UnsupportedFormat(request.format.clone()))?;

    let start_secs = parse_time(request.start_time.as_deref(), "start_time")?;
    let end_secs = parse_time(request.end_time.as_deref(), "end_time")?;

    if let (Some(start), Some(end)) = (start_secs, end_secs) {
        if end <= start {
            return Err(RequestValidationError::EmptyTrimRange);
        }
    }

    let trim = (start_secs.is_some() || end_secs.is_some()).then_some(TrimRange { start_secs, end_secs });

    Ok(DownloadParams {
        format,
        audio_only: request.audio_only,
        trim,
    })
}

/// Blank values count as absent
fn parse_time(value: Option<&str>, field: &'static str) -> Result<Option<u32>, RequestValidationError> {
    match value.map(str::trim).filter(|v| !v.is_empty()) {
        Some(value) => parse_hms(value)
            .map(Some)
            .ok_or(RequestValidationError::InvalidTime { field }),
        None => Ok(None),
    }
}

/// `HH:MM:SS` → seconds; minutes and seconds must be below 60
pub(crate) fn parse_hms(value: &str) -> Option<u32> {
    let mut parts = value.split(':');
    let (h, m, s) = (parts.next()?, parts.next()?, parts.next()?);
    if parts.next().is_some() {
        return None;
    }

    let field = |part: &str| -> Option<u32> {
        if part.len() != 2 || !part.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        part.parse().ok()
    };

    let (h, m, s) = (field(h)?, field(m)?, field(s)?);
    if m >= 60 || s >= 60 {
        return None;
    }
    Some(h * 3600 + m * 60 + s)
}
