use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;
use std::str::FromStr;

pub const YT_DLP: &str = "yt-dlp";
pub const GALLERY_DL: &str = "gallery-dl";
pub const HTTP: &str = "http";

/// Engines this binary knows how to drive
pub const BUILTIN_ENGINES: &[&str] = &[YT_DLP, GALLERY_DL, HTTP];

/// Opaque identifier of a download backend (e.g. `"yt-dlp"`)
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EngineId(String);

impl EngineId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EngineId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EngineId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for EngineId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl Borrow<str> for EngineId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for EngineId {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for EngineId {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

/// Output container/codec accepted by the download endpoint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaFormat {
    Mp4,
    Mp3,
    Avi,
    Mkv,
    Webm,
    M4a,
    Aac,
    Ogg,
    Wav,
    Flv,
}

impl MediaFormat {
    pub const ALL: [MediaFormat; 10] = [
        MediaFormat::Mp4,
        MediaFormat::Mp3,
        MediaFormat::Avi,
        MediaFormat::Mkv,
        MediaFormat::Webm,
        MediaFormat::M4a,
        MediaFormat::Aac,
        MediaFormat::Ogg,
        MediaFormat::Wav,
        MediaFormat::Flv,
    ];

    pub fn extension(&self) -> &'static str {
        match self {
            MediaFormat::Mp4 => "mp4",
            MediaFormat::Mp3 => "mp3",
            MediaFormat::Avi => "avi",
            MediaFormat::Mkv => "mkv",
            MediaFormat::Webm => "webm",
            MediaFormat::M4a => "m4a",
            MediaFormat::Aac => "aac",
            MediaFormat::Ogg => "ogg",
            MediaFormat::Wav => "wav",
            MediaFormat::Flv => "flv",
        }
    }

    pub fn is_audio(&self) -> bool {
        matches!(
            self,
            MediaFormat::Mp3 | MediaFormat::M4a | MediaFormat::Aac | MediaFormat::Ogg | MediaFormat::Wav
        )
    }

    pub fn mime_type(&self) -> &'static str {
        match self {
            MediaFormat::Mp4 => "video/mp4",
            MediaFormat::Mp3 => "audio/mpeg",
            MediaFormat::Avi => "video/x-msvideo",
            MediaFormat::Mkv => "video/x-matroska",
            MediaFormat::Webm => "video/webm",
            MediaFormat::M4a => "audio/mp4",
            MediaFormat::Aac => "audio/aac",
            MediaFormat::Ogg => "audio/ogg",
            MediaFormat::Wav => "audio/wav",
            MediaFormat::Flv => "video/x-flv",
        }
    }
}

impl fmt::Display for MediaFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.extension())
    }
}

impl FromStr for MediaFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase();
        MediaFormat::ALL
            .into_iter()
            .find(|format| format.extension() == wanted)
            .ok_or_else(|| format!("unsupported format '{s}'"))
    }
}

/// Optional trim bounds in whole seconds
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrimRange {
    pub start_secs: Option<u32>,
    pub end_secs: Option<u32>,
}

impl TrimRange {
    /// yt-dlp `--download-sections` value, e.g. `*60-150` or `*30-inf`
    pub fn download_section(&self) -> String {
        let start = self.start_secs.unwrap_or(0);
        match self.end_secs {
            Some(end) => format!("*{start}-{end}"),
            None => format!("*{start}-inf"),
        }
    }
}

/// Typed job parameters, validated once at the HTTP boundary
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadParams {
    pub format: MediaFormat,
    #[serde(default)]
    pub audio_only: bool,
    #[serde(default)]
    pub trim: Option<TrimRange>,
}

impl DownloadParams {
    pub fn new(format: MediaFormat) -> Self {
        Self {
            format,
            audio_only: false,
            trim: None,
        }
    }

    pub fn wants_audio(&self) -> bool {
        self.audio_only || self.format.is_audio()
    }

    /// Audio codec to extract; audio-only requests for a video container fall back to mp3
    pub fn audio_format(&self) -> MediaFormat {
        if self.format.is_audio() {
            self.format
        } else {
            MediaFormat::Mp3
        }
    }
}

/// One extraction attempt handed to an engine
#[derive(Debug, Clone, Copy)]
pub struct ExtractionJob<'a> {
    pub job_id: &'a str,
    pub url: &'a str,
    pub params: &'a DownloadParams,
    pub correlation_id: Option<&'a str>,
}

/// Downloaded file, addressed by its key under the download directory
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub key: String,
    pub size: Option<u64>,
}

impl Artifact {
    pub fn extension(&self) -> Option<&str> {
        let file_name = self.key.rsplit('/').next()?;
        let (_, ext) = file_name.rsplit_once('.')?;
        Some(ext)
    }
}

/// Metadata returned by a probe (no download)
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MediaInfo {
    pub title: String,
    pub thumbnail: Option<String>,
    pub duration_secs: Option<u64>,
    pub author: Option<String>,
    pub view_count: Option<u64>,
}
