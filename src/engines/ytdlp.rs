//! yt-dlp backed extractor

use async_trait::async_trait;
use serde_json::Value;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use super::process;
use super::traits::{ExtractionError, Extractor, MediaProber};
use super::types::{Artifact, ExtractionJob, MediaInfo, YT_DLP};
use crate::config::ProcessEngineConfig;
use crate::humanize::HumanDuration;
use crate::storage::StorageClient;

pub struct YtDlpExtractor {
    binary: String,
    timeout: HumanDuration,
    probe_timeout: HumanDuration,
    storage: Arc<StorageClient>,
}

impl YtDlpExtractor {
    pub fn new(config: &ProcessEngineConfig, probe_timeout: HumanDuration, storage: Arc<StorageClient>) -> Self {
        Self {
            binary: config.binary.clone(),
            timeout: config.timeout,
            probe_timeout,
            storage,
        }
    }

    /// Command line for one download; the final path is printed on stdout
    pub(crate) fn download_args(&self, job: &ExtractionJob<'_>) -> Vec<String> {
        let template = self.storage.path_for(&format!("{}.%(ext)s", job.job_id));
        let params = job.params;

        let mut args = vec![
            "--no-playlist".to_string(),
            "--no-progress".to_string(),
            "--no-warnings".to_string(),
            "--force-overwrites".to_string(),
            "--no-simulate".to_string(),
            "--print".to_string(),
            "after_move:filepath".to_string(),
            "-o".to_string(),
            template.to_string_lossy().into_owned(),
        ];

        if params.wants_audio() {
            args.extend([
                "-f".to_string(),
                "bestaudio/best".to_string(),
                "--extract-audio".to_string(),
                "--audio-format".to_string(),
                params.audio_format().extension().to_string(),
            ]);
        } else {
            args.extend([
                "-f".to_string(),
                "bestvideo+bestaudio/best".to_string(),
                "--merge-output-format".to_string(),
                params.format.extension().to_string(),
            ]);
        }

        if let Some(trim) = params.trim {
            args.extend([
                "--download-sections".to_string(),
                trim.download_section(),
                "--force-keyframes-at-cuts".to_string(),
            ]);
        }

        args.push(job.url.to_string());
        args
    }

    fn probe_args(url: &str) -> Vec<String> {
        vec![
            "--dump-json".to_string(),
            "--no-download".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            url.to_string(),
        ]
    }
}

#[async_trait]
impl Extractor for YtDlpExtractor {
    fn engine(&self) -> &str {
        YT_DLP
    }

    async fn extract(&self, job: &ExtractionJob<'_>) -> Result<Artifact, ExtractionError> {
        let args = self.download_args(job);
        let output = process::run(YT_DLP, &self.binary, &args, self.timeout).await?;

        let stdout = String::from_utf8_lossy(&output.stdout);
        let printed = stdout
            .lines()
            .map(str::trim)
            .rfind(|line| !line.is_empty())
            .ok_or_else(|| ExtractionError::NoArtifact("yt-dlp printed no output path".to_string()))?;

        let path = PathBuf::from(printed);
        let key = self.storage.key_for(&path).ok_or_else(|| {
            ExtractionError::NoArtifact(format!("{} is not inside the download directory", path.display()))
        })?;
        let size = self.storage.size(&key).await?;

        info!(job_id = job.job_id, key, size, "yt-dlp download finished");

        Ok(Artifact { key, size: Some(size) })
    }

    async fn check_available(&self) -> Result<String, ExtractionError> {
        process::version(YT_DLP, &self.binary, self.probe_timeout).await
    }
}

#[async_trait]
impl MediaProber for YtDlpExtractor {
    async fn probe(&self, url: &str) -> Result<MediaInfo, ExtractionError> {
        debug!(url, "Probing media metadata with yt-dlp");

        let output = process::run(YT_DLP, &self.binary, &Self::probe_args(url), self.probe_timeout).await?;
        parse_info(&output.stdout)
    }
}

/// Map `--dump-json` output to [`MediaInfo`]
pub(crate) fn parse_info(stdout: &[u8]) -> Result<MediaInfo, ExtractionError> {
    let json: Value = serde_json::from_slice(stdout).map_err(|e| ExtractionError::Metadata(e.to_string()))?;

    Ok(MediaInfo {
        title: json["title"].as_str().unwrap_or("Unknown Title").to_string(),
        thumbnail: json["thumbnail"].as_str().map(str::to_owned),
        duration_secs: json["duration"].as_f64().map(|d| d.round() as u64),
        author: json["uploader"]
            .as_str()
            .or_else(|| json["channel"].as_str())
            .map(str::to_owned),
        view_count: json["view_count"].as_u64(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::types::{DownloadParams, MediaFormat, TrimRange};
    use tempfile::TempDir;

    fn extractor(dir: &TempDir) -> YtDlpExtractor {
        let storage = Arc::new(StorageClient::local(dir.path()).unwrap());
        let config = ProcessEngineConfig {
            binary: "yt-dlp".to_string(),
            timeout: HumanDuration::from_secs(60),
        };
        YtDlpExtractor::new(&config, HumanDuration::from_secs(10), storage)
    }

    fn job<'a>(params: &'a DownloadParams) -> ExtractionJob<'a> {
        ExtractionJob {
            job_id: "job-1",
            url: "https://youtube.com/watch?v=abc",
            params,
            correlation_id: None,
        }
    }

    fn window(args: &[String], flag: &str) -> Option<String> {
        let pos = args.iter().position(|a| a == flag)?;
        args.get(pos + 1).cloned()
    }

    #[test]
    fn test_video_args() {
        let dir = TempDir::new().unwrap();
        let params = DownloadParams::new(MediaFormat::Mkv);
        let args = extractor(&dir).download_args(&job(&params));

        assert_eq!(window(&args, "--merge-output-format").as_deref(), Some("mkv"));
        assert!(!args.contains(&"--extract-audio".to_string()));
        assert!(!args.contains(&"--download-sections".to_string()));
        assert!(window(&args, "-o").unwrap().ends_with("job-1.%(ext)s"));
        assert_eq!(args.last().map(String::as_str), Some("https://youtube.com/watch?v=abc"));
    }

    #[test]
    fn test_audio_only_args() {
        let dir = TempDir::new().unwrap();
        let mut params = DownloadParams::new(MediaFormat::Mp4);
        params.audio_only = true;
        let args = extractor(&dir).download_args(&job(&params));

        assert!(args.contains(&"--extract-audio".to_string()));
        assert_eq!(window(&args, "--audio-format").as_deref(), Some("mp3"));
        assert!(!args.contains(&"--merge-output-format".to_string()));
    }

    #[test]
    fn test_trim_args() {
        let dir = TempDir::new().unwrap();
        let mut params = DownloadParams::new(MediaFormat::M4a);
        params.trim = Some(TrimRange { start_secs: Some(60), end_secs: Some(150) });
        let args = extractor(&dir).download_args(&job(&params));

        assert_eq!(window(&args, "--download-sections").as_deref(), Some("*60-150"));
        assert!(args.contains(&"--force-keyframes-at-cuts".to_string()));
        assert_eq!(window(&args, "--audio-format").as_deref(), Some("m4a"));
    }

    #[test]
    fn test_parse_info() {
        let json = br#"{
            "title": "Big Buck Bunny",
            "thumbnail": "https://i.ytimg.com/vi/abc/hq.jpg",
            "duration": 596.4,
            "uploader": "Blender",
            "view_count": 1234567
        }"#;

        let info = parse_info(json).unwrap();
        assert_eq!(info.title, "Big Buck Bunny");
        assert_eq!(info.duration_secs, Some(596));
        assert_eq!(info.author.as_deref(), Some("Blender"));
        assert_eq!(info.view_count, Some(1_234_567));
    }

    #[test]
    fn test_parse_info_defaults() {
        let info = parse_info(b"{}").unwrap();
        assert_eq!(info.title, "Unknown Title");
        assert_eq!(info.thumbnail, None);

        assert!(matches!(parse_info(b"not json"), Err(ExtractionError::Metadata(_))));
    }
}
