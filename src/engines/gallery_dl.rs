//! gallery-dl backed extractor
//!
//! gallery-dl writes every item of a post into the target directory; the
//! first file (by name) becomes the job artifact.

use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::{debug, info};

use super::process;
use super::traits::{ExtractionError, Extractor};
use super::types::{Artifact, ExtractionJob, GALLERY_DL};
use crate::config::ProcessEngineConfig;
use crate::humanize::HumanDuration;
use crate::storage::StorageClient;

pub struct GalleryDlExtractor {
    binary: String,
    timeout: HumanDuration,
    probe_timeout: HumanDuration,
    storage: Arc<StorageClient>,
}

impl GalleryDlExtractor {
    pub fn new(config: &ProcessEngineConfig, probe_timeout: HumanDuration, storage: Arc<StorageClient>) -> Self {
        Self {
            binary: config.binary.clone(),
            timeout: config.timeout,
            probe_timeout,
            storage,
        }
    }

    pub(crate) fn download_args(target_dir: &Path, url: &str) -> Vec<String> {
        vec![
            "--quiet".to_string(),
            "-D".to_string(),
            target_dir.to_string_lossy().into_owned(),
            url.to_string(),
        ]
    }
}

#[async_trait]
impl Extractor for GalleryDlExtractor {
    fn engine(&self) -> &str {
        GALLERY_DL
    }

    async fn extract(&self, job: &ExtractionJob<'_>) -> Result<Artifact, ExtractionError> {
        if job.params.trim.is_some() {
            return Err(ExtractionError::Unsupported {
                engine: GALLERY_DL.to_string(),
                feature: "trimming".to_string(),
            });
        }

        let target_dir = self.storage.path_for(job.job_id);
        tokio::fs::create_dir_all(&target_dir)
            .await
            .map_err(crate::storage::StorageError::from)?;

        let args = Self::download_args(&target_dir, job.url);
        process::run(GALLERY_DL, &self.binary, &args, self.timeout).await?;

        let first = first_file(&target_dir).await?.ok_or_else(|| {
            ExtractionError::NoArtifact("gallery-dl finished without writing any file".to_string())
        })?;
        debug!(job_id = job.job_id, path = %first.display(), "Picked gallery-dl artifact");

        let key = self.storage.key_for(&first).ok_or_else(|| {
            ExtractionError::NoArtifact(format!("{} is not inside the download directory", first.display()))
        })?;
        let size = self.storage.size(&key).await?;

        info!(job_id = job.job_id, key, size, "gallery-dl download finished");

        Ok(Artifact { key, size: Some(size) })
    }

    async fn check_available(&self) -> Result<String, ExtractionError> {
        process::version(GALLERY_DL, &self.binary, self.probe_timeout).await
    }
}

/// Lexicographically first regular file in `dir`
async fn first_file(dir: &Path) -> Result<Option<std::path::PathBuf>, ExtractionError> {
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(crate::storage::StorageError::from)?;

    let mut files = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(crate::storage::StorageError::from)?
    {
        let is_file = entry
            .file_type()
            .await
            .map(|t| t.is_file())
            .unwrap_or(false);
        if is_file {
            files.push(entry.path());
        }
    }

    files.sort();
    Ok(files.into_iter().next())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engines::types::{DownloadParams, MediaFormat, TrimRange};
    use tempfile::TempDir;

    #[test]
    fn test_download_args() {
        let args = GalleryDlExtractor::download_args(Path::new("/data/job-9"), "https://imgur.com/a/x");
        assert_eq!(args, vec!["--quiet", "-D", "/data/job-9", "https://imgur.com/a/x"]);
    }

    #[tokio::test]
    async fn test_first_file_sorted_and_skips_dirs() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("a_subdir")).unwrap();
        std::fs::write(dir.path().join("b.jpg"), b"b").unwrap();
        std::fs::write(dir.path().join("c.jpg"), b"c").unwrap();

        let first = first_file(dir.path()).await.unwrap().unwrap();
        assert_eq!(first.file_name().unwrap(), "b.jpg");

        let empty = TempDir::new().unwrap();
        assert!(first_file(empty.path()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_trim_is_unsupported() {
        let dir = TempDir::new().unwrap();
        let storage = Arc::new(StorageClient::local(dir.path()).unwrap());
        let config = ProcessEngineConfig {
            binary: "gallery-dl".to_string(),
            timeout: HumanDuration::from_secs(5),
        };
        let extractor = GalleryDlExtractor::new(&config, HumanDuration::from_secs(5), storage);

        let mut params = DownloadParams::new(MediaFormat::Mp4);
        params.trim = Some(TrimRange { start_secs: Some(1), end_secs: None });
        let job = ExtractionJob {
            job_id: "job-1",
            url: "https://example.com/a",
            params: &params,
            correlation_id: None,
        };

        assert!(matches!(
            extractor.extract(&job).await,
            Err(ExtractionError::Unsupported { .. })
        ));
    }
}
