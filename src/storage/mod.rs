//! Artifact storage rooted at the download directory
//! Uses Apache Arrow object_store crate (local filesystem backend)

use bytes::Bytes;
use object_store::{GetResult, ObjectStore, WriteMultipart, local::LocalFileSystem, path::Path as StoragePath};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Filesystem error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Object store error: {0}")]
    ObjectStoreError(#[from] object_store::Error),
}

/// Storage result type
pub type Result<T> = std::result::Result<T, StorageError>;

/// Metadata returned after upload
#[derive(Debug, Clone)]
pub struct UploadMetadata {
    pub key: String,
    pub etag: Option<String>,
    pub size: u64,
}

/// Storage client wrapping object_store
///
/// Engines that write files themselves (yt-dlp, gallery-dl) get a filesystem
/// path from [`StorageClient::path_for`] and hand the result back through
/// [`StorageClient::key_for`]; everything else goes through object_store.
#[derive(Clone)]
pub struct StorageClient {
    store: Arc<dyn ObjectStore>,
    root: PathBuf,
}

impl StorageClient {
    /// Create a client over `root`, creating the directory if needed
    pub fn local(root: impl AsRef<Path>) -> Result<Self> {
        std::fs::create_dir_all(root.as_ref())?;
        let root = std::fs::canonicalize(root.as_ref())?;
        let store = LocalFileSystem::new_with_prefix(&root)?;

        Ok(Self {
            store: Arc::new(store),
            root,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Filesystem path of `key` (which may not exist yet)
    pub fn path_for(&self, key: &str) -> PathBuf {
        key.split('/')
            .filter(|segment| !segment.is_empty())
            .fold(self.root.clone(), |path, segment| path.join(segment))
    }

    /// Storage key of a file written under the root, `None` if it lives elsewhere
    pub fn key_for(&self, path: &Path) -> Option<String> {
        let absolute = std::fs::canonicalize(path).ok()?;
        let relative = absolute.strip_prefix(&self.root).ok()?;

        let segments = relative
            .components()
            .map(|c| c.as_os_str().to_str().map(str::to_owned))
            .collect::<Option<Vec<_>>>()?;

        if segments.is_empty() {
            None
        } else {
            Some(segments.join("/"))
        }
    }

    /// Upload bytes to storage
    pub async fn upload(&self, key: &str, data: Bytes) -> Result<UploadMetadata> {
        let path = Self::object_path(key)?;
        let size = data.len() as u64;

        let put_result = self.store.put(&path, data.into()).await?;

        tracing::info!(key, size, "Uploaded to storage");

        Ok(UploadMetadata {
            key: key.to_string(),
            etag: put_result.e_tag.clone(),
            size,
        })
    }

    /// Start a streamed write of `key`; nothing is visible under the key until `finish`
    pub async fn writer(&self, key: &str) -> Result<ArtifactWriter> {
        let path = Self::object_path(key)?;
        let upload = self.store.put_multipart(&path).await?;

        Ok(ArtifactWriter {
            key: key.to_string(),
            upload: WriteMultipart::new(upload),
            written: 0,
        })
    }

    /// Open an artifact for streaming
    pub async fn get(&self, key: &str) -> Result<GetResult> {
        let path = Self::object_path(key)?;

        match self.store.get(&path).await {
            Ok(result) => Ok(result),
            Err(object_store::Error::NotFound { .. }) => Err(StorageError::NotFound(key.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Size in bytes of a stored artifact
    pub async fn size(&self, key: &str) -> Result<u64> {
        let path = Self::object_path(key)?;

        match self.store.head(&path).await {
            Ok(meta) => Ok(meta.size),
            Err(object_store::Error::NotFound { .. }) => Err(StorageError::NotFound(key.to_string())),
            Err(e) => Err(e.into()),
        }
    }

    /// Check if key exists
    pub async fn exists(&self, key: &str) -> Result<bool> {
        let path = Self::object_path(key)?;

        match self.store.head(&path).await {
            Ok(_) => Ok(true),
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => Err(e.into()),
        }
    }

    pub fn is_healthy(&self) -> bool {
        self.root.is_dir()
    }

    fn object_path(key: &str) -> Result<StoragePath> {
        StoragePath::parse(key).map_err(|e| StorageError::InvalidKey(format!("{key}: {e}")))
    }
}

/// Parts allowed in flight before `write` waits; bounds buffered memory per writer
const MAX_INFLIGHT_PARTS: usize = 2;

/// Incremental artifact upload backed by an object_store multipart write
///
/// Memory stays at a few parts regardless of artifact size. Call `abort` on
/// any error so the staged data is removed.
pub struct ArtifactWriter {
    key: String,
    upload: WriteMultipart,
    written: u64,
}

impl ArtifactWriter {
    pub async fn write(&mut self, chunk: &[u8]) -> Result<()> {
        self.upload.wait_for_capacity(MAX_INFLIGHT_PARTS).await?;
        self.upload.write(chunk);
        self.written += chunk.len() as u64;
        Ok(())
    }

    /// Bytes accepted so far
    pub fn written(&self) -> u64 {
        self.written
    }

    pub async fn finish(self) -> Result<UploadMetadata> {
        let put_result = self.upload.finish().await?;
        tracing::info!(key = %self.key, size = self.written, "Streamed to storage");

        Ok(UploadMetadata {
            key: self.key,
            etag: put_result.e_tag,
            size: self.written,
        })
    }

    pub async fn abort(self) -> Result<()> {
        self.upload.abort().await?;
        Ok(())
    }
}
