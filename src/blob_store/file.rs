/// Local filesystem blob connector
use crate::{
    blob_store::{require_namespace, require_non_empty, BlobStorageConnector},
    error::{BlobError, BlobResult},
    hashing,
    urn::BlobUrn,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

/// Configuration for the filesystem connector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileConnectorConfig {
    /// Root directory for blob files
    pub directory: PathBuf,

    /// Extension appended to every blob file (default: "blob")
    #[serde(default = "default_extension")]
    pub extension: String,

    /// Namespace override (default: "file")
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

fn default_extension() -> String {
    "blob".to_string()
}

fn default_namespace() -> String {
    FileBlobConnector::NAMESPACE.to_string()
}

impl FileConnectorConfig {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        Self {
            directory: directory.into(),
            extension: default_extension(),
            namespace: default_namespace(),
        }
    }

    pub fn validate(&self) -> BlobResult<()> {
        require_non_empty("directory", &self.directory.to_string_lossy())?;
        require_non_empty("extension", &self.extension)?;
        require_namespace(&self.namespace)?;
        if self.extension.contains(['/', '\\', '.']) {
            return Err(BlobError::Validation(format!(
                "extension must be a bare suffix, got \"{}\"",
                self.extension
            )));
        }
        Ok(())
    }
}

/// Filesystem storage connector
///
/// Stores blobs on the local filesystem with directory sharding
/// based on hash prefixes to prevent too many files in one directory.
#[derive(Clone)]
pub struct FileBlobConnector {
    config: FileConnectorConfig,
}

impl FileBlobConnector {
    pub const NAMESPACE: &'static str = "file";

    /// Create a new filesystem connector
    pub fn new(config: FileConnectorConfig) -> BlobResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Create the root directory if it doesn't exist
    pub async fn bootstrap(&self) -> BlobResult<()> {
        fs::create_dir_all(&self.config.directory).await.map_err(|e| {
            BlobError::Storage(format!(
                "Failed to create blob directory {:?}: {}",
                self.config.directory, e
            ))
        })
    }

    /// Get the file path for a content id
    ///
    /// Uses directory sharding: {base}/{first2chars}/{hash}.{ext}
    fn blob_path(&self, content_id: &str) -> PathBuf {
        let file_name = format!("{}.{}", content_id, self.config.extension);
        if content_id.len() >= 2 && content_id.is_char_boundary(2) {
            self.config
                .directory
                .join(&content_id[0..2])
                .join(file_name)
        } else {
            self.config.directory.join("_").join(file_name)
        }
    }
}

#[async_trait]
impl BlobStorageConnector for FileBlobConnector {
    fn namespace(&self) -> &str {
        &self.config.namespace
    }

    async fn set(&self, blob: Vec<u8>) -> BlobResult<String> {
        let content_id = hashing::content_id(&blob);
        let blob_path = self.blob_path(&content_id);

        if let Some(parent) = blob_path.parent() {
            fs::create_dir_all(parent).await.map_err(|e| {
                BlobError::Storage(format!("Failed to create blob directory: {}", e))
            })?;
        }

        fs::write(&blob_path, blob).await.map_err(|e| {
            BlobError::Storage(format!("Failed to write blob {}: {}", content_id, e))
        })?;

        tracing::debug!(path = %blob_path.display(), "blob_file_written");
        Ok(BlobUrn::new(&self.config.namespace, content_id).to_string())
    }

    async fn get(&self, id: &str) -> BlobResult<Option<Vec<u8>>> {
        let urn = BlobUrn::parse_for(id, &self.config.namespace)?;
        let blob_path = self.blob_path(urn.content_id());

        match fs::read(&blob_path).await {
            Ok(data) => Ok(Some(data)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(BlobError::Storage(format!(
                "Failed to read blob {}: {}",
                id, e
            ))),
        }
    }

    async fn remove(&self, id: &str) -> BlobResult<bool> {
        let urn = BlobUrn::parse_for(id, &self.config.namespace)?;
        let blob_path = self.blob_path(urn.content_id());

        match fs::remove_file(&blob_path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(BlobError::Storage(format!(
                "Failed to delete blob {}: {}",
                id, e
            ))),
        }
    }
}
