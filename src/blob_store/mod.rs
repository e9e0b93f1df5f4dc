/// Blob Storage System
///
/// Content-addressed storage of raw bytes behind interchangeable connectors
/// (memory, local filesystem, S3, Azure Blob, Google Cloud Storage, IPFS),
/// plus the entry service that tracks metadata for every stored blob.

pub mod cloud;
pub mod file;
pub mod ipfs;
pub mod memory;
pub mod models;
pub mod service;

pub use cloud::{
    AzureConnectorConfig, GcpConnectorConfig, ObjectStoreBlobConnector, S3ConnectorConfig,
};
pub use file::{FileBlobConnector, FileConnectorConfig};
pub use ipfs::{IpfsBlobConnector, IpfsConnectorConfig};
pub use memory::MemoryBlobConnector;
pub use models::*;
pub use service::{BlobStorageService, BlobStorageServiceConfig};

use crate::error::{BlobError, BlobResult};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;

/// Blob storage connector trait
///
/// Implementations store raw bytes in one backend and address them by
/// `blob:<namespace>:<content-id>`. Backend "not found" signals are reported
/// as `None` / `false`, every other backend failure as an error.
#[async_trait]
pub trait BlobStorageConnector: Send + Sync {
    /// Namespace segment of the ids this connector produces
    fn namespace(&self) -> &str;

    /// Store a blob and return its id
    async fn set(&self, blob: Vec<u8>) -> BlobResult<String>;

    /// Retrieve a blob by id
    async fn get(&self, id: &str) -> BlobResult<Option<Vec<u8>>>;

    /// Remove a blob by id, returning whether it existed
    async fn remove(&self, id: &str) -> BlobResult<bool>;
}

/// Fail fast when a mandatory config field is empty
pub(crate) fn require_non_empty(field: &str, value: &str) -> BlobResult<()> {
    if value.trim().is_empty() {
        return Err(BlobError::Validation(format!("{} must not be empty", field)));
    }
    Ok(())
}

/// Validate a configured namespace override
pub(crate) fn require_namespace(namespace: &str) -> BlobResult<()> {
    if !crate::urn::is_valid_namespace(namespace) {
        return Err(BlobError::Validation(format!(
            "Invalid connector namespace: \"{}\"",
            namespace
        )));
    }
    Ok(())
}

/// Connector configuration, one variant per backend
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ConnectorConfig {
    Memory {
        #[serde(default = "memory::default_namespace")]
        namespace: String,
    },
    File(FileConnectorConfig),
    S3(S3ConnectorConfig),
    Azure(AzureConnectorConfig),
    Gcp(GcpConnectorConfig),
    Ipfs(IpfsConnectorConfig),
}

impl ConnectorConfig {
    /// Namespace the built connector will own
    pub fn namespace(&self) -> &str {
        match self {
            ConnectorConfig::Memory { namespace } => namespace,
            ConnectorConfig::File(config) => &config.namespace,
            ConnectorConfig::S3(config) => &config.namespace,
            ConnectorConfig::Azure(config) => &config.namespace,
            ConnectorConfig::Gcp(config) => &config.namespace,
            ConnectorConfig::Ipfs(config) => &config.namespace,
        }
    }

    /// Build the connector described by this config
    pub async fn build(&self) -> BlobResult<Arc<dyn BlobStorageConnector>> {
        let connector: Arc<dyn BlobStorageConnector> = match self {
            ConnectorConfig::Memory { namespace } => {
                Arc::new(MemoryBlobConnector::with_namespace(namespace)?)
            }
            ConnectorConfig::File(config) => {
                let connector = FileBlobConnector::new(config.clone())?;
                connector.bootstrap().await?;
                Arc::new(connector)
            }
            ConnectorConfig::S3(config) => Arc::new(ObjectStoreBlobConnector::s3(config)?),
            ConnectorConfig::Azure(config) => Arc::new(ObjectStoreBlobConnector::azure(config)?),
            ConnectorConfig::Gcp(config) => Arc::new(ObjectStoreBlobConnector::gcp(config)?),
            ConnectorConfig::Ipfs(config) => Arc::new(IpfsBlobConnector::new(config.clone())?),
        };

        tracing::info!(namespace = connector.namespace(), "blob_connector_initialized");
        Ok(connector)
    }
}

/// Namespace to connector mapping, assembled once at startup
#[derive(Clone, Default)]
pub struct ConnectorRegistry {
    connectors: HashMap<String, Arc<dyn BlobStorageConnector>>,
}

impl ConnectorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a connector under its own namespace
    pub fn register(&mut self, connector: Arc<dyn BlobStorageConnector>) -> BlobResult<()> {
        let namespace = connector.namespace().to_string();
        if self.connectors.contains_key(&namespace) {
            return Err(BlobError::Validation(format!(
                "A connector is already registered for namespace \"{}\"",
                namespace
            )));
        }
        self.connectors.insert(namespace, connector);
        Ok(())
    }

    /// Builder-style register
    pub fn with(mut self, connector: Arc<dyn BlobStorageConnector>) -> BlobResult<Self> {
        self.register(connector)?;
        Ok(self)
    }

    /// Build every configured connector
    pub async fn from_configs(configs: &[ConnectorConfig]) -> BlobResult<Self> {
        let mut registry = Self::new();
        for config in configs {
            registry.register(config.build().await?)?;
        }
        Ok(registry)
    }

    /// Look up the connector for a namespace
    pub fn resolve(&self, namespace: &str) -> BlobResult<Arc<dyn BlobStorageConnector>> {
        self.connectors.get(namespace).cloned().ok_or_else(|| {
            BlobError::Validation(format!(
                "No blob connector registered for namespace \"{}\"",
                namespace
            ))
        })
    }

    pub fn contains(&self, namespace: &str) -> bool {
        self.connectors.contains_key(namespace)
    }

    /// Registered namespaces, sorted
    pub fn namespaces(&self) -> Vec<String> {
        let mut namespaces: Vec<String> = self.connectors.keys().cloned().collect();
        namespaces.sort();
        namespaces
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_registry_resolves_by_namespace() {
        let registry = ConnectorRegistry::new()
            .with(Arc::new(MemoryBlobConnector::new()))
            .unwrap()
            .with(Arc::new(MemoryBlobConnector::with_namespace("scratch").unwrap()))
            .unwrap();

        assert_eq!(registry.namespaces(), vec!["memory", "scratch"]);
        assert_eq!(registry.resolve("scratch").unwrap().namespace(), "scratch");
        assert!(matches!(
            registry.resolve("aws"),
            Err(BlobError::Validation(_))
        ));
    }

    #[tokio::test]
    async fn test_registry_rejects_duplicate_namespace() {
        let mut registry = ConnectorRegistry::new();
        registry.register(Arc::new(MemoryBlobConnector::new())).unwrap();
        assert!(registry.register(Arc::new(MemoryBlobConnector::new())).is_err());
    }

    #[tokio::test]
    async fn test_build_from_config() {
        let dir = tempfile::tempdir().unwrap();
        let configs = vec![
            ConnectorConfig::Memory {
                namespace: "memory".to_string(),
            },
            ConnectorConfig::File(FileConnectorConfig::new(dir.path().join("blobs"))),
        ];

        let registry = ConnectorRegistry::from_configs(&configs).await.unwrap();
        assert_eq!(registry.namespaces(), vec!["file", "memory"]);
        assert!(dir.path().join("blobs").exists());
    }

    #[test]
    fn test_require_non_empty() {
        assert!(require_non_empty("bucket", "").is_err());
        assert!(require_non_empty("bucket", "   ").is_err());
        assert!(require_non_empty("bucket", "blobs").is_ok());
    }
}
