/// Cloud object storage connectors (S3, Azure Blob, Google Cloud Storage)
///
/// All three backends go through the `object_store` crate, so a single
/// connector type wraps whichever store the config builds.
use crate::{
    blob_store::{require_namespace, require_non_empty, BlobStorageConnector},
    error::{BlobError, BlobResult},
    hashing,
    urn::BlobUrn,
};
use async_trait::async_trait;
use object_store::{
    aws::AmazonS3Builder, azure::MicrosoftAzureBuilder, gcp::GoogleCloudStorageBuilder,
    path::Path as ObjectPath, ObjectStore, PutPayload,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, error, info};

/// Configuration for S3-compatible storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct S3ConnectorConfig {
    /// S3 bucket name
    pub bucket: String,

    /// AWS region (e.g., "us-east-1")
    pub region: String,

    /// Custom endpoint for S3-compatible services (e.g., MinIO)
    /// Example: "http://localhost:9000"
    #[serde(default)]
    pub endpoint: Option<String>,

    /// AWS access key ID
    pub access_key_id: String,

    /// AWS secret access key
    pub secret_access_key: String,

    /// Path prefix for all objects
    #[serde(default)]
    pub prefix: String,

    /// Namespace override (default: "aws")
    #[serde(default = "default_s3_namespace")]
    pub namespace: String,
}

fn default_s3_namespace() -> String {
    "aws".to_string()
}

impl Default for S3ConnectorConfig {
    fn default() -> Self {
        Self {
            bucket: String::new(),
            region: "us-east-1".to_string(),
            endpoint: None,
            access_key_id: String::new(),
            secret_access_key: String::new(),
            prefix: String::new(),
            namespace: default_s3_namespace(),
        }
    }
}

impl S3ConnectorConfig {
    pub fn validate(&self) -> BlobResult<()> {
        require_non_empty("bucket", &self.bucket)?;
        require_non_empty("region", &self.region)?;
        require_non_empty("access_key_id", &self.access_key_id)?;
        require_non_empty("secret_access_key", &self.secret_access_key)?;
        require_namespace(&self.namespace)
    }
}

/// Configuration for Azure Blob storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AzureConnectorConfig {
    /// Storage account name
    pub account_name: String,

    /// Storage account key
    pub account_key: String,

    /// Blob container name
    pub container: String,

    /// Talk to a local Azurite emulator instead of the real service
    #[serde(default)]
    pub use_emulator: bool,

    #[serde(default)]
    pub prefix: String,

    /// Namespace override (default: "azure")
    #[serde(default = "default_azure_namespace")]
    pub namespace: String,
}

fn default_azure_namespace() -> String {
    "azure".to_string()
}

impl AzureConnectorConfig {
    pub fn validate(&self) -> BlobResult<()> {
        require_non_empty("account_name", &self.account_name)?;
        require_non_empty("account_key", &self.account_key)?;
        require_non_empty("container", &self.container)?;
        require_namespace(&self.namespace)
    }
}

/// Configuration for Google Cloud Storage
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GcpConnectorConfig {
    /// GCP project that owns the bucket
    pub project_id: String,

    /// Service account key JSON
    pub credentials: String,

    /// Bucket name
    pub bucket: String,

    #[serde(default)]
    pub prefix: String,

    /// Namespace override (default: "gcp")
    #[serde(default = "default_gcp_namespace")]
    pub namespace: String,
}

fn default_gcp_namespace() -> String {
    "gcp".to_string()
}

impl GcpConnectorConfig {
    pub fn validate(&self) -> BlobResult<()> {
        require_non_empty("project_id", &self.project_id)?;
        require_non_empty("credentials", &self.credentials)?;
        require_non_empty("bucket", &self.bucket)?;
        require_namespace(&self.namespace)
    }
}

/// Object storage connector
///
/// Object key is `<prefix><content-id>`.
#[derive(Clone)]
pub struct ObjectStoreBlobConnector {
    store: Arc<dyn ObjectStore>,
    namespace: String,
    prefix: String,
}

impl ObjectStoreBlobConnector {
    /// Wrap an already built store
    pub fn with_store(
        store: Arc<dyn ObjectStore>,
        namespace: &str,
        prefix: &str,
    ) -> BlobResult<Self> {
        require_namespace(namespace)?;
        Ok(Self {
            store,
            namespace: namespace.to_string(),
            prefix: normalize_prefix(prefix),
        })
    }

    /// S3 or S3-compatible storage
    pub fn s3(config: &S3ConnectorConfig) -> BlobResult<Self> {
        config.validate()?;
        info!(
            "Initializing S3 blob storage (bucket: {}, region: {})",
            config.bucket, config.region
        );

        let mut builder = AmazonS3Builder::new()
            .with_bucket_name(&config.bucket)
            .with_region(&config.region)
            .with_access_key_id(&config.access_key_id)
            .with_secret_access_key(&config.secret_access_key);

        if let Some(endpoint) = &config.endpoint {
            debug!("Using custom S3 endpoint: {}", endpoint);
            builder = builder
                .with_endpoint(endpoint)
                .with_allow_http(endpoint.starts_with("http://"));
        }

        let store = builder
            .build()
            .map_err(|e| BlobError::Validation(format!("Failed to build S3 store: {}", e)))?;

        Self::with_store(Arc::new(store), &config.namespace, &config.prefix)
    }

    /// Azure Blob storage
    pub fn azure(config: &AzureConnectorConfig) -> BlobResult<Self> {
        config.validate()?;
        info!(
            "Initializing Azure blob storage (account: {}, container: {})",
            config.account_name, config.container
        );

        let store = MicrosoftAzureBuilder::new()
            .with_account(&config.account_name)
            .with_access_key(&config.account_key)
            .with_container_name(&config.container)
            .with_use_emulator(config.use_emulator)
            .build()
            .map_err(|e| BlobError::Validation(format!("Failed to build Azure store: {}", e)))?;

        Self::with_store(Arc::new(store), &config.namespace, &config.prefix)
    }

    /// Google Cloud Storage
    pub fn gcp(config: &GcpConnectorConfig) -> BlobResult<Self> {
        config.validate()?;
        info!(
            "Initializing GCP blob storage (project: {}, bucket: {})",
            config.project_id, config.bucket
        );

        let store = GoogleCloudStorageBuilder::new()
            .with_bucket_name(&config.bucket)
            .with_service_account_key(&config.credentials)
            .build()
            .map_err(|e| BlobError::Validation(format!("Failed to build GCP store: {}", e)))?;

        Self::with_store(Arc::new(store), &config.namespace, &config.prefix)
    }

    fn object_path(&self, content_id: &str) -> ObjectPath {
        ObjectPath::from(format!("{}{}", self.prefix, content_id))
    }
}

fn normalize_prefix(prefix: &str) -> String {
    let trimmed = prefix.trim_matches('/');
    if trimmed.is_empty() {
        String::new()
    } else {
        format!("{}/", trimmed)
    }
}

#[async_trait]
impl BlobStorageConnector for ObjectStoreBlobConnector {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn set(&self, blob: Vec<u8>) -> BlobResult<String> {
        let content_id = hashing::content_id(&blob);
        let path = self.object_path(&content_id);
        let size = blob.len();

        self.store
            .put(&path, PutPayload::from(blob))
            .await
            .map_err(|e| {
                error!("Failed to upload blob to {}: {}", self.namespace, e);
                BlobError::Storage(format!("{} upload failed: {}", self.namespace, e))
            })?;

        debug!("✓ Blob uploaded to {}: {} ({} bytes)", self.namespace, path, size);
        Ok(BlobUrn::new(&self.namespace, content_id).to_string())
    }

    async fn get(&self, id: &str) -> BlobResult<Option<Vec<u8>>> {
        let urn = BlobUrn::parse_for(id, &self.namespace)?;
        let path = self.object_path(urn.content_id());

        match self.store.get(&path).await {
            Ok(result) => {
                let data = result.bytes().await.map_err(|e| {
                    error!("Failed to read object body: {}", e);
                    BlobError::Storage(format!("Failed to read object {}: {}", path, e))
                })?;
                Ok(Some(data.to_vec()))
            }
            Err(object_store::Error::NotFound { .. }) => {
                debug!("Blob not found in {}: {}", self.namespace, path);
                Ok(None)
            }
            Err(e) => {
                error!("Failed to download blob from {}: {}", self.namespace, e);
                Err(BlobError::Storage(format!(
                    "{} download failed: {}",
                    self.namespace, e
                )))
            }
        }
    }

    async fn remove(&self, id: &str) -> BlobResult<bool> {
        let urn = BlobUrn::parse_for(id, &self.namespace)?;
        let path = self.object_path(urn.content_id());

        // Object stores delete missing keys silently, so check existence first
        match self.store.head(&path).await {
            Ok(_) => {}
            Err(object_store::Error::NotFound { .. }) => return Ok(false),
            Err(e) => {
                return Err(BlobError::Storage(format!(
                    "{} head object failed: {}",
                    self.namespace, e
                )))
            }
        }

        match self.store.delete(&path).await {
            Ok(()) => {
                debug!("✓ Blob deleted from {}: {}", self.namespace, path);
                Ok(true)
            }
            Err(object_store::Error::NotFound { .. }) => Ok(false),
            Err(e) => {
                error!("Failed to delete blob from {}: {}", self.namespace, e);
                Err(BlobError::Storage(format!(
                    "{} delete failed: {}",
                    self.namespace, e
                )))
            }
        }
    }
}
