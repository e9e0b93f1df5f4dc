/// Application context and dependency injection
use crate::{
    blob_store::{BlobStorageService, BlobStorageServiceConfig, ConnectorRegistry},
    config::{EntryStoreConfig, ServerConfig},
    db,
    entity_store::{EntityStorageConnector, MemoryEntityStorage, SqliteEntityStorage},
    error::{BlobError, BlobResult},
    vault::{MemoryVaultConnector, VaultConnector},
};
use sqlx::SqlitePool;
use std::sync::Arc;

/// Application context holding all shared services
#[derive(Clone)]
pub struct AppContext {
    pub config: Arc<ServerConfig>,
    /// Entry database, `None` when entries are kept in memory
    pub entry_db: Option<SqlitePool>,
    pub blob_service: Arc<BlobStorageService>,
}

impl AppContext {
    /// Create a new application context from configuration
    pub async fn new(config: ServerConfig) -> BlobResult<Self> {
        // Validate configuration
        config.validate()?;

        // Create data directory if it doesn't exist
        if !config.storage.data_directory.exists() {
            tokio::fs::create_dir_all(&config.storage.data_directory)
                .await
                .map_err(|e| {
                    BlobError::Internal(format!(
                        "Failed to create directory {:?}: {}",
                        config.storage.data_directory, e
                    ))
                })?;
        }

        // Initialize entry store
        let (entry_db, entries): (Option<SqlitePool>, Arc<dyn EntityStorageConnector>) =
            match &config.storage.entry_store {
                EntryStoreConfig::Sqlite { location } => {
                    let pool = db::create_pool(location, db::DatabaseOptions::default()).await?;
                    db::test_connection(&pool).await?;

                    let store = SqliteEntityStorage::new(pool.clone());
                    store.bootstrap().await?;
                    (Some(pool), Arc::new(store) as Arc<dyn EntityStorageConnector>)
                }
                EntryStoreConfig::Memory => {
                    tracing::warn!("Entry store is in memory, entries are lost on restart");
                    (None, Arc::new(MemoryEntityStorage::new()) as Arc<dyn EntityStorageConnector>)
                }
            };

        // Initialize connectors
        let connectors = ConnectorRegistry::from_configs(&config.storage.connectors).await?;

        // Initialize vault (only if a master key is configured)
        let vault: Option<Arc<dyn VaultConnector>> = match &config.vault.master_key_hex {
            Some(hex_key) => Some(Arc::new(MemoryVaultConnector::from_hex_master_key(hex_key)?)
                as Arc<dyn VaultConnector>),
            None => None,
        };

        Self::from_parts(config, entry_db, connectors, entries, vault)
    }

    /// Assemble a context from already built collaborators
    pub fn from_parts(
        config: ServerConfig,
        entry_db: Option<SqlitePool>,
        connectors: ConnectorRegistry,
        entries: Arc<dyn EntityStorageConnector>,
        vault: Option<Arc<dyn VaultConnector>>,
    ) -> BlobResult<Self> {
        let service_config = BlobStorageServiceConfig {
            default_namespace: config.storage.default_namespace.clone(),
            vault_key_id: config.vault.key_id.clone(),
            identity_scoping: config.identity,
            max_blob_size: Some(config.service.blob_upload_limit),
            json_ld_context: config.json_ld.context.clone(),
        };

        let blob_service = Arc::new(BlobStorageService::new(
            service_config,
            connectors,
            entries,
            vault,
        )?);

        tracing::info!(
            namespaces = ?blob_service.connectors().namespaces(),
            default_namespace = %config.storage.default_namespace,
            "blob_service_ready"
        );

        Ok(Self {
            config: Arc::new(config),
            entry_db,
            blob_service,
        })
    }

    /// Get service URL
    pub fn service_url(&self) -> String {
        format!(
            "http://{}:{}{}",
            self.config.service.hostname, self.config.service.port, self.config.service.route_prefix
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::blob_store::{ConnectorConfig, FileConnectorConfig};
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_new_with_sqlite_and_file_connector() {
        let dir = tempdir().unwrap();
        let mut config = ServerConfig::default();
        config.storage.data_directory = dir.path().to_path_buf();
        config.storage.entry_store = EntryStoreConfig::Sqlite {
            location: dir.path().join("entries.sqlite"),
        };
        config
            .storage
            .connectors
            .push(ConnectorConfig::File(FileConnectorConfig::new(dir.path().join("blobs"))));
        config.storage.default_namespace = "file".to_string();

        let ctx = AppContext::new(config).await.unwrap();
        assert!(ctx.entry_db.is_some());
        assert_eq!(
            ctx.blob_service.connectors().namespaces(),
            vec!["file", "memory"]
        );
        assert_eq!(ctx.service_url(), "http://localhost:3000/blob-storage");
    }

    #[tokio::test]
    async fn test_new_with_vault() {
        let dir = tempdir().unwrap();
        let mut config = ServerConfig::default();
        config.storage.data_directory = dir.path().to_path_buf();
        config.vault.key_id = Some("blob-key".to_string());
        config.vault.master_key_hex = Some("ab".repeat(32));

        let ctx = AppContext::new(config).await.unwrap();
        assert_eq!(
            ctx.blob_service.config().vault_key_id.as_deref(),
            Some("blob-key")
        );
    }
}
