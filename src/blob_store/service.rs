/// Blob Storage Service
///
/// Coordinates blob connectors with entry metadata tracking. Every operation
/// takes a `TenantContext`; whether its identities are enforced is decided
/// once by `IdentityScoping` in the service config.
use crate::{
    blob_store::{
        BlobStorageEntry, BlobStorageEntryList, BlobStorageEntryView, ConnectorRegistry,
        CreateBlobRequest, GetOptions, IdentityScoping, QueryRequest, TenantContext,
        UpdateBlobRequest, BLOB_STORAGE_ENTRY_TYPE, ITEM_LIST_TYPE,
    },
    entity_store::{Condition, EntityStorageConnector, SortBy, SortDirection},
    error::{BlobError, BlobResult},
    hashing, json_ld, metrics, mime,
    urn::BlobUrn,
    vault::{EncryptionAlgorithm, VaultConnector},
};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::{SecondsFormat, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Sort property used when a query doesn't choose one
pub const DEFAULT_ORDER_BY: &str = "dateCreated";

/// Blob storage service configuration
#[derive(Debug, Clone)]
pub struct BlobStorageServiceConfig {
    /// Connector used when a create doesn't name one
    pub default_namespace: String,
    /// Vault key used to encrypt new blobs, encryption is off when `None`
    pub vault_key_id: Option<String>,
    pub identity_scoping: IdentityScoping,
    /// Largest accepted plaintext payload in bytes
    pub max_blob_size: Option<usize>,
    /// Vocabulary added to every response context
    pub json_ld_context: String,
}

impl Default for BlobStorageServiceConfig {
    fn default() -> Self {
        Self {
            default_namespace: crate::blob_store::MemoryBlobConnector::NAMESPACE.to_string(),
            vault_key_id: None,
            identity_scoping: IdentityScoping::disabled(),
            max_blob_size: None,
            json_ld_context: json_ld::DEFAULT_BLOB_STORAGE_CONTEXT.to_string(),
        }
    }
}

/// Main blob storage service
#[derive(Clone)]
pub struct BlobStorageService {
    config: BlobStorageServiceConfig,
    connectors: ConnectorRegistry,
    entries: Arc<dyn EntityStorageConnector>,
    vault: Option<Arc<dyn VaultConnector>>,
}

fn timestamp() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// Count the outcome of an operation and pass the result through
fn observe<T>(operation: &str, result: BlobResult<T>) -> BlobResult<T> {
    metrics::record_blob_operation(operation, result.is_ok());
    if let Err(e) = &result {
        debug!(operation, error = %e, "blob_operation_failed");
    }
    result
}

impl BlobStorageService {
    /// Create a new blob storage service
    pub fn new(
        config: BlobStorageServiceConfig,
        connectors: ConnectorRegistry,
        entries: Arc<dyn EntityStorageConnector>,
        vault: Option<Arc<dyn VaultConnector>>,
    ) -> BlobResult<Self> {
        if !connectors.contains(&config.default_namespace) {
            return Err(BlobError::Validation(format!(
                "Default namespace \"{}\" has no registered connector",
                config.default_namespace
            )));
        }

        match (&config.vault_key_id, &vault) {
            (Some(key_id), _) if key_id.trim().is_empty() => {
                return Err(BlobError::Validation(
                    "vault_key_id must not be empty".to_string(),
                ));
            }
            (Some(_), None) => {
                return Err(BlobError::Validation(
                    "vault_key_id is set but no vault connector was provided".to_string(),
                ));
            }
            _ => {}
        }

        Ok(Self {
            config,
            connectors,
            entries,
            vault,
        })
    }

    pub fn config(&self) -> &BlobStorageServiceConfig {
        &self.config
    }

    pub fn connectors(&self) -> &ConnectorRegistry {
        &self.connectors
    }

    /// Store a blob and record its entry, returning the blob id
    ///
    /// Every failure is wrapped in `BlobError::CreateFailed`. The blob write
    /// and the entry write are independent, so a failure after the first
    /// leaves an unreferenced blob behind.
    pub async fn create(
        &self,
        request: CreateBlobRequest,
        tenant: &TenantContext,
    ) -> BlobResult<String> {
        let result = self
            .create_entry(request, tenant)
            .await
            .map_err(|e| BlobError::CreateFailed(Box::new(e)));
        observe("create", result)
    }

    async fn create_entry(
        &self,
        request: CreateBlobRequest,
        tenant: &TenantContext,
    ) -> BlobResult<String> {
        self.require_identity(tenant)?;

        if request.blob.trim().is_empty() {
            return Err(BlobError::Validation("blob must not be empty".to_string()));
        }
        let blob = STANDARD
            .decode(request.blob.trim())
            .map_err(|e| BlobError::Validation(format!("blob must be valid base64: {}", e)))?;

        let blob_size = blob.len();
        if let Some(limit) = self.config.max_blob_size {
            if blob_size > limit {
                return Err(BlobError::Validation(format!(
                    "Blob size {} exceeds maximum {}",
                    blob_size, limit
                )));
            }
        }

        let encoding_format = request
            .encoding_format
            .or_else(|| mime::detect_mime_type(&blob).map(str::to_string));
        let file_extension = request
            .file_extension
            .or_else(|| encoding_format.as_deref().and_then(mime::default_extension));

        if let Some(metadata) = &request.metadata {
            json_ld::validate_node(metadata)?;
        }

        let blob_hash = hashing::integrity_hash(&blob);

        let is_encrypted =
            !request.options.disable_encryption && self.config.vault_key_id.is_some();
        let (stored, vault_key) = if is_encrypted {
            let key_name = self.key_reference(tenant)?;
            let ciphertext = self
                .vault()?
                .encrypt(&key_name, EncryptionAlgorithm::ChaCha20Poly1305, &blob)
                .await?;
            (ciphertext, Some(key_name))
        } else {
            (blob, None)
        };

        let namespace = request
            .options
            .namespace
            .unwrap_or_else(|| self.config.default_namespace.clone());
        let connector = self.connectors.resolve(&namespace)?;
        metrics::record_connector_call(&namespace, "set");
        let id = connector.set(stored).await?;

        let scoping = self.config.identity_scoping;
        let entry = BlobStorageEntry {
            id: id.clone(),
            date_created: timestamp(),
            date_modified: None,
            blob_size: blob_size as u64,
            blob_hash,
            encoding_format,
            file_extension,
            metadata: request.metadata,
            is_encrypted,
            vault_key,
            user_identity: tenant
                .user_identity
                .clone()
                .filter(|_| scoping.include_user_identity),
            node_identity: tenant
                .node_identity
                .clone()
                .filter(|_| scoping.include_node_identity),
        };
        self.entries.set(entry).await?;

        metrics::record_bytes_stored(blob_size as u64);
        info!(id = %id, size = blob_size, encrypted = is_encrypted, "blob_created");
        Ok(id)
    }

    /// Fetch an entry, optionally with its content
    pub async fn get(
        &self,
        id: &str,
        options: GetOptions,
        tenant: &TenantContext,
    ) -> BlobResult<BlobStorageEntryView> {
        let result: BlobResult<BlobStorageEntryView> = async {
            let (entry, content) = if options.include_content {
                let (entry, content) = self.fetch_with_content(id, tenant).await?;
                (entry, Some(STANDARD.encode(content)))
            } else {
                (self.fetch_entry(id, tenant).await?, None)
            };

            let mut context = json_ld::base_context(&self.config.json_ld_context);
            json_ld::merge_context(&mut context, entry.metadata.as_ref());

            Ok(BlobStorageEntryView {
                context,
                entry_type: BLOB_STORAGE_ENTRY_TYPE.to_string(),
                entry: entry.without_identity(),
                blob: content,
            })
        }
        .await;
        observe("get", result)
    }

    /// Fetch an entry together with its decrypted bytes
    pub async fn get_content(
        &self,
        id: &str,
        tenant: &TenantContext,
    ) -> BlobResult<(BlobStorageEntry, Vec<u8>)> {
        let result = self
            .fetch_with_content(id, tenant)
            .await
            .map(|(entry, content)| (entry.without_identity(), content));
        observe("get_content", result)
    }

    /// Metadata-only update; size, hash, creation date and encryption never change
    pub async fn update(
        &self,
        id: &str,
        request: UpdateBlobRequest,
        tenant: &TenantContext,
    ) -> BlobResult<()> {
        let result: BlobResult<()> = async {
            let mut entry = self.fetch_entry(id, tenant).await?;

            if let Some(metadata) = &request.metadata {
                json_ld::validate_node(metadata)?;
            }

            if let Some(encoding_format) = request.encoding_format {
                entry.encoding_format = Some(encoding_format);
            }
            if let Some(file_extension) = request.file_extension {
                entry.file_extension = Some(file_extension);
            }
            if let Some(metadata) = request.metadata {
                entry.metadata = Some(metadata);
            }
            entry.date_modified = Some(timestamp());

            self.entries.set(entry).await?;
            info!(id = %id, "blob_updated");
            Ok(())
        }
        .await;
        observe("update", result)
    }

    /// Remove the caller's entry, then the blob once no entry references it
    pub async fn remove(&self, id: &str, tenant: &TenantContext) -> BlobResult<()> {
        let result: BlobResult<()> = async {
            let urn = BlobUrn::parse(id)?;
            self.require_identity(tenant)?;
            let connector = self.connectors.resolve(urn.namespace())?;

            let removed = self.entries.remove(id, &self.identity_conditions(tenant)).await?;
            if !removed {
                return Err(BlobError::NotFound(format!("Blob entry not found: {}", id)));
            }

            let remaining = self.entries.count(id).await?;
            if remaining > 0 {
                debug!(id = %id, remaining, "blob_still_referenced");
            } else {
                metrics::record_connector_call(urn.namespace(), "remove");
                if !connector.remove(id).await? {
                    warn!(id = %id, "blob_already_absent");
                }
            }

            info!(id = %id, "blob_removed");
            Ok(())
        }
        .await;
        observe("remove", result)
    }

    /// List entries visible to the tenant
    pub async fn query(
        &self,
        request: QueryRequest,
        tenant: &TenantContext,
    ) -> BlobResult<BlobStorageEntryList> {
        let result: BlobResult<BlobStorageEntryList> = async {
            self.require_identity(tenant)?;

            let mut conditions = self.identity_conditions(tenant);
            conditions.extend(request.conditions);

            let sort = SortBy {
                property: request
                    .order_by
                    .unwrap_or_else(|| DEFAULT_ORDER_BY.to_string()),
                direction: request
                    .order_by_direction
                    .unwrap_or(SortDirection::Descending),
            };

            let page = self
                .entries
                .query(&conditions, Some(sort), request.cursor, request.page_size)
                .await?;

            let mut context = json_ld::base_context(&self.config.json_ld_context);
            for entry in &page.entries {
                json_ld::merge_context(&mut context, entry.metadata.as_ref());
            }

            Ok(BlobStorageEntryList {
                context,
                list_type: ITEM_LIST_TYPE.to_string(),
                entries: page
                    .entries
                    .into_iter()
                    .map(BlobStorageEntry::without_identity)
                    .collect(),
                cursor: page.cursor,
            })
        }
        .await;
        observe("query", result)
    }

    async fn fetch_entry(&self, id: &str, tenant: &TenantContext) -> BlobResult<BlobStorageEntry> {
        BlobUrn::parse(id)?;
        self.require_identity(tenant)?;

        self.entries
            .get(id, &self.identity_conditions(tenant))
            .await?
            .ok_or_else(|| BlobError::NotFound(format!("Blob entry not found: {}", id)))
    }

    async fn fetch_with_content(
        &self,
        id: &str,
        tenant: &TenantContext,
    ) -> BlobResult<(BlobStorageEntry, Vec<u8>)> {
        let entry = self.fetch_entry(id, tenant).await?;
        let urn = BlobUrn::parse(id)?;
        let connector = self.connectors.resolve(urn.namespace())?;

        metrics::record_connector_call(urn.namespace(), "get");
        let stored = connector
            .get(id)
            .await?
            .ok_or_else(|| BlobError::NotFound(format!("Blob content not found: {}", id)))?;

        let content = if entry.is_encrypted {
            // Decrypt with the key recorded at create, whatever node the reader names
            let key_name = match &entry.vault_key {
                Some(key_name) => key_name.clone(),
                None => self.key_reference(tenant)?,
            };
            self.vault()?
                .decrypt(&key_name, EncryptionAlgorithm::ChaCha20Poly1305, &stored)
                .await?
        } else {
            stored
        };

        Ok((entry, content))
    }

    fn require_identity(&self, tenant: &TenantContext) -> BlobResult<()> {
        let scoping = self.config.identity_scoping;
        if scoping.include_user_identity && tenant.user_identity.is_none() {
            return Err(BlobError::Validation("userIdentity is required".to_string()));
        }
        if scoping.include_node_identity && tenant.node_identity.is_none() {
            return Err(BlobError::Validation("nodeIdentity is required".to_string()));
        }
        Ok(())
    }

    /// Equality constraints for the enforced identity fields
    fn identity_conditions(&self, tenant: &TenantContext) -> Vec<Condition> {
        let scoping = self.config.identity_scoping;
        let mut conditions = Vec::new();
        if scoping.include_user_identity {
            if let Some(user) = &tenant.user_identity {
                conditions.push(Condition::equals("userIdentity", user.as_str()));
            }
        }
        if scoping.include_node_identity {
            if let Some(node) = &tenant.node_identity {
                conditions.push(Condition::equals("nodeIdentity", node.as_str()));
            }
        }
        conditions
    }

    fn vault(&self) -> BlobResult<&Arc<dyn VaultConnector>> {
        self.vault
            .as_ref()
            .ok_or_else(|| BlobError::Vault("No vault connector configured".to_string()))
    }

    /// Key reference for new blobs, `{nodeIdentity}/{vaultKeyId}` when a node is known
    fn key_reference(&self, tenant: &TenantContext) -> BlobResult<String> {
        let key_id = self
            .config
            .vault_key_id
            .as_deref()
            .ok_or_else(|| BlobError::Vault("No vault key configured".to_string()))?;

        Ok(match &tenant.node_identity {
            Some(node) => format!("{}/{}", node, key_id),
            None => key_id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        blob_store::{BlobStorageConnector, CreateOptions, MemoryBlobConnector},
        entity_store::MemoryEntityStorage,
        vault::MemoryVaultConnector,
    };
    use async_trait::async_trait;
    use serde_json::json;

    /// Connector whose backend has lost every blob it was given
    struct LossyConnector {
        remove_error: bool,
    }

    #[async_trait]
    impl BlobStorageConnector for LossyConnector {
        fn namespace(&self) -> &str {
            "lossy"
        }

        async fn set(&self, blob: Vec<u8>) -> BlobResult<String> {
            Ok(BlobUrn::new("lossy", hashing::content_id(&blob)).to_string())
        }

        async fn get(&self, _id: &str) -> BlobResult<Option<Vec<u8>>> {
            Ok(None)
        }

        async fn remove(&self, _id: &str) -> BlobResult<bool> {
            if self.remove_error {
                return Err(BlobError::Storage("bucket unreachable".to_string()));
            }
            Ok(false)
        }
    }

    fn lossy_fixture(remove_error: bool) -> (BlobStorageService, Arc<MemoryEntityStorage>) {
        let entries = Arc::new(MemoryEntityStorage::new());
        let registry = ConnectorRegistry::new()
            .with(Arc::new(LossyConnector { remove_error }))
            .unwrap();
        let config = BlobStorageServiceConfig {
            default_namespace: "lossy".to_string(),
            ..Default::default()
        };
        let service = BlobStorageService::new(config, registry, entries.clone(), None).unwrap();
        (service, entries)
    }

    struct Fixture {
        service: BlobStorageService,
        connector: Arc<MemoryBlobConnector>,
        entries: Arc<MemoryEntityStorage>,
    }

    fn fixture(
        config: BlobStorageServiceConfig,
        vault: Option<Arc<dyn VaultConnector>>,
    ) -> Fixture {
        let connector = Arc::new(MemoryBlobConnector::new());
        let entries = Arc::new(MemoryEntityStorage::new());
        let registry = ConnectorRegistry::new().with(connector.clone()).unwrap();
        let service = BlobStorageService::new(config, registry, entries.clone(), vault).unwrap();
        Fixture {
            service,
            connector,
            entries,
        }
    }

    fn scoped() -> BlobStorageServiceConfig {
        BlobStorageServiceConfig {
            identity_scoping: IdentityScoping {
                include_user_identity: true,
                include_node_identity: false,
            },
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_create_detects_text_plain() {
        let f = fixture(BlobStorageServiceConfig::default(), None);
        let tenant = TenantContext::anonymous();

        let id = f
            .service
            .create(CreateBlobRequest::new("VGVzdA=="), &tenant)
            .await
            .unwrap();
        assert_eq!(id, format!("blob:memory:{}", hashing::content_id(b"Test")));

        let view = f.service.get(&id, GetOptions::default(), &tenant).await.unwrap();
        assert_eq!(view.entry.encoding_format.as_deref(), Some("text/plain"));
        assert_eq!(view.entry.file_extension.as_deref(), Some("txt"));
        assert_eq!(view.entry.blob_size, 4);
        assert_eq!(
            view.entry.blob_hash,
            "sha256:Uy6qvZV0iA2/drm4zACDLCCm7BE9aCKZVQ16bg80XiU="
        );
        assert_eq!(view.blob, None);
        assert!(!view.entry.is_encrypted);
    }

    #[tokio::test]
    async fn test_create_is_content_addressed() {
        let f = fixture(BlobStorageServiceConfig::default(), None);
        let tenant = TenantContext::anonymous();

        let first = f.service.create(CreateBlobRequest::new("VGVzdA=="), &tenant).await.unwrap();
        let second = f.service.create(CreateBlobRequest::new("VGVzdA=="), &tenant).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(f.connector.len().await, 1);
        assert_eq!(f.entries.len().await, 1);
    }

    #[tokio::test]
    async fn test_get_with_content_roundtrip() {
        let f = fixture(BlobStorageServiceConfig::default(), None);
        let tenant = TenantContext::anonymous();
        let payload = STANDARD.encode(b"\x89PNG\r\n\x1a\nrest-of-image");

        let id = f.service.create(CreateBlobRequest::new(payload.clone()), &tenant).await.unwrap();
        let view = f
            .service
            .get(&id, GetOptions { include_content: true }, &tenant)
            .await
            .unwrap();

        assert_eq!(view.blob, Some(payload));
        assert_eq!(view.entry.encoding_format.as_deref(), Some("image/png"));
        assert_eq!(view.entry.file_extension.as_deref(), Some("png"));
    }

    #[tokio::test]
    async fn test_create_rejects_bad_input() {
        let f = fixture(BlobStorageServiceConfig::default(), None);
        let tenant = TenantContext::anonymous();

        let err = f
            .service
            .create(CreateBlobRequest::new("not base64!!"), &tenant)
            .await
            .unwrap_err();
        assert!(matches!(err, BlobError::CreateFailed(_)));
        assert!(matches!(err.root(), BlobError::Validation(_)));

        let mut request = CreateBlobRequest::new("VGVzdA==");
        request.metadata = Some(json!(["not", "a", "node"]));
        let err = f.service.create(request, &tenant).await.unwrap_err();
        assert!(matches!(err.root(), BlobError::Validation(_)));

        // Nothing reaches the connector when validation fails
        assert!(f.connector.is_empty().await);
    }

    #[tokio::test]
    async fn test_create_enforces_size_limit() {
        let config = BlobStorageServiceConfig {
            max_blob_size: Some(3),
            ..Default::default()
        };
        let f = fixture(config, None);

        let err = f
            .service
            .create(CreateBlobRequest::new("VGVzdA=="), &TenantContext::anonymous())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("exceeds maximum"));
    }

    #[tokio::test]
    async fn test_create_unknown_namespace() {
        let f = fixture(BlobStorageServiceConfig::default(), None);
        let mut request = CreateBlobRequest::new("VGVzdA==");
        request.options = CreateOptions {
            disable_encryption: false,
            namespace: Some("aws".to_string()),
        };

        let err = f
            .service
            .create(request, &TenantContext::anonymous())
            .await
            .unwrap_err();
        assert!(matches!(err.root(), BlobError::Validation(_)));
    }

    #[tokio::test]
    async fn test_identity_scoping_separates_tenants() {
        let f = fixture(scoped(), None);
        let alice = TenantContext::user("alice");
        let bob = TenantContext::user("bob");

        let a = f.service.create(CreateBlobRequest::new("VGVzdA=="), &alice).await.unwrap();
        let b = f.service.create(CreateBlobRequest::new("VGVzdA=="), &bob).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(f.entries.len().await, 2);

        let listed = f.service.query(QueryRequest::default(), &alice).await.unwrap();
        assert_eq!(listed.entries.len(), 1);
        assert_eq!(listed.entries[0].user_identity, None);

        let err = f
            .service
            .get(&a, GetOptions::default(), &TenantContext::user("carol"))
            .await
            .unwrap_err();
        assert!(matches!(err, BlobError::NotFound(_)));

        let err = f
            .service
            .query(QueryRequest::default(), &TenantContext::anonymous())
            .await
            .unwrap_err();
        assert!(matches!(err, BlobError::Validation(_)));
    }

    #[tokio::test]
    async fn test_update_changes_metadata_only() {
        let f = fixture(BlobStorageServiceConfig::default(), None);
        let tenant = TenantContext::anonymous();
        let id = f.service.create(CreateBlobRequest::new("VGVzdA=="), &tenant).await.unwrap();
        let before = f.service.get(&id, GetOptions::default(), &tenant).await.unwrap();

        let update = UpdateBlobRequest {
            metadata: Some(json!({
                "@context": "https://schema.org",
                "@type": "Note",
                "name": "greeting"
            })),
            ..Default::default()
        };
        f.service.update(&id, update, &tenant).await.unwrap();

        let after = f.service.get(&id, GetOptions::default(), &tenant).await.unwrap();
        assert_eq!(after.entry.blob_hash, before.entry.blob_hash);
        assert_eq!(after.entry.blob_size, before.entry.blob_size);
        assert_eq!(after.entry.date_created, before.entry.date_created);
        assert_eq!(after.entry.is_encrypted, before.entry.is_encrypted);
        assert_eq!(after.entry.encoding_format, before.entry.encoding_format);
        assert!(after.entry.date_modified.is_some());
        assert_eq!(after.entry.metadata.unwrap()["name"], "greeting");
    }

    #[tokio::test]
    async fn test_remove_then_get_is_not_found() {
        let f = fixture(BlobStorageServiceConfig::default(), None);
        let tenant = TenantContext::anonymous();
        let id = f.service.create(CreateBlobRequest::new("VGVzdA=="), &tenant).await.unwrap();

        f.service.remove(&id, &tenant).await.unwrap();
        assert!(f.connector.is_empty().await);

        let err = f.service.get(&id, GetOptions::default(), &tenant).await.unwrap_err();
        assert!(matches!(err, BlobError::NotFound(_)));

        let err = f.service.remove(&id, &tenant).await.unwrap_err();
        assert!(matches!(err, BlobError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_remove_tolerates_blob_already_gone() {
        let (service, entries) = lossy_fixture(false);
        let tenant = TenantContext::anonymous();
        let id = service.create(CreateBlobRequest::new("VGVzdA=="), &tenant).await.unwrap();

        service.remove(&id, &tenant).await.unwrap();
        assert_eq!(entries.count(&id).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_remove_surfaces_connector_failure() {
        let (service, entries) = lossy_fixture(true);
        let tenant = TenantContext::anonymous();
        let id = service.create(CreateBlobRequest::new("VGVzdA=="), &tenant).await.unwrap();

        let err = service.remove(&id, &tenant).await.unwrap_err();
        assert!(matches!(err, BlobError::Storage(_)));

        // The entry is gone even though the bytes could not be deleted
        assert_eq!(entries.count(&id).await.unwrap(), 0);
        let err = service.get(&id, GetOptions::default(), &tenant).await.unwrap_err();
        assert!(matches!(err, BlobError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_get_content_missing_from_connector() {
        let (service, _) = lossy_fixture(false);
        let tenant = TenantContext::anonymous();
        let id = service.create(CreateBlobRequest::new("VGVzdA=="), &tenant).await.unwrap();

        let view = service.get(&id, GetOptions::default(), &tenant).await.unwrap();
        assert_eq!(view.entry.blob_size, 4);

        let err = service
            .get(&id, GetOptions { include_content: true }, &tenant)
            .await
            .unwrap_err();
        assert!(matches!(err, BlobError::NotFound(_)));

        let err = service.get_content(&id, &tenant).await.unwrap_err();
        assert!(matches!(err, BlobError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_remove_keeps_blob_shared_by_other_tenant() {
        let f = fixture(scoped(), None);
        let alice = TenantContext::user("alice");
        let bob = TenantContext::user("bob");

        let id = f.service.create(CreateBlobRequest::new("VGVzdA=="), &alice).await.unwrap();
        f.service.create(CreateBlobRequest::new("VGVzdA=="), &bob).await.unwrap();

        f.service.remove(&id, &alice).await.unwrap();
        assert_eq!(f.connector.len().await, 1);

        let view = f
            .service
            .get(&id, GetOptions { include_content: true }, &bob)
            .await
            .unwrap();
        assert_eq!(view.blob.as_deref(), Some("VGVzdA=="));
    }

    #[tokio::test]
    async fn test_encryption_stores_ciphertext() {
        let vault = Arc::new(MemoryVaultConnector::new());
        vault.create_key("node-1/blob-key").await.unwrap();
        let config = BlobStorageServiceConfig {
            vault_key_id: Some("blob-key".to_string()),
            ..Default::default()
        };
        let f = fixture(config, Some(vault));
        let tenant = TenantContext::anonymous().with_node("node-1");

        let id = f.service.create(CreateBlobRequest::new("VGVzdA=="), &tenant).await.unwrap();
        let urn = BlobUrn::parse(&id).unwrap();

        let stored = f.connector.raw(urn.content_id()).await.unwrap();
        assert_ne!(stored, b"Test");

        let view = f
            .service
            .get(&id, GetOptions { include_content: true }, &tenant)
            .await
            .unwrap();
        assert!(view.entry.is_encrypted);
        assert_eq!(view.entry.blob_size, 4);
        assert_eq!(view.entry.blob_hash, hashing::integrity_hash(b"Test"));
        assert_eq!(view.blob.as_deref(), Some("VGVzdA=="));
    }

    #[tokio::test]
    async fn test_encrypted_content_readable_without_node() {
        let vault = Arc::new(MemoryVaultConnector::new());
        vault.create_key("node-1/blob-key").await.unwrap();
        let config = BlobStorageServiceConfig {
            vault_key_id: Some("blob-key".to_string()),
            ..scoped()
        };
        let f = fixture(config, Some(vault));
        let writer = TenantContext::user("alice").with_node("node-1");
        let reader = TenantContext::user("alice");

        let id = f.service.create(CreateBlobRequest::new("VGVzdA=="), &writer).await.unwrap();
        let stored = f.entries.get(&id, &[]).await.unwrap().unwrap();
        assert_eq!(stored.vault_key.as_deref(), Some("node-1/blob-key"));

        let (entry, content) = f.service.get_content(&id, &reader).await.unwrap();
        assert!(entry.is_encrypted);
        assert_eq!(entry.vault_key, None);
        assert_eq!(content, b"Test");
    }

    #[tokio::test]
    async fn test_disable_encryption_per_call() {
        let vault = Arc::new(MemoryVaultConnector::new());
        vault.create_key("blob-key").await.unwrap();
        let config = BlobStorageServiceConfig {
            vault_key_id: Some("blob-key".to_string()),
            ..Default::default()
        };
        let f = fixture(config, Some(vault));

        let mut request = CreateBlobRequest::new("VGVzdA==");
        request.options.disable_encryption = true;
        let id = f.service.create(request, &TenantContext::anonymous()).await.unwrap();

        assert_eq!(id, format!("blob:memory:{}", hashing::content_id(b"Test")));
        assert_eq!(
            f.connector.raw(&hashing::content_id(b"Test")).await,
            Some(b"Test".to_vec())
        );
    }

    #[tokio::test]
    async fn test_get_merges_metadata_context() {
        let f = fixture(BlobStorageServiceConfig::default(), None);
        let tenant = TenantContext::anonymous();
        let mut request = CreateBlobRequest::new("VGVzdA==");
        request.metadata = Some(json!({
            "@context": "https://example.org/vocab/",
            "@type": "Document"
        }));
        let id = f.service.create(request, &tenant).await.unwrap();

        let view = f.service.get(&id, GetOptions::default(), &tenant).await.unwrap();
        assert_eq!(view.entry_type, BLOB_STORAGE_ENTRY_TYPE);
        assert_eq!(view.context[0], json!(json_ld::SCHEMA_ORG_CONTEXT));
        assert!(view.context.contains(&json!("https://example.org/vocab/")));
    }

    #[tokio::test]
    async fn test_query_orders_newest_first() {
        let f = fixture(BlobStorageServiceConfig::default(), None);
        let tenant = TenantContext::anonymous();

        let first = f.service.create(CreateBlobRequest::new("Zmlyc3Q="), &tenant).await.unwrap();
        tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        let second = f.service.create(CreateBlobRequest::new("c2Vjb25k"), &tenant).await.unwrap();

        let listed = f.service.query(QueryRequest::default(), &tenant).await.unwrap();
        assert_eq!(listed.list_type, ITEM_LIST_TYPE);
        let ids: Vec<&str> = listed.entries.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec![second.as_str(), first.as_str()]);
    }

    #[test]
    fn test_new_validates_configuration() {
        let registry = ConnectorRegistry::new()
            .with(Arc::new(MemoryBlobConnector::new()))
            .unwrap();
        let entries: Arc<dyn EntityStorageConnector> = Arc::new(MemoryEntityStorage::new());

        let config = BlobStorageServiceConfig {
            default_namespace: "file".to_string(),
            ..Default::default()
        };
        assert!(BlobStorageService::new(config, registry.clone(), entries.clone(), None).is_err());

        let config = BlobStorageServiceConfig {
            vault_key_id: Some("key".to_string()),
            ..Default::default()
        };
        assert!(BlobStorageService::new(config, registry, entries, None).is_err());
    }
}
