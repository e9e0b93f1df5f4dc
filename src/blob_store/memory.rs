/// In-memory blob connector
use crate::{
    blob_store::{require_namespace, BlobStorageConnector},
    error::BlobResult,
    hashing,
    urn::BlobUrn,
};
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

pub(crate) fn default_namespace() -> String {
    MemoryBlobConnector::NAMESPACE.to_string()
}

/// Keeps blobs in a process-local map keyed by content hash
pub struct MemoryBlobConnector {
    namespace: String,
    blobs: RwLock<HashMap<String, Vec<u8>>>,
}

impl MemoryBlobConnector {
    pub const NAMESPACE: &'static str = "memory";

    pub fn new() -> Self {
        Self {
            namespace: Self::NAMESPACE.to_string(),
            blobs: RwLock::new(HashMap::new()),
        }
    }

    pub fn with_namespace(namespace: &str) -> BlobResult<Self> {
        require_namespace(namespace)?;
        Ok(Self {
            namespace: namespace.to_string(),
            blobs: RwLock::new(HashMap::new()),
        })
    }

    /// Number of distinct blobs held
    pub async fn len(&self) -> usize {
        self.blobs.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.blobs.read().await.is_empty()
    }

    /// Bytes exactly as stored, keyed by content id
    pub async fn raw(&self, content_id: &str) -> Option<Vec<u8>> {
        self.blobs.read().await.get(content_id).cloned()
    }
}

impl Default for MemoryBlobConnector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BlobStorageConnector for MemoryBlobConnector {
    fn namespace(&self) -> &str {
        &self.namespace
    }

    async fn set(&self, blob: Vec<u8>) -> BlobResult<String> {
        let content_id = hashing::content_id(&blob);
        self.blobs.write().await.insert(content_id.clone(), blob);
        Ok(BlobUrn::new(&self.namespace, content_id).to_string())
    }

    async fn get(&self, id: &str) -> BlobResult<Option<Vec<u8>>> {
        let urn = BlobUrn::parse_for(id, &self.namespace)?;
        Ok(self.blobs.read().await.get(urn.content_id()).cloned())
    }

    async fn remove(&self, id: &str) -> BlobResult<bool> {
        let urn = BlobUrn::parse_for(id, &self.namespace)?;
        Ok(self.blobs.write().await.remove(urn.content_id()).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BlobError;

    #[tokio::test]
    async fn test_set_get_remove() {
        let connector = MemoryBlobConnector::new();

        let id = connector.set(b"hello".to_vec()).await.unwrap();
        assert_eq!(id, format!("blob:memory:{}", hashing::content_id(b"hello")));
        assert_eq!(connector.get(&id).await.unwrap(), Some(b"hello".to_vec()));

        assert!(connector.remove(&id).await.unwrap());
        assert_eq!(connector.get(&id).await.unwrap(), None);
        assert!(!connector.remove(&id).await.unwrap());
    }

    #[tokio::test]
    async fn test_identical_content_stored_once() {
        let connector = MemoryBlobConnector::new();

        let first = connector.set(b"same".to_vec()).await.unwrap();
        let second = connector.set(b"same".to_vec()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(connector.len().await, 1);
    }

    #[tokio::test]
    async fn test_namespace_mismatch() {
        let connector = MemoryBlobConnector::new();

        let err = connector.get("blob:file:abc").await.unwrap_err();
        assert!(matches!(err, BlobError::NamespaceMismatch { .. }));

        let err = connector.remove("blob:file:abc").await.unwrap_err();
        assert!(matches!(err, BlobError::NamespaceMismatch { .. }));
    }
}
