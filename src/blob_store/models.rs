/// Blob storage data models
use crate::entity_store::{Condition, SortDirection};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// JSON-LD type of a single entry
pub const BLOB_STORAGE_ENTRY_TYPE: &str = "BlobStorageEntry";

/// JSON-LD type of a query result page
pub const ITEM_LIST_TYPE: &str = "ItemList";

/// Metadata record persisted in the entity store, one per stored blob and tenant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobStorageEntry {
    /// `blob:<namespace>:<content-id>`
    pub id: String,
    pub date_created: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date_modified: Option<String>,
    /// Size of the plaintext payload
    pub blob_size: u64,
    /// `sha256:<base64>` of the plaintext payload
    pub blob_hash: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_extension: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(default)]
    pub is_encrypted: bool,
    /// Vault key reference the stored bytes were encrypted with
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub vault_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_identity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_identity: Option<String>,
}

impl BlobStorageEntry {
    /// Drop the tenant tags before handing an entry to a caller
    ///
    /// The vault key reference embeds the node identity, so it goes too.
    pub fn without_identity(mut self) -> Self {
        self.user_identity = None;
        self.node_identity = None;
        self.vault_key = None;
        self
    }
}

/// Caller identity passed through every service operation
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TenantContext {
    pub user_identity: Option<String>,
    pub node_identity: Option<String>,
}

impl TenantContext {
    pub fn new(user_identity: Option<String>, node_identity: Option<String>) -> Self {
        Self {
            user_identity: user_identity.filter(|s| !s.trim().is_empty()),
            node_identity: node_identity.filter(|s| !s.trim().is_empty()),
        }
    }

    /// No identity at all
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(user_identity: impl Into<String>) -> Self {
        Self::new(Some(user_identity.into()), None)
    }

    pub fn with_node(mut self, node_identity: impl Into<String>) -> Self {
        self.node_identity = Some(node_identity.into()).filter(|s: &String| !s.trim().is_empty());
        self
    }
}

/// Which identity fields the service enforces
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityScoping {
    pub include_user_identity: bool,
    pub include_node_identity: bool,
}

impl IdentityScoping {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn user_and_node() -> Self {
        Self {
            include_user_identity: true,
            include_node_identity: true,
        }
    }
}

/// Per-call create options
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOptions {
    /// Store plaintext even when a vault key is configured
    #[serde(default)]
    pub disable_encryption: bool,
    /// Connector to store into, defaults to the service default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

/// Create request (also the REST body of `POST /`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateBlobRequest {
    /// Base64 encoded payload
    pub blob: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_extension: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
    #[serde(flatten)]
    pub options: CreateOptions,
}

impl CreateBlobRequest {
    pub fn new(blob: impl Into<String>) -> Self {
        Self {
            blob: blob.into(),
            ..Default::default()
        }
    }
}

/// Metadata-only update (also the REST body of `PUT /:id`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateBlobRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub encoding_format: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_extension: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Value>,
}

/// Per-call get options
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GetOptions {
    pub include_content: bool,
}

/// Query parameters for listing entries
#[derive(Debug, Clone, Default)]
pub struct QueryRequest {
    pub conditions: Vec<Condition>,
    pub order_by: Option<String>,
    pub order_by_direction: Option<SortDirection>,
    pub cursor: Option<String>,
    pub page_size: Option<usize>,
}

/// Entry as returned to callers: identity stripped, optional content, merged context
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlobStorageEntryView {
    #[serde(rename = "@context")]
    pub context: Vec<Value>,
    #[serde(rename = "type")]
    pub entry_type: String,
    #[serde(flatten)]
    pub entry: BlobStorageEntry,
    /// Base64 encoded plaintext, present when content was requested
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blob: Option<String>,
}

/// One page of query results
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlobStorageEntryList {
    #[serde(rename = "@context")]
    pub context: Vec<Value>,
    #[serde(rename = "type")]
    pub list_type: String,
    #[serde(rename = "itemListElement")]
    pub entries: Vec<BlobStorageEntry>,
    /// Cursor for the next page, absent on the last page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cursor: Option<String>,
}

/// Response body for `POST /`
#[derive(Debug, Serialize, Deserialize)]
pub struct BlobCreateResponse {
    pub id: String,
}
