/// Blob identifiers
///
/// Every blob is addressed by a URN of the form `blob:<namespace>:<content-id>`.
/// The namespace names the connector that holds the bytes, the content id is
/// whatever that connector keys the bytes by (hex SHA-256, or an IPFS CID).
use crate::error::{BlobError, BlobResult};
use std::fmt;

/// URN scheme prefix shared by all connectors
pub const BLOB_URN_PREFIX: &str = "blob";

/// Parsed blob URN
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BlobUrn {
    namespace: String,
    content_id: String,
}

impl BlobUrn {
    /// Build a URN from its parts
    pub fn new(namespace: impl Into<String>, content_id: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            content_id: content_id.into(),
        }
    }

    /// Parse `blob:<namespace>:<content-id>`
    pub fn parse(id: &str) -> BlobResult<Self> {
        let mut parts = id.splitn(3, ':');
        let (prefix, namespace, content_id) = match (parts.next(), parts.next(), parts.next()) {
            (Some(p), Some(n), Some(c)) => (p, n, c),
            _ => {
                return Err(BlobError::Validation(format!(
                    "\"{}\" is not a blob URN, expected blob:<namespace>:<id>",
                    id
                )))
            }
        };

        if prefix != BLOB_URN_PREFIX {
            return Err(BlobError::Validation(format!(
                "\"{}\" must start with \"{}:\"",
                id, BLOB_URN_PREFIX
            )));
        }

        if !is_valid_namespace(namespace) {
            return Err(BlobError::Validation(format!(
                "\"{}\" has an invalid namespace",
                id
            )));
        }

        if content_id.is_empty() || content_id.contains(['/', '\\']) {
            return Err(BlobError::Validation(format!(
                "\"{}\" has an invalid content id",
                id
            )));
        }

        Ok(Self::new(namespace, content_id))
    }

    /// Parse and require the namespace to match `expected`
    pub fn parse_for(id: &str, expected: &str) -> BlobResult<Self> {
        let urn = Self::parse(id)?;
        if urn.namespace != expected {
            return Err(BlobError::NamespaceMismatch {
                expected: expected.to_string(),
                actual: urn.namespace,
            });
        }
        Ok(urn)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn content_id(&self) -> &str {
        &self.content_id
    }
}

impl fmt::Display for BlobUrn {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", BLOB_URN_PREFIX, self.namespace, self.content_id)
    }
}

/// Namespaces are short lowercase tags: `[a-z0-9-]+`
pub fn is_valid_namespace(namespace: &str) -> bool {
    !namespace.is_empty()
        && namespace
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}
