/// IPFS blob connector
///
/// Talks to a Kubo-compatible RPC API (`/api/v0/add`, `/api/v0/cat`,
/// `/api/v0/pin/rm`). Unlike the hash-addressed connectors the content id is
/// the CID the node returns.
use crate::{
    blob_store::{require_namespace, require_non_empty, BlobStorageConnector},
    error::{BlobError, BlobResult},
    urn::BlobUrn,
};
use async_trait::async_trait;
use reqwest::{multipart, Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};
use tracing::{debug, error};

/// Configuration for the IPFS connector
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IpfsConnectorConfig {
    /// RPC API base URL, e.g. "http://127.0.0.1:5001"
    pub api_url: String,

    /// Bearer token sent with every request, for authenticated gateways
    #[serde(default)]
    pub bearer_token: Option<String>,

    /// Namespace override (default: "ipfs")
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

fn default_namespace() -> String {
    IpfsBlobConnector::NAMESPACE.to_string()
}

impl IpfsConnectorConfig {
    pub fn new(api_url: impl Into<String>) -> Self {
        Self {
            api_url: api_url.into(),
            bearer_token: None,
            namespace: default_namespace(),
        }
    }

    pub fn validate(&self) -> BlobResult<()> {
        require_non_empty("api_url", &self.api_url)?;
        if let Some(token) = &self.bearer_token {
            require_non_empty("bearer_token", token)?;
        }
        require_namespace(&self.namespace)
    }
}

/// Response of `/api/v0/add`
#[derive(Debug, Deserialize)]
struct AddResponse {
    #[serde(rename = "Hash")]
    hash: String,
}

/// Error body returned by the RPC API
#[derive(Debug, Deserialize)]
struct RpcError {
    #[serde(rename = "Message", default)]
    message: String,
}

#[derive(Clone)]
pub struct IpfsBlobConnector {
    config: IpfsConnectorConfig,
    client: Client,
}

impl IpfsBlobConnector {
    pub const NAMESPACE: &'static str = "ipfs";

    pub fn new(config: IpfsConnectorConfig) -> BlobResult<Self> {
        config.validate()?;
        Ok(Self {
            config,
            client: Client::new(),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/v0/{}", self.config.api_url.trim_end_matches('/'), path)
    }

    fn post(&self, path: &str) -> RequestBuilder {
        let request = self.client.post(self.endpoint(path));
        match &self.config.bearer_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }

    fn parse_cid(&self, id: &str) -> BlobResult<String> {
        let urn = BlobUrn::parse_for(id, &self.config.namespace)?;
        let cid = urn.content_id();
        if !cid.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(BlobError::Validation(format!(
                "\"{}\" is not a valid IPFS content identifier",
                cid
            )));
        }
        Ok(cid.to_string())
    }
}

/// Whether an RPC failure means the content is simply absent
fn is_missing(status: StatusCode, body: &str) -> bool {
    if status == StatusCode::NOT_FOUND {
        return true;
    }

    let message = serde_json::from_str::<RpcError>(body)
        .map(|e| e.message)
        .unwrap_or_else(|_| body.to_string())
        .to_ascii_lowercase();

    message.contains("not pinned")
        || message.contains("not found")
        || message.contains("no link named")
}

fn transport_error(action: &str, e: reqwest::Error) -> BlobError {
    error!("IPFS {} request failed: {}", action, e);
    BlobError::Storage(format!("IPFS {} failed: {}", action, e))
}

#[async_trait]
impl BlobStorageConnector for IpfsBlobConnector {
    fn namespace(&self) -> &str {
        &self.config.namespace
    }

    async fn set(&self, blob: Vec<u8>) -> BlobResult<String> {
        let size = blob.len();
        let form =
            multipart::Form::new().part("file", multipart::Part::bytes(blob).file_name("blob"));

        let response = self
            .post("add?pin=true")
            .multipart(form)
            .send()
            .await
            .map_err(|e| transport_error("add", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BlobError::Storage(format!(
                "IPFS add failed with {}: {}",
                status, body
            )));
        }

        let added: AddResponse = response
            .json()
            .await
            .map_err(|e| transport_error("add", e))?;

        debug!("✓ Blob added to IPFS: {} ({} bytes)", added.hash, size);
        Ok(BlobUrn::new(&self.config.namespace, added.hash).to_string())
    }

    async fn get(&self, id: &str) -> BlobResult<Option<Vec<u8>>> {
        let cid = self.parse_cid(id)?;

        let response = self
            .post("cat")
            .query(&[("arg", cid.as_str())])
            .send()
            .await
            .map_err(|e| transport_error("cat", e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            if is_missing(status, &body) {
                debug!("Blob not found in IPFS: {}", cid);
                return Ok(None);
            }
            return Err(BlobError::Storage(format!(
                "IPFS cat failed with {}: {}",
                status, body
            )));
        }

        let data = response
            .bytes()
            .await
            .map_err(|e| transport_error("cat", e))?;
        Ok(Some(data.to_vec()))
    }

    async fn remove(&self, id: &str) -> BlobResult<bool> {
        let cid = self.parse_cid(id)?;

        let response = self
            .post("pin/rm")
            .query(&[("arg", cid.as_str())])
            .send()
            .await
            .map_err(|e| transport_error("pin/rm", e))?;

        let status = response.status();
        if status.is_success() {
            debug!("✓ Blob unpinned from IPFS: {}", cid);
            return Ok(true);
        }

        let body = response.text().await.unwrap_or_default();
        if is_missing(status, &body) {
            return Ok(false);
        }

        Err(BlobError::Storage(format!(
            "IPFS pin/rm failed with {}: {}",
            status, body
        )))
    }
}
