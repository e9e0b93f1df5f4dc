/// Configuration management for the blob storage service
use crate::{
    blob_store::{
        AzureConnectorConfig, ConnectorConfig, FileConnectorConfig, GcpConnectorConfig,
        IdentityScoping, IpfsConnectorConfig, MemoryBlobConnector, S3ConnectorConfig,
    },
    error::{BlobError, BlobResult},
    json_ld,
};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub vault: VaultConfig,
    pub identity: IdentityScoping,
    pub json_ld: JsonLdConfig,
    pub logging: LoggingConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub version: String,
    /// Path the blob routes are nested under
    pub route_prefix: String,
    pub blob_upload_limit: usize,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub entry_store: EntryStoreConfig,
    /// Connector used when a create doesn't name one
    pub default_namespace: String,
    pub connectors: Vec<ConnectorConfig>,
}

/// Where entry metadata lives
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EntryStoreConfig {
    Sqlite { location: PathBuf },
    Memory,
}

/// Vault configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VaultConfig {
    /// Key id new blobs are encrypted under, encryption is off when unset
    pub key_id: Option<String>,
    /// Hex encoded 256-bit master key the in-process vault derives keys from
    pub master_key_hex: Option<String>,
}

/// JSON-LD configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JsonLdConfig {
    pub context: String,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            service: ServiceConfig {
                hostname: "localhost".to_string(),
                port: 3000,
                version: env!("CARGO_PKG_VERSION").to_string(),
                route_prefix: "/blob-storage".to_string(),
                blob_upload_limit: 5242880,
            },
            storage: StorageConfig {
                data_directory: PathBuf::from("./data"),
                entry_store: EntryStoreConfig::Memory,
                default_namespace: MemoryBlobConnector::NAMESPACE.to_string(),
                connectors: vec![ConnectorConfig::Memory {
                    namespace: MemoryBlobConnector::NAMESPACE.to_string(),
                }],
            },
            vault: VaultConfig::default(),
            identity: IdentityScoping::disabled(),
            json_ld: JsonLdConfig {
                context: json_ld::DEFAULT_BLOB_STORAGE_CONTEXT.to_string(),
            },
            logging: LoggingConfig {
                level: "info".to_string(),
            },
        }
    }
}

/// Parse a boolean environment value, accepting 1/0 and yes/no as well
fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn env_flag(name: &str, default: bool) -> bool {
    env::var(name)
        .ok()
        .and_then(|v| parse_flag(&v))
        .unwrap_or(default)
}

fn env_required(name: &str) -> BlobResult<String> {
    env::var(name).map_err(|_| BlobError::Validation(format!("{} is required", name)))
}

fn env_or(name: &str, default: &str) -> String {
    env::var(name).unwrap_or_else(|_| default.to_string())
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> BlobResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env_or("BLOB_HOSTNAME", "localhost");
        let port = env_or("BLOB_PORT", "3000")
            .parse()
            .map_err(|_| BlobError::Validation("Invalid port number".to_string()))?;
        let version = env_or("BLOB_VERSION", env!("CARGO_PKG_VERSION"));
        let route_prefix = env_or("BLOB_ROUTE_PREFIX", "/blob-storage");
        let blob_upload_limit = env_or("BLOB_UPLOAD_LIMIT", "5242880")
            .parse()
            .unwrap_or(5242880);

        let data_directory: PathBuf = env_or("BLOB_DATA_DIRECTORY", "./data").into();

        let entry_store = match env_or("BLOB_ENTRY_STORE", "sqlite").as_str() {
            "memory" => EntryStoreConfig::Memory,
            "sqlite" => EntryStoreConfig::Sqlite {
                location: env::var("BLOB_ENTRY_DB_LOCATION")
                    .map(PathBuf::from)
                    .unwrap_or_else(|_| data_directory.join("entries.sqlite")),
            },
            other => {
                return Err(BlobError::Validation(format!(
                    "Unknown BLOB_ENTRY_STORE \"{}\" (expected sqlite or memory)",
                    other
                )))
            }
        };

        // Memory and file connectors are always available
        let mut connectors = vec![ConnectorConfig::Memory {
            namespace: MemoryBlobConnector::NAMESPACE.to_string(),
        }];

        let mut file = FileConnectorConfig::new(
            env::var("BLOB_FILE_DIRECTORY")
                .map(PathBuf::from)
                .unwrap_or_else(|_| data_directory.join("blobs")),
        );
        if let Ok(extension) = env::var("BLOB_FILE_EXTENSION") {
            file.extension = extension;
        }
        connectors.push(ConnectorConfig::File(file));

        if let Ok(bucket) = env::var("BLOB_S3_BUCKET") {
            connectors.push(ConnectorConfig::S3(S3ConnectorConfig {
                bucket,
                region: env_or("BLOB_S3_REGION", "us-east-1"),
                endpoint: env::var("BLOB_S3_ENDPOINT").ok(),
                access_key_id: env_required("BLOB_S3_ACCESS_KEY_ID")?,
                secret_access_key: env_required("BLOB_S3_SECRET_ACCESS_KEY")?,
                prefix: env_or("BLOB_S3_PREFIX", ""),
                ..Default::default()
            }));
        }

        if let Ok(account_name) = env::var("BLOB_AZURE_ACCOUNT_NAME") {
            connectors.push(ConnectorConfig::Azure(AzureConnectorConfig {
                account_name,
                account_key: env_required("BLOB_AZURE_ACCOUNT_KEY")?,
                container: env_required("BLOB_AZURE_CONTAINER")?,
                use_emulator: env_flag("BLOB_AZURE_USE_EMULATOR", false),
                prefix: env_or("BLOB_AZURE_PREFIX", ""),
                namespace: "azure".to_string(),
            }));
        }

        if let Ok(bucket) = env::var("BLOB_GCP_BUCKET") {
            connectors.push(ConnectorConfig::Gcp(GcpConnectorConfig {
                project_id: env_required("BLOB_GCP_PROJECT_ID")?,
                credentials: env_required("BLOB_GCP_CREDENTIALS")?,
                bucket,
                prefix: env_or("BLOB_GCP_PREFIX", ""),
                namespace: "gcp".to_string(),
            }));
        }

        if let Ok(api_url) = env::var("BLOB_IPFS_API_URL") {
            let mut ipfs = IpfsConnectorConfig::new(api_url);
            ipfs.bearer_token = env::var("BLOB_IPFS_BEARER_TOKEN").ok();
            connectors.push(ConnectorConfig::Ipfs(ipfs));
        }

        let default_namespace = env_or("BLOB_DEFAULT_NAMESPACE", "file");

        let vault = VaultConfig {
            key_id: env::var("BLOB_VAULT_KEY_ID").ok().filter(|s| !s.is_empty()),
            master_key_hex: env::var("BLOB_VAULT_KEY_HEX").ok().filter(|s| !s.is_empty()),
        };

        let identity = IdentityScoping {
            include_user_identity: env_flag("BLOB_INCLUDE_USER_IDENTITY", false),
            include_node_identity: env_flag("BLOB_INCLUDE_NODE_IDENTITY", false),
        };

        let json_ld_context = env_or("BLOB_JSONLD_CONTEXT", json_ld::DEFAULT_BLOB_STORAGE_CONTEXT);
        let log_level = env_or("RUST_LOG", "blob_storage_service=debug,tower_http=debug");

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                version,
                route_prefix,
                blob_upload_limit,
            },
            storage: StorageConfig {
                data_directory,
                entry_store,
                default_namespace,
                connectors,
            },
            vault,
            identity,
            json_ld: JsonLdConfig {
                context: json_ld_context,
            },
            logging: LoggingConfig { level: log_level },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> BlobResult<()> {
        if self.service.hostname.is_empty() {
            return Err(BlobError::Validation("Hostname cannot be empty".to_string()));
        }

        if !self.service.route_prefix.starts_with('/') {
            return Err(BlobError::Validation(format!(
                "Route prefix must start with '/', got \"{}\"",
                self.service.route_prefix
            )));
        }

        if self.service.blob_upload_limit == 0 {
            return Err(BlobError::Validation(
                "Blob upload limit must be greater than zero".to_string(),
            ));
        }

        let namespaces: Vec<&str> = self
            .storage
            .connectors
            .iter()
            .map(ConnectorConfig::namespace)
            .collect();
        if !namespaces.contains(&self.storage.default_namespace.as_str()) {
            return Err(BlobError::Validation(format!(
                "Default namespace \"{}\" is not configured (available: {})",
                self.storage.default_namespace,
                namespaces.join(", ")
            )));
        }

        if self.vault.key_id.is_some() && self.vault.master_key_hex.is_none() {
            return Err(BlobError::Validation(
                "BLOB_VAULT_KEY_ID requires BLOB_VAULT_KEY_HEX".to_string(),
            ));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = ServerConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.service.route_prefix, "/blob-storage");
    }

    #[test]
    fn test_validate_default_namespace() {
        let mut config = ServerConfig::default();
        config.storage.default_namespace = "aws".to_string();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("aws"));
    }

    #[test]
    fn test_validate_vault_pairing() {
        let mut config = ServerConfig::default();
        config.vault.key_id = Some("blob-key".to_string());
        assert!(config.validate().is_err());

        config.vault.master_key_hex = Some("00".repeat(32));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_route_prefix() {
        let mut config = ServerConfig::default();
        config.service.route_prefix = "blob-storage".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("true"), Some(true));
        assert_eq!(parse_flag(" YES "), Some(true));
        assert_eq!(parse_flag("0"), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }
}
