/// Vault connectors
///
/// Symmetric encryption of blob payloads under named keys. The service only
/// ever talks to the `VaultConnector` trait; `MemoryVaultConnector` keeps keys
/// in process and is what the server wires up from `BLOB_VAULT_KEY_HEX`.
use crate::error::{BlobError, BlobResult};
use async_trait::async_trait;
use chacha20poly1305::{aead::Aead, ChaCha20Poly1305, Key, KeyInit, Nonce};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use tokio::sync::RwLock;

/// Key length in bytes
pub const KEY_LEN: usize = 32;

/// Nonce length for ChaCha20-Poly1305 (12 bytes)
pub const NONCE_LEN: usize = 12;

/// Supported algorithms
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EncryptionAlgorithm {
    #[default]
    ChaCha20Poly1305,
}

#[async_trait]
pub trait VaultConnector: Send + Sync {
    /// Encrypt `data` with the named key
    async fn encrypt(
        &self,
        key_name: &str,
        algorithm: EncryptionAlgorithm,
        data: &[u8],
    ) -> BlobResult<Vec<u8>>;

    /// Decrypt output of `encrypt`
    async fn decrypt(
        &self,
        key_name: &str,
        algorithm: EncryptionAlgorithm,
        data: &[u8],
    ) -> BlobResult<Vec<u8>>;
}

/// In-process key ring
///
/// Keys are either added explicitly or, when a master key is configured,
/// derived on demand as `SHA-256(master || key_name)`. Derivation lets
/// `{nodeIdentity}/{keyId}` references resolve without provisioning every
/// node up front.
#[derive(Default)]
pub struct MemoryVaultConnector {
    keys: RwLock<HashMap<String, [u8; KEY_LEN]>>,
    master_key: Option<[u8; KEY_LEN]>,
}

impl MemoryVaultConnector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Vault that derives any requested key from `master_key`
    pub fn with_master_key(master_key: [u8; KEY_LEN]) -> Self {
        Self {
            keys: RwLock::new(HashMap::new()),
            master_key: Some(master_key),
        }
    }

    /// Parse a hex encoded master key
    pub fn from_hex_master_key(hex_key: &str) -> BlobResult<Self> {
        let bytes = hex::decode(hex_key.trim())
            .map_err(|e| BlobError::Validation(format!("Vault key is not valid hex: {}", e)))?;
        let key: [u8; KEY_LEN] = bytes.try_into().map_err(|_| {
            BlobError::Validation(format!("Vault key must be {} bytes", KEY_LEN))
        })?;
        Ok(Self::with_master_key(key))
    }

    /// Register a key under a name, replacing any previous one
    pub async fn add_key(&self, key_name: &str, key: [u8; KEY_LEN]) -> BlobResult<()> {
        if key_name.trim().is_empty() {
            return Err(BlobError::Validation("Vault key name must not be empty".to_string()));
        }
        self.keys.write().await.insert(key_name.to_string(), key);
        Ok(())
    }

    /// Generate and register a random key
    pub async fn create_key(&self, key_name: &str) -> BlobResult<()> {
        let mut key = [0u8; KEY_LEN];
        OsRng.fill_bytes(&mut key);
        self.add_key(key_name, key).await
    }

    async fn key(&self, key_name: &str) -> BlobResult<[u8; KEY_LEN]> {
        if let Some(key) = self.keys.read().await.get(key_name) {
            return Ok(*key);
        }

        match &self.master_key {
            Some(master) => {
                let mut hasher = Sha256::new();
                hasher.update(master);
                hasher.update(key_name.as_bytes());
                Ok(hasher.finalize().into())
            }
            None => Err(BlobError::NotFound(format!("Vault key not found: {}", key_name))),
        }
    }
}

#[async_trait]
impl VaultConnector for MemoryVaultConnector {
    async fn encrypt(
        &self,
        key_name: &str,
        algorithm: EncryptionAlgorithm,
        data: &[u8],
    ) -> BlobResult<Vec<u8>> {
        let EncryptionAlgorithm::ChaCha20Poly1305 = algorithm;
        let key = self.key(key_name).await?;

        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce);

        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), data)
            .map_err(|_| BlobError::Vault(format!("Encryption failed with key {}", key_name)))?;

        let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&ciphertext);
        Ok(out)
    }

    async fn decrypt(
        &self,
        key_name: &str,
        algorithm: EncryptionAlgorithm,
        data: &[u8],
    ) -> BlobResult<Vec<u8>> {
        let EncryptionAlgorithm::ChaCha20Poly1305 = algorithm;
        if data.len() < NONCE_LEN {
            return Err(BlobError::Vault("Ciphertext is shorter than its nonce".to_string()));
        }
        let key = self.key(key_name).await?;

        let (nonce, ciphertext) = data.split_at(NONCE_LEN);
        let cipher = ChaCha20Poly1305::new(Key::from_slice(&key));
        cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| BlobError::Vault(format!("Decryption failed with key {}", key_name)))
    }
}
