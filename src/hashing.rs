/// Content hashing
use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256};

/// Hex SHA-256 used as the storage key by hash-addressed connectors
pub fn content_id(data: &[u8]) -> String {
    hex::encode(Sha256::digest(data))
}

/// `sha256:<base64>` integrity hash recorded on entries
pub fn integrity_hash(data: &[u8]) -> String {
    format!("sha256:{}", STANDARD.encode(Sha256::digest(data)))
}
