/// Unified error types for the blob storage service
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for blob storage operations
#[derive(Error, Debug)]
pub enum BlobError {
    /// Malformed input: bad base64, invalid JSON-LD, missing identity, empty config field
    #[error("Validation error: {0}")]
    Validation(String),

    /// A blob id was handed to a connector that does not own its namespace
    #[error("Namespace mismatch: expected \"{expected}\", found \"{actual}\"")]
    NamespaceMismatch { expected: String, actual: String },

    /// Metadata entry or blob absent when required
    #[error("Not found: {0}")]
    NotFound(String),

    /// Any failure while creating a blob, wrapped once at the service boundary
    #[error("Failed to create blob: {0}")]
    CreateFailed(#[source] Box<BlobError>),

    /// Backend (filesystem, cloud SDK, IPFS node) failures
    #[error("Blob storage error: {0}")]
    Storage(String),

    /// Vault encryption/decryption errors
    #[error("Vault error: {0}")]
    Vault(String),

    /// Database errors
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal server errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl BlobError {
    /// The innermost error, looking through `CreateFailed` wrappers
    pub fn root(&self) -> &BlobError {
        match self {
            BlobError::CreateFailed(inner) => inner.root(),
            other => other,
        }
    }

    /// Short machine-readable error code
    pub fn code(&self) -> &'static str {
        match self.root() {
            BlobError::Validation(_) => "ValidationError",
            BlobError::NamespaceMismatch { .. } => "NamespaceMismatch",
            BlobError::NotFound(_) => "NotFound",
            _ => "GeneralError",
        }
    }
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
}

/// Convert BlobError to HTTP response
impl IntoResponse for BlobError {
    fn into_response(self) -> Response {
        let status = match self.root() {
            BlobError::Validation(_) | BlobError::NamespaceMismatch { .. } => {
                StatusCode::BAD_REQUEST
            }
            BlobError::NotFound(_) => StatusCode::NOT_FOUND,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let message = match self.root() {
            BlobError::Database(_) | BlobError::Io(_) | BlobError::Internal(_) => {
                // Don't leak details
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        };

        if status.is_server_error() {
            tracing::error!(error = %self, "request_failed");
        }

        let body = Json(ErrorResponse {
            error: self.code().to_string(),
            message,
        });

        (status, body).into_response()
    }
}

/// Result type alias for blob storage operations
pub type BlobResult<T> = Result<T, BlobError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_failed_reports_inner_code() {
        let err = BlobError::CreateFailed(Box::new(BlobError::Validation(
            "blob must be base64".to_string(),
        )));
        assert_eq!(err.code(), "ValidationError");
        assert!(err.to_string().contains("blob must be base64"));
    }

    #[test]
    fn test_status_codes() {
        let resp = BlobError::NotFound("blob:memory:abc".to_string()).into_response();
        assert_eq!(resp.status(), StatusCode::NOT_FOUND);

        let resp = BlobError::NamespaceMismatch {
            expected: "file".to_string(),
            actual: "memory".to_string(),
        }
        .into_response();
        assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

        let resp = BlobError::CreateFailed(Box::new(BlobError::Storage("boom".to_string())))
            .into_response();
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
