//! Error types for the client and the server.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use ripdb_relay::RelayError;
use ripdb_store::StoreError;
use ripdb_vault::VaultError;
use thiserror::Error;
use tracing::warn;

/// Errors surfaced by [`RipClient`](crate::RipClient) and the HTTP routes.
#[derive(Debug, Error)]
pub enum RipError {
    /// Storage error.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Encryption or decryption error.
    #[error("vault error: {0}")]
    Vault(#[from] VaultError),

    /// Relay error.
    #[error("relay error: {0}")]
    Relay(#[from] RelayError),

    /// A stored value does not have the requested shape.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The request itself is malformed.
    #[error("bad request: {0}")]
    BadRequest(String),
}

impl RipError {
    /// Whether the requested key does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::Store(e) if e.is_not_found())
    }
}

impl IntoResponse for RipError {
    fn into_response(self) -> Response {
        match self {
            e if e.is_not_found() => (StatusCode::NOT_FOUND, "Not Found").into_response(),
            Self::BadRequest(reason) => (StatusCode::BAD_REQUEST, reason).into_response(),
            e => {
                warn!(error = %e, "request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error").into_response()
            }
        }
    }
}

/// Result type for client and server operations.
pub type Result<T> = std::result::Result<T, RipError>;
