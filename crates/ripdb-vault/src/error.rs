//! Error types for the vault module.

use thiserror::Error;

/// Errors that can occur while encrypting, storing or decrypting payloads.
#[derive(Debug, Error)]
pub enum VaultError {
    /// The custody service refused to unwrap: the proof does not satisfy
    /// the access condition.
    #[error("access denied: {0}")]
    AccessDenied(String),

    /// No authorization proof could be obtained.
    #[error("no authorization proof available: {0}")]
    NoProof(String),

    /// Encryption error.
    #[error("encryption error: {0}")]
    EncryptionError(String),

    /// Decryption error.
    #[error("decryption error: {0}")]
    DecryptionError(String),

    /// Serialization error.
    #[error("serialization error: {0}")]
    SerializationError(String),

    /// An encrypted record is malformed.
    #[error("invalid encrypted record: {0}")]
    InvalidRecord(String),

    /// Blob storage failed.
    #[error("store error: {0}")]
    Store(#[from] ripdb_store::StoreError),
}

impl From<serde_json::Error> for VaultError {
    fn from(e: serde_json::Error) -> Self {
        Self::SerializationError(e.to_string())
    }
}

/// Result type for vault operations.
pub type Result<T> = std::result::Result<T, VaultError>;
