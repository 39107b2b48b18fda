//! Error types for RipDB Core.

use thiserror::Error;

/// Core errors that can occur while handling keys and payloads.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid signature")]
    InvalidSignature,

    #[error("invalid public key")]
    InvalidPublicKey,

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("decoding error: {0}")]
    DecodingError(String),
}

/// Validation errors for submitted message envelopes.
///
/// These never leave the relay as detailed errors; callers collapse them
/// into a coarse rejection reason.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("envelope is missing field `{0}`")]
    MissingField(&'static str),

    #[error("signature verification failed")]
    SignatureFailed,

    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("sender account does not match signing key")]
    SenderKeyMismatch,

    #[error("channel mismatch: claimed {claimed}, expected {expected}")]
    ChannelMismatch { claimed: String, expected: String },
}

impl From<CoreError> for ValidationError {
    fn from(e: CoreError) -> Self {
        match e {
            CoreError::InvalidSignature | CoreError::InvalidPublicKey => {
                ValidationError::SignatureFailed
            }
            CoreError::EncodingError(msg) | CoreError::DecodingError(msg) => {
                ValidationError::MalformedPayload(msg)
            }
        }
    }
}
