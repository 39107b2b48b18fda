//! Error types for the relay module.
//!
//! Rejected publishes are not errors; they are reported as
//! [`PublishOutcome::Rejected`](crate::PublishOutcome). These errors cover
//! collaborator failures and misuse of a closed connection.

use thiserror::Error;

/// Errors that can occur while relaying.
#[derive(Debug, Error)]
pub enum RelayError {
    /// Stream append or lookup failed.
    #[error("store error: {0}")]
    Store(#[from] ripdb_store::StoreError),

    /// The broker refused an operation.
    #[error("broker error: {0}")]
    Broker(String),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(String),

    /// An inbound event could not be decoded.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// The connection already reached its subscription limit.
    #[error("subscription limit of {0} reached")]
    SubscriptionLimit(usize),

    /// The connection is closed.
    #[error("connection is disconnected")]
    Disconnected,

    /// Shared state is unusable.
    #[error("registry unavailable: {0}")]
    Unavailable(String),
}

impl From<serde_json::Error> for RelayError {
    fn from(e: serde_json::Error) -> Self {
        Self::InvalidMessage(e.to_string())
    }
}

/// Result type for relay operations.
pub type Result<T> = std::result::Result<T, RelayError>;
