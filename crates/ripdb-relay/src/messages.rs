//! Wire events exchanged with a connected client.
//!
//! Events are JSON objects tagged by an `"event"` field, e.g.
//! `{"event":"subscribe","channel":"..."}`.

use serde::{Deserialize, Serialize};
use std::fmt;

use ripdb_core::{ChannelId, Identity, MessageEnvelope, MessageId, ValidationError};

/// Process-local identifier of one live connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ConnectionId(pub u64);

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Message size limits.
pub mod limits {
    /// Max length of a channel or stream name.
    pub const MAX_CHANNEL_NAME_LEN: usize = 256;
    /// Max length of an envelope payload.
    pub const MAX_PAYLOAD_LEN: usize = 64 * 1024;
}

/// Events a client sends.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum ClientEvent {
    /// Start receiving messages published on `channel`.
    #[serde(rename = "subscribe")]
    Subscribe {
        /// Channel to join.
        channel: ChannelId,
    },

    /// Stop receiving messages published on `channel`.
    #[serde(rename = "unsubscribe")]
    Unsubscribe {
        /// Channel to leave.
        channel: ChannelId,
    },

    /// Publish a signed envelope.
    #[serde(rename = "send message")]
    SendMessage {
        /// Channel to fan out on.
        channel: ChannelId,
        /// Stream to append to.
        stream: ChannelId,
        /// The other participant of the channel.
        #[serde(default)]
        to: Option<Identity>,
        /// The signed message.
        envelope: MessageEnvelope,
    },
}

impl ClientEvent {
    /// Decode an event from JSON text.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Check name and payload sizes.
    pub fn validate_limits(&self) -> Result<(), String> {
        let names = match self {
            Self::Subscribe { channel } | Self::Unsubscribe { channel } => vec![channel],
            Self::SendMessage {
                channel, stream, ..
            } => vec![channel, stream],
        };
        for name in names {
            if name.as_str().is_empty() {
                return Err("empty channel name".into());
            }
            if name.as_str().len() > limits::MAX_CHANNEL_NAME_LEN {
                return Err(format!(
                    "channel name exceeds {} bytes",
                    limits::MAX_CHANNEL_NAME_LEN
                ));
            }
        }
        if let Self::SendMessage { envelope, .. } = self {
            let len = envelope.payload.as_deref().map_or(0, str::len);
            if len > limits::MAX_PAYLOAD_LEN {
                return Err(format!("payload exceeds {} bytes", limits::MAX_PAYLOAD_LEN));
            }
        }
        Ok(())
    }
}

/// Events the relay sends to a client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event")]
pub enum ServerEvent {
    /// A message was published on a channel this connection subscribes to.
    #[serde(rename = "new message")]
    NewMessage {
        /// The channel it was published on.
        channel: ChannelId,
        /// The envelope, carrying its assigned `messageId`.
        message: MessageEnvelope,
    },

    /// Point-to-point acknowledgment of this connection's own publish.
    #[serde(rename = "message id")]
    MessageAck {
        /// The stream the message was appended to.
        stream: ChannelId,
        /// The id the stream assigned.
        #[serde(rename = "messageId")]
        message_id: MessageId,
    },

    /// This connection's publish was dropped. Only sent under
    /// [`RejectionPolicy::Notify`](crate::RejectionPolicy::Notify).
    #[serde(rename = "rejected")]
    Rejected {
        /// Coarse reason.
        reason: RejectReason,
    },
}

impl ServerEvent {
    /// Encode as JSON text.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Why a publish was dropped.
///
/// Deliberately coarse: a verification failure never says which part of
/// the signature check failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RejectReason {
    /// A required field is missing or the payload is unreadable.
    Invalid,
    /// The signature does not verify or the sender is not the signer.
    Unauthenticated,
    /// The channel or stream is not the sender's channel with the counterparty.
    Misrouted,
}

impl From<&ValidationError> for RejectReason {
    fn from(e: &ValidationError) -> Self {
        match e {
            ValidationError::MissingField(_) | ValidationError::MalformedPayload(_) => {
                Self::Invalid
            }
            ValidationError::SignatureFailed | ValidationError::SenderKeyMismatch => {
                Self::Unauthenticated
            }
            ValidationError::ChannelMismatch { .. } => Self::Misrouted,
        }
    }
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Invalid => "invalid",
            Self::Unauthenticated => "unauthenticated",
            Self::Misrouted => "misrouted",
        })
    }
}
