//! Message envelopes: what a client submits and what subscribers receive.
//!
//! The envelope wrapper is never signed. The signature covers the raw
//! `payload` string only, and everything inside the payload (including the
//! sender's account id) is untrusted until that signature checks out.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::str::FromStr;

use crate::crypto::Keypair;
use crate::error::CoreError;
use crate::identity::Identity;

/// Position of a message within one stream.
///
/// Assigned by the stream on append. Ids start at 1 and strictly increase
/// within a stream; they carry no meaning across streams.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub u64);

impl MessageId {
    /// The id given to the first message of every stream.
    pub const FIRST: Self = Self(1);

    /// The id that follows this one.
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// The raw sequence value.
    pub const fn value(self) -> u64 {
        self.0
    }
}

impl fmt::Debug for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MessageId({})", self.0)
    }
}

impl fmt::Display for MessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for MessageId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse().map(Self)
    }
}

/// A message envelope as it travels over the wire.
///
/// Every submitted field is optional so that a missing field is reported by
/// validation instead of failing deserialization of the whole event.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessageEnvelope {
    /// Hex-encoded Ed25519 public key of the signer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pub_key: Option<String>,

    /// Hex-encoded signature over `payload`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,

    /// JSON-encoded [`MessagePayload`].
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub payload: Option<String>,

    /// Server-assigned stream position; absent on submission.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message_id: Option<MessageId>,
}

impl MessageEnvelope {
    /// Attach the stream-assigned id.
    pub fn with_message_id(mut self, id: MessageId) -> Self {
        self.message_id = Some(id);
        self
    }
}

/// The signed content of an envelope.
///
/// Only `fromAccountId` is interpreted by the relay; the remaining fields are
/// carried through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    /// The account that claims to have sent the message.
    pub from_account_id: Identity,

    /// Application fields.
    #[serde(flatten)]
    pub body: Map<String, Value>,
}

impl MessagePayload {
    /// Parse the payload string of an envelope.
    pub fn parse(payload: &str) -> Result<Self, CoreError> {
        serde_json::from_str(payload).map_err(|e| CoreError::DecodingError(e.to_string()))
    }

    /// Encode to the string form that gets signed.
    pub fn encode(&self) -> Result<String, CoreError> {
        serde_json::to_string(self).map_err(|e| CoreError::EncodingError(e.to_string()))
    }
}

/// Builder for signed envelopes.
///
/// ```
/// use ripdb_core::{EnvelopeBuilder, Identity, Keypair};
///
/// let keypair = Keypair::generate();
/// let me = Identity::from_public_key(&keypair.public_key());
/// let envelope = EnvelopeBuilder::new(me)
///     .text("hello")
///     .sign(&keypair)
///     .unwrap();
/// assert!(envelope.message_id.is_none());
/// ```
#[derive(Debug, Clone)]
pub struct EnvelopeBuilder {
    payload: MessagePayload,
}

impl EnvelopeBuilder {
    /// Start an envelope sent by `from`.
    pub fn new(from: Identity) -> Self {
        Self {
            payload: MessagePayload {
                from_account_id: from,
                body: Map::new(),
            },
        }
    }

    /// Set an application field.
    pub fn field(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.body.insert(key.into(), value.into());
        self
    }

    /// Set the `text` field.
    pub fn text(self, text: impl Into<String>) -> Self {
        self.field("text", text.into())
    }

    /// Encode the payload and sign it.
    pub fn sign(self, keypair: &Keypair) -> Result<MessageEnvelope, CoreError> {
        let payload = self.payload.encode()?;
        let signature = keypair.sign(payload.as_bytes());
        Ok(MessageEnvelope {
            pub_key: Some(keypair.public_key().to_hex()),
            signature: Some(signature.to_hex()),
            payload: Some(payload),
            message_id: None,
        })
    }
}
