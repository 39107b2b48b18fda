//! Storage traits: the abstract interfaces the relay and client depend on.
//!
//! The relay only needs [`StreamStore`]; the HTTP surface and the client use
//! [`KeyValueStore`]; the encrypted-envelope codec uses [`BlobStore`].

use async_trait::async_trait;
use bytes::Bytes;
use ripdb_core::{Blake3Hash, ChannelId, MessageId};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

use crate::error::{Result, StoreError};

/// One entry of a message stream.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreamEntry {
    /// Position assigned on append.
    pub id: MessageId,
    /// The appended payload, verbatim.
    pub payload: String,
}

/// A stored value together with its key and the moment it was stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Wrapped<T> {
    /// The key the value is stored under.
    pub key: String,
    /// The value.
    pub data: T,
    /// When the value was stored (Unix ms).
    pub stored_at: i64,
}

impl<T> Wrapped<T> {
    /// Replace the value, keeping key and timestamp.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Wrapped<U> {
        Wrapped {
            key: self.key,
            data: f(self.data),
            stored_at: self.stored_at,
        }
    }

    /// Fallible [`Wrapped::map`].
    pub fn try_map<U, E>(
        self,
        f: impl FnOnce(T) -> std::result::Result<U, E>,
    ) -> std::result::Result<Wrapped<U>, E> {
        Ok(Wrapped {
            key: self.key,
            data: f(self.data)?,
            stored_at: self.stored_at,
        })
    }
}

/// Address of a blob in a [`BlobStore`].
///
/// Memory blobs are addressed by the hex Blake3 hash of their content.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlobLocation(String);

impl BlobLocation {
    /// Wrap a location string.
    pub fn new(location: impl Into<String>) -> Self {
        Self(location.into())
    }

    /// The content address of `bytes`.
    pub fn for_content(bytes: &[u8]) -> Self {
        Self(Blake3Hash::hash(bytes).to_hex())
    }

    /// Parse the location as a content hash.
    pub fn content_hash(&self) -> Result<Blake3Hash> {
        Blake3Hash::from_hex(&self.0)
            .map_err(|e| StoreError::InvalidData(format!("bad blob address {}: {e}", self.0)))
    }

    /// Borrow the location string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for BlobLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "BlobLocation({})", self.0)
    }
}

impl fmt::Display for BlobLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Append-only message streams.
///
/// Streams are named by channel and come into existence on first append.
/// Ids start at [`MessageId::FIRST`] and strictly increase per stream.
/// Implementations serialize appends to the same stream.
#[async_trait]
pub trait StreamStore: Send + Sync {
    /// Append `payload` to `stream` and return its assigned id.
    async fn append(&self, stream: &ChannelId, payload: &str) -> Result<MessageId>;

    /// Entries of `stream` with an id strictly greater than `after`, in order.
    ///
    /// `None` returns the whole stream. An unknown stream is empty.
    async fn range(&self, stream: &ChannelId, after: Option<MessageId>) -> Result<Vec<StreamEntry>>;

    /// The id of the most recent entry, if any.
    async fn last_id(&self, stream: &ChannelId) -> Result<Option<MessageId>>;
}

/// Key-value storage of JSON values.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    // ─────────────────────────────────────────────────────────────────────────
    // Writes
    // ─────────────────────────────────────────────────────────────────────────

    /// Store `value` under `key`, replacing any previous value.
    async fn set(&self, key: &str, value: Value) -> Result<Wrapped<Value>>;

    /// Delete `key`. Returns whether anything was removed.
    async fn purge(&self, key: &str) -> Result<bool>;

    // ─────────────────────────────────────────────────────────────────────────
    // Reads
    // ─────────────────────────────────────────────────────────────────────────

    /// Fetch the value under `key`.
    ///
    /// Fails with [`StoreError::NotFound`] when nothing is stored.
    async fn get(&self, key: &str) -> Result<Wrapped<Value>>;
}

/// Opaque blob storage.
#[async_trait]
pub trait BlobStore: Send + Sync {
    /// Store `bytes`, returning where they can be fetched from.
    async fn store(&self, bytes: Bytes) -> Result<BlobLocation>;

    /// Fetch previously stored bytes.
    async fn fetch(&self, location: &BlobLocation) -> Result<Bytes>;
}
