//! In-memory implementations of the storage traits.
//!
//! Same semantics as SQLite, no persistence. Used by tests and by the server
//! when no database path is configured.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use bytes::Bytes;
use ripdb_core::{Blake3Hash, ChannelId, MessageId};
use serde_json::Value;

use crate::error::{Result, StoreError};
use crate::now_millis;
use crate::traits::{BlobLocation, BlobStore, KeyValueStore, StreamEntry, StreamStore, Wrapped};

/// In-memory stream and key-value store.
///
/// All data is lost when the store is dropped. Thread-safe via RwLock.
pub struct MemoryStore {
    inner: RwLock<MemoryStoreInner>,
}

#[derive(Default)]
struct MemoryStoreInner {
    /// Streams by name, entries in id order.
    streams: HashMap<ChannelId, Vec<StreamEntry>>,

    /// Key-value entries.
    values: HashMap<String, Wrapped<Value>>,
}

impl MemoryStore {
    /// Create a new empty in-memory store.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(MemoryStoreInner::default()),
        }
    }

    fn read(&self) -> Result<std::sync::RwLockReadGuard<'_, MemoryStoreInner>> {
        self.inner
            .read()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {e}")))
    }

    fn write(&self) -> Result<std::sync::RwLockWriteGuard<'_, MemoryStoreInner>> {
        self.inner
            .write()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {e}")))
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StreamStore for MemoryStore {
    async fn append(&self, stream: &ChannelId, payload: &str) -> Result<MessageId> {
        let mut inner = self.write()?;
        let entries = inner.streams.entry(stream.clone()).or_default();

        let id = entries
            .last()
            .map(|e| e.id.next())
            .unwrap_or(MessageId::FIRST);
        entries.push(StreamEntry {
            id,
            payload: payload.to_owned(),
        });

        Ok(id)
    }

    async fn range(&self, stream: &ChannelId, after: Option<MessageId>) -> Result<Vec<StreamEntry>> {
        let inner = self.read()?;
        let Some(entries) = inner.streams.get(stream) else {
            return Ok(Vec::new());
        };

        let start = match after {
            Some(after) => entries.partition_point(|e| e.id <= after),
            None => 0,
        };
        Ok(entries[start..].to_vec())
    }

    async fn last_id(&self, stream: &ChannelId) -> Result<Option<MessageId>> {
        let inner = self.read()?;
        Ok(inner
            .streams
            .get(stream)
            .and_then(|entries| entries.last())
            .map(|e| e.id))
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    async fn set(&self, key: &str, value: Value) -> Result<Wrapped<Value>> {
        let wrapped = Wrapped {
            key: key.to_owned(),
            data: value,
            stored_at: now_millis(),
        };
        self.write()?.values.insert(key.to_owned(), wrapped.clone());
        Ok(wrapped)
    }

    async fn purge(&self, key: &str) -> Result<bool> {
        Ok(self.write()?.values.remove(key).is_some())
    }

    async fn get(&self, key: &str) -> Result<Wrapped<Value>> {
        self.read()?
            .values
            .get(key)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(key.to_owned()))
    }
}

/// In-memory content-addressed blob store.
///
/// Blobs are keyed by the Blake3 hash of their bytes, so storing the same
/// content twice yields the same location.
#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: RwLock<HashMap<Blake3Hash, Bytes>>,
}

impl MemoryBlobStore {
    /// Create an empty blob store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct blobs held.
    pub fn len(&self) -> usize {
        self.blobs.read().map(|b| b.len()).unwrap_or(0)
    }

    /// Whether no blobs are held.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn store(&self, bytes: Bytes) -> Result<BlobLocation> {
        let hash = Blake3Hash::hash(&bytes);
        self.blobs
            .write()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {e}")))?
            .insert(hash, bytes);
        Ok(BlobLocation::new(hash.to_hex()))
    }

    async fn fetch(&self, location: &BlobLocation) -> Result<Bytes> {
        let hash = location.content_hash()?;
        self.blobs
            .read()
            .map_err(|e| StoreError::Unavailable(format!("lock poisoned: {e}")))?
            .get(&hash)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(location.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn ch(name: &str) -> ChannelId {
        ChannelId::named(name)
    }

    #[tokio::test]
    async fn test_append_assigns_ids_from_one() {
        let store = MemoryStore::new();
        assert_eq!(store.append(&ch("s"), "a").await.unwrap(), MessageId(1));
        assert_eq!(store.append(&ch("s"), "b").await.unwrap(), MessageId(2));
        assert_eq!(store.append(&ch("t"), "c").await.unwrap(), MessageId(1));
        assert_eq!(store.last_id(&ch("s")).await.unwrap(), Some(MessageId(2)));
        assert_eq!(store.last_id(&ch("u")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_range_after() {
        let store = MemoryStore::new();
        for p in ["a", "b", "c"] {
            store.append(&ch("s"), p).await.unwrap();
        }

        let all = store.range(&ch("s"), None).await.unwrap();
        assert_eq!(all.len(), 3);

        let tail = store.range(&ch("s"), Some(MessageId(1))).await.unwrap();
        let payloads: Vec<_> = tail.iter().map(|e| e.payload.as_str()).collect();
        assert_eq!(payloads, ["b", "c"]);

        assert!(store.range(&ch("s"), Some(MessageId(3))).await.unwrap().is_empty());
        assert!(store.range(&ch("missing"), None).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_kv_set_get_purge() {
        let store = MemoryStore::new();
        let err = store.get("k").await.unwrap_err();
        assert!(err.is_not_found());

        let set = store.set("k", serde_json::json!({"v": 1})).await.unwrap();
        let got = store.get("k").await.unwrap();
        assert_eq!(set, got);
        assert_eq!(got.key, "k");

        assert!(store.purge("k").await.unwrap());
        assert!(!store.purge("k").await.unwrap());
        assert!(store.get("k").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn test_blob_store_is_content_addressed() {
        let blobs = MemoryBlobStore::new();
        let a = blobs.store(Bytes::from_static(b"hello")).await.unwrap();
        let b = blobs.store(Bytes::from_static(b"hello")).await.unwrap();
        assert_eq!(a, b);
        assert_eq!(blobs.len(), 1);
        assert_eq!(blobs.fetch(&a).await.unwrap(), Bytes::from_static(b"hello"));

        let missing = BlobLocation::for_content(b"other");
        assert!(blobs.fetch(&missing).await.unwrap_err().is_not_found());
    }

    proptest! {
        #[test]
        fn append_ids_strictly_increase(payloads in proptest::collection::vec(".*", 1..20)) {
            let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
            rt.block_on(async {
                let store = MemoryStore::new();
                let mut last = None;
                for p in &payloads {
                    let id = store.append(&ch("s"), p).await.unwrap();
                    if let Some(prev) = last {
                        assert!(id > prev);
                    }
                    last = Some(id);
                }
                assert_eq!(store.range(&ch("s"), None).await.unwrap().len(), payloads.len());
            });
        }
    }
}
