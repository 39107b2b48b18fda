//! # RipDB Store
//!
//! Storage collaborators for the relay and the client: append-only message
//! streams, a wrapped key-value store, and content-addressed blob storage.
//!
//! ## Key Types
//!
//! - [`StreamStore`] - per-stream append log that assigns [`MessageId`]s
//! - [`KeyValueStore`] - `set` / `get` / `purge` over JSON values
//! - [`BlobStore`] - `store` / `fetch` of opaque bytes
//! - [`SqliteStore`] - SQLite-backed streams and values
//! - [`MemoryStore`], [`MemoryBlobStore`] - in-memory backends
//!
//! ## Usage
//!
//! ```rust,no_run
//! use ripdb_core::ChannelId;
//! use ripdb_store::{SqliteStore, StreamStore};
//!
//! async fn example() {
//!     let store = SqliteStore::open("ripdb.db").unwrap();
//!     let stream = ChannelId::named("ch1");
//!     let id = store.append(&stream, "{\"fromAccountId\":\"alice\"}").await.unwrap();
//!     let history = store.range(&stream, None).await.unwrap();
//!     assert_eq!(history.last().map(|e| e.id), Some(id));
//! }
//! ```
//!
//! [`MessageId`]: ripdb_core::MessageId

pub mod error;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use memory::{MemoryBlobStore, MemoryStore};
pub use sqlite::SqliteStore;
pub use traits::{BlobLocation, BlobStore, KeyValueStore, StreamEntry, StreamStore, Wrapped};

/// Current time in Unix milliseconds.
pub(crate) fn now_millis() -> i64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
