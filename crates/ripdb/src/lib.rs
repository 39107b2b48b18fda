//! # RipDB
//!
//! Authenticated two-party messaging plus a key-value store whose values can
//! be encrypted for their owner.
//!
//! ## Overview
//!
//! - **Relay**: clients connect over a WebSocket, subscribe to channels and
//!   publish signed envelopes; see [`relay`]
//! - **Store**: `/set`, `/get`, `/purge` over JSON values, and stream history;
//!   see [`store`]
//! - **Vault**: owner-gated encryption of stored values; see [`vault`]
//! - **Client**: [`RipClient`] encrypts on write and decrypts on read
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ripdb::{GetOptions, RipClient, SetOptions};
//! use ripdb::core::{Ed25519Verifier, Keypair};
//! use ripdb::store::{MemoryBlobStore, MemoryStore, Wrapped};
//! use ripdb::vault::{EnvelopeCodec, LocalKeyCustody};
//!
//! async fn example() {
//!     let codec = EnvelopeCodec::new(
//!         Arc::new(LocalKeyCustody::generate(Arc::new(Ed25519Verifier))),
//!         Arc::new(MemoryBlobStore::new()),
//!     );
//!     let client = RipClient::new(Arc::new(MemoryStore::new()), codec)
//!         .with_keypair(Keypair::generate());
//!
//!     client.set("diary", "dear diary", SetOptions::encrypted()).await.unwrap();
//!     let entry: Wrapped<String> = client.get("diary", GetOptions::default()).await.unwrap();
//!     assert_eq!(entry.data, "dear diary");
//! }
//! ```
//!
//! ## Re-exports
//!
//! - `ripdb::core` - identities, channels, envelopes, signatures
//! - `ripdb::store` - stream, key-value and blob storage
//! - `ripdb::relay` - the message relay
//! - `ripdb::vault` - encrypted envelopes

pub mod client;
pub mod config;
pub mod error;
pub mod server;

pub use ripdb_core as core;
pub use ripdb_relay as relay;
pub use ripdb_store as store;
pub use ripdb_vault as vault;

pub use client::{GetOptions, RipClient, SetOptions};
pub use config::ServerConfig;
pub use error::{Result, RipError};
pub use server::{router, AppState};
