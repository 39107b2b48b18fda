//! # RipDB Relay
//!
//! Real-time relay of signed messages between the two participants of a
//! channel.
//!
//! ## Overview
//!
//! Each live client is a [`Connection`]. It subscribes to channels through
//! the shared [`SubscriptionRegistry`] and publishes through the
//! [`PublishPipeline`], which authenticates an envelope, checks that it is
//! routed to the sender's own channel, appends it to the stream and fans it
//! out through the [`Broker`].
//!
//! ## Key Properties
//!
//! - **Spoof-resistant**: nothing is appended or fanned out unless the
//!   signature verifies and the stream is `derive(sender, counterparty)`
//! - **Ordered**: message ids come from the stream append, per stream
//! - **Membership-exact**: delivery re-checks subscription at delivery time
//!   and again before writing, so an unsubscribe suppresses in-flight messages
//! - **Leak-free**: teardown runs exactly once per connection, on every exit
//!   path
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ripdb_core::Ed25519Verifier;
//! use ripdb_relay::{MemoryBroker, Relay, RelayConfig};
//! use ripdb_store::MemoryStore;
//!
//! let relay = Relay::new(
//!     Arc::new(MemoryStore::new()),
//!     Arc::new(MemoryBroker::new()),
//!     Arc::new(Ed25519Verifier),
//!     RelayConfig::default(),
//! );
//! let connection = relay.connect().unwrap();
//! // connection.run(inbound_events, outbound_sink).await
//! ```
//!
//! ## Event Flow
//!
//! ```text
//! Sender                      Relay                         Subscriber
//!   |-- send message -------->|                                  |
//!   |                         |-- append(stream) -> messageId    |
//!   |<------- message id -----|                                  |
//!   |                         |-- publish(channel) ------------->|
//!   |                         |                    new message   |
//! ```

pub mod broker;
pub mod config;
pub mod connection;
pub mod error;
pub mod messages;
pub mod pipeline;
pub mod registry;

pub use broker::{Broker, DeliveryCallback, MemoryBroker};
pub use config::{RejectionPolicy, RelayConfig};
pub use connection::{Connection, ConnectionState, Relay};
pub use error::{RelayError, Result};
pub use messages::{limits, ClientEvent, ConnectionId, RejectReason, ServerEvent};
pub use pipeline::{PublishOutcome, PublishPipeline, PublishRequest};
pub use registry::{Delivery, SubscriptionRegistry};
