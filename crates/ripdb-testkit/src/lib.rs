//! # RipDB Testkit
//!
//! Testing utilities for RipDB.
//!
//! ## Overview
//!
//! - **Fixtures**: participants with deterministic keys, signed envelopes,
//!   and a relay wired to in-memory collaborators
//! - **Generators**: proptest strategies for identities, channels and
//!   subscription workloads
//! - **Golden vectors**: channel ids every implementation must agree on
//!
//! ## Golden Vectors
//!
//! ```rust
//! use ripdb_testkit::vectors::verify_all_vectors;
//!
//! verify_all_vectors().unwrap();
//! ```
//!
//! ## Fixtures
//!
//! ```rust
//! use ripdb_testkit::fixtures::Participant;
//!
//! let alice = Participant::from_seed(1);
//! let bob = Participant::from_seed(2);
//! assert_eq!(alice.channel_with(&bob), bob.channel_with(&alice));
//! let envelope = alice.envelope("hello");
//! assert!(envelope.message_id.is_none());
//! ```

pub mod fixtures;
pub mod generators;
pub mod vectors;

pub use fixtures::{multi_party, test_codec, Participant, TestRelay};
pub use generators::{RegistryOp, RegistryWorkload};
pub use vectors::{all_vectors, verify_all_vectors, ChannelVector};
