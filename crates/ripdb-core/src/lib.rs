//! # RipDB Core
//!
//! Pure primitives for RipDB: participant identities, channel derivation, and
//! signed message envelopes.
//!
//! This crate contains no I/O, no storage, no networking. It is pure computation
//! over identities and signed data.
//!
//! ## Key Types
//!
//! - [`Identity`] - An opaque participant identity (hex public key)
//! - [`ChannelId`] - The symmetric two-party channel name, `hex(sha256(sorted ids))`
//! - [`MessageEnvelope`] - A signed message as submitted by a client
//! - [`MessageId`] - Stream-assigned position of an appended message
//!
//! ## Validation
//!
//! Envelopes are checked with [`validate_envelope`], which verifies the signature
//! over the raw payload before anything inside the payload is trusted.

pub mod channel;
pub mod crypto;
pub mod envelope;
pub mod error;
pub mod identity;
pub mod validation;

pub use channel::ChannelId;
pub use crypto::{
    Blake3Hash, Ed25519PublicKey, Ed25519Signature, Ed25519Verifier, Keypair, SignatureVerifier,
};
pub use envelope::{EnvelopeBuilder, MessageEnvelope, MessageId, MessagePayload};
pub use error::{CoreError, ValidationError};
pub use identity::Identity;
pub use validation::{validate_envelope, validate_envelope_structure, VerifiedEnvelope};
