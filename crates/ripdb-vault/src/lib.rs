//! # RipDB Vault
//!
//! Owner-gated encryption of stored payloads.
//!
//! ## Encryption Model
//!
//! 1. **Content key**: a fresh ChaCha20-Poly1305 key per payload
//! 2. **Access condition**: "the caller controls `ownerIdentity`"
//! 3. **Custody**: the content key is wrapped by a [`KeyCustody`] service
//!    that only releases it against an [`AuthProof`] satisfying the condition
//!
//! The ciphertext goes to a [`BlobStore`](ripdb_store::BlobStore) and the
//! stored value becomes an [`EncryptedRecord`]. Storage never sees plaintext
//! or the content key.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use ripdb_core::{Ed25519Verifier, Keypair};
//! use ripdb_store::MemoryBlobStore;
//! use ripdb_vault::{EnvelopeCodec, KeypairPrompt, LocalKeyCustody, PayloadEnvelope};
//!
//! async fn example() {
//!     let custody = Arc::new(LocalKeyCustody::generate(Arc::new(Ed25519Verifier)));
//!     let codec = EnvelopeCodec::new(custody, Arc::new(MemoryBlobStore::new()));
//!     let prompt = KeypairPrompt::new(Keypair::generate());
//!
//!     let record = codec.encrypt_and_store("hello", &prompt).await.unwrap();
//!     let back: String = codec
//!         .load_and_decrypt(PayloadEnvelope::Encrypted(record), &prompt)
//!         .await
//!         .unwrap();
//!     assert_eq!(back, "hello");
//! }
//! ```

pub mod codec;
pub mod condition;
pub mod crypto;
pub mod custody;
pub mod envelope;
pub mod error;
pub mod proof;

pub use codec::EnvelopeCodec;
pub use condition::AccessCondition;
pub use crypto::{
    EncryptionKey, EncryptionNonce, EphemeralKeyPair, SharedKey, X25519PublicKey,
    X25519StaticSecret,
};
pub use custody::{KeyCustody, LocalKeyCustody, WrappedKey};
pub use envelope::{EncryptedPayload, EncryptedRecord, EncryptionFormat, PayloadEnvelope};
pub use error::{Result, VaultError};
pub use proof::{
    AuthProof, KeypairPrompt, NoInteractiveContext, ProofCache, ProofChain, ProofProvider,
    StaticProof, AUTH_MESSAGE_DOMAIN,
};
