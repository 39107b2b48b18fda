//! The encrypted-envelope codec.
//!
//! Write path: serialize, encrypt under a fresh content key, wrap that key
//! for the owner, store the ciphertext. Read path reverses it, asking the
//! custody service to release the key. The content key lives only for the
//! duration of one call.

use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::debug;
use zeroize::Zeroizing;

use ripdb_store::BlobStore;

use crate::condition::AccessCondition;
use crate::crypto::EncryptionKey;
use crate::custody::{KeyCustody, WrappedKey};
use crate::envelope::{EncryptedPayload, EncryptedRecord, PayloadEnvelope};
use crate::error::Result;
use crate::proof::ProofProvider;

/// Encrypts payloads for their owner and decrypts them again.
#[derive(Clone)]
pub struct EnvelopeCodec {
    custody: Arc<dyn KeyCustody>,
    blobs: Arc<dyn BlobStore>,
}

impl EnvelopeCodec {
    /// Create a codec over a custody service and a blob store.
    pub fn new(custody: Arc<dyn KeyCustody>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { custody, blobs }
    }

    /// Encrypt `value` so only the identity behind `proofs` can read it.
    ///
    /// Fails with [`VaultError::NoProof`](crate::VaultError::NoProof) when no
    /// proof can be obtained.
    pub async fn encrypt_and_store<T: Serialize + ?Sized>(
        &self,
        value: &T,
        proofs: &dyn ProofProvider,
    ) -> Result<EncryptedRecord> {
        let proof = proofs.proof().await?;
        let condition = AccessCondition::owner(proof.identity.clone());

        let plaintext = Zeroizing::new(serde_json::to_vec(value)?);
        let key = EncryptionKey::generate();
        let payload = EncryptedPayload::encrypt(&plaintext, &key)?;

        let wrapped = self.custody.wrap_key(&key, &condition, &proof).await?;
        let location = self.blobs.store(Bytes::from(payload.to_bytes()?)).await?;

        debug!(owner = %proof.identity, %location, "stored encrypted payload");
        Ok(EncryptedRecord {
            owner_identity: proof.identity,
            wrapped_symmetric_key: wrapped.to_hex(),
            ciphertext_location: location,
        })
    }

    /// Return a plain value as-is, or decrypt an encrypted one.
    pub async fn load_and_decrypt<T: DeserializeOwned>(
        &self,
        envelope: PayloadEnvelope<T>,
        proofs: &dyn ProofProvider,
    ) -> Result<T> {
        match envelope {
            PayloadEnvelope::Plain(value) => Ok(value),
            PayloadEnvelope::Encrypted(record) => self.decrypt_record(&record, proofs).await,
        }
    }

    /// Decrypt one record.
    ///
    /// Fails with [`VaultError::AccessDenied`](crate::VaultError::AccessDenied)
    /// when the custody service refuses the proof.
    pub async fn decrypt_record<T: DeserializeOwned>(
        &self,
        record: &EncryptedRecord,
        proofs: &dyn ProofProvider,
    ) -> Result<T> {
        let condition = AccessCondition::owner(record.owner_identity.clone());
        let wrapped = WrappedKey::from_hex(&record.wrapped_symmetric_key)?;

        let proof = proofs.proof().await?;
        let key = self.custody.unwrap_key(&wrapped, &condition, &proof).await?;

        let blob = self.blobs.fetch(&record.ciphertext_location).await?;
        let payload = EncryptedPayload::from_bytes(&blob)?;
        let plaintext = Zeroizing::new(payload.decrypt(&key)?);

        Ok(serde_json::from_slice(&plaintext)?)
    }
}
