//! Encrypted payloads and the records that point at them.
//!
//! The ciphertext itself lives in blob storage as a CBOR [`EncryptedPayload`].
//! What gets stored under a key is an [`EncryptedRecord`]: the owner, the
//! wrapped content key, and where the ciphertext is.

use serde::{Deserialize, Serialize};

use ripdb_core::Identity;
use ripdb_store::BlobLocation;

use crate::crypto::{EncryptionKey, EncryptionNonce};
use crate::error::{Result, VaultError};

/// Format identifier for encrypted payloads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum EncryptionFormat {
    /// ChaCha20-Poly1305 with 256-bit key.
    ChaCha20Poly1305 = 1,
}

/// Ciphertext plus what is needed to decrypt it, given the key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptedPayload {
    /// Encryption algorithm used.
    pub format: EncryptionFormat,

    /// Nonce used for encryption (unique per encryption).
    pub nonce: EncryptionNonce,

    /// The encrypted data (includes authentication tag).
    pub ciphertext: Vec<u8>,
}

impl EncryptedPayload {
    /// Encrypt plaintext with the given key.
    pub fn encrypt(plaintext: &[u8], key: &EncryptionKey) -> Result<Self> {
        let nonce = EncryptionNonce::generate();
        let ciphertext = key.encrypt(plaintext, &nonce)?;

        Ok(Self {
            format: EncryptionFormat::ChaCha20Poly1305,
            nonce,
            ciphertext,
        })
    }

    /// Decrypt with the given key.
    pub fn decrypt(&self, key: &EncryptionKey) -> Result<Vec<u8>> {
        match self.format {
            EncryptionFormat::ChaCha20Poly1305 => key.decrypt(&self.ciphertext, &self.nonce),
        }
    }

    /// Serialize to CBOR bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| VaultError::SerializationError(e.to_string()))?;
        Ok(buf)
    }

    /// Deserialize from CBOR bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| VaultError::InvalidRecord(e.to_string()))
    }
}

/// The stored form of an owner-gated payload.
///
/// Holds nothing that reveals the plaintext or the content key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EncryptedRecord {
    /// Only this identity can have the content key released.
    pub owner_identity: Identity,
    /// Hex of the custody-wrapped content key.
    pub wrapped_symmetric_key: String,
    /// Where the CBOR [`EncryptedPayload`] is stored.
    pub ciphertext_location: BlobLocation,
}

/// A stored value that is either plain or an [`EncryptedRecord`].
///
/// The encrypted arm is tried first; any object carrying the three record
/// fields is treated as encrypted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PayloadEnvelope<T> {
    /// Owner-gated payload.
    Encrypted(EncryptedRecord),
    /// A value stored as-is.
    Plain(T),
}

impl<T> PayloadEnvelope<T> {
    /// Whether this is an encrypted record.
    pub fn is_encrypted(&self) -> bool {
        matches!(self, Self::Encrypted(_))
    }
}

impl<T> From<EncryptedRecord> for PayloadEnvelope<T> {
    fn from(record: EncryptedRecord) -> Self {
        Self::Encrypted(record)
    }
}
