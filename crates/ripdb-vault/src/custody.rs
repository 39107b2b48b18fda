//! Key custody: wrapping content keys under an access condition.
//!
//! The custody service is the only place an access condition is enforced.
//! [`LocalKeyCustody`] is an in-process implementation; a threshold network
//! plugs in behind the same trait.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use ripdb_core::SignatureVerifier;

use crate::condition::AccessCondition;
use crate::crypto::{
    EncryptionKey, EncryptionNonce, EphemeralKeyPair, X25519PublicKey, X25519StaticSecret,
};
use crate::error::{Result, VaultError};
use crate::proof::AuthProof;

/// A content key in a form only the custody service can unwrap.
#[derive(Clone, PartialEq, Eq)]
pub struct WrappedKey(Vec<u8>);

impl WrappedKey {
    /// Wrap raw bytes.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    /// Get the raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Convert to hex string.
    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    /// Parse from hex string.
    pub fn from_hex(s: &str) -> Result<Self> {
        hex::decode(s)
            .map(Self)
            .map_err(|e| VaultError::InvalidRecord(format!("wrapped key is not hex: {e}")))
    }
}

impl fmt::Debug for WrappedKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "WrappedKey({} bytes)", self.0.len())
    }
}

/// The key-custody collaborator.
#[async_trait]
pub trait KeyCustody: Send + Sync {
    /// Wrap `key` so it is only released to callers satisfying `condition`.
    ///
    /// `proof` authenticates the caller asking for the wrap.
    async fn wrap_key(
        &self,
        key: &EncryptionKey,
        condition: &AccessCondition,
        proof: &AuthProof,
    ) -> Result<WrappedKey>;

    /// Release the key inside `wrapped`.
    ///
    /// Fails with [`VaultError::AccessDenied`] unless `proof` satisfies
    /// `condition` and `condition` is the one the key was wrapped under.
    async fn unwrap_key(
        &self,
        wrapped: &WrappedKey,
        condition: &AccessCondition,
        proof: &AuthProof,
    ) -> Result<EncryptionKey>;
}

/// Wire form of a wrapped key: an ephemeral X25519 share to the custody key.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct KeyShare {
    ephemeral_public: X25519PublicKey,
    nonce: EncryptionNonce,
    encrypted_key: Vec<u8>,
}

impl KeyShare {
    fn to_bytes(&self) -> Result<Vec<u8>> {
        let mut buf = Vec::new();
        ciborium::into_writer(self, &mut buf)
            .map_err(|e| VaultError::SerializationError(e.to_string()))?;
        Ok(buf)
    }

    fn from_bytes(bytes: &[u8]) -> Result<Self> {
        ciborium::from_reader(bytes).map_err(|e| VaultError::InvalidRecord(e.to_string()))
    }
}

/// In-process custody holding one X25519 secret.
///
/// Wrapped keys are bound to their condition: the wrapping key is derived
/// from the condition bytes, which are also the AEAD associated data.
pub struct LocalKeyCustody {
    secret: X25519StaticSecret,
    verifier: Arc<dyn SignatureVerifier>,
}

impl LocalKeyCustody {
    /// Custody with a fresh random secret.
    pub fn generate(verifier: Arc<dyn SignatureVerifier>) -> Self {
        Self::from_secret(X25519StaticSecret::generate(), verifier)
    }

    /// Custody with a given secret.
    pub fn from_secret(secret: X25519StaticSecret, verifier: Arc<dyn SignatureVerifier>) -> Self {
        Self { secret, verifier }
    }

    /// The custody public key.
    pub fn public_key(&self) -> X25519PublicKey {
        self.secret.public_key()
    }
}

#[async_trait]
impl KeyCustody for LocalKeyCustody {
    async fn wrap_key(
        &self,
        key: &EncryptionKey,
        condition: &AccessCondition,
        proof: &AuthProof,
    ) -> Result<WrappedKey> {
        if !proof.verify(self.verifier.as_ref()) {
            return Err(VaultError::AccessDenied(
                "authorization proof does not verify".into(),
            ));
        }

        let context = condition.canonical_bytes();
        let ephemeral = EphemeralKeyPair::generate();
        let ephemeral_public = ephemeral.public_key();
        let wrapping_key = ephemeral
            .diffie_hellman(&self.secret.public_key())
            .derive_wrapping_key(&context);

        let nonce = EncryptionNonce::generate();
        let encrypted_key = wrapping_key.encrypt_with_aad(key.as_bytes(), &context, &nonce)?;

        let share = KeyShare {
            ephemeral_public,
            nonce,
            encrypted_key,
        };
        Ok(WrappedKey(share.to_bytes()?))
    }

    async fn unwrap_key(
        &self,
        wrapped: &WrappedKey,
        condition: &AccessCondition,
        proof: &AuthProof,
    ) -> Result<EncryptionKey> {
        if !condition.is_satisfied_by(proof, self.verifier.as_ref()) {
            debug!(identity = %proof.identity, "unwrap refused");
            return Err(VaultError::AccessDenied(
                "proof does not satisfy the access condition".into(),
            ));
        }

        let share = KeyShare::from_bytes(&wrapped.0)?;
        let context = condition.canonical_bytes();
        let wrapping_key = self
            .secret
            .diffie_hellman(&share.ephemeral_public)
            .derive_wrapping_key(&context);

        let key_bytes = zeroize::Zeroizing::new(
            wrapping_key
                .decrypt_with_aad(&share.encrypted_key, &context, &share.nonce)
                .map_err(|_| {
                    VaultError::AccessDenied("key was not wrapped under this condition".into())
                })?,
        );
        EncryptionKey::from_slice(&key_bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ripdb_core::{Ed25519Verifier, Identity, Keypair};

    fn custody() -> LocalKeyCustody {
        LocalKeyCustody::generate(Arc::new(Ed25519Verifier))
    }

    fn owner_of(keypair: &Keypair) -> AccessCondition {
        AccessCondition::owner(Identity::from_public_key(&keypair.public_key()))
    }

    #[tokio::test]
    async fn test_wrap_unwrap_roundtrip() {
        let custody = custody();
        let alice = Keypair::from_seed(&[1; 32]);
        let proof = AuthProof::sign(&alice);
        let key = EncryptionKey::generate();

        let wrapped = custody.wrap_key(&key, &owner_of(&alice), &proof).await.unwrap();
        let unwrapped = custody
            .unwrap_key(&wrapped, &owner_of(&alice), &proof)
            .await
            .unwrap();
        assert_eq!(key.as_bytes(), unwrapped.as_bytes());
    }

    #[tokio::test]
    async fn test_unwrap_with_other_identity_is_denied() {
        let custody = custody();
        let alice = Keypair::from_seed(&[1; 32]);
        let bob = Keypair::from_seed(&[2; 32]);
        let key = EncryptionKey::generate();
        let wrapped = custody
            .wrap_key(&key, &owner_of(&alice), &AuthProof::sign(&alice))
            .await
            .unwrap();

        // Bob's proof against alice's condition.
        let denied = custody
            .unwrap_key(&wrapped, &owner_of(&alice), &AuthProof::sign(&bob))
            .await;
        assert!(matches!(denied, Err(VaultError::AccessDenied(_))));

        // Bob's proof against his own condition: the key is bound to alice's.
        let denied = custody
            .unwrap_key(&wrapped, &owner_of(&bob), &AuthProof::sign(&bob))
            .await;
        assert!(matches!(denied, Err(VaultError::AccessDenied(_))));
    }

    #[tokio::test]
    async fn test_wrap_requires_valid_proof() {
        let custody = custody();
        let alice = Keypair::from_seed(&[1; 32]);
        let mut proof = AuthProof::sign(&alice);
        proof.signature = "00".repeat(64);

        let result = custody
            .wrap_key(&EncryptionKey::generate(), &owner_of(&alice), &proof)
            .await;
        assert!(matches!(result, Err(VaultError::AccessDenied(_))));
    }

    #[test]
    fn test_wrapped_key_hex() {
        let wrapped = WrappedKey::from_bytes(vec![1, 2, 3]);
        assert_eq!(WrappedKey::from_hex(&wrapped.to_hex()).unwrap(), wrapped);
        assert!(WrappedKey::from_hex("zz").is_err());
    }
}
