//! Symmetric encryption and X25519 key agreement.
//!
//! Content keys are ChaCha20-Poly1305 keys that are zeroed on drop. Key
//! wrapping uses an ephemeral X25519 agreement with the custody key.

use std::fmt;

use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use x25519_dalek::{EphemeralSecret, PublicKey, StaticSecret};
use zeroize::{Zeroize, ZeroizeOnDrop};

use crate::error::{Result, VaultError};

const WRAPPING_CONTEXT: &str = "ripdb-vault-v1 key wrapping";

fn random_bytes<const N: usize>() -> [u8; N] {
    let mut bytes = [0u8; N];
    rand::thread_rng().fill_bytes(&mut bytes);
    bytes
}

/// X25519 public key of a custody service or of an ephemeral sender.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct X25519PublicKey(pub [u8; 32]);

impl X25519PublicKey {
    pub const fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl From<PublicKey> for X25519PublicKey {
    fn from(pk: PublicKey) -> Self {
        Self(pk.to_bytes())
    }
}

impl From<X25519PublicKey> for PublicKey {
    fn from(pk: X25519PublicKey) -> Self {
        PublicKey::from(pk.0)
    }
}

/// Long-lived X25519 secret held by a custody service.
pub struct X25519StaticSecret(StaticSecret);

impl X25519StaticSecret {
    pub fn generate() -> Self {
        Self(StaticSecret::random_from_rng(rand::thread_rng()))
    }

    /// Restore a secret from its 32 bytes, e.g. from configuration.
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(StaticSecret::from(bytes))
    }

    pub fn public_key(&self) -> X25519PublicKey {
        PublicKey::from(&self.0).into()
    }

    pub fn diffie_hellman(&self, peer: &X25519PublicKey) -> SharedKey {
        SharedKey(self.0.diffie_hellman(&(*peer).into()).to_bytes())
    }
}

/// Single-use X25519 key pair; the secret is consumed by the agreement.
pub struct EphemeralKeyPair {
    secret: EphemeralSecret,
    public: X25519PublicKey,
}

impl EphemeralKeyPair {
    pub fn generate() -> Self {
        let secret = EphemeralSecret::random_from_rng(rand::thread_rng());
        let public = PublicKey::from(&secret).into();
        Self { secret, public }
    }

    pub fn public_key(&self) -> X25519PublicKey {
        self.public
    }

    pub fn diffie_hellman(self, peer: &X25519PublicKey) -> SharedKey {
        SharedKey(self.secret.diffie_hellman(&(*peer).into()).to_bytes())
    }
}

/// Output of an X25519 agreement. Never used directly as a cipher key.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct SharedKey([u8; 32]);

impl SharedKey {
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    /// Derive a key-wrapping key bound to `context`.
    pub fn derive_wrapping_key(&self, context: &[u8]) -> EncryptionKey {
        let mut hasher = blake3::Hasher::new_derive_key(WRAPPING_CONTEXT);
        hasher.update(&self.0);
        hasher.update(context);
        EncryptionKey(*hasher.finalize().as_bytes())
    }
}

/// A 256-bit ChaCha20-Poly1305 key. Zeroed on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct EncryptionKey([u8; 32]);

impl EncryptionKey {
    /// Fresh random content key.
    pub fn generate() -> Self {
        Self(random_bytes())
    }

    /// Rebuild a key released by custody; anything but 32 bytes is rejected.
    pub fn from_slice(bytes: &[u8]) -> Result<Self> {
        bytes.try_into().map(Self).map_err(|_| {
            VaultError::DecryptionError(format!("expected a 32-byte key, got {}", bytes.len()))
        })
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    pub fn encrypt(&self, plaintext: &[u8], nonce: &EncryptionNonce) -> Result<Vec<u8>> {
        self.encrypt_with_aad(plaintext, &[], nonce)
    }

    pub fn decrypt(&self, ciphertext: &[u8], nonce: &EncryptionNonce) -> Result<Vec<u8>> {
        self.decrypt_with_aad(ciphertext, &[], nonce)
    }

    /// Encrypt, authenticating `aad` alongside the ciphertext.
    pub fn encrypt_with_aad(
        &self,
        plaintext: &[u8],
        aad: &[u8],
        nonce: &EncryptionNonce,
    ) -> Result<Vec<u8>> {
        self.cipher()
            .encrypt(nonce.as_nonce(), Payload { msg: plaintext, aad })
            .map_err(|e| VaultError::EncryptionError(e.to_string()))
    }

    /// Decrypt; fails unless `aad` matches what was used to encrypt.
    pub fn decrypt_with_aad(
        &self,
        ciphertext: &[u8],
        aad: &[u8],
        nonce: &EncryptionNonce,
    ) -> Result<Vec<u8>> {
        self.cipher()
            .decrypt(nonce.as_nonce(), Payload { msg: ciphertext, aad })
            .map_err(|e| VaultError::DecryptionError(e.to_string()))
    }

    fn cipher(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(&self.0))
    }
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

/// A 96-bit ChaCha20-Poly1305 nonce; always random, never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct EncryptionNonce(pub [u8; 12]);

impl EncryptionNonce {
    pub fn generate() -> Self {
        Self(random_bytes())
    }

    pub const fn as_bytes(&self) -> &[u8; 12] {
        &self.0
    }

    fn as_nonce(&self) -> &Nonce {
        Nonce::from_slice(&self.0)
    }
}
