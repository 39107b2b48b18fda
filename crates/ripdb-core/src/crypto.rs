//! Cryptographic primitives for RipDB.
//!
//! Wraps Ed25519 signing and Blake3 hashing with strong types, and defines the
//! [`SignatureVerifier`] seam the relay uses to authenticate envelopes.

use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::CoreError;

/// Generates byte and hex accessors for a fixed-width newtype.
macro_rules! fixed_bytes {
    ($name:ident, $len:literal, $label:literal) => {
        impl $name {
            /// Wrap raw bytes.
            pub const fn from_bytes(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }

            /// Borrow the raw bytes.
            pub const fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }

            /// Lowercase hex encoding.
            pub fn to_hex(&self) -> String {
                hex::encode(self.0)
            }

            /// Decode from hex; the string must encode exactly the right width.
            pub fn from_hex(s: &str) -> Result<Self, hex::FromHexError> {
                decode_fixed::<$len>(s).map(Self)
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($label, "({})"), &self.to_hex()[..16])
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }
    };
}

/// Content address of a stored blob.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Blake3Hash(pub [u8; 32]);

fixed_bytes!(Blake3Hash, 32, "Blake3");

impl Blake3Hash {
    /// Hash `data`.
    pub fn hash(data: &[u8]) -> Self {
        Self(*blake3::hash(data).as_bytes())
    }
}

/// Ed25519 verifying key. Its hex form doubles as an account identity.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Ed25519PublicKey(pub [u8; 32]);

fixed_bytes!(Ed25519PublicKey, 32, "Ed25519Pub");

impl Ed25519PublicKey {
    /// Check `signature` over `message`.
    ///
    /// Fails with [`CoreError::InvalidPublicKey`] when the bytes are not a
    /// curve point, and [`CoreError::InvalidSignature`] otherwise.
    pub fn verify(&self, message: &[u8], signature: &Ed25519Signature) -> Result<(), CoreError> {
        let key = VerifyingKey::from_bytes(&self.0).map_err(|_| CoreError::InvalidPublicKey)?;
        key.verify(message, &Signature::from_bytes(&signature.0))
            .map_err(|_| CoreError::InvalidSignature)
    }
}

/// Detached Ed25519 signature.
#[derive(Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ed25519Signature(#[serde(with = "sig_bytes")] pub [u8; 64]);

fixed_bytes!(Ed25519Signature, 64, "Ed25519Sig");

// serde only derives array impls up to 32 elements.
mod sig_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8; 64], s: S) -> Result<S::Ok, S::Error> {
        s.serialize_bytes(bytes)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 64], D::Error> {
        let v: Vec<u8> = Deserialize::deserialize(d)?;
        v.try_into()
            .map_err(|_| serde::de::Error::custom("expected 64 signature bytes"))
    }
}

/// Signing half of an account.
#[derive(Clone)]
pub struct Keypair(SigningKey);

impl Keypair {
    /// Fresh random keypair from the thread RNG.
    pub fn generate() -> Self {
        Self(SigningKey::generate(&mut rand::thread_rng()))
    }

    /// Deterministic keypair; used by fixtures and tests.
    pub fn from_seed(seed: &[u8; 32]) -> Self {
        Self(SigningKey::from_bytes(seed))
    }

    pub fn public_key(&self) -> Ed25519PublicKey {
        Ed25519PublicKey(self.0.verifying_key().to_bytes())
    }

    pub fn sign(&self, message: &[u8]) -> Ed25519Signature {
        Ed25519Signature(self.0.sign(message).to_bytes())
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Keypair").field(&self.public_key()).finish()
    }
}

/// The signature verification primitive.
///
/// Implementations must be side-effect free and report only a boolean: the
/// caller must not learn whether the key, the signature encoding, or the
/// signature itself was at fault.
pub trait SignatureVerifier: Send + Sync {
    /// Verify `signature` (hex) over `payload` with `pub_key` (hex).
    fn verify(&self, payload: &[u8], signature: &str, pub_key: &str) -> bool;
}

/// Ed25519 verifier over hex-encoded keys and signatures.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ed25519Verifier;

impl SignatureVerifier for Ed25519Verifier {
    fn verify(&self, payload: &[u8], signature: &str, pub_key: &str) -> bool {
        let (Ok(key), Ok(sig)) = (
            Ed25519PublicKey::from_hex(pub_key),
            Ed25519Signature::from_hex(signature),
        ) else {
            return false;
        };
        key.verify(payload, &sig).is_ok()
    }
}

fn decode_fixed<const N: usize>(s: &str) -> Result<[u8; N], hex::FromHexError> {
    let bytes = hex::decode(s)?;
    bytes
        .try_into()
        .map_err(|_| hex::FromHexError::InvalidStringLength)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_then_tamper() {
        let keypair = Keypair::generate();
        let signature = keypair.sign(b"fromAccountId");
        let key = keypair.public_key();

        assert!(key.verify(b"fromAccountId", &signature).is_ok());
        assert!(matches!(
            key.verify(b"fromAccountID", &signature),
            Err(CoreError::InvalidSignature)
        ));
    }

    #[test]
    fn test_seeded_keys_match_known_vector() {
        let key = Keypair::from_seed(&[1u8; 32]).public_key();
        assert_eq!(key, Keypair::from_seed(&[1u8; 32]).public_key());
        assert!(key.to_hex().starts_with("8a88e3dd"));
        assert_eq!(Ed25519PublicKey::from_hex(&key.to_hex()).unwrap(), key);
    }

    #[test]
    fn test_hex_width_is_enforced() {
        assert_eq!(
            Ed25519PublicKey::from_hex("abcd"),
            Err(hex::FromHexError::InvalidStringLength)
        );
        assert!(Ed25519Signature::from_hex(&"00".repeat(64)).is_ok());
        assert!(Ed25519Signature::from_hex(&"00".repeat(32)).is_err());
    }

    #[test]
    fn test_verifier_accepts_hex_signature() {
        let keypair = Keypair::from_seed(&[7u8; 32]);
        let sig = keypair.sign(b"payload");

        let verifier = Ed25519Verifier;
        assert!(verifier.verify(b"payload", &sig.to_hex(), &keypair.public_key().to_hex()));
        assert!(!verifier.verify(b"other", &sig.to_hex(), &keypair.public_key().to_hex()));
    }

    #[test]
    fn test_verifier_rejects_garbage_encodings() {
        let verifier = Ed25519Verifier;
        let keypair = Keypair::generate();
        let sig = keypair.sign(b"payload").to_hex();

        assert!(!verifier.verify(b"payload", "not-hex", &keypair.public_key().to_hex()));
        assert!(!verifier.verify(b"payload", &sig, "abcd"));
        assert!(!verifier.verify(b"payload", &sig[..64], &keypair.public_key().to_hex()));
    }

    #[test]
    fn test_blake3_hash() {
        let h1 = Blake3Hash::hash(b"test data");
        let h2 = Blake3Hash::hash(b"test data");
        assert_eq!(h1, h2);
        assert_ne!(h1, Blake3Hash::hash(b"different data"));
        assert_eq!(Blake3Hash::from_hex(&h1.to_hex()).unwrap(), h1);
    }
}
