//! Participant identities.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::crypto::Ed25519PublicKey;

/// An opaque participant identity.
///
/// In practice this is a hex-encoded public key, but nothing here relies on
/// that beyond ordering and equality.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Wrap an identity string.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// The identity owned by an Ed25519 key.
    pub fn from_public_key(key: &Ed25519PublicKey) -> Self {
        Self(key.to_hex())
    }

    /// Borrow the identity string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Whether this identity is the hex form of `key`.
    pub fn is_key(&self, key: &str) -> bool {
        self.0.eq_ignore_ascii_case(key)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = self.0.get(..16).unwrap_or(&self.0);
        write!(f, "Identity({shown})")
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Identity {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

impl From<String> for Identity {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for Identity {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
