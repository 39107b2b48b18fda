//! Channel identity: the symmetric name of a two-party conversation.
//!
//! A channel is never created or destroyed. Both participants derive the same
//! name independently, and the relay re-derives it to check where a signed
//! message is allowed to go.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::identity::Identity;

/// A channel name.
///
/// Derived channels are `hex(sha256(lo || hi))` where `lo <= hi` are the two
/// participant identities. Arbitrary names are also accepted as subscription
/// topics; only the publish pipeline insists on the derived form.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChannelId(String);

impl ChannelId {
    /// Derive the channel shared by `a` and `b`. Commutative.
    pub fn derive(a: &Identity, b: &Identity) -> Self {
        let (lo, hi) = if a <= b { (a, b) } else { (b, a) };
        let mut hasher = Sha256::new();
        hasher.update(lo.as_str().as_bytes());
        hasher.update(hi.as_str().as_bytes());
        Self(hex::encode(hasher.finalize()))
    }

    /// Use an arbitrary topic name as a channel.
    pub fn named(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Whether this is the channel between `a` and `b`.
    pub fn is_between(&self, a: &Identity, b: &Identity) -> bool {
        *self == Self::derive(a, b)
    }

    /// Borrow the channel name.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let shown = self.0.get(..16).unwrap_or(&self.0);
        write!(f, "ChannelId({shown})")
    }
}

impl fmt::Display for ChannelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ChannelId {
    fn from(s: &str) -> Self {
        Self::named(s)
    }
}

impl AsRef<str> for ChannelId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
