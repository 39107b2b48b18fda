//! Access conditions enforced by the key-custody service.

use serde::{Deserialize, Serialize};

use ripdb_core::{Identity, SignatureVerifier};

use crate::proof::AuthProof;

const CONDITION_DOMAIN: &[u8] = b"ripdb-vault-v1/condition";

/// A predicate a caller must satisfy before a wrapped key is released.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum AccessCondition {
    /// The caller proves control of `identity`.
    Owner {
        /// The owning identity.
        identity: Identity,
    },
}

impl AccessCondition {
    /// Gate on control of `identity`.
    pub fn owner(identity: Identity) -> Self {
        Self::Owner { identity }
    }

    /// Stable byte encoding. A key wrapped under one condition cannot be
    /// unwrapped under another.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        let mut out = CONDITION_DOMAIN.to_vec();
        match self {
            Self::Owner { identity } => {
                out.extend_from_slice(b"/owner/");
                out.extend_from_slice(identity.as_str().as_bytes());
            }
        }
        out
    }

    /// Whether `proof` satisfies this condition.
    pub fn is_satisfied_by(&self, proof: &AuthProof, verifier: &dyn SignatureVerifier) -> bool {
        match self {
            Self::Owner { identity } => proof.identity == *identity && proof.verify(verifier),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ripdb_core::{Ed25519Verifier, Keypair};

    #[test]
    fn test_owner_condition() {
        let owner = Keypair::from_seed(&[1; 32]);
        let other = Keypair::from_seed(&[2; 32]);
        let condition = AccessCondition::owner(Identity::from_public_key(&owner.public_key()));

        assert!(condition.is_satisfied_by(&AuthProof::sign(&owner), &Ed25519Verifier));
        assert!(!condition.is_satisfied_by(&AuthProof::sign(&other), &Ed25519Verifier));
    }

    #[test]
    fn test_canonical_bytes_distinguish_owners() {
        let a = AccessCondition::owner(Identity::from("a"));
        let b = AccessCondition::owner(Identity::from("b"));
        assert_ne!(a.canonical_bytes(), b.canonical_bytes());
        assert_eq!(a.canonical_bytes(), a.clone().canonical_bytes());
    }

    #[test]
    fn test_wire_shape() {
        let json = serde_json::to_value(AccessCondition::owner(Identity::from("abc"))).unwrap();
        assert_eq!(json["kind"], "owner");
        assert_eq!(json["identity"], "abc");
    }
}
