//! Authorization proofs and the providers that obtain them.
//!
//! A proof is an Ed25519 signature by an identity's key over a fixed,
//! domain-separated message. Decrypt and encrypt paths never produce proofs
//! themselves; they ask an injected [`ProofProvider`].

use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use ripdb_core::{Identity, Keypair, SignatureVerifier};

use crate::error::{Result, VaultError};

/// Prefix of every authorization message.
pub const AUTH_MESSAGE_DOMAIN: &str = "ripdb-vault-v1/authorize:";

/// Proof that the holder controls `identity`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthProof {
    /// The identity claimed, hex Ed25519 public key.
    pub identity: Identity,
    /// Hex signature over [`AuthProof::message`].
    pub signature: String,
}

impl AuthProof {
    /// The message an identity signs to authorize key access.
    pub fn message(identity: &Identity) -> Vec<u8> {
        format!("{AUTH_MESSAGE_DOMAIN}{identity}").into_bytes()
    }

    /// Produce a proof for the keypair's own identity.
    pub fn sign(keypair: &Keypair) -> Self {
        let identity = Identity::from_public_key(&keypair.public_key());
        let signature = keypair.sign(&Self::message(&identity)).to_hex();
        Self {
            identity,
            signature,
        }
    }

    /// Check the signature against the claimed identity.
    pub fn verify(&self, verifier: &dyn SignatureVerifier) -> bool {
        verifier.verify(
            &Self::message(&self.identity),
            &self.signature,
            self.identity.as_str(),
        )
    }
}

/// Source of authorization proofs.
#[async_trait]
pub trait ProofProvider: Send + Sync {
    /// Obtain a proof, or fail with [`VaultError::NoProof`].
    async fn proof(&self) -> Result<AuthProof>;
}

/// A fixed proof, e.g. one supplied by the caller as an override.
#[derive(Debug, Clone)]
pub struct StaticProof(pub AuthProof);

#[async_trait]
impl ProofProvider for StaticProof {
    async fn proof(&self) -> Result<AuthProof> {
        Ok(self.0.clone())
    }
}

/// Remembers the most recent proof handed to it.
#[derive(Debug, Default)]
pub struct ProofCache {
    slot: RwLock<Option<AuthProof>>,
}

impl ProofCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Remember `proof`.
    pub fn store(&self, proof: AuthProof) {
        if let Ok(mut slot) = self.slot.write() {
            *slot = Some(proof);
        }
    }

    /// The remembered proof, if any.
    pub fn get(&self) -> Option<AuthProof> {
        self.slot.read().ok().and_then(|slot| slot.clone())
    }

    /// Forget the remembered proof.
    pub fn clear(&self) {
        if let Ok(mut slot) = self.slot.write() {
            *slot = None;
        }
    }
}

#[async_trait]
impl ProofProvider for ProofCache {
    async fn proof(&self) -> Result<AuthProof> {
        self.get()
            .ok_or_else(|| VaultError::NoProof("no cached proof".into()))
    }
}

/// The interactive provider: signs with a held keypair on demand.
///
/// Every proof it produces is also written to `cache`, when one is set.
pub struct KeypairPrompt {
    keypair: Keypair,
    cache: Option<Arc<ProofCache>>,
}

impl KeypairPrompt {
    /// Sign with `keypair` whenever asked.
    pub fn new(keypair: Keypair) -> Self {
        Self {
            keypair,
            cache: None,
        }
    }

    /// Also remember produced proofs in `cache`.
    pub fn caching_into(mut self, cache: Arc<ProofCache>) -> Self {
        self.cache = Some(cache);
        self
    }
}

#[async_trait]
impl ProofProvider for KeypairPrompt {
    async fn proof(&self) -> Result<AuthProof> {
        let proof = AuthProof::sign(&self.keypair);
        debug!(identity = %proof.identity, "signed authorization message");
        if let Some(cache) = &self.cache {
            cache.store(proof.clone());
        }
        Ok(proof)
    }
}

/// Used where nobody can be prompted, e.g. on a server.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoInteractiveContext;

#[async_trait]
impl ProofProvider for NoInteractiveContext {
    async fn proof(&self) -> Result<AuthProof> {
        Err(VaultError::NoProof(
            "authorization messages can only be signed interactively".into(),
        ))
    }
}

/// Tries providers in order; the first proof wins.
///
/// Providers failing with [`VaultError::NoProof`] are skipped, any other
/// error is returned immediately.
#[derive(Default, Clone)]
pub struct ProofChain {
    providers: Vec<Arc<dyn ProofProvider>>,
}

impl ProofChain {
    /// An empty chain. Always fails until a provider is added.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a provider.
    pub fn then(mut self, provider: Arc<dyn ProofProvider>) -> Self {
        self.providers.push(provider);
        self
    }

    /// Append a provider if present.
    pub fn then_maybe(self, provider: Option<Arc<dyn ProofProvider>>) -> Self {
        match provider {
            Some(provider) => self.then(provider),
            None => self,
        }
    }
}

#[async_trait]
impl ProofProvider for ProofChain {
    async fn proof(&self) -> Result<AuthProof> {
        for provider in &self.providers {
            match provider.proof().await {
                Ok(proof) => return Ok(proof),
                Err(VaultError::NoProof(reason)) => {
                    debug!(%reason, "proof provider declined");
                }
                Err(e) => return Err(e),
            }
        }
        Err(VaultError::NoProof("no provider produced a proof".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ripdb_core::Ed25519Verifier;

    fn keypair(seed: u8) -> Keypair {
        Keypair::from_seed(&[seed; 32])
    }

    #[test]
    fn test_proof_verifies_only_for_its_identity() {
        let proof = AuthProof::sign(&keypair(1));
        assert!(proof.verify(&Ed25519Verifier));

        let mut forged = proof.clone();
        forged.identity = Identity::from_public_key(&keypair(2).public_key());
        assert!(!forged.verify(&Ed25519Verifier));
    }

    #[tokio::test]
    async fn test_chain_order_and_fallthrough() {
        let override_proof = AuthProof::sign(&keypair(1));
        let cache = Arc::new(ProofCache::new());
        let prompt = Arc::new(KeypairPrompt::new(keypair(2)).caching_into(cache.clone()));

        // Nothing cached, no override: the prompt answers and fills the cache.
        let chain = ProofChain::new()
            .then(cache.clone())
            .then(prompt.clone());
        let first = chain.proof().await.unwrap();
        assert_eq!(cache.get(), Some(first.clone()));

        // An override beats everything after it.
        let chain = ProofChain::new()
            .then(Arc::new(StaticProof(override_proof.clone())))
            .then(cache.clone())
            .then(prompt);
        assert_eq!(chain.proof().await.unwrap(), override_proof);
    }

    #[tokio::test]
    async fn test_no_interactive_context() {
        let chain = ProofChain::new()
            .then(Arc::new(ProofCache::new()))
            .then(Arc::new(NoInteractiveContext));
        assert!(matches!(chain.proof().await, Err(VaultError::NoProof(_))));
        assert!(matches!(
            ProofChain::new().proof().await,
            Err(VaultError::NoProof(_))
        ));
    }
}
