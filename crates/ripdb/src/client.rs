//! Client-side access to a key-value store, with optional owner-gated
//! encryption of the stored values.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use ripdb_core::Keypair;
use ripdb_store::{KeyValueStore, Wrapped};
use ripdb_vault::{
    AuthProof, EnvelopeCodec, KeypairPrompt, NoInteractiveContext, PayloadEnvelope, ProofCache,
    ProofChain, ProofProvider, StaticProof,
};

use crate::error::Result;

/// Options for [`RipClient::set`].
#[derive(Debug, Clone, Default)]
pub struct SetOptions {
    /// Store the value as an [`EncryptedRecord`](ripdb_vault::EncryptedRecord)
    /// owned by the proving identity.
    pub encrypt: bool,
    /// Use this proof instead of the cached or interactive one.
    pub proof_override: Option<AuthProof>,
}

impl SetOptions {
    /// Encrypt the value.
    pub fn encrypted() -> Self {
        Self {
            encrypt: true,
            proof_override: None,
        }
    }
}

/// Options for [`RipClient::get`].
#[derive(Debug, Clone, Default)]
pub struct GetOptions {
    /// Use this proof instead of the cached or interactive one.
    pub proof_override: Option<AuthProof>,
}

/// A key-value client that encrypts on request and decrypts transparently.
///
/// Proofs are taken from, in order: the per-call override, the cache, the
/// interactive provider. Without an interactive provider (e.g. on a server)
/// encryption works only with an override or a cached proof.
pub struct RipClient {
    store: Arc<dyn KeyValueStore>,
    codec: EnvelopeCodec,
    cache: Arc<ProofCache>,
    interactive: Arc<dyn ProofProvider>,
}

impl RipClient {
    /// A client with no interactive context.
    pub fn new(store: Arc<dyn KeyValueStore>, codec: EnvelopeCodec) -> Self {
        Self {
            store,
            codec,
            cache: Arc::new(ProofCache::new()),
            interactive: Arc::new(NoInteractiveContext),
        }
    }

    /// Sign authorization messages with `keypair` when no proof is at hand.
    /// Signed proofs are cached.
    pub fn with_keypair(mut self, keypair: Keypair) -> Self {
        self.interactive = Arc::new(KeypairPrompt::new(keypair).caching_into(self.cache.clone()));
        self
    }

    /// Use a custom interactive provider.
    pub fn with_interactive(mut self, provider: Arc<dyn ProofProvider>) -> Self {
        self.interactive = provider;
        self
    }

    fn proofs(&self, proof_override: Option<AuthProof>) -> ProofChain {
        ProofChain::new()
            .then_maybe(
                proof_override.map(|proof| Arc::new(StaticProof(proof)) as Arc<dyn ProofProvider>),
            )
            .then(self.cache.clone())
            .then(self.interactive.clone())
    }

    /// Store `value` under `key`, encrypted if `opts.encrypt` is set.
    ///
    /// Returns what was stored: the plain value or the encrypted record.
    pub async fn set<T: Serialize + ?Sized>(
        &self,
        key: &str,
        value: &T,
        opts: SetOptions,
    ) -> Result<Wrapped<Value>> {
        let data = if opts.encrypt {
            let proofs = self.proofs(opts.proof_override);
            let record = self.codec.encrypt_and_store(value, &proofs).await?;
            serde_json::to_value(record)?
        } else {
            serde_json::to_value(value)?
        };

        debug!(key, encrypted = opts.encrypt, "set");
        Ok(self.store.set(key, data).await?)
    }

    /// Fetch the value under `key`, decrypting it if it is encrypted.
    ///
    /// Fails with a not-found error when nothing is stored, and with
    /// [`VaultError::AccessDenied`](ripdb_vault::VaultError::AccessDenied)
    /// when the proof is not accepted for the record's owner.
    pub async fn get<T: DeserializeOwned>(&self, key: &str, opts: GetOptions) -> Result<Wrapped<T>> {
        let Wrapped {
            key,
            data,
            stored_at,
        } = self.store.get(key).await?;

        let envelope: PayloadEnvelope<T> = serde_json::from_value(data)?;
        let proofs = self.proofs(opts.proof_override);
        let data = self.codec.load_and_decrypt(envelope, &proofs).await?;

        Ok(Wrapped {
            key,
            data,
            stored_at,
        })
    }

    /// Delete `key`. Returns whether anything was removed.
    pub async fn purge(&self, key: &str) -> Result<bool> {
        Ok(self.store.purge(key).await?)
    }

    /// Obtain a proof from the interactive provider and cache it.
    pub async fn sign_for_encryption(&self) -> Result<AuthProof> {
        let proof = self.interactive.proof().await?;
        self.cache.store(proof.clone());
        Ok(proof)
    }

    /// The cached proof, if any.
    pub fn encryption_proof(&self) -> Option<AuthProof> {
        self.cache.get()
    }

    /// Forget the cached proof.
    pub fn clear_encryption_proof(&self) {
        self.cache.clear();
    }
}
