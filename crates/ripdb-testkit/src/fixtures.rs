//! Test fixtures and helpers.

use std::sync::Arc;

use ripdb_core::{
    ChannelId, Ed25519PublicKey, Ed25519Verifier, EnvelopeBuilder, Identity, Keypair,
    MessageEnvelope,
};
use ripdb_relay::{ClientEvent, MemoryBroker, Relay, RelayConfig};
use ripdb_store::{MemoryBlobStore, MemoryStore};
use ripdb_vault::{AuthProof, EnvelopeCodec, LocalKeyCustody, StaticProof};

/// A participant with a keypair and the identity it owns.
#[derive(Debug, Clone)]
pub struct Participant {
    pub keypair: Keypair,
    pub identity: Identity,
}

impl Participant {
    /// A participant with a random keypair.
    pub fn new() -> Self {
        Self::from_keypair(Keypair::generate())
    }

    /// A participant whose seed is `[byte; 32]`.
    pub fn from_seed(byte: u8) -> Self {
        Self::from_keypair(Keypair::from_seed(&[byte; 32]))
    }

    fn from_keypair(keypair: Keypair) -> Self {
        let identity = Identity::from_public_key(&keypair.public_key());
        Self { keypair, identity }
    }

    /// Get the keypair's public key.
    pub fn public_key(&self) -> Ed25519PublicKey {
        self.keypair.public_key()
    }

    /// The channel shared with `other`.
    pub fn channel_with(&self, other: &Participant) -> ChannelId {
        ChannelId::derive(&self.identity, &other.identity)
    }

    /// A signed envelope carrying `text`.
    pub fn envelope(&self, text: &str) -> MessageEnvelope {
        self.builder()
            .text(text)
            .sign(&self.keypair)
            .expect("text payload always encodes")
    }

    /// Start an envelope sent by this participant.
    pub fn builder(&self) -> EnvelopeBuilder {
        EnvelopeBuilder::new(self.identity.clone())
    }

    /// A correctly routed `send message` event to `to`.
    pub fn send_to(&self, to: &Participant, text: &str) -> ClientEvent {
        let channel = self.channel_with(to);
        ClientEvent::SendMessage {
            channel: channel.clone(),
            stream: channel,
            to: Some(to.identity.clone()),
            envelope: self.envelope(text),
        }
    }

    /// A `send message` event signed by this participant but routed to
    /// `channel` for both fan-out and append.
    pub fn send_on(&self, channel: ChannelId, to: &Participant, text: &str) -> ClientEvent {
        ClientEvent::SendMessage {
            channel: channel.clone(),
            stream: channel,
            to: Some(to.identity.clone()),
            envelope: self.envelope(text),
        }
    }

    /// An authorization proof for this participant's identity.
    pub fn auth_proof(&self) -> AuthProof {
        AuthProof::sign(&self.keypair)
    }

    /// The proof, as a provider.
    pub fn proof_provider(&self) -> StaticProof {
        StaticProof(self.auth_proof())
    }
}

impl Default for Participant {
    fn default() -> Self {
        Self::new()
    }
}

/// Create `count` participants with seeds `1..=count`.
pub fn multi_party(count: u8) -> Vec<Participant> {
    (1..=count).map(Participant::from_seed).collect()
}

/// A relay over in-memory collaborators, with handles to inspect them.
pub struct TestRelay {
    pub relay: Relay,
    pub broker: Arc<MemoryBroker>,
    pub store: Arc<MemoryStore>,
}

impl TestRelay {
    /// A relay with the default configuration.
    pub fn new() -> Self {
        Self::with_config(RelayConfig::default())
    }

    /// A relay with `config`.
    pub fn with_config(config: RelayConfig) -> Self {
        let broker = Arc::new(MemoryBroker::new());
        let store = Arc::new(MemoryStore::new());
        let relay = Relay::new(
            store.clone(),
            broker.clone(),
            Arc::new(Ed25519Verifier),
            config,
        );
        Self {
            relay,
            broker,
            store,
        }
    }
}

impl Default for TestRelay {
    fn default() -> Self {
        Self::new()
    }
}

/// A codec over a fresh local custody service and an in-memory blob store.
pub fn test_codec() -> EnvelopeCodec {
    EnvelopeCodec::new(
        Arc::new(LocalKeyCustody::generate(Arc::new(Ed25519Verifier))),
        Arc::new(MemoryBlobStore::new()),
    )
}
