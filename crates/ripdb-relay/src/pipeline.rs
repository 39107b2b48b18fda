//! The authenticated publish pipeline.
//!
//! ```text
//! envelope ─▶ fields present ─▶ signature ─▶ sender ─▶ channel ─▶ append ─▶ fan-out
//!                 │                 │           │          │
//!                 └────── Rejected(reason): no append, no fan-out ──┘
//! ```
//!
//! Nothing touches the stream or the broker until every check has passed.
//! Once the append succeeded, fan-out runs on its own task so it completes
//! even if the publishing connection goes away mid-operation.

use std::sync::Arc;

use ripdb_core::{
    validate_envelope, ChannelId, Identity, MessageEnvelope, MessageId, SignatureVerifier,
    ValidationError, VerifiedEnvelope,
};
use ripdb_store::StreamStore;
use tracing::{debug, warn};

use crate::broker::Broker;
use crate::config::RelayConfig;
use crate::error::Result;
use crate::messages::RejectReason;

/// One publish request, as received from a connection.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    /// Channel the sender wants the message fanned out on.
    pub channel: ChannelId,
    /// Stream the sender wants the message appended to.
    pub stream: ChannelId,
    /// The other participant of the channel.
    pub counterparty: Option<Identity>,
    /// The signed envelope.
    pub envelope: MessageEnvelope,
}

/// Result of a publish that did not fail on a collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PublishOutcome {
    /// Appended with this id and handed to the broker.
    Accepted(MessageId),
    /// Dropped before any side effect.
    Rejected(RejectReason),
}

/// Validates, appends and fans out envelopes.
pub struct PublishPipeline {
    streams: Arc<dyn StreamStore>,
    broker: Arc<dyn Broker>,
    verifier: Arc<dyn SignatureVerifier>,
    bind_sender_to_key: bool,
}

impl PublishPipeline {
    /// Create a pipeline over the given collaborators.
    pub fn new(
        streams: Arc<dyn StreamStore>,
        broker: Arc<dyn Broker>,
        verifier: Arc<dyn SignatureVerifier>,
        config: &RelayConfig,
    ) -> Self {
        Self {
            streams,
            broker,
            verifier,
            bind_sender_to_key: config.bind_sender_to_key,
        }
    }

    /// Run every check of the pipeline without side effects.
    pub fn check(
        &self,
        request: &PublishRequest,
    ) -> std::result::Result<VerifiedEnvelope, ValidationError> {
        let verified = validate_envelope(&request.envelope, self.verifier.as_ref())?;

        if self.bind_sender_to_key && !verified.sender_is_signer() {
            return Err(ValidationError::SenderKeyMismatch);
        }

        let counterparty = request
            .counterparty
            .as_ref()
            .ok_or(ValidationError::MissingField("to"))?;
        let expected = ChannelId::derive(&verified.sender, counterparty);

        for claimed in [&request.stream, &request.channel] {
            if *claimed != expected {
                return Err(ValidationError::ChannelMismatch {
                    claimed: claimed.to_string(),
                    expected: expected.to_string(),
                });
            }
        }

        Ok(verified)
    }

    /// Publish an envelope.
    ///
    /// Returns `Rejected` without touching the stream or broker if any check
    /// fails. Errors only come from the stream append; broker failures after
    /// the append are logged, since the message is already durable.
    ///
    /// `Accepted` is returned once the broker publish has finished, so the
    /// sender's ack follows its own fan-out. The publish itself runs on a
    /// spawned task and is not cancelled if this future is dropped.
    pub async fn publish(&self, request: PublishRequest) -> Result<PublishOutcome> {
        let verified = match self.check(&request) {
            Ok(verified) => verified,
            Err(e) => {
                let reason = RejectReason::from(&e);
                debug!(%reason, "publish rejected");
                return Ok(PublishOutcome::Rejected(reason));
            }
        };

        let id = self.streams.append(&request.stream, &verified.payload).await?;
        let message = request.envelope.with_message_id(id);
        debug!(stream = %request.stream, %id, sender = %verified.sender, "appended");

        let broker = Arc::clone(&self.broker);
        let channel = request.channel;
        let fanout = tokio::spawn(async move {
            if let Err(e) = broker.publish(&channel, &message).await {
                warn!(%channel, error = %e, "fan-out failed");
            }
        });
        if let Err(e) = fanout.await {
            warn!(error = %e, "fan-out task did not complete");
        }

        Ok(PublishOutcome::Accepted(id))
    }
}
