//! One live connection: its state machine and its event loop.
//!
//! ```text
//!            subscribe / unsubscribe / send message
//!                  ┌──────────┐
//!                  ▼          │
//!  attach ──▶ Connected ──────┘
//!                  │
//!                  │ transport closed, error, or task dropped
//!                  ▼
//!            Disconnected   (teardown has run; every operation fails)
//! ```

use std::sync::Arc;

use futures::{Sink, SinkExt, Stream, StreamExt};
use ripdb_core::SignatureVerifier;
use ripdb_store::StreamStore;
use tokio::sync::mpsc;
use tracing::{debug, info, info_span, warn, Instrument};

use crate::broker::Broker;
use crate::config::{RejectionPolicy, RelayConfig};
use crate::error::{RelayError, Result};
use crate::messages::{ClientEvent, ConnectionId, RejectReason, ServerEvent};
use crate::pipeline::{PublishOutcome, PublishPipeline, PublishRequest};
use crate::registry::{Delivery, SubscriptionRegistry};

/// Lifecycle state of a [`Connection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Accepting events.
    Connected,
    /// Torn down. Terminal.
    Disconnected,
}

/// The relay shared by all connections of a process.
#[derive(Clone)]
pub struct Relay {
    registry: Arc<SubscriptionRegistry>,
    pipeline: Arc<PublishPipeline>,
    config: RelayConfig,
}

impl Relay {
    /// Assemble a relay from its collaborators.
    pub fn new(
        streams: Arc<dyn StreamStore>,
        broker: Arc<dyn Broker>,
        verifier: Arc<dyn SignatureVerifier>,
        config: RelayConfig,
    ) -> Self {
        let registry = Arc::new(SubscriptionRegistry::new(Arc::clone(&broker), &config));
        let pipeline = Arc::new(PublishPipeline::new(streams, broker, verifier, &config));
        Self {
            registry,
            pipeline,
            config,
        }
    }

    /// Open a new connection.
    pub fn connect(&self) -> Result<Connection> {
        let (id, deliveries) = self.registry.attach()?;
        Ok(Connection {
            id,
            state: ConnectionState::Connected,
            guard: Some(TeardownGuard {
                id,
                registry: Arc::clone(&self.registry),
                armed: true,
            }),
            deliveries,
            registry: Arc::clone(&self.registry),
            pipeline: Arc::clone(&self.pipeline),
            policy: self.config.rejection_policy,
        })
    }

    /// The subscription registry.
    pub fn registry(&self) -> &Arc<SubscriptionRegistry> {
        &self.registry
    }

    /// The publish pipeline.
    pub fn pipeline(&self) -> &Arc<PublishPipeline> {
        &self.pipeline
    }

    /// The relay configuration.
    pub fn config(&self) -> &RelayConfig {
        &self.config
    }
}

/// Runs teardown for a connection exactly once, on whichever exit path
/// comes first.
///
/// Dropping the guard detaches the connection immediately, so no delivery
/// can be queued for it afterwards. Broker releases are then finished on a
/// spawned task, since `Drop` cannot await.
struct TeardownGuard {
    id: ConnectionId,
    registry: Arc<SubscriptionRegistry>,
    armed: bool,
}

impl TeardownGuard {
    async fn run(mut self) -> Result<()> {
        let released = self.registry.detach(self.id)?;
        self.armed = false;
        self.registry.reconcile_all(&released).await
    }
}

impl Drop for TeardownGuard {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        let released = match self.registry.detach(self.id) {
            Ok(released) => released,
            Err(e) => {
                warn!(conn = %self.id, error = %e, "teardown failed");
                return;
            }
        };
        if released.is_empty() {
            return;
        }

        let registry = Arc::clone(&self.registry);
        let conn = self.id;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = registry.reconcile_all(&released).await {
                        warn!(%conn, error = %e, "releasing broker subscriptions failed");
                    }
                });
            }
            Err(_) => warn!(%conn, "no runtime to release broker subscriptions"),
        }
    }
}

/// One client connection.
pub struct Connection {
    id: ConnectionId,
    state: ConnectionState,
    guard: Option<TeardownGuard>,
    deliveries: mpsc::Receiver<Delivery>,
    registry: Arc<SubscriptionRegistry>,
    pipeline: Arc<PublishPipeline>,
    policy: RejectionPolicy,
}

impl Connection {
    /// This connection's id.
    pub fn id(&self) -> ConnectionId {
        self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    fn ensure_connected(&self) -> Result<()> {
        match self.state {
            ConnectionState::Connected => Ok(()),
            ConnectionState::Disconnected => Err(RelayError::Disconnected),
        }
    }

    /// Handle one inbound event. Returns the reply for this connection, if any.
    ///
    /// Bad subscription requests are logged and ignored; they never close
    /// the connection.
    pub async fn handle(&mut self, event: ClientEvent) -> Result<Option<ServerEvent>> {
        self.ensure_connected()?;

        if let Err(reason) = event.validate_limits() {
            warn!(conn = %self.id, %reason, "event exceeds limits");
            return Ok(self.rejection(RejectReason::Invalid));
        }

        match event {
            ClientEvent::Subscribe { channel } => {
                match self.registry.subscribe(self.id, &channel).await {
                    Ok(_) => {}
                    Err(RelayError::SubscriptionLimit(max)) => {
                        warn!(conn = %self.id, %channel, max, "subscription limit reached");
                    }
                    Err(e) => return Err(e),
                }
                Ok(None)
            }
            ClientEvent::Unsubscribe { channel } => {
                self.registry.unsubscribe(self.id, &channel).await?;
                Ok(None)
            }
            ClientEvent::SendMessage {
                channel,
                stream,
                to,
                envelope,
            } => {
                let request = PublishRequest {
                    channel,
                    stream: stream.clone(),
                    counterparty: to,
                    envelope,
                };
                match self.pipeline.publish(request).await? {
                    PublishOutcome::Accepted(message_id) => {
                        Ok(Some(ServerEvent::MessageAck { stream, message_id }))
                    }
                    PublishOutcome::Rejected(reason) => Ok(self.rejection(reason)),
                }
            }
        }
    }

    fn rejection(&self, reason: RejectReason) -> Option<ServerEvent> {
        match self.policy {
            RejectionPolicy::Silent => None,
            RejectionPolicy::Notify => Some(ServerEvent::Rejected { reason }),
        }
    }

    /// Wait for the next message to forward to the client.
    ///
    /// Membership is checked again here, so a message queued just before an
    /// unsubscribe is not forwarded. Returns `None` once the connection is
    /// torn down.
    pub async fn next_delivery(&mut self) -> Option<ServerEvent> {
        loop {
            let delivery = self.deliveries.recv().await?;
            if self.registry.is_subscribed(self.id, &delivery.channel) {
                return Some(ServerEvent::NewMessage {
                    channel: delivery.channel,
                    message: delivery.message,
                });
            }
            debug!(conn = %self.id, channel = %delivery.channel, "suppressed stale delivery");
        }
    }

    /// Tear the connection down. Idempotent.
    pub async fn close(&mut self) -> Result<()> {
        self.state = ConnectionState::Disconnected;
        self.deliveries.close();
        match self.guard.take() {
            Some(guard) => guard.run().await,
            None => Ok(()),
        }
    }

    /// Drive the connection until the inbound side ends or the transport fails.
    ///
    /// Undecodable events are logged and skipped. Teardown always runs before
    /// this returns, and also if the returned future is dropped.
    pub async fn run<I, O>(mut self, mut inbound: I, mut outbound: O) -> Result<()>
    where
        I: Stream<Item = Result<ClientEvent>> + Unpin,
        O: Sink<ServerEvent, Error = RelayError> + Unpin,
    {
        let span = info_span!("connection", id = %self.id);

        async move {
            info!("connected");

            let result = loop {
                tokio::select! {
                    event = inbound.next() => match event {
                        Some(Ok(event)) => match self.handle(event).await {
                            Ok(Some(reply)) => {
                                if let Err(e) = outbound.send(reply).await {
                                    break Err(e);
                                }
                            }
                            Ok(None) => {}
                            Err(e) => break Err(e),
                        },
                        Some(Err(RelayError::InvalidMessage(reason))) => {
                            warn!(%reason, "skipping undecodable event");
                        }
                        Some(Err(e)) => break Err(e),
                        None => break Ok(()),
                    },
                    Some(event) = self.next_delivery() => {
                        if let Err(e) = outbound.send(event).await {
                            break Err(e);
                        }
                    }
                }
            };

            let closed = self.close().await;
            match &result {
                Ok(()) => info!("disconnected"),
                Err(e) => info!(error = %e, "disconnected with error"),
            }
            result.and(closed)
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broker::MemoryBroker;
    use ripdb_core::{ChannelId, Ed25519Verifier, EnvelopeBuilder, Identity, Keypair, MessageId};
    use ripdb_store::MemoryStore;

    fn relay(config: RelayConfig) -> (Arc<MemoryBroker>, Relay) {
        let broker = Arc::new(MemoryBroker::new());
        let relay = Relay::new(
            Arc::new(MemoryStore::new()),
            broker.clone(),
            Arc::new(Ed25519Verifier),
            config,
        );
        (broker, relay)
    }

    fn send_event(from: &Keypair, to: &Identity) -> ClientEvent {
        let me = Identity::from_public_key(&from.public_key());
        let channel = ChannelId::derive(&me, to);
        ClientEvent::SendMessage {
            channel: channel.clone(),
            stream: channel,
            to: Some(to.clone()),
            envelope: EnvelopeBuilder::new(me).text("hi").sign(from).unwrap(),
        }
    }

    #[tokio::test]
    async fn test_ack_then_fanout_to_own_subscription() {
        let (_, relay) = relay(RelayConfig::default());
        let mut conn = relay.connect().unwrap();
        let alice = Keypair::from_seed(&[1; 32]);
        let bob = Identity::from("bob");
        let channel = ChannelId::derive(&Identity::from_public_key(&alice.public_key()), &bob);

        conn.handle(ClientEvent::Subscribe {
            channel: channel.clone(),
        })
        .await
        .unwrap();

        let reply = conn.handle(send_event(&alice, &bob)).await.unwrap();
        assert_eq!(
            reply,
            Some(ServerEvent::MessageAck {
                stream: channel.clone(),
                message_id: MessageId(1)
            })
        );

        match conn.next_delivery().await {
            Some(ServerEvent::NewMessage { channel: c, message }) => {
                assert_eq!(c, channel);
                assert_eq!(message.message_id, Some(MessageId(1)));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_stale_delivery_is_suppressed() {
        let (broker, relay) = relay(RelayConfig::default());
        let mut conn = relay.connect().unwrap();
        let ch = ChannelId::named("ch1");

        conn.handle(ClientEvent::Subscribe { channel: ch.clone() })
            .await
            .unwrap();
        // Queued while subscribed, dequeued after unsubscribing.
        let queued = ripdb_core::MessageEnvelope::default().with_message_id(MessageId(1));
        broker.publish(&ch, &queued).await.unwrap();
        conn.handle(ClientEvent::Unsubscribe { channel: ch.clone() })
            .await
            .unwrap();
        conn.close().await.unwrap();

        assert_eq!(conn.next_delivery().await, None);
    }

    #[tokio::test]
    async fn test_rejection_policy() {
        let mallory = Keypair::from_seed(&[9; 32]);
        let bob = Identity::from("bob");
        let mut event = send_event(&mallory, &bob);
        if let ClientEvent::SendMessage { stream, .. } = &mut event {
            *stream = ChannelId::named("not-theirs");
        }

        let (_, silent) = relay(RelayConfig::default());
        let mut conn = silent.connect().unwrap();
        assert_eq!(conn.handle(event.clone()).await.unwrap(), None);

        let (_, notify) =
            relay(RelayConfig::default().with_rejection_policy(RejectionPolicy::Notify));
        let mut conn = notify.connect().unwrap();
        assert_eq!(
            conn.handle(event).await.unwrap(),
            Some(ServerEvent::Rejected {
                reason: RejectReason::Misrouted
            })
        );
    }

    #[tokio::test]
    async fn test_operations_after_close_fail() {
        let (broker, relay) = relay(RelayConfig::default());
        let mut conn = relay.connect().unwrap();
        let ch = ChannelId::named("ch1");
        conn.handle(ClientEvent::Subscribe { channel: ch.clone() })
            .await
            .unwrap();

        conn.close().await.unwrap();
        conn.close().await.unwrap();

        assert_eq!(conn.state(), ConnectionState::Disconnected);
        assert!(!broker.is_subscribed(&ch));
        assert!(matches!(
            conn.handle(ClientEvent::Subscribe { channel: ch }).await,
            Err(RelayError::Disconnected)
        ));
    }

    #[tokio::test]
    async fn test_drop_tears_down() {
        let (broker, relay) = relay(RelayConfig::default());
        let conn = relay.connect().unwrap();
        let id = conn.id();
        let ch = ChannelId::named("ch1");
        relay.registry().subscribe(id, &ch).await.unwrap();

        drop(conn);
        assert!(!relay.registry().is_attached(id));
        assert_eq!(relay.registry().deliver(&ch, &Default::default()), 0);

        // Broker release finishes on a spawned task.
        for _ in 0..100 {
            if !broker.is_subscribed(&ch) {
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(!broker.is_subscribed(&ch));
    }

    #[tokio::test]
    async fn test_run_loop_until_inbound_ends() {
        let (_, relay) = relay(RelayConfig::default());
        let conn = relay.connect().unwrap();
        let id = conn.id();
        let alice = Keypair::from_seed(&[1; 32]);
        let bob = Identity::from("bob");

        let inbound = futures::stream::iter(vec![
            Ok(ClientEvent::Subscribe {
                channel: ChannelId::named("ch1"),
            }),
            Err(RelayError::InvalidMessage("garbage".into())),
            Ok(send_event(&alice, &bob)),
        ]);
        let (tx, rx) = futures::channel::mpsc::unbounded();
        let outbound = tx.sink_map_err(|e| RelayError::Transport(e.to_string()));

        conn.run(inbound, outbound).await.unwrap();

        let sent: Vec<ServerEvent> = rx.collect().await;
        assert!(matches!(
            sent.as_slice(),
            [ServerEvent::MessageAck { message_id: MessageId(1), .. }]
        ));
        assert!(!relay.registry().is_attached(id));
    }
}
