//! Subscription registry: which connection wants which channels.
//!
//! The registry is the only state shared between connections. It keeps, under
//! one lock:
//!
//! - each connection's outbound queue (its delivery callback),
//! - each connection's subscription set, dropped when it becomes empty,
//! - a reverse index channel → connections, used for fan-out and to know when
//!   the broker subscription for a channel can be released.
//!
//! The lock is never held across an `.await`. Broker subscribe/unsubscribe
//! calls are serialized separately and always re-read the index, so a
//! release can never overtake a later acquire for the same channel.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};

use ripdb_core::{ChannelId, MessageEnvelope};
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::{debug, warn};

use crate::broker::{Broker, DeliveryCallback};
use crate::config::RelayConfig;
use crate::error::{RelayError, Result};
use crate::messages::ConnectionId;

/// A message queued for one connection.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    /// Channel the message was published on.
    pub channel: ChannelId,
    /// The envelope, with its message id.
    pub message: MessageEnvelope,
}

#[derive(Default)]
struct RegistryState {
    /// Outbound queue per attached connection.
    outbound: HashMap<ConnectionId, mpsc::Sender<Delivery>>,

    /// Subscription set per connection. Absent when empty.
    subscriptions: HashMap<ConnectionId, HashSet<ChannelId>>,

    /// Reverse index. Absent when no local connection wants the channel.
    channels: HashMap<ChannelId, HashSet<ConnectionId>>,

    /// Channels the broker is currently routing to us.
    brokered: HashSet<ChannelId>,
}

impl RegistryState {
    fn is_subscribed(&self, conn: ConnectionId, channel: &ChannelId) -> bool {
        self.subscriptions
            .get(&conn)
            .is_some_and(|set| set.contains(channel))
    }

    fn remove(&mut self, conn: ConnectionId, channel: &ChannelId) -> bool {
        let Some(set) = self.subscriptions.get_mut(&conn) else {
            return false;
        };
        if !set.remove(channel) {
            return false;
        }
        if set.is_empty() {
            self.subscriptions.remove(&conn);
        }
        if let Some(conns) = self.channels.get_mut(channel) {
            conns.remove(&conn);
            if conns.is_empty() {
                self.channels.remove(channel);
            }
        }
        true
    }
}

/// Concurrency-safe registry of connections and their subscriptions.
pub struct SubscriptionRegistry {
    state: Arc<RwLock<RegistryState>>,
    broker: Arc<dyn Broker>,
    broker_ops: tokio::sync::Mutex<()>,
    next_id: AtomicU64,
    outbound_buffer: usize,
    max_subscriptions: usize,
}

impl SubscriptionRegistry {
    /// Create a registry that subscribes through `broker`.
    pub fn new(broker: Arc<dyn Broker>, config: &RelayConfig) -> Self {
        Self {
            state: Arc::new(RwLock::new(RegistryState::default())),
            broker,
            broker_ops: tokio::sync::Mutex::new(()),
            next_id: AtomicU64::new(1),
            outbound_buffer: config.outbound_buffer.max(1),
            max_subscriptions: config.max_subscriptions_per_connection,
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, RegistryState>> {
        self.state
            .read()
            .map_err(|e| RelayError::Unavailable(format!("lock poisoned: {e}")))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, RegistryState>> {
        self.state
            .write()
            .map_err(|e| RelayError::Unavailable(format!("lock poisoned: {e}")))
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Connection lifecycle
    // ─────────────────────────────────────────────────────────────────────────

    /// Attach a new connection and return its id and delivery queue.
    pub fn attach(&self) -> Result<(ConnectionId, mpsc::Receiver<Delivery>)> {
        let id = ConnectionId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let (tx, rx) = mpsc::channel(self.outbound_buffer);
        self.write()?.outbound.insert(id, tx);
        debug!(%id, "connection attached");
        Ok((id, rx))
    }

    /// Whether `conn` is attached.
    pub fn is_attached(&self, conn: ConnectionId) -> bool {
        self.read()
            .map(|s| s.outbound.contains_key(&conn))
            .unwrap_or(false)
    }

    /// Remove every subscription of `conn` and detach it.
    ///
    /// Deliveries stop as soon as this returns from its first lock section;
    /// broker subscriptions nobody needs any more are released afterwards.
    /// Calling this for an unknown or already torn down connection is a no-op.
    pub async fn teardown(&self, conn: ConnectionId) -> Result<()> {
        let released = self.detach(conn)?;
        self.reconcile_all(&released).await
    }

    /// The synchronous half of [`teardown`](Self::teardown): returns the
    /// channels whose broker subscription may need releasing.
    pub(crate) fn detach(&self, conn: ConnectionId) -> Result<Vec<ChannelId>> {
        let mut state = self.write()?;
        let was_attached = state.outbound.remove(&conn).is_some();

        let held: Vec<ChannelId> = state
            .subscriptions
            .get(&conn)
            .map(|set| set.iter().cloned().collect())
            .unwrap_or_default();
        for channel in &held {
            state.remove(conn, channel);
        }
        state.subscriptions.remove(&conn);

        if was_attached {
            debug!(%conn, channels = held.len(), "connection detached");
        }
        Ok(held)
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Subscriptions
    // ─────────────────────────────────────────────────────────────────────────

    /// Add `channel` to the subscriptions of `conn`. Idempotent.
    ///
    /// Returns `true` if the channel was newly added. If the broker refuses
    /// the subscription, the membership is rolled back and the error returned,
    /// so a retry starts from scratch.
    pub async fn subscribe(&self, conn: ConnectionId, channel: &ChannelId) -> Result<bool> {
        let added = {
            let mut state = self.write()?;
            if !state.outbound.contains_key(&conn) {
                return Err(RelayError::Disconnected);
            }
            if state.is_subscribed(conn, channel) {
                if state.brokered.contains(channel) {
                    return Ok(false);
                }
                // Held, but a concurrent acquire has not landed or failed.
                false
            } else {
                let held = state.subscriptions.get(&conn).map_or(0, HashSet::len);
                if held >= self.max_subscriptions {
                    return Err(RelayError::SubscriptionLimit(self.max_subscriptions));
                }

                state
                    .subscriptions
                    .entry(conn)
                    .or_default()
                    .insert(channel.clone());
                state
                    .channels
                    .entry(channel.clone())
                    .or_default()
                    .insert(conn);
                true
            }
        };

        if let Err(e) = self.reconcile(channel).await {
            if added {
                self.write()?.remove(conn, channel);
            }
            warn!(%conn, %channel, error = %e, "broker subscribe failed");
            return Err(e);
        }
        if added {
            debug!(%conn, %channel, "subscribed");
        }
        Ok(added)
    }

    /// Remove `channel` from the subscriptions of `conn`. Idempotent.
    ///
    /// Returns `true` if the channel was held.
    pub async fn unsubscribe(&self, conn: ConnectionId, channel: &ChannelId) -> Result<bool> {
        let removed = self.write()?.remove(conn, channel);
        if removed {
            debug!(%conn, %channel, "unsubscribed");
            self.reconcile(channel).await?;
        }
        Ok(removed)
    }

    /// Whether `conn` currently wants deliveries on `channel`.
    pub fn is_subscribed(&self, conn: ConnectionId, channel: &ChannelId) -> bool {
        self.read()
            .map(|s| s.is_subscribed(conn, channel))
            .unwrap_or(false)
    }

    /// Channels `conn` currently holds.
    pub fn subscriptions(&self, conn: ConnectionId) -> Vec<ChannelId> {
        self.read()
            .ok()
            .and_then(|s| s.subscriptions.get(&conn).map(|set| set.iter().cloned().collect()))
            .unwrap_or_default()
    }

    /// Number of local connections subscribed to `channel`.
    pub fn subscriber_count(&self, channel: &ChannelId) -> usize {
        self.read()
            .ok()
            .and_then(|s| s.channels.get(channel).map(HashSet::len))
            .unwrap_or(0)
    }

    pub(crate) async fn reconcile_all(&self, channels: &[ChannelId]) -> Result<()> {
        for channel in channels {
            self.reconcile(channel).await?;
        }
        Ok(())
    }

    /// Bring the broker subscription for `channel` in line with the index.
    async fn reconcile(&self, channel: &ChannelId) -> Result<()> {
        let _serialized = self.broker_ops.lock().await;

        let (wanted, held) = {
            let state = self.read()?;
            (
                state.channels.contains_key(channel),
                state.brokered.contains(channel),
            )
        };

        match (wanted, held) {
            (true, false) => {
                self.broker.subscribe(channel, self.callback()).await?;
                self.write()?.brokered.insert(channel.clone());
                debug!(%channel, "broker subscription acquired");
            }
            (false, true) => {
                self.broker.unsubscribe(channel).await?;
                self.write()?.brokered.remove(channel);
                debug!(%channel, "broker subscription released");
            }
            _ => {}
        }
        Ok(())
    }

    fn callback(&self) -> DeliveryCallback {
        let state = Arc::downgrade(&self.state);
        Arc::new(move |channel, message| {
            deliver(&state, channel, message);
        })
    }

    // ─────────────────────────────────────────────────────────────────────────
    // Delivery
    // ─────────────────────────────────────────────────────────────────────────

    /// Queue `message` for every connection subscribed to `channel` right now.
    ///
    /// Returns the number of connections it was queued for.
    pub fn deliver(&self, channel: &ChannelId, message: &MessageEnvelope) -> usize {
        deliver(&Arc::downgrade(&self.state), channel, message)
    }
}

fn deliver(
    state: &Weak<RwLock<RegistryState>>,
    channel: &ChannelId,
    message: &MessageEnvelope,
) -> usize {
    let Some(state) = state.upgrade() else {
        return 0;
    };
    let Ok(state) = state.read() else {
        return 0;
    };
    let Some(conns) = state.channels.get(channel) else {
        return 0;
    };

    let mut queued = 0;
    for conn in conns {
        let Some(tx) = state.outbound.get(conn) else {
            continue;
        };
        let delivery = Delivery {
            channel: channel.clone(),
            message: message.clone(),
        };
        match tx.try_send(delivery) {
            Ok(()) => queued += 1,
            Err(TrySendError::Full(_)) => {
                warn!(%conn, %channel, "outbound queue full, dropping delivery");
            }
            Err(TrySendError::Closed(_)) => {
                debug!(%conn, %channel, "outbound queue closed");
            }
        }
    }
    queued
}
