//! Pub/sub broker abstraction.
//!
//! The relay holds at most one broker subscription per channel and
//! dispatches deliveries to its own connections. A networked broker (Redis
//! pub/sub or similar) plugs in behind the same trait.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use ripdb_core::{ChannelId, MessageEnvelope};

use crate::error::{RelayError, Result};

/// Callback invoked for every message the broker delivers on a channel.
///
/// Must not block: it runs on the publisher's task.
pub type DeliveryCallback = Arc<dyn Fn(&ChannelId, &MessageEnvelope) + Send + Sync>;

/// Broker trait for channel fan-out.
#[async_trait]
pub trait Broker: Send + Sync {
    /// Route deliveries on `channel` to `callback`, replacing any previous one.
    async fn subscribe(&self, channel: &ChannelId, callback: DeliveryCallback) -> Result<()>;

    /// Stop deliveries on `channel`. Unsubscribing an unknown channel is a no-op.
    async fn unsubscribe(&self, channel: &ChannelId) -> Result<()>;

    /// Publish `message` on `channel`. Returns the number of subscriptions reached.
    async fn publish(&self, channel: &ChannelId, message: &MessageEnvelope) -> Result<usize>;
}

/// In-process broker.
///
/// Delivery is synchronous and exactly-once per active subscription.
#[derive(Default)]
pub struct MemoryBroker {
    subscriptions: RwLock<HashMap<ChannelId, DeliveryCallback>>,
}

impl MemoryBroker {
    /// Create a broker with no subscriptions.
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `channel` currently has a subscription.
    pub fn is_subscribed(&self, channel: &ChannelId) -> bool {
        self.subscriptions
            .read()
            .map(|s| s.contains_key(channel))
            .unwrap_or(false)
    }

    /// Number of channels with a subscription.
    pub fn subscription_count(&self) -> usize {
        self.subscriptions.read().map(|s| s.len()).unwrap_or(0)
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> RelayError {
    RelayError::Broker(format!("lock poisoned: {e}"))
}

#[async_trait]
impl Broker for MemoryBroker {
    async fn subscribe(&self, channel: &ChannelId, callback: DeliveryCallback) -> Result<()> {
        self.subscriptions
            .write()
            .map_err(poisoned)?
            .insert(channel.clone(), callback);
        Ok(())
    }

    async fn unsubscribe(&self, channel: &ChannelId) -> Result<()> {
        self.subscriptions.write().map_err(poisoned)?.remove(channel);
        Ok(())
    }

    async fn publish(&self, channel: &ChannelId, message: &MessageEnvelope) -> Result<usize> {
        let callback = self
            .subscriptions
            .read()
            .map_err(poisoned)?
            .get(channel)
            .cloned();

        // Lock released before dispatch so the callback may call back in.
        match callback {
            Some(callback) => {
                callback(channel, message);
                Ok(1)
            }
            None => Ok(0),
        }
    }
}
