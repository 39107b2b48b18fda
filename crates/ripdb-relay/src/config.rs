//! Relay configuration.

use serde::{Deserialize, Serialize};

/// What a sender learns when its publish is rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RejectionPolicy {
    /// Drop without telling the sender.
    #[default]
    Silent,
    /// Send a `rejected` event with a coarse reason.
    Notify,
}

/// Configuration shared by every connection of one relay.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Whether rejected senders hear about it.
    pub rejection_policy: RejectionPolicy,
    /// Require `fromAccountId` to be the hex of the signing key.
    pub bind_sender_to_key: bool,
    /// Capacity of each connection's outbound delivery queue.
    pub outbound_buffer: usize,
    /// Maximum channels one connection may hold at once.
    pub max_subscriptions_per_connection: usize,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            rejection_policy: RejectionPolicy::Silent,
            bind_sender_to_key: true,
            outbound_buffer: 256,
            max_subscriptions_per_connection: 256,
        }
    }
}

impl RelayConfig {
    /// Same config with a different rejection policy.
    pub fn with_rejection_policy(mut self, policy: RejectionPolicy) -> Self {
        self.rejection_policy = policy;
        self
    }
}
