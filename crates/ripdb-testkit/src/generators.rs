//! Proptest generators for property-based testing.

use proptest::prelude::*;

use ripdb_core::{ChannelId, Identity, Keypair};

use crate::fixtures::Participant;

/// Generate a random keypair.
pub fn keypair() -> impl Strategy<Value = Keypair> {
    any::<[u8; 32]>().prop_map(|seed| Keypair::from_seed(&seed))
}

/// Generate a participant with a random key.
pub fn participant() -> impl Strategy<Value = Participant> {
    any::<u8>().prop_map(Participant::from_seed)
}

/// Generate two participants with different keys.
pub fn participant_pair() -> impl Strategy<Value = (Participant, Participant)> {
    (any::<u8>(), any::<u8>())
        .prop_filter("distinct seeds", |(a, b)| a != b)
        .prop_map(|(a, b)| (Participant::from_seed(a), Participant::from_seed(b)))
}

/// Generate an arbitrary non-empty identity string.
pub fn identity() -> impl Strategy<Value = Identity> {
    ".{1,64}".prop_map(Identity::new)
}

/// Generate a hex identity shaped like a public key.
pub fn key_identity() -> impl Strategy<Value = Identity> {
    "[0-9a-f]{64}".prop_map(Identity::new)
}

/// Generate a topic-style channel name.
pub fn channel_name() -> impl Strategy<Value = ChannelId> {
    "[a-z][a-z0-9-]{0,15}".prop_map(ChannelId::named)
}

/// Generate message text.
pub fn text() -> impl Strategy<Value = String> {
    ".{0,256}"
}

/// One step of a subscription workload over a small pool of connections
/// and channels, addressed by index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistryOp {
    Subscribe { conn: usize, channel: usize },
    Unsubscribe { conn: usize, channel: usize },
    Teardown { conn: usize },
    Deliver { channel: usize },
}

/// A sequence of registry operations.
#[derive(Debug, Clone)]
pub struct RegistryWorkload {
    pub connections: usize,
    pub channels: usize,
    pub ops: Vec<RegistryOp>,
}

/// Generate one operation over `connections` connections and `channels` channels.
pub fn registry_op(connections: usize, channels: usize) -> impl Strategy<Value = RegistryOp> {
    prop_oneof![
        4 => (0..connections, 0..channels)
            .prop_map(|(conn, channel)| RegistryOp::Subscribe { conn, channel }),
        3 => (0..connections, 0..channels)
            .prop_map(|(conn, channel)| RegistryOp::Unsubscribe { conn, channel }),
        1 => (0..connections).prop_map(|conn| RegistryOp::Teardown { conn }),
        3 => (0..channels).prop_map(|channel| RegistryOp::Deliver { channel }),
    ]
}

impl Arbitrary for RegistryWorkload {
    type Parameters = ();
    type Strategy = BoxedStrategy<Self>;

    fn arbitrary_with(_: Self::Parameters) -> Self::Strategy {
        (1usize..=4, 1usize..=4)
            .prop_flat_map(|(connections, channels)| {
                prop::collection::vec(registry_op(connections, channels), 0..48).prop_map(
                    move |ops| RegistryWorkload {
                        connections,
                        channels,
                        ops,
                    },
                )
            })
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    proptest! {
        #[test]
        fn pairs_are_distinct((a, b) in participant_pair()) {
            prop_assert_ne!(a.identity, b.identity);
        }

        #[test]
        fn workload_indices_in_range(workload: RegistryWorkload) {
            for op in &workload.ops {
                match *op {
                    RegistryOp::Subscribe { conn, channel }
                    | RegistryOp::Unsubscribe { conn, channel } => {
                        prop_assert!(conn < workload.connections);
                        prop_assert!(channel < workload.channels);
                    }
                    RegistryOp::Teardown { conn } => prop_assert!(conn < workload.connections),
                    RegistryOp::Deliver { channel } => prop_assert!(channel < workload.channels),
                }
            }
        }
    }
}
