//! Golden channel-id vectors.
//!
//! A channel id is `hex(sha256(lo || hi))` with the two identities in
//! byte order. Every client deriving channels must reproduce these.

use ripdb_core::{ChannelId, Identity};

/// A golden test vector.
#[derive(Debug, Clone)]
pub struct ChannelVector {
    /// Human-readable name for the vector.
    pub name: &'static str,
    /// First identity, as given.
    pub a: &'static str,
    /// Second identity, as given.
    pub b: &'static str,
    /// Expected channel id (hex).
    pub expected: &'static str,
}

/// Get all golden vectors.
pub fn all_vectors() -> Vec<ChannelVector> {
    vec![
        ChannelVector {
            name: "alice and bob",
            a: "alice",
            b: "bob",
            expected: "a83ab2505ace9a8705ea2f0f4187087dc38947110596cf40cdd906d2cd3a9e6a",
        },
        ChannelVector {
            name: "arguments reversed",
            a: "bob",
            b: "alice",
            expected: "a83ab2505ace9a8705ea2f0f4187087dc38947110596cf40cdd906d2cd3a9e6a",
        },
        ChannelVector {
            name: "single letters",
            a: "b",
            b: "a",
            expected: "fb8e20fc2e4c3f248c60c39bd652f3c1347298bb977b8b4d5903b85055620603",
        },
        ChannelVector {
            name: "uppercase sorts first",
            a: "alice",
            b: "Zed",
            expected: "2f90b8cf9fd2d16213425ba778a74468bd16ec1c3fb2d937e909c16ae2aa3bfe",
        },
        ChannelVector {
            name: "prefix sorts first",
            a: "bobby",
            b: "bob",
            expected: "3e1f9382981b7083eb832cbe86833c8135edb1523dc09c27b73d8be2430ad721",
        },
        ChannelVector {
            name: "talking to yourself",
            a: "ch",
            b: "ch",
            expected: "caf4a6af6d6b6773be9e8211477cc7c0cbe234a673dc0f0b5bc9202388516d8a",
        },
        ChannelVector {
            name: "keys of seeds 0x01 and 0x02",
            a: "8a88e3dd7409f195fd52db2d3cba5d72ca6709bf1d94121bf3748801b40f6f5c",
            b: "8139770ea87d175f56a35466c34c7ecccb8d8a91b4ee37a25df60f5b8fc9b394",
            expected: "576e7567c0b61fe64a795b2b85a64a9e7c99d07c6a2ee455cb0a73ab11536a55",
        },
        ChannelVector {
            name: "keys of seeds 0x02 and 0x03",
            a: "ed4928c628d1c2c6eae90338905995612959273a5c63f93636c14614ac8737d1",
            b: "8139770ea87d175f56a35466c34c7ecccb8d8a91b4ee37a25df60f5b8fc9b394",
            expected: "5533626ffc2b87034379c1f079b5e3f95ff65deb4874a561b15a37a299aa27a0",
        },
    ]
}

/// Derive the channel of a vector.
pub fn derive_vector(vector: &ChannelVector) -> ChannelId {
    ChannelId::derive(&Identity::from(vector.a), &Identity::from(vector.b))
}

/// Verify all golden vectors; returns the names of those that fail.
pub fn verify_all_vectors() -> Result<(), Vec<String>> {
    let failures: Vec<String> = all_vectors()
        .iter()
        .filter(|v| derive_vector(v).as_str() != v.expected)
        .map(|v| v.name.to_string())
        .collect();

    if failures.is_empty() {
        Ok(())
    } else {
        Err(failures)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::Participant;

    #[test]
    fn test_vectors_hold() {
        verify_all_vectors().unwrap();
    }

    #[test]
    fn test_seed_vectors_match_participants() {
        let one = Participant::from_seed(1);
        let two = Participant::from_seed(2);
        let vectors = all_vectors();
        let seeded = vectors
            .iter()
            .find(|v| v.name == "keys of seeds 0x01 and 0x02")
            .unwrap();

        assert_eq!(one.identity.as_str(), seeded.a);
        assert_eq!(two.identity.as_str(), seeded.b);
        assert_eq!(one.channel_with(&two).as_str(), seeded.expected);
    }
}
