//! Encrypted values shared through one store by several clients.

use std::sync::Arc;

use proptest::prelude::*;
use ripdb::{GetOptions, RipClient, RipError, SetOptions};
use ripdb_store::{KeyValueStore, MemoryStore, SqliteStore, Wrapped};
use ripdb_testkit::{test_codec, Participant};
use ripdb_vault::{EncryptedRecord, PayloadEnvelope, VaultError};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Profile {
    name: String,
    age: u32,
}

fn profile() -> Profile {
    Profile {
        name: "Alice".into(),
        age: 30,
    }
}

#[tokio::test]
async fn only_the_owner_reads_encrypted_values() {
    let store: Arc<dyn KeyValueStore> = Arc::new(SqliteStore::open_memory().unwrap());
    let codec = test_codec();
    let alice = Participant::from_seed(1);
    let bob = Participant::from_seed(2);

    let alice_client =
        RipClient::new(store.clone(), codec.clone()).with_keypair(alice.keypair.clone());
    let bob_client = RipClient::new(store.clone(), codec).with_keypair(bob.keypair.clone());

    let stored = alice_client
        .set("profile", &profile(), SetOptions::encrypted())
        .await
        .unwrap();
    let record: EncryptedRecord = serde_json::from_value(stored.data).unwrap();
    assert_eq!(record.owner_identity, alice.identity);

    // What the store holds says nothing about the profile.
    let raw = store.get("profile").await.unwrap();
    assert!(!raw.data.to_string().contains("Alice"));

    let got: Wrapped<Profile> = alice_client.get("profile", GetOptions::default()).await.unwrap();
    assert_eq!(got.data, profile());

    let denied = bob_client.get::<Profile>("profile", GetOptions::default()).await;
    assert!(matches!(
        denied,
        Err(RipError::Vault(VaultError::AccessDenied(_)))
    ));
}

#[tokio::test]
async fn server_side_client_needs_an_override() {
    let store: Arc<dyn KeyValueStore> = Arc::new(SqliteStore::open_memory().unwrap());
    let codec = test_codec();
    let alice = Participant::from_seed(1);

    let browser =
        RipClient::new(store.clone(), codec.clone()).with_keypair(alice.keypair.clone());
    browser
        .set("profile", &profile(), SetOptions::encrypted())
        .await
        .unwrap();
    let proof = browser.sign_for_encryption().await.unwrap();

    let server = RipClient::new(store.clone(), codec);
    let no_proof = server.get::<Profile>("profile", GetOptions::default()).await;
    assert!(matches!(
        no_proof,
        Err(RipError::Vault(VaultError::NoProof(_)))
    ));

    let got: Wrapped<Profile> = server
        .get(
            "profile",
            GetOptions {
                proof_override: Some(proof),
            },
        )
        .await
        .unwrap();
    assert_eq!(got.data, profile());
}

#[tokio::test]
async fn plain_and_encrypted_values_coexist() {
    let store: Arc<dyn KeyValueStore> = Arc::new(SqliteStore::open_memory().unwrap());
    let alice = Participant::from_seed(1);
    let client = RipClient::new(store, test_codec()).with_keypair(alice.keypair.clone());

    client
        .set("public", &serde_json::json!({"motd": "hello"}), SetOptions::default())
        .await
        .unwrap();
    client
        .set("private", &profile(), SetOptions::encrypted())
        .await
        .unwrap();

    let public: Wrapped<Value> = client.get("public", GetOptions::default()).await.unwrap();
    assert_eq!(public.data["motd"], "hello");

    let private: Wrapped<Value> = client.get("private", GetOptions::default()).await.unwrap();
    assert_eq!(private.data["name"], "Alice");
}

fn any_profile() -> impl Strategy<Value = Profile> {
    (".{0,64}", any::<u32>()).prop_map(|(name, age)| Profile { name, age })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn values_round_trip_through_the_client(value in any_profile(), encrypt in any::<bool>()) {
        let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
        rt.block_on(async {
            let store: Arc<dyn KeyValueStore> = Arc::new(MemoryStore::new());
            let owner = Participant::from_seed(1);
            let client = RipClient::new(store.clone(), test_codec()).with_keypair(owner.keypair);
            let opts = SetOptions { encrypt, ..SetOptions::default() };

            client.set("value", &value, opts).await.unwrap();

            let raw = store.get("value").await.unwrap();
            let stored: PayloadEnvelope<Profile> = serde_json::from_value(raw.data).unwrap();
            assert_eq!(stored.is_encrypted(), encrypt);

            let got: Wrapped<Profile> = client.get("value", GetOptions::default()).await.unwrap();
            assert_eq!(got.data, value);
        });
    }
}
