//! Two participants talking through running relay connections.

use std::time::Duration;

use futures::channel::mpsc::{unbounded, UnboundedReceiver, UnboundedSender};
use futures::{SinkExt, StreamExt};
use ripdb_core::{ChannelId, MessageId, MessagePayload};
use ripdb_relay::{
    ClientEvent, ConnectionId, RejectReason, RejectionPolicy, RelayConfig, RelayError,
    ServerEvent,
};
use ripdb_store::StreamStore;
use ripdb_testkit::{Participant, TestRelay};
use tokio::task::JoinHandle;

/// The client side of one running connection.
struct Session {
    id: ConnectionId,
    send: UnboundedSender<Result<ClientEvent, RelayError>>,
    recv: UnboundedReceiver<ServerEvent>,
    task: JoinHandle<ripdb_relay::Result<()>>,
}

impl Session {
    fn open(fixture: &TestRelay) -> Self {
        let connection = fixture.relay.connect().unwrap();
        let id = connection.id();
        let (send, inbound) = unbounded();
        let (outbound, recv) = unbounded();
        let outbound = outbound.sink_map_err(|e| RelayError::Transport(e.to_string()));
        let task = tokio::spawn(connection.run(inbound, outbound));
        Self {
            id,
            send,
            recv,
            task,
        }
    }

    async fn emit(&mut self, event: ClientEvent) {
        self.send.send(Ok(event)).await.unwrap();
    }

    async fn next(&mut self) -> ServerEvent {
        tokio::time::timeout(Duration::from_secs(5), self.recv.next())
            .await
            .expect("timed out waiting for server event")
            .expect("connection closed")
    }

    async fn nothing_pending(&mut self) -> bool {
        tokio::time::timeout(Duration::from_millis(50), self.recv.next())
            .await
            .is_err()
    }

    async fn close(self) {
        drop(self.send);
        self.task.await.unwrap().unwrap();
    }
}

async fn wait_for_subscribers(fixture: &TestRelay, channel: &ChannelId, count: usize) {
    for _ in 0..500 {
        if fixture.relay.registry().subscriber_count(channel) == count {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("expected {count} subscribers on {channel}");
}

#[tokio::test]
async fn message_reaches_both_sides_with_ack_to_sender() {
    let fixture = TestRelay::new();
    let alice = Participant::from_seed(1);
    let bob = Participant::from_seed(2);
    let channel = alice.channel_with(&bob);

    let mut a = Session::open(&fixture);
    let mut b = Session::open(&fixture);
    a.emit(ClientEvent::Subscribe { channel: channel.clone() }).await;
    b.emit(ClientEvent::Subscribe { channel: channel.clone() }).await;
    wait_for_subscribers(&fixture, &channel, 2).await;

    a.emit(alice.send_to(&bob, "hi bob")).await;

    // The sender sees its ack and its own message; order between the two is
    // not fixed.
    let mut seen_ack = false;
    let mut seen_message = false;
    for _ in 0..2 {
        match a.next().await {
            ServerEvent::MessageAck { stream, message_id } => {
                assert_eq!(stream, channel);
                assert_eq!(message_id, MessageId(1));
                seen_ack = true;
            }
            ServerEvent::NewMessage { message, .. } => {
                assert_eq!(message.message_id, Some(MessageId(1)));
                seen_message = true;
            }
            other => panic!("unexpected {other:?}"),
        }
    }
    assert!(seen_ack && seen_message);

    match b.next().await {
        ServerEvent::NewMessage { channel: on, message } => {
            assert_eq!(on, channel);
            let payload = MessagePayload::parse(message.payload.as_deref().unwrap()).unwrap();
            assert_eq!(payload.from_account_id, alice.identity);
            assert_eq!(payload.body["text"], "hi bob");
        }
        other => panic!("unexpected {other:?}"),
    }
    assert!(b.nothing_pending().await);

    let history = fixture.store.range(&channel, None).await.unwrap();
    assert_eq!(history.len(), 1);

    a.close().await;
    b.close().await;
    assert_eq!(fixture.relay.registry().subscriber_count(&channel), 0);
    assert!(!fixture.broker.is_subscribed(&channel));
}

#[tokio::test]
async fn spoofed_channel_is_dropped_and_reported_under_notify() {
    let fixture =
        TestRelay::with_config(RelayConfig::default().with_rejection_policy(RejectionPolicy::Notify));
    let alice = Participant::from_seed(1);
    let bob = Participant::from_seed(2);
    let mallory = Participant::from_seed(3);
    let channel = alice.channel_with(&bob);

    let mut b = Session::open(&fixture);
    let mut m = Session::open(&fixture);
    b.emit(ClientEvent::Subscribe { channel: channel.clone() }).await;
    wait_for_subscribers(&fixture, &channel, 1).await;

    // Validly signed by mallory, aimed at alice and bob's channel.
    m.emit(mallory.send_on(channel.clone(), &bob, "let me in")).await;
    assert_eq!(
        m.next().await,
        ServerEvent::Rejected {
            reason: RejectReason::Misrouted
        }
    );

    assert!(b.nothing_pending().await);
    assert!(fixture.store.range(&channel, None).await.unwrap().is_empty());

    m.close().await;
    b.close().await;
}

#[tokio::test]
async fn dropped_sender_task_still_tears_down() {
    let fixture = TestRelay::new();
    let channel = ChannelId::named("ch1");

    let mut s = Session::open(&fixture);
    let id = s.id;
    s.emit(ClientEvent::Subscribe { channel: channel.clone() }).await;
    wait_for_subscribers(&fixture, &channel, 1).await;

    s.task.abort();
    let _ = (&mut s.task).await;

    assert!(!fixture.relay.registry().is_attached(id));
    for _ in 0..500 {
        if !fixture.broker.is_subscribed(&channel) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(2)).await;
    }
    panic!("broker subscription was not released");
}
