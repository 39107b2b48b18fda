//! WebSocket transport for relay connections.
//!
//! Each text frame carries one JSON event. The socket is adapted into the
//! event stream and sink that [`Connection::run`](ripdb_relay::Connection::run)
//! drives.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::Response;
use futures::{future, Sink, SinkExt, Stream, StreamExt};
use tracing::warn;

use ripdb_relay::{ClientEvent, Relay, RelayError, ServerEvent};

use super::AppState;

pub(crate) async fn upgrade(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| serve(socket, state.relay))
}

async fn serve(socket: WebSocket, relay: Relay) {
    let connection = match relay.connect() {
        Ok(connection) => connection,
        Err(e) => {
            warn!(error = %e, "refusing websocket connection");
            return;
        }
    };

    let (sink, stream) = socket.split();
    if let Err(e) = connection.run(inbound(stream), outbound(sink)).await {
        warn!(error = %e, "websocket connection ended with error");
    }
}

/// Decode frames into client events. Control frames are skipped.
fn inbound<S>(frames: S) -> impl Stream<Item = Result<ClientEvent, RelayError>> + Unpin
where
    S: Stream<Item = Result<Message, axum::Error>> + Unpin,
{
    frames.filter_map(|frame| future::ready(decode(frame)))
}

fn decode(frame: Result<Message, axum::Error>) -> Option<Result<ClientEvent, RelayError>> {
    match frame {
        Ok(Message::Text(text)) => Some(ClientEvent::from_json(&text).map_err(RelayError::from)),
        Ok(Message::Binary(bytes)) => {
            Some(serde_json::from_slice::<ClientEvent>(&bytes).map_err(RelayError::from))
        }
        Ok(Message::Ping(_) | Message::Pong(_) | Message::Close(_)) => None,
        Err(e) => Some(Err(RelayError::Transport(e.to_string()))),
    }
}

/// Encode server events as text frames.
fn outbound<S>(frames: S) -> impl Sink<ServerEvent, Error = RelayError> + Unpin
where
    S: Sink<Message, Error = axum::Error> + Unpin,
{
    frames
        .sink_map_err(|e| RelayError::Transport(e.to_string()))
        .with(|event: ServerEvent| {
            future::ready(event.to_json().map(Message::Text).map_err(RelayError::from))
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use ripdb_core::ChannelId;

    #[test]
    fn test_decode_frames() {
        let subscribe = Message::Text(r#"{"event":"subscribe","channel":"ch1"}"#.into());
        assert!(matches!(
            decode(Ok(subscribe)),
            Some(Ok(ClientEvent::Subscribe { channel })) if channel == ChannelId::named("ch1")
        ));

        assert!(matches!(
            decode(Ok(Message::Text("{".into()))),
            Some(Err(RelayError::InvalidMessage(_)))
        ));
        assert!(decode(Ok(Message::Ping(vec![1]))).is_none());
    }

    #[tokio::test]
    async fn test_outbound_encodes_text() {
        let (tx, rx) = futures::channel::mpsc::unbounded::<Message>();
        let mut sink = outbound(tx.sink_map_err(|_| axum::Error::new("closed")));

        sink.send(ServerEvent::Rejected {
            reason: ripdb_relay::RejectReason::Misrouted,
        })
        .await
        .unwrap();
        drop(sink);

        let frames: Vec<Message> = rx.collect().await;
        match frames.as_slice() {
            [Message::Text(text)] => assert!(text.contains("\"rejected\"")),
            other => panic!("unexpected {other:?}"),
        }
    }
}
