//! Integration tests for the WebSocket transport against a local server.
#![allow(clippy::unwrap_used)]

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::json;
use tokio::net::TcpListener;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use url::Url;

use fleetsync_api::websocket::{ReconnectConfig, WebSocketTransport};
use fleetsync_api::wire::{self, Incoming, Notification, NotifyAction, Response};
use fleetsync_api::{RequestMessage, Transport, TransportEvent};

// ── Helpers ─────────────────────────────────────────────────────────

/// Accept one connection and answer every request with its own params,
/// after pushing a notification first.
async fn spawn_echo_server() -> Url {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        let (stream, _) = listener.accept().await.unwrap();
        let mut ws = tokio_tungstenite::accept_async(stream).await.unwrap();
        while let Some(Ok(Message::Text(text))) = ws.next().await {
            let request = wire::decode_request(&text).unwrap();
            let notify = Incoming::Notification(Notification::new(
                request.model.clone(),
                NotifyAction::Update,
                json!({"id": 1}),
            ));
            ws.send(Message::text(wire::encode_incoming(&notify).unwrap()))
                .await
                .unwrap();
            let reply = Incoming::Response(Response::ok(
                request.request_id,
                request.params.unwrap_or_default(),
            ));
            ws.send(Message::text(wire::encode_incoming(&reply).unwrap()))
                .await
                .unwrap();
        }
    });

    Url::parse(&format!("ws://{addr}/ws")).unwrap()
}

async fn next_event(
    events: &mut tokio::sync::mpsc::UnboundedReceiver<TransportEvent>,
) -> TransportEvent {
    tokio::time::timeout(Duration::from_secs(5), events.recv())
        .await
        .unwrap()
        .unwrap()
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn round_trips_request_and_preserves_order() {
    let url = spawn_echo_server().await;
    let cancel = CancellationToken::new();
    let transport =
        WebSocketTransport::connect(url, ReconnectConfig::default(), cancel.clone(), None);
    let mut events = transport.take_events().unwrap();

    assert_eq!(next_event(&mut events).await, TransportEvent::Connected);

    tokio_test::assert_ok!(transport.send(RequestMessage::new(
        11,
        "zone",
        "get",
        Some(json!({"id": 1})),
    )));

    match next_event(&mut events).await {
        TransportEvent::Message(Incoming::Notification(n)) => {
            assert_eq!(n.model, "zone");
            assert_eq!(n.action, NotifyAction::Update);
        }
        other => panic!("expected notification first, got {other:?}"),
    }
    assert_eq!(
        next_event(&mut events).await,
        TransportEvent::Message(Incoming::Response(Response::ok(11, json!({"id": 1}))))
    );

    transport.close();
    assert!(matches!(
        next_event(&mut events).await,
        TransportEvent::Disconnected { .. }
    ));
    tokio_test::assert_err!(transport.send(RequestMessage::new(12, "zone", "list", None)));
}

#[tokio::test]
async fn send_before_connect_fails_fast() {
    // Nothing listens on this port; the loop keeps retrying in the background.
    let url = Url::parse("ws://127.0.0.1:9/ws").unwrap();
    let cancel = CancellationToken::new();
    let transport = WebSocketTransport::connect(
        url,
        ReconnectConfig {
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_millis(20),
            max_retries: Some(0),
        },
        cancel.clone(),
        None,
    );

    let err = transport
        .send(RequestMessage::new(1, "zone", "list", None))
        .unwrap_err();
    assert!(err.is_transient());
    cancel.cancel();
}
