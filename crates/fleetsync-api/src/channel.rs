// ── In-process transport ──
//
// A transport whose "server" is a plain handle held by the caller.
// Tests drive the engine through it deterministically; embedders that
// already own a connection can bridge into the engine the same way.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::Value;
use tokio::sync::mpsc;

use crate::error::Error;
use crate::transport::{Transport, TransportEvent};
use crate::wire::{Incoming, Notification, NotifyAction, RequestId, RequestMessage, Response};

/// Engine-side half of an in-process transport pair.
pub struct ChannelTransport {
    requests: mpsc::UnboundedSender<RequestMessage>,
    events: Mutex<Option<mpsc::UnboundedReceiver<TransportEvent>>>,
    connected: Arc<AtomicBool>,
}

/// Server-side half: receives requests and pushes responses,
/// notifications and connection changes.
pub struct RemoteEnd {
    requests: mpsc::UnboundedReceiver<RequestMessage>,
    events: mpsc::UnboundedSender<TransportEvent>,
    connected: Arc<AtomicBool>,
}

impl ChannelTransport {
    /// Create a connected pair. A `Connected` event is already queued.
    pub fn pair() -> (Self, RemoteEnd) {
        let (req_tx, req_rx) = mpsc::unbounded_channel();
        let (evt_tx, evt_rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(true));
        let _ = evt_tx.send(TransportEvent::Connected);

        let transport = Self {
            requests: req_tx,
            events: Mutex::new(Some(evt_rx)),
            connected: Arc::clone(&connected),
        };
        let remote = RemoteEnd {
            requests: req_rx,
            events: evt_tx,
            connected,
        };
        (transport, remote)
    }
}

impl Transport for ChannelTransport {
    fn send(&self, request: RequestMessage) -> Result<(), Error> {
        if !self.connected.load(Ordering::Acquire) {
            return Err(Error::NotConnected);
        }
        self.requests.send(request).map_err(|_| Error::Closed)
    }

    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<TransportEvent>> {
        self.events.lock().ok().and_then(|mut slot| slot.take())
    }

    fn close(&self) {
        self.connected.store(false, Ordering::Release);
    }
}

impl RemoteEnd {
    /// Wait for the next request the engine sends.
    pub async fn recv_request(&mut self) -> Option<RequestMessage> {
        self.requests.recv().await
    }

    /// Take the next request if one is already queued.
    pub fn try_recv_request(&mut self) -> Option<RequestMessage> {
        self.requests.try_recv().ok()
    }

    /// Drain every request queued so far.
    pub fn drain_requests(&mut self) -> Vec<RequestMessage> {
        std::iter::from_fn(|| self.try_recv_request()).collect()
    }

    pub fn respond_ok(&self, request_id: RequestId, result: Value) {
        self.push(Incoming::Response(Response::ok(request_id, result)));
    }

    pub fn respond_err(&self, request_id: RequestId, error: Value) {
        self.push(Incoming::Response(Response::err(request_id, error)));
    }

    pub fn notify(&self, model: &str, action: NotifyAction, item: Value) {
        self.push(Incoming::Notification(Notification::new(model, action, item)));
    }

    /// Drop the connection. Sends fail until [`reconnect`](Self::reconnect).
    pub fn disconnect(&self, reason: &str) {
        self.connected.store(false, Ordering::Release);
        let _ = self.events.send(TransportEvent::Disconnected {
            reason: reason.to_owned(),
        });
    }

    pub fn reconnect(&self) {
        self.connected.store(true, Ordering::Release);
        let _ = self.events.send(TransportEvent::Connected);
    }

    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    fn push(&self, incoming: Incoming) {
        let _ = self.events.send(TransportEvent::Message(incoming));
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn pair_starts_connected() {
        let (transport, _remote) = ChannelTransport::pair();
        let mut events = transport.take_events().unwrap();
        assert_eq!(events.try_recv().unwrap(), TransportEvent::Connected);
        assert!(transport.take_events().is_none());
    }

    #[test]
    fn send_fails_while_disconnected() {
        let (transport, mut remote) = ChannelTransport::pair();
        remote.disconnect("test");
        let err = transport
            .send(RequestMessage::new(1, "zone", "list", None))
            .unwrap_err();
        assert!(matches!(err, Error::NotConnected));

        remote.reconnect();
        transport
            .send(RequestMessage::new(2, "zone", "list", None))
            .unwrap();
        assert_eq!(remote.drain_requests().len(), 1);
    }

    #[test]
    fn events_keep_arrival_order() {
        let (transport, remote) = ChannelTransport::pair();
        let mut events = transport.take_events().unwrap();
        remote.notify("zone", NotifyAction::Create, json!({"id": 1}));
        remote.respond_ok(5, json!(null));

        assert_eq!(events.try_recv().unwrap(), TransportEvent::Connected);
        assert!(matches!(
            events.try_recv().unwrap(),
            TransportEvent::Message(Incoming::Notification(_))
        ));
        assert!(matches!(
            events.try_recv().unwrap(),
            TransportEvent::Message(Incoming::Response(Response { request_id: 5, .. }))
        ));
    }
}
