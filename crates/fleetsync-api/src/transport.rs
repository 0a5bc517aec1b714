// ── Transport capability ──
//
// The seam between the engine and whatever carries frames. A transport
// accepts requests synchronously and reports everything it receives,
// plus its own connection changes, on a single ordered event channel.

use tokio::sync::mpsc;

use crate::error::Error;
use crate::wire::{Incoming, RequestMessage};

/// Something that happened on the transport, in arrival order.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    /// A (re)connection completed. Requests may be sent from now on.
    Connected,
    /// The connection dropped. Every in-flight request is lost.
    Disconnected { reason: String },
    /// A decoded frame from the server.
    Message(Incoming),
}

/// Duplex channel to the remote service.
///
/// Implementations must deliver events in the order they were received
/// and must never reorder a response relative to a notification.
pub trait Transport: Send + Sync + 'static {
    /// Queue a request for delivery. Fails fast when disconnected.
    fn send(&self, request: RequestMessage) -> Result<(), Error>;

    /// Take the event receiver. Returns `None` once it has been taken.
    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<TransportEvent>>;

    /// Tear the transport down. Idempotent.
    fn close(&self);
}
