//! Wire protocol and transports for the fleetsync engine.
//!
//! The engine talks to the remote service over a single duplex channel:
//!
//! - **[`wire`]**: Message types (requests, responses, change
//!   notifications) and the JSON text-frame codec spoken over the socket.
//! - **[`Transport`]**: Object-safe capability the engine is handed.
//!   Requests go out synchronously; responses, notifications and
//!   connection changes come back as [`TransportEvent`]s on one channel,
//!   in arrival order.
//! - **[`websocket::WebSocketTransport`]**: Production transport with
//!   automatic reconnect (exponential backoff + jitter).
//! - **[`channel::ChannelTransport`]**: In-process transport whose far
//!   end is driven by hand. Used by tests and by embedders that already
//!   own a connection.

pub mod channel;
pub mod error;
pub mod transport;
pub mod websocket;
pub mod wire;

pub use channel::{ChannelTransport, RemoteEnd};
pub use error::Error;
pub use transport::{Transport, TransportEvent};
pub use wire::{Incoming, Notification, NotifyAction, RequestId, RequestMessage, Response};
