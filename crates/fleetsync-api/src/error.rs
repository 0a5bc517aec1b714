// ── Transport-layer errors ──
//
// Everything that can go wrong below the engine: the socket, the frame
// codec, or a transport that has already been torn down. The engine
// folds all of these into its own connection error kind.

use thiserror::Error;

/// Top-level error type for the `fleetsync-api` crate.
#[derive(Debug, Error)]
pub enum Error {
    /// WebSocket handshake or stream failure.
    #[error("WebSocket connection failed: {0}")]
    WebSocketConnect(String),

    /// The transport is between connections; nothing can be sent.
    #[error("Transport is not connected")]
    NotConnected,

    /// The transport (or its remote end) has been shut down.
    #[error("Transport closed")]
    Closed,

    /// A frame could not be encoded or decoded.
    #[error("Malformed frame: {0}")]
    Codec(#[from] serde_json::Error),

    /// A frame decoded as JSON but does not follow the protocol.
    #[error("Protocol violation: {0}")]
    Protocol(String),

    /// Invalid URL (e.g. from config).
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
}

impl Error {
    /// Returns `true` if retrying the connection may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::WebSocketConnect(_) | Self::NotConnected)
    }
}
