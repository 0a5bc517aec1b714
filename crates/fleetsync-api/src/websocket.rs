//! WebSocket transport with auto-reconnect.
//!
//! Connects to the service's WebSocket endpoint, encodes outgoing
//! requests as text frames and reports decoded server frames plus
//! connection changes as [`TransportEvent`]s. Handles reconnection with
//! exponential backoff + jitter automatically.
//!
//! # Example
//!
//! ```rust,ignore
//! use fleetsync_api::websocket::{ReconnectConfig, WebSocketTransport};
//! use tokio_util::sync::CancellationToken;
//! use url::Url;
//!
//! let ws_url = Url::parse("wss://fleet.example.com/ws")?;
//! let transport = WebSocketTransport::connect(ws_url, ReconnectConfig::default(), CancellationToken::new(), None);
//! let mut events = transport.take_events().expect("fresh transport");
//! ```

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use secrecy::{ExposeSecret, SecretString};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{self, ClientRequestBuilder};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::Error;
use crate::transport::{Transport, TransportEvent};
use crate::wire::{self, RequestMessage};

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Exponential backoff configuration for WebSocket reconnection.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay before the first reconnection attempt. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,

    /// Maximum reconnection attempts before giving up.
    /// `None` means retry forever.
    pub max_retries: Option<u32>,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_retries: None,
        }
    }
}

// ── WebSocketTransport ───────────────────────────────────────────────

/// [`Transport`] over a reconnecting WebSocket.
///
/// Requests are queued to the connection task. While the socket is down
/// [`send`](Transport::send) fails fast with [`Error::NotConnected`]
/// instead of buffering.
pub struct WebSocketTransport {
    outbound: mpsc::UnboundedSender<String>,
    events: Mutex<Option<mpsc::UnboundedReceiver<TransportEvent>>>,
    connected: Arc<AtomicBool>,
    cancel: CancellationToken,
}

impl WebSocketTransport {
    /// Spawn the connection loop and return immediately.
    ///
    /// The first connection attempt happens asynchronously; a
    /// [`TransportEvent::Connected`] is emitted once it succeeds. If
    /// `cookie` is provided it is sent as a `Cookie` header on every
    /// upgrade request (session auth). Must be called within a tokio
    /// runtime.
    pub fn connect(
        ws_url: Url,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
        cookie: Option<SecretString>,
    ) -> Self {
        let (outbound, outbound_rx) = mpsc::unbounded_channel();
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let connected = Arc::new(AtomicBool::new(false));

        let link = Link {
            url: ws_url,
            cookie,
            event_tx,
            connected: Arc::clone(&connected),
            cancel: cancel.clone(),
        };
        tokio::spawn(ws_loop(link, outbound_rx, reconnect));

        Self {
            outbound,
            events: Mutex::new(Some(event_rx)),
            connected,
            cancel,
        }
    }
}

impl Transport for WebSocketTransport {
    fn send(&self, request: RequestMessage) -> Result<(), Error> {
        if self.cancel.is_cancelled() {
            return Err(Error::Closed);
        }
        if !self.connected.load(Ordering::Acquire) {
            return Err(Error::NotConnected);
        }
        let frame = wire::encode_request(&request)?;
        tracing::debug!(
            request_id = request.request_id,
            method = %request.qualified_method(),
            "queueing request"
        );
        self.outbound.send(frame).map_err(|_| Error::Closed)
    }

    fn take_events(&self) -> Option<mpsc::UnboundedReceiver<TransportEvent>> {
        self.events.lock().ok().and_then(|mut slot| slot.take())
    }

    fn close(&self) {
        self.cancel.cancel();
    }
}

/// Everything the connection loop shares with the transport handle.
struct Link {
    url: Url,
    cookie: Option<SecretString>,
    event_tx: mpsc::UnboundedSender<TransportEvent>,
    connected: Arc<AtomicBool>,
    cancel: CancellationToken,
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: connect → pump frames → on drop, backoff → reconnect.
async fn ws_loop(
    link: Link,
    mut outbound: mpsc::UnboundedReceiver<String>,
    reconnect: ReconnectConfig,
) {
    let mut attempt: u32 = 0;

    while !link.cancel.is_cancelled() {
        match connect_and_pump(&link, &mut outbound).await {
            // Session ended after a successful handshake (or shutdown).
            // Reset attempt counter and reconnect immediately.
            Ok(()) => {
                if link.cancel.is_cancelled() {
                    break;
                }
                tracing::info!("WebSocket session ended, reconnecting");
                attempt = 0;
            }
            Err(e) => {
                tracing::warn!(error = %e, attempt, "WebSocket error");

                if let Some(max) = reconnect.max_retries {
                    if attempt >= max {
                        tracing::error!(
                            max_retries = max,
                            "WebSocket reconnection limit reached, giving up"
                        );
                        break;
                    }
                }

                let delay = calculate_backoff(attempt, &reconnect);
                tracing::info!(
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    attempt,
                    "Waiting before reconnect"
                );

                tokio::select! {
                    biased;
                    () = link.cancel.cancelled() => break,
                    () = tokio::time::sleep(delay) => {}
                }

                attempt = attempt.saturating_add(1);
            }
        }
    }

    link.connected.store(false, Ordering::Release);
    tracing::debug!("WebSocket loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Establish one WebSocket session and pump frames until it drops.
///
/// Returns `Err` only when the handshake fails. Once connected, the
/// session always ends with a `Disconnected` event and `Ok(())`, including
/// when the transport is closed.
async fn connect_and_pump(
    link: &Link,
    outbound: &mut mpsc::UnboundedReceiver<String>,
) -> Result<(), Error> {
    tracing::info!(url = %link.url, "Connecting to WebSocket");

    let uri: tungstenite::http::Uri = link
        .url
        .as_str()
        .parse()
        .map_err(|e: tungstenite::http::uri::InvalidUri| Error::WebSocketConnect(e.to_string()))?;

    let mut request = ClientRequestBuilder::new(uri);
    if let Some(ref cookie) = link.cookie {
        request = request.with_header("Cookie", cookie.expose_secret());
    }

    let (ws_stream, _response) = tokio::select! {
        biased;
        () = link.cancel.cancelled() => return Ok(()),
        result = tokio_tungstenite::connect_async(request) => {
            result.map_err(|e| Error::WebSocketConnect(e.to_string()))?
        }
    };

    // Frames queued against the previous session belong to requests the
    // engine has already failed.
    while outbound.try_recv().is_ok() {}

    link.connected.store(true, Ordering::Release);
    let _ = link.event_tx.send(TransportEvent::Connected);
    tracing::info!("WebSocket connected");

    let (mut write, mut read) = ws_stream.split();

    let reason = loop {
        tokio::select! {
            biased;
            () = link.cancel.cancelled() => {
                let _ = write.send(tungstenite::Message::Close(None)).await;
                break "transport closed".to_owned();
            }
            frame = read.next() => {
                match frame {
                    Some(Ok(tungstenite::Message::Text(text))) => {
                        dispatch_frame(&text, &link.event_tx);
                    }
                    Some(Ok(tungstenite::Message::Ping(_))) => {
                        // tungstenite handles pong replies automatically
                        tracing::trace!("WebSocket ping");
                    }
                    Some(Ok(tungstenite::Message::Close(frame))) => {
                        if let Some(ref cf) = frame {
                            tracing::info!(
                                code = %cf.code,
                                reason = %cf.reason,
                                "WebSocket close frame received"
                            );
                        } else {
                            tracing::info!("WebSocket close frame received (no payload)");
                        }
                        break "server closed the connection".to_owned();
                    }
                    Some(Err(e)) => break e.to_string(),
                    None => break "stream ended".to_owned(),
                    _ => {
                        // Binary, Pong, Frame -- ignore
                    }
                }
            }
            outgoing = outbound.recv() => {
                let Some(text) = outgoing else {
                    break "transport dropped".to_owned();
                };
                if let Err(e) = write.send(tungstenite::Message::text(text)).await {
                    break e.to_string();
                }
            }
        }
    };

    link.connected.store(false, Ordering::Release);
    tracing::info!(%reason, "WebSocket disconnected");
    let _ = link.event_tx.send(TransportEvent::Disconnected { reason });
    Ok(())
}

/// Decode one text frame and forward it. Undecodable frames are dropped.
fn dispatch_frame(text: &str, event_tx: &mpsc::UnboundedSender<TransportEvent>) {
    match wire::decode_incoming(text) {
        Ok(incoming) => {
            let _ = event_tx.send(TransportEvent::Message(incoming));
        }
        Err(e) => {
            tracing::warn!(error = %e, "Dropping undecodable frame");
        }
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) + jitter`
///
/// Jitter is +-25% to spread out reconnection storms from multiple clients.
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt.min(31)).unwrap_or(31);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic "jitter" seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
        assert!(config.max_retries.is_none());
    }

    #[test]
    fn backoff_increases_exponentially() {
        let config = ReconnectConfig::default();

        let d0 = calculate_backoff(0, &config);
        let d1 = calculate_backoff(1, &config);
        let d2 = calculate_backoff(2, &config);

        assert!(d1 > d0, "d1 ({d1:?}) should be greater than d0 ({d0:?})");
        assert!(d2 > d1, "d2 ({d2:?}) should be greater than d1 ({d1:?})");
    }

    #[test]
    fn backoff_caps_at_max_delay() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
            max_retries: None,
        };

        let d10 = calculate_backoff(10, &config);
        // With jitter factor up to 1.25, max effective is 12.5s
        assert!(
            d10 <= Duration::from_secs(13),
            "delay at attempt 10 ({d10:?}) should be capped near max_delay"
        );
        // Huge attempt counts must not overflow.
        assert!(calculate_backoff(u32::MAX, &config) <= Duration::from_secs(13));
    }

    #[test]
    fn undecodable_frames_are_dropped() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        dispatch_frame("{\"type\":7}", &tx);
        dispatch_frame(r#"{"type":2,"name":"zone","action":"create","data":{"id":1}}"#, &tx);
        assert!(matches!(rx.try_recv(), Ok(TransportEvent::Message(_))));
        assert!(rx.try_recv().is_err());
    }
}
