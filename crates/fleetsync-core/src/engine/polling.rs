// ── Polling ──
//
// Repeating requests keyed by a poll id. Each poll is a task bound to a
// child of the engine's cancellation token; re-issues go through the
// normal request path. Polls pause while the transport is down and
// resume with an immediate request once it is back.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::request::RequestKind;
use super::{ConnectionState, SyncEngine};
use crate::error::CoreError;
use crate::model::PrimaryKey;

/// Poll id of the engine's keep-alive.
pub(crate) const PING_POLL_ID: &str = "status.ping";

/// What one poll tick sends.
#[derive(Debug, Clone, PartialEq)]
pub enum PollRequest {
    /// Bulk fetch, bypassing the fetch cache.
    Fetch { model: String },
    Get { model: String, key: PrimaryKey },
    Ping,
    Call {
        model: String,
        method: String,
        params: Option<Value>,
    },
}

/// Builds the request for each tick.
pub type PollFactory = Arc<dyn Fn() -> PollRequest + Send + Sync>;

pub(crate) struct PollTask {
    cancel: CancellationToken,
    pub(crate) handle: JoinHandle<()>,
}

impl SyncEngine {
    /// Issue a request now and again every `interval` until
    /// [`stop_poll`](Self::stop_poll). Replaces an existing poll with the
    /// same id.
    pub fn start_poll(
        &self,
        poll_id: impl Into<String>,
        factory: PollFactory,
        interval: Duration,
    ) -> Result<(), CoreError> {
        if interval.is_zero() {
            return Err(CoreError::validation("interval", "must be greater than 0"));
        }
        let poll_id = poll_id.into();
        self.stop_poll(&poll_id);

        if self.is_connected() {
            self.issue_poll(&poll_id, &factory);
        }

        let cancel = self.inner.cancel.child_token();
        let handle = tokio::spawn(poll_task(
            self.clone(),
            poll_id.clone(),
            factory,
            interval,
            cancel.clone(),
        ));
        info!(poll_id, ?interval, "poll started");
        self.inner.polls.insert(poll_id, PollTask { cancel, handle });
        Ok(())
    }

    /// Stop future re-issues. Unknown ids are ignored.
    pub fn stop_poll(&self, poll_id: &str) {
        if let Some((_, task)) = self.inner.polls.remove(poll_id) {
            task.cancel.cancel();
            debug!(poll_id, "poll stopped");
        }
    }

    pub fn is_polling(&self, poll_id: &str) -> bool {
        self.inner.polls.contains_key(poll_id)
    }

    pub(crate) fn start_ping(&self, interval: Duration) {
        let factory: PollFactory = Arc::new(|| PollRequest::Ping);
        if let Err(e) = self.start_poll(PING_POLL_ID, factory, interval) {
            debug!(error = %e, "keep-alive not started");
        }
    }

    fn issue_poll(&self, poll_id: &str, factory: &PollFactory) {
        let result = match factory() {
            PollRequest::Fetch { model } => self.issue_fetch(&model).map(drop),
            PollRequest::Get { model, key } => self.issue_get(&model, &key).map(drop),
            PollRequest::Ping => self.submit("status", "ping", None, RequestKind::Ping).map(drop),
            PollRequest::Call {
                model,
                method,
                params,
            } => self
                .submit(&model, &method, params, RequestKind::Call)
                .map(drop),
        };
        if let Err(e) = result {
            debug!(poll_id, error = %e, "poll request not sent");
        }
    }
}

async fn poll_task(
    engine: SyncEngine,
    poll_id: String,
    factory: PollFactory,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut state = engine.connection_state();
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                if !engine.is_connected() {
                    debug!(poll_id, "poll paused while disconnected");
                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => break,
                        connected = wait_connected(&mut state) => {
                            if !connected {
                                break;
                            }
                        }
                    }
                    interval.reset();
                }
                engine.issue_poll(&poll_id, &factory);
            }
        }
    }
}

/// Resolves `false` if the engine went away.
async fn wait_connected(state: &mut watch::Receiver<ConnectionState>) -> bool {
    state
        .wait_for(|s| *s == ConnectionState::Connected)
        .await
        .is_ok()
}
