// ── Sync engine ──
//
// Issues requests through the transport, correlates responses, applies
// optimistic and confirmed mutations to the per-model stores, merges
// notifications and keeps every list view live. One dispatcher task is
// the only consumer of transport events; consumer-initiated local
// mutations happen synchronously under the store lock before the
// request leaves.

mod dispatch;
mod lists;
mod ops;
mod polling;
mod request;
mod selection;

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::{DashMap, DashSet};
use serde_json::Value;
use tokio::sync::{Mutex, oneshot, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use fleetsync_api::{RequestId, RequestMessage, Transport};

use crate::config::EngineConfig;
use crate::error::CoreError;
use crate::model::{ModelSchema, builtin_schemas};
use crate::store::{DataStore, EntityStore, ModelState};
use crate::stream::ModelStream;

pub use polling::{PollFactory, PollRequest};

use request::{Failure, RequestKind};

// ── ConnectionState ──────────────────────────────────────────────────

/// Connection state observable by consumers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
}

// ── SyncEngine ───────────────────────────────────────────────────────

/// The main entry point for consumers.
///
/// Cheaply cloneable via `Arc<EngineInner>`. Several engines may coexist;
/// each owns its stores, its transport and its background tasks.
#[derive(Clone)]
pub struct SyncEngine {
    inner: Arc<EngineInner>,
}

struct EngineInner {
    config: EngineConfig,
    store: DataStore,
    transport: Arc<dyn Transport>,
    connection_state: watch::Sender<ConnectionState>,
    pending: DashMap<RequestId, PendingRequest>,
    next_request_id: AtomicU64,
    /// Models with a bulk fetch issued since the last (re)connect.
    fetched: DashSet<String>,
    polls: DashMap<String, polling::PollTask>,
    cancel: CancellationToken,
    task_handles: Mutex<Vec<JoinHandle<()>>>,
}

/// An in-flight request and what to do when it settles.
struct PendingRequest {
    model: String,
    method: String,
    kind: RequestKind,
    reply: oneshot::Sender<Result<Value, CoreError>>,
}

/// Handle on a submitted request.
pub(crate) struct Ticket {
    request_id: RequestId,
    method: String,
    reply: oneshot::Receiver<Result<Value, CoreError>>,
}

impl SyncEngine {
    /// Create an engine over `transport` with the built-in model schemas
    /// registered. Does NOT start -- call [`start()`](Self::start).
    pub fn new(config: EngineConfig, transport: Arc<dyn Transport>) -> Self {
        let store = DataStore::new();
        for schema in builtin_schemas() {
            store.register(schema);
        }
        let (connection_state, _) = watch::channel(ConnectionState::Disconnected);

        Self {
            inner: Arc::new(EngineInner {
                config,
                store,
                transport,
                connection_state,
                pending: DashMap::new(),
                next_request_id: AtomicU64::new(1),
                fetched: DashSet::new(),
                polls: DashMap::new(),
                cancel: CancellationToken::new(),
                task_handles: Mutex::new(Vec::new()),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    /// Register an additional model, or replace a built-in schema.
    pub fn register_schema(&self, schema: ModelSchema) {
        debug!(model = schema.name(), "registering schema");
        self.inner.store.register(schema);
    }

    pub fn schema(&self, model: &str) -> Result<Arc<ModelSchema>, CoreError> {
        self.inner.store.schema(model)
    }

    /// Access the underlying DataStore.
    pub fn store(&self) -> &DataStore {
        &self.inner.store
    }

    // ── Lifecycle ────────────────────────────────────────────────────

    /// Spawn the dispatcher. Fails if the engine was already started.
    pub async fn start(&self) -> Result<(), CoreError> {
        let events = self
            .inner
            .transport
            .take_events()
            .ok_or_else(|| CoreError::Internal("engine already started".into()))?;

        self.set_connection_state(ConnectionState::Connecting);
        let handle = tokio::spawn(dispatch::dispatch_task(
            self.clone(),
            events,
            self.inner.cancel.child_token(),
        ));
        self.inner.task_handles.lock().await.push(handle);
        info!("sync engine started");
        Ok(())
    }

    /// Wait until the transport reports a connection, bounded by the
    /// request timeout.
    pub async fn wait_until_connected(&self) -> Result<(), CoreError> {
        let mut rx = self.inner.connection_state.subscribe();
        let timeout = self.inner.config.request_timeout;
        match tokio::time::timeout(timeout, rx.wait_for(|s| *s == ConnectionState::Connected))
            .await
        {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(_)) => Err(CoreError::disconnected()),
            Err(_) => Err(timeout_error("connect", timeout)),
        }
    }

    /// Cancel background tasks, close the transport and fail every
    /// pending request.
    pub async fn shutdown(&self) {
        self.inner.cancel.cancel();

        let mut handles: Vec<JoinHandle<()>> = self.inner.task_handles.lock().await.drain(..).collect();
        let poll_ids: Vec<String> = self.inner.polls.iter().map(|r| r.key().clone()).collect();
        for id in poll_ids {
            if let Some((_, task)) = self.inner.polls.remove(&id) {
                handles.push(task.handle);
            }
        }
        for handle in handles {
            let _ = handle.await;
        }

        self.inner.transport.close();
        self.fail_all_pending("engine shut down");
        self.set_connection_state(ConnectionState::Disconnected);
        info!("sync engine stopped");
    }

    // ── State observation ────────────────────────────────────────────

    /// Subscribe to connection state changes.
    pub fn connection_state(&self) -> watch::Receiver<ConnectionState> {
        self.inner.connection_state.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        *self.inner.connection_state.borrow() == ConnectionState::Connected
    }

    /// Publish a new connection state. Stored even with no receivers.
    pub(super) fn set_connection_state(&self, state: ConnectionState) {
        self.inner.connection_state.send_replace(state);
    }

    /// Current snapshot of one model.
    pub fn snapshot(&self, model: &str) -> Result<Arc<ModelState>, CoreError> {
        Ok(self.inner.store.store(model)?.snapshot())
    }

    /// Subscribe to one model's snapshots.
    pub fn subscribe(&self, model: &str) -> Result<ModelStream, CoreError> {
        Ok(self.inner.store.store(model)?.subscribe())
    }

    /// Number of requests awaiting a response.
    pub fn pending_requests(&self) -> usize {
        self.inner.pending.len()
    }

    // ── Request plumbing ─────────────────────────────────────────────

    fn entity_store(&self, model: &str) -> Result<Arc<EntityStore>, CoreError> {
        self.inner.store.store(model)
    }

    fn next_request_id(&self) -> RequestId {
        self.inner.next_request_id.fetch_add(1, Ordering::Relaxed)
    }

    /// Run the local side of a request under the store lock, register it
    /// as pending and hand it to the transport.
    fn submit(
        &self,
        model: &str,
        method: &str,
        params: Option<Value>,
        mut kind: RequestKind,
    ) -> Result<Ticket, CoreError> {
        if !self.is_connected() {
            return Err(CoreError::disconnected());
        }

        let request_id = self.next_request_id();
        if kind.touches_store() {
            let optimistic = self.inner.config.optimistic_updates;
            self.entity_store(model)?
                .mutate(|state, schema| kind.begin(state, schema, request_id, optimistic))?;
        }

        let request = if kind.is_ping() {
            RequestMessage::ping(request_id)
        } else {
            RequestMessage::new(request_id, model, method, params)
        };
        debug!(request_id, model, method, "sending request");

        let (tx, rx) = oneshot::channel();
        self.inner.pending.insert(
            request_id,
            PendingRequest {
                model: model.to_owned(),
                method: method.to_owned(),
                kind,
                reply: tx,
            },
        );

        if let Err(e) = self.inner.transport.send(request) {
            warn!(request_id, model, method, error = %e, "send failed");
            let err = CoreError::from(e);
            if let Some((_, pending)) = self.inner.pending.remove(&request_id) {
                self.complete(
                    request_id,
                    pending,
                    Err(Failure::Lost(CoreError::Connection {
                        reason: err.to_string(),
                    })),
                );
            }
            return Err(err);
        }

        Ok(Ticket {
            request_id,
            method: format!("{model}.{method}"),
            reply: rx,
        })
    }

    /// Await the outcome of a submitted request, bounded by the request
    /// timeout. A timed-out request is failed and rolled back.
    async fn wait(&self, ticket: Ticket) -> Result<Value, CoreError> {
        let timeout = self.inner.config.request_timeout;
        match tokio::time::timeout(timeout, ticket.reply).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(CoreError::disconnected()),
            Err(_) => {
                warn!(request_id = ticket.request_id, method = %ticket.method, "request timed out");
                if let Some((_, pending)) = self.inner.pending.remove(&ticket.request_id) {
                    self.complete(
                        ticket.request_id,
                        pending,
                        Err(Failure::Lost(timeout_error(&ticket.method, timeout))),
                    );
                }
                Err(timeout_error(&ticket.method, timeout))
            }
        }
    }

    /// Apply a settled request's effects, then resolve its continuation.
    fn complete(
        &self,
        request_id: RequestId,
        pending: PendingRequest,
        outcome: Result<Value, Failure>,
    ) {
        let PendingRequest {
            model,
            method,
            kind,
            reply,
        } = pending;

        if outcome.is_err() && kind.is_fetch() {
            self.inner.fetched.remove(&model);
        }

        let mut unsubscribe = Vec::new();
        if kind.touches_store() {
            match self.entity_store(&model) {
                Ok(store) => {
                    unsubscribe = store.mutate(|state, schema| match &outcome {
                        Ok(value) => kind.succeed(state, schema, request_id, value),
                        Err(failure) => {
                            kind.fail(state, schema, request_id, failure);
                            Vec::new()
                        }
                    });
                }
                Err(e) => warn!(model, error = %e, "response for a model without a store"),
            }
        }

        match &outcome {
            Ok(_) => debug!(request_id, model, method, "request succeeded"),
            Err(failure) => debug!(request_id, model, method, error = %failure, "request failed"),
        }

        let _ = reply.send(outcome.map_err(Failure::into_error));

        if !unsubscribe.is_empty() {
            self.unsubscribe(&model, unsubscribe);
        }
    }

    /// Fail every pending request with a connection error.
    fn fail_all_pending(&self, reason: &str) {
        let mut ids: Vec<RequestId> = self.inner.pending.iter().map(|r| *r.key()).collect();
        ids.sort_unstable();
        for id in ids {
            if let Some((_, pending)) = self.inner.pending.remove(&id) {
                self.complete(
                    id,
                    pending,
                    Err(Failure::Lost(CoreError::Connection {
                        reason: reason.to_owned(),
                    })),
                );
            }
        }
    }
}

fn timeout_error(method: &str, timeout: std::time::Duration) -> CoreError {
    CoreError::Timeout {
        method: method.to_owned(),
        timeout_ms: u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX),
    }
}
