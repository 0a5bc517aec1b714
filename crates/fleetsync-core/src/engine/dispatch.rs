// ── Transport event dispatch ──
//
// The single consumer of transport events. Responses settle their
// pending request, notifications are merged into the stores, and
// connection changes fan out to pending requests, lists and polls.

use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use fleetsync_api::{Incoming, Notification, NotifyAction, Response, TransportEvent};

use super::polling::PING_POLL_ID;
use super::request::Failure;
use super::{ConnectionState, SyncEngine};
use crate::list::ListView;
use crate::model::ErrorPayload;

pub(super) async fn dispatch_task(
    engine: SyncEngine,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            event = events.recv() => {
                let Some(event) = event else {
                    debug!("transport event channel closed");
                    break;
                };
                engine.handle_event(event);
            }
        }
    }
}

impl SyncEngine {
    fn handle_event(&self, event: TransportEvent) {
        match event {
            TransportEvent::Connected => self.on_connected(),
            TransportEvent::Disconnected { reason } => self.on_disconnected(&reason),
            TransportEvent::Message(Incoming::Response(response)) => self.on_response(response),
            TransportEvent::Message(Incoming::Notification(notification)) => {
                self.on_notification(notification);
            }
        }
    }

    fn on_connected(&self) {
        info!("transport connected");
        self.inner.fetched.clear();
        self.set_connection_state(ConnectionState::Connected);

        if let Some(interval) = self.inner.config.ping_interval.filter(|d| !d.is_zero()) {
            if !self.inner.polls.contains_key(PING_POLL_ID) {
                self.start_ping(interval);
            }
        }
    }

    fn on_disconnected(&self, reason: &str) {
        warn!(reason, "transport disconnected");
        self.set_connection_state(ConnectionState::Disconnected);
        self.inner.fetched.clear();
        self.fail_all_pending(reason);

        for store in self.inner.store.live_stores() {
            store.mutate(|state, _| {
                state.for_server_lists(|view| {
                    let changed = !view.stale || view.loading;
                    view.stale = true;
                    view.loading = false;
                    view.pending = None;
                    changed
                })
            });
        }
    }

    fn on_response(&self, response: Response) {
        let Some((_, pending)) = self.inner.pending.remove(&response.request_id) else {
            debug!(request_id = response.request_id, "response for unknown or abandoned request");
            return;
        };
        let outcome = response
            .result
            .map_err(|raw| Failure::Service(ErrorPayload::from_wire(raw)));
        self.complete(response.request_id, pending, outcome);
    }

    fn on_notification(&self, notification: Notification) {
        let Notification {
            model,
            action,
            item,
        } = notification;
        let store = match self.inner.store.store(&model) {
            Ok(store) => store,
            Err(_) => {
                debug!(model, %action, "notification for unregistered model");
                return;
            }
        };
        debug!(model, %action, "applying notification");

        match action {
            NotifyAction::Create | NotifyAction::Update => {
                let Some(entity) = store.schema().entity(item) else {
                    warn!(model, %action, "notification without a usable entity");
                    return;
                };
                store.mutate(|state, _| {
                    let mut changed = state.upsert(entity.clone());
                    changed |= if action == NotifyAction::Create {
                        state.for_server_lists(ListView::entity_created)
                    } else {
                        state.for_server_lists(|view| view.entity_updated(&entity))
                    };
                    changed
                });
            }
            NotifyAction::Delete => {
                let Some(key) = store.schema().key_of(&item) else {
                    warn!(model, "delete notification without a key");
                    return;
                };
                store.remove(&key);
            }
        }
    }
}
