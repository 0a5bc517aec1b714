// ── Per-model entity store ──
//
// Owns the working copy of one model's state behind a mutex and
// publishes an immutable snapshot through a `watch` channel whenever a
// mutation changed something. Local list views are re-projected inside
// the same critical section, so subscribers never observe a list that
// lags behind the items.

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::watch;

use super::state::{BulkFlag, ModelState};
use super::status::StatusFlag;
use crate::model::{Entity, ErrorPayload, ModelSchema, PrimaryKey};
use crate::stream::ModelStream;

/// Reactive store for a single model.
pub struct EntityStore {
    schema: Arc<ModelSchema>,
    state: Mutex<ModelState>,
    snapshot: watch::Sender<Arc<ModelState>>,
}

impl EntityStore {
    pub fn new(schema: Arc<ModelSchema>) -> Self {
        let (snapshot, _) = watch::channel(Arc::new(ModelState::default()));
        Self {
            schema,
            state: Mutex::new(ModelState::default()),
            snapshot,
        }
    }

    pub fn schema(&self) -> &Arc<ModelSchema> {
        &self.schema
    }

    /// Current snapshot (cheap `Arc` clone).
    pub fn snapshot(&self) -> Arc<ModelState> {
        self.snapshot.borrow().clone()
    }

    pub fn subscribe(&self) -> ModelStream {
        ModelStream::new(self.snapshot.subscribe())
    }

    // ── Mutations ────────────────────────────────────────────────────

    pub fn upsert(&self, entity: Entity) -> bool {
        self.mutate(|state, _| state.upsert(entity))
    }

    pub fn remove(&self, key: &PrimaryKey) -> bool {
        self.mutate(|state, _| state.remove(key))
    }

    pub fn replace_all(&self, entities: Vec<Entity>) -> bool {
        self.mutate(|state, _| state.replace_all(entities))
    }

    pub fn set_bulk_status(&self, flag: BulkFlag, on: bool) -> bool {
        self.mutate(|state, _| state.set_bulk(flag, on))
    }

    pub fn set_errors(&self, errors: Option<ErrorPayload>) -> bool {
        self.mutate(|state, _| state.set_errors(errors))
    }

    pub fn set_entity_status(&self, key: &PrimaryKey, flag: StatusFlag, on: bool) -> bool {
        self.mutate(|state, _| state.set_status(key, flag, on))
    }

    /// Run `f` against the working copy and publish if it changed
    /// anything.
    pub(crate) fn mutate<R>(&self, f: impl FnOnce(&mut ModelState, &ModelSchema) -> R) -> R {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let before = state.revision();
        let out = f(&mut state, &self.schema);
        if state.revision() != before {
            state.refresh_local_lists(&self.schema);
            // `send_replace` updates even with zero receivers.
            self.snapshot.send_replace(Arc::new(state.clone()));
        }
        out
    }

    /// Read the working copy without publishing.
    pub(crate) fn read<R>(&self, f: impl FnOnce(&ModelState) -> R) -> R {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        f(&state)
    }
}

impl std::fmt::Debug for EntityStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EntityStore")
            .field("model", &self.schema.name())
            .finish_non_exhaustive()
    }
}
