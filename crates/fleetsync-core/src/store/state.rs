// ── Per-model state ──
//
// `ModelState` is everything the engine knows about one model. Consumers
// only ever see immutable snapshots of it; the store owns the working
// copy and publishes a fresh snapshot after each change.

use std::collections::{HashMap, HashSet};

use indexmap::{IndexMap, IndexSet};
use serde::Serialize;

use super::status::{EntityStatus, StatusFlag};
use crate::list::{ListId, ListMode, ListView};
use crate::model::{Entity, ErrorPayload, ModelSchema, PrimaryKey};

/// Model-level lifecycle flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BulkFlag {
    Loading,
    /// A bulk fetch is in flight. Single gets raise `Loading` only.
    Fetching,
    Loaded,
    Saving,
    Saved,
}

/// Failure of one operation on one entity, e.g. `delete` of `abc`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EventError {
    pub event: String,
    pub key: PrimaryKey,
    pub error: ErrorPayload,
}

/// Snapshot of one model.
#[derive(Debug, Clone, Default)]
pub struct ModelState {
    /// Entities in fetch order.
    pub items: IndexMap<PrimaryKey, Entity>,
    pub loading: bool,
    pub fetching: bool,
    pub loaded: bool,
    pub saving: bool,
    pub saved: bool,
    pub errors: Option<ErrorPayload>,
    pub event_errors: Vec<EventError>,
    pub statuses: HashMap<PrimaryKey, EntityStatus>,
    pub selected: IndexSet<PrimaryKey>,
    pub active: Option<PrimaryKey>,
    pub lists: HashMap<ListId, ListView>,
    revision: u64,
}

impl ModelState {
    // ── Read access ──────────────────────────────────────────────────

    pub fn get(&self, key: &PrimaryKey) -> Option<&Entity> {
        self.items.get(key)
    }

    pub fn contains(&self, key: &PrimaryKey) -> bool {
        self.items.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Entities in fetch order.
    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.items.values()
    }

    /// Status of `key`; unknown keys are idle.
    pub fn status(&self, key: &PrimaryKey) -> EntityStatus {
        self.statuses.get(key).cloned().unwrap_or_default()
    }

    pub fn is_selected(&self, key: &PrimaryKey) -> bool {
        self.selected.contains(key)
    }

    pub fn active_entity(&self) -> Option<&Entity> {
        self.active.as_ref().and_then(|key| self.items.get(key))
    }

    pub fn list(&self, id: &ListId) -> Option<&ListView> {
        self.lists.get(id)
    }

    /// Entities on the current page of a list, in page order.
    pub fn list_entities(&self, id: &ListId) -> Vec<&Entity> {
        self.lists
            .get(id)
            .map(|view| {
                view.result_keys
                    .iter()
                    .filter_map(|key| self.items.get(key))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn event_error(&self, event: &str, key: &PrimaryKey) -> Option<&ErrorPayload> {
        self.event_errors
            .iter()
            .find(|e| e.event == event && &e.key == key)
            .map(|e| &e.error)
    }

    /// Bumped on every published change.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    // ── Entities ─────────────────────────────────────────────────────

    /// Insert or replace. Identical entities are left alone.
    pub(crate) fn upsert(&mut self, entity: Entity) -> bool {
        if self.items.get(entity.key()) == Some(&entity) {
            return false;
        }
        self.items.insert(entity.key().clone(), entity);
        self.touch()
    }

    /// Delete and cascade into statuses, selection and lists.
    pub(crate) fn remove(&mut self, key: &PrimaryKey) -> bool {
        let mut changed = self.items.shift_remove(key).is_some();
        changed |= self.statuses.remove(key).is_some();
        changed |= self.selected.shift_remove(key);
        if self.active.as_ref() == Some(key) {
            self.active = None;
            changed = true;
        }
        for view in self.lists.values_mut() {
            changed |= view.entity_removed(key);
        }
        changed && self.touch()
    }

    /// Upsert every entity, then prune keys not in the incoming set.
    /// Order follows the incoming sequence.
    pub(crate) fn replace_all(&mut self, entities: Vec<Entity>) -> bool {
        let incoming: HashSet<&PrimaryKey> = entities.iter().map(Entity::key).collect();
        let stale: Vec<PrimaryKey> = self
            .items
            .keys()
            .filter(|key| !incoming.contains(key))
            .cloned()
            .collect();

        let mut changed = false;
        for key in &stale {
            changed |= self.remove(key);
        }

        let order: Vec<PrimaryKey> = entities.iter().map(|e| e.key().clone()).collect();
        for entity in entities {
            changed |= self.upsert(entity);
        }

        if !self.items.keys().eq(order.iter()) {
            let mut reordered = IndexMap::with_capacity(order.len());
            for key in order {
                if let Some(entity) = self.items.shift_remove(&key) {
                    reordered.insert(key, entity);
                }
            }
            self.items = reordered;
            changed |= self.touch();
        }
        changed
    }

    // ── Flags ────────────────────────────────────────────────────────

    pub(crate) fn set_bulk(&mut self, flag: BulkFlag, on: bool) -> bool {
        let slot = match flag {
            BulkFlag::Loading => &mut self.loading,
            BulkFlag::Fetching => &mut self.fetching,
            BulkFlag::Loaded => &mut self.loaded,
            BulkFlag::Saving => &mut self.saving,
            BulkFlag::Saved => &mut self.saved,
        };
        if *slot == on {
            return false;
        }
        *slot = on;
        self.touch()
    }

    pub(crate) fn set_errors(&mut self, errors: Option<ErrorPayload>) -> bool {
        if self.errors == errors {
            return false;
        }
        self.errors = errors;
        self.touch()
    }

    /// Record (or clear, with `None`) the error of `event` on `key`.
    pub(crate) fn set_event_error(
        &mut self,
        event: &str,
        key: &PrimaryKey,
        error: Option<ErrorPayload>,
    ) -> bool {
        let before = self.event_errors.len();
        self.event_errors
            .retain(|e| !(e.event == event && &e.key == key));
        let mut changed = before != self.event_errors.len();
        if let Some(error) = error {
            self.event_errors.push(EventError {
                event: event.to_owned(),
                key: key.clone(),
                error,
            });
            changed = true;
        }
        changed && self.touch()
    }

    pub(crate) fn set_status(&mut self, key: &PrimaryKey, flag: StatusFlag, on: bool) -> bool {
        let changed = self.statuses.entry(key.clone()).or_default().set(flag, on);
        changed && self.touch()
    }

    /// Reset a status record to all-false.
    pub(crate) fn reset_status(&mut self, key: &PrimaryKey) -> bool {
        match self.statuses.get_mut(key) {
            Some(status) if !status.is_idle() => {
                *status = EntityStatus::default();
                self.touch()
            }
            _ => false,
        }
    }

    pub(crate) fn cleanup(&mut self) -> bool {
        let mut changed = self.set_errors(None);
        changed |= self.set_bulk(BulkFlag::Saved, false);
        changed |= self.set_bulk(BulkFlag::Saving, false);
        if !self.event_errors.is_empty() {
            self.event_errors.clear();
            changed |= self.touch();
        }
        changed
    }

    // ── Selection ────────────────────────────────────────────────────

    pub(crate) fn select<'a>(&mut self, keys: impl IntoIterator<Item = &'a PrimaryKey>) -> bool {
        let mut changed = false;
        for key in keys {
            changed |= self.selected.insert(key.clone());
        }
        changed && self.touch()
    }

    pub(crate) fn deselect<'a>(&mut self, keys: impl IntoIterator<Item = &'a PrimaryKey>) -> bool {
        let mut changed = false;
        for key in keys {
            changed |= self.selected.shift_remove(key);
        }
        changed && self.touch()
    }

    pub(crate) fn select_all(&mut self) -> bool {
        let all: IndexSet<PrimaryKey> = self.items.keys().cloned().collect();
        if all == self.selected {
            return false;
        }
        self.selected = all;
        self.touch()
    }

    pub(crate) fn clear_selection(&mut self) -> bool {
        if self.selected.is_empty() {
            return false;
        }
        self.selected.clear();
        self.touch()
    }

    pub(crate) fn set_active(&mut self, key: Option<PrimaryKey>) -> bool {
        if self.active == key {
            return false;
        }
        self.active = key;
        self.touch()
    }

    // ── Lists ────────────────────────────────────────────────────────

    pub(crate) fn insert_list(&mut self, view: ListView) {
        self.lists.insert(view.id.clone(), view);
        self.touch();
    }

    pub(crate) fn remove_list(&mut self, id: &ListId) -> Option<ListView> {
        let removed = self.lists.remove(id);
        if removed.is_some() {
            self.touch();
        }
        removed
    }

    /// Mutable access to one list. The closure reports whether it changed
    /// anything.
    pub(crate) fn with_list<F>(&mut self, id: &ListId, f: F) -> bool
    where
        F: FnOnce(&mut ListView) -> bool,
    {
        let changed = self.lists.get_mut(id).is_some_and(f);
        changed && self.touch()
    }

    /// Apply `f` to every server-mode list.
    pub(crate) fn for_server_lists<F>(&mut self, mut f: F) -> bool
    where
        F: FnMut(&mut ListView) -> bool,
    {
        let mut changed = false;
        for view in self.lists.values_mut() {
            if view.mode == ListMode::Server {
                changed |= f(view);
            }
        }
        changed && self.touch()
    }

    /// Keys held by any list other than `except`.
    pub(crate) fn keys_held_elsewhere(&self, except: &ListId) -> HashSet<PrimaryKey> {
        self.lists
            .values()
            .filter(|view| &view.id != except)
            .flat_map(|view| {
                view.result_keys
                    .iter()
                    .chain(view.unsubscribe_keys.iter())
                    .cloned()
            })
            .collect()
    }

    /// Re-project every local list against the current items.
    pub(crate) fn refresh_local_lists(&mut self, schema: &ModelSchema) -> bool {
        let mut changed = false;
        for view in self.lists.values_mut() {
            if view.mode == ListMode::Local {
                changed |= view.project(&self.items, schema, self.loading, self.loaded);
            }
        }
        changed && self.touch()
    }

    fn touch(&mut self) -> bool {
        self.revision += 1;
        true
    }
}
