// ── Request effects ──
//
// What each kind of request does to the model state when it is issued,
// when it succeeds and when it fails. All three run inside the store's
// critical section.

use std::collections::HashSet;
use std::fmt;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use fleetsync_api::RequestId;

use crate::error::CoreError;
use crate::list::{ListId, ListMode, ListQuery, ListView, ServerPage};
use crate::model::{Entity, ErrorPayload, ModelSchema, PrimaryKey};
use crate::store::{BulkFlag, ModelState, StatusFlag};

/// Why a request did not succeed.
#[derive(Debug)]
pub(crate) enum Failure {
    /// The service answered with an error payload.
    Service(ErrorPayload),
    /// No answer will come: disconnect, timeout or shutdown.
    Lost(CoreError),
}

impl Failure {
    pub(crate) fn into_error(self) -> CoreError {
        match self {
            Self::Service(payload) => payload.into(),
            Self::Lost(err) => err,
        }
    }
}

impl fmt::Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Service(payload) => write!(f, "{payload}"),
            Self::Lost(err) => write!(f, "{err}"),
        }
    }
}

/// Pre-image of an optimistic update.
#[derive(Debug)]
pub(crate) struct Optimistic {
    before: Entity,
    applied: Entity,
}

#[derive(Debug)]
pub(crate) enum RequestKind {
    Fetch,
    Get,
    Create,
    Update {
        key: PrimaryKey,
        patch: Map<String, Value>,
        optimistic: Option<Optimistic>,
    },
    Delete {
        key: PrimaryKey,
    },
    Action {
        key: PrimaryKey,
        verb: String,
        flag: StatusFlag,
    },
    List {
        list_id: ListId,
        query: ListQuery,
        create: bool,
    },
    Unsubscribe {
        keys: Vec<PrimaryKey>,
    },
    SetActive {
        key: Option<PrimaryKey>,
    },
    Count,
    Ping,
    /// Arbitrary method; the result goes to the caller untouched.
    Call,
}

impl RequestKind {
    pub(crate) fn touches_store(&self) -> bool {
        !matches!(self, Self::Ping | Self::Call | Self::Count)
    }

    pub(crate) fn is_ping(&self) -> bool {
        matches!(self, Self::Ping)
    }

    pub(crate) fn is_fetch(&self) -> bool {
        matches!(self, Self::Fetch)
    }

    // ── Issue ────────────────────────────────────────────────────────

    /// Guards and local mutations applied before the request is sent.
    pub(crate) fn begin(
        &mut self,
        state: &mut ModelState,
        schema: &ModelSchema,
        request_id: RequestId,
        optimistic_updates: bool,
    ) -> Result<(), CoreError> {
        match self {
            Self::Fetch => {
                state.set_bulk(BulkFlag::Loading, true);
                state.set_bulk(BulkFlag::Fetching, true);
            }
            Self::Get => {
                state.set_bulk(BulkFlag::Loading, true);
            }
            Self::Create => start_saving(state),
            Self::Update {
                key,
                patch,
                optimistic,
            } => {
                if optimistic_updates {
                    if let Some(current) = state.get(key).cloned() {
                        let applied = current.merged(patch);
                        state.upsert(applied.clone());
                        *optimistic = Some(Optimistic {
                            before: current,
                            applied,
                        });
                    }
                }
                start_saving(state);
            }
            Self::Delete { key } => {
                raise(state, schema, key, StatusFlag::Deleting)?;
                start_saving(state);
            }
            Self::Action { key, flag, .. } => raise(state, schema, key, *flag)?,
            Self::List {
                list_id,
                query,
                create,
            } => {
                if *create {
                    state.insert_list(ListView::new(list_id.clone(), ListMode::Server, query.clone()));
                }
                let query = query.clone();
                let found = state.with_list(list_id, |view| {
                    view.query = query;
                    view.loading = true;
                    view.errors = None;
                    view.pending = Some(request_id);
                    true
                });
                if !found {
                    return Err(CoreError::not_found("list", list_id.as_str()));
                }
            }
            Self::Unsubscribe { keys } => {
                for key in keys.iter() {
                    if state.statuses.contains_key(key) {
                        state.set_status(key, StatusFlag::Unsubscribing, true);
                    }
                }
            }
            Self::SetActive { .. } | Self::Count | Self::Ping | Self::Call => {}
        }
        Ok(())
    }

    // ── Success ──────────────────────────────────────────────────────

    /// Apply the authoritative payload. Returns keys whose server-side
    /// subscriptions are no longer needed.
    pub(crate) fn succeed(
        &self,
        state: &mut ModelState,
        schema: &ModelSchema,
        request_id: RequestId,
        result: &Value,
    ) -> Vec<PrimaryKey> {
        match self {
            Self::Fetch => {
                state.replace_all(entities_of(result, schema));
                finish_loading(state, true);
                state.set_bulk(BulkFlag::Loaded, true);
                state.set_errors(None);
            }
            Self::Get => {
                upsert_result(state, schema, result);
                finish_loading(state, false);
                state.set_errors(None);
            }
            Self::Create | Self::Update { .. } => {
                upsert_result(state, schema, result);
                finish_saving(state, true);
                state.set_errors(None);
            }
            Self::Delete { key } => {
                state.remove(key);
                finish_saving(state, true);
                state.set_errors(None);
            }
            Self::Action { key, verb, flag } => {
                lower(state, key, *flag);
                if schema.key_of(result).as_ref() == Some(key) && result.is_object() {
                    upsert_result(state, schema, result);
                }
                state.set_event_error(verb, key, None);
                state.set_errors(None);
            }
            Self::List { list_id, query, .. } => {
                return apply_list_page(state, schema, request_id, list_id, query, result);
            }
            Self::Unsubscribe { keys } => {
                for key in keys {
                    state.reset_status(key);
                }
            }
            Self::SetActive { key } => {
                let active = match result {
                    Value::Null => None,
                    Value::Object(_) => {
                        upsert_result(state, schema, result);
                        schema.key_of(result)
                    }
                    _ => key.clone(),
                };
                state.set_active(active);
                state.set_errors(None);
            }
            Self::Count | Self::Ping | Self::Call => {}
        }
        Vec::new()
    }

    // ── Failure ──────────────────────────────────────────────────────

    /// Undo optimistic state and clear flags. Service errors are stored;
    /// lost requests leave no model-level error behind.
    pub(crate) fn fail(
        &self,
        state: &mut ModelState,
        schema: &ModelSchema,
        request_id: RequestId,
        failure: &Failure,
    ) {
        let payload = match failure {
            Failure::Service(payload) => Some(payload.clone()),
            Failure::Lost(_) => None,
        };

        match self {
            Self::Fetch => finish_loading(state, true),
            Self::Get => finish_loading(state, false),
            Self::Create => finish_saving(state, false),
            Self::Update {
                key, optimistic, ..
            } => {
                if let Some(Optimistic { before, applied }) = optimistic {
                    if state.get(key) == Some(applied) {
                        state.upsert(before.clone());
                    } else {
                        debug!(model = schema.name(), %key, "entity changed since optimistic update, keeping it");
                    }
                }
                finish_saving(state, false);
                if let Some(ref payload) = payload {
                    state.set_event_error("update", key, Some(payload.clone()));
                }
            }
            Self::Delete { key } => {
                lower(state, key, StatusFlag::Deleting);
                finish_saving(state, false);
                if let Some(ref payload) = payload {
                    state.set_event_error("delete", key, Some(payload.clone()));
                }
            }
            Self::Action { key, verb, flag } => {
                lower(state, key, *flag);
                if let Some(ref payload) = payload {
                    state.set_event_error(verb, key, Some(payload.clone()));
                }
            }
            Self::List { list_id, .. } => {
                let lost = payload.is_none();
                let errors = payload.clone();
                state.with_list(list_id, |view| {
                    if view.pending != Some(request_id) {
                        return false;
                    }
                    view.loading = false;
                    view.pending = None;
                    view.errors = errors;
                    view.stale |= lost;
                    true
                });
            }
            Self::Unsubscribe { keys } => {
                warn!(model = schema.name(), error = %failure, "unsubscribe failed");
                for key in keys {
                    lower(state, key, StatusFlag::Unsubscribing);
                }
            }
            Self::SetActive { .. } => {
                state.set_active(None);
            }
            Self::Count | Self::Ping | Self::Call => {}
        }

        if payload.is_some() {
            state.set_errors(payload);
        }
    }
}

// ── Helpers ──────────────────────────────────────────────────────────

fn start_saving(state: &mut ModelState) {
    state.set_bulk(BulkFlag::Saving, true);
    state.set_bulk(BulkFlag::Saved, false);
}

/// A settled get leaves `loading` up while a bulk fetch is still out.
fn finish_loading(state: &mut ModelState, bulk: bool) {
    if bulk {
        state.set_bulk(BulkFlag::Fetching, false);
    }
    if !state.fetching {
        state.set_bulk(BulkFlag::Loading, false);
    }
}

fn finish_saving(state: &mut ModelState, saved: bool) {
    state.set_bulk(BulkFlag::Saving, false);
    state.set_bulk(BulkFlag::Saved, saved);
}

/// Raise `flag` on `key`, rejecting unknown keys and duplicates.
fn raise(
    state: &mut ModelState,
    schema: &ModelSchema,
    key: &PrimaryKey,
    flag: StatusFlag,
) -> Result<(), CoreError> {
    if !state.contains(key) {
        return Err(CoreError::not_found(schema.name(), key));
    }
    if state.status(key).get(flag) {
        return Err(CoreError::ActionConflict {
            model: schema.name().to_owned(),
            key: key.clone(),
            flag,
        });
    }
    state.set_status(key, flag, true);
    Ok(())
}

fn lower(state: &mut ModelState, key: &PrimaryKey, flag: StatusFlag) {
    if state.statuses.contains_key(key) {
        state.set_status(key, flag, false);
    }
}

fn upsert_result(state: &mut ModelState, schema: &ModelSchema, result: &Value) {
    match schema.entity(result.clone()) {
        Some(entity) => {
            state.upsert(entity);
        }
        None => debug!(model = schema.name(), "result carries no entity"),
    }
}

/// Records from a bulk `list` result: a plain array or a grouped page.
fn entities_of(result: &Value, schema: &ModelSchema) -> Vec<Entity> {
    match result {
        Value::Array(items) => items
            .iter()
            .filter_map(|item| schema.entity(item.clone()))
            .collect(),
        other => match ServerPage::parse(other.clone(), schema, &ListQuery::default()) {
            Ok(page) => page.entities,
            Err(e) => {
                warn!(model = schema.name(), error = %e, "unusable fetch result");
                Vec::new()
            }
        },
    }
}

fn apply_list_page(
    state: &mut ModelState,
    schema: &ModelSchema,
    request_id: RequestId,
    list_id: &ListId,
    query: &ListQuery,
    result: &Value,
) -> Vec<PrimaryKey> {
    let view_query = state
        .list(list_id)
        .map_or_else(|| query.clone(), |view| view.query.clone());
    let page = match ServerPage::parse(result.clone(), schema, &view_query) {
        Ok(page) => page,
        Err(e) => {
            warn!(model = schema.name(), list_id = %list_id, error = %e, "unusable list page");
            let message = ErrorPayload::Message(e.to_string());
            state.with_list(list_id, |view| {
                if view.pending != Some(request_id) {
                    return false;
                }
                view.loading = false;
                view.pending = None;
                view.errors = Some(message);
                true
            });
            return Vec::new();
        }
    };

    for entity in &page.entities {
        state.upsert(entity.clone());
    }
    state.set_errors(None);

    let Some(pending) = state.list(list_id).map(|view| view.pending) else {
        // Cleared while in flight: the entities stay cached, the
        // subscriptions are released.
        let held = state.keys_held_elsewhere(list_id);
        return page.keys().into_iter().filter(|k| !held.contains(k)).collect();
    };
    if pending != Some(request_id) {
        debug!(model = schema.name(), list_id = %list_id, request_id, "superseded list response");
        return Vec::new();
    }

    let previous = state
        .list(list_id)
        .map(|view| view.unsubscribe_keys.clone())
        .unwrap_or_default();
    state.with_list(list_id, |view| {
        view.apply_page(&page);
        true
    });

    let current: HashSet<PrimaryKey> = page.keys().into_iter().collect();
    let held = state.keys_held_elsewhere(list_id);
    previous
        .into_iter()
        .filter(|k| !current.contains(k) && !held.contains(k))
        .collect()
}
