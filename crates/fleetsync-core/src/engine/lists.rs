// ── List operations ──
//
// Local lists are projected from the cache inside every store mutation.
// Server lists are requested from the service, mirrored, and release the
// subscriptions of keys that drop out of them.

use serde_json::{Map, Value};
use tracing::{debug, warn};

use super::SyncEngine;
use super::request::RequestKind;
use crate::error::CoreError;
use crate::list::{ListId, ListMode, ListQuery, ListView};
use crate::model::PrimaryKey;

impl SyncEngine {
    /// Create a list view and return its id. Server lists resolve once
    /// the first page has arrived and need a schema that supports them.
    pub async fn list(
        &self,
        model: &str,
        query: ListQuery,
        mode: ListMode,
    ) -> Result<ListId, CoreError> {
        let store = self.entity_store(model)?;
        let query = query.normalized(self.inner.config.default_page_size)?;
        let list_id = ListId::new();
        debug!(model, list_id = %list_id, ?mode, "creating list");

        match mode {
            ListMode::Local => {
                store.mutate(|state, _| {
                    state.insert_list(ListView::new(list_id.clone(), ListMode::Local, query));
                });
                Ok(list_id)
            }
            ListMode::Server => {
                if !store.schema().supports_server_lists() {
                    return Err(CoreError::validation(
                        "mode",
                        format!("{model} does not support server-side lists"),
                    ));
                }
                let params = query.to_params();
                let kind = RequestKind::List {
                    list_id: list_id.clone(),
                    query,
                    create: true,
                };
                let ticket = self.submit(model, "list", Some(params), kind)?;
                match self.wait(ticket).await {
                    Ok(_) => Ok(list_id),
                    Err(e) => {
                        store.mutate(|state, _| state.remove_list(&list_id).is_some());
                        Err(e)
                    }
                }
            }
        }
    }

    /// Replace a list's query. The page resets to 1 when anything but the
    /// page changed, unless the query asks to keep it.
    pub async fn requery(
        &self,
        model: &str,
        list_id: &ListId,
        query: ListQuery,
    ) -> Result<(), CoreError> {
        let current = self.list_query(model, list_id)?;
        let mut query = query.normalized(self.inner.config.default_page_size)?;
        if !query.keep_page && !current.same_descriptor(&query) {
            query.page_number = 1;
        }
        self.apply_query(model, list_id, query).await
    }

    /// Move a list to another page.
    pub async fn set_page(
        &self,
        model: &str,
        list_id: &ListId,
        page_number: usize,
    ) -> Result<(), CoreError> {
        let query = self
            .list_query(model, list_id)?
            .page(page_number)
            .normalized(self.inner.config.default_page_size)?;
        self.apply_query(model, list_id, query).await
    }

    /// Destroy a list and release its server-side subscriptions. A
    /// response still in flight for it is cached but never rendered.
    pub fn clear_list(&self, model: &str, list_id: &ListId) -> Result<(), CoreError> {
        let release = self.entity_store(model)?.mutate(|state, _| {
            let Some(view) = state.remove_list(list_id) else {
                return Vec::new();
            };
            let held = state.keys_held_elsewhere(list_id);
            view.unsubscribe_keys
                .into_iter()
                .filter(|key| !held.contains(key))
                .collect()
        });
        debug!(model, list_id = %list_id, "list cleared");
        if !release.is_empty() {
            self.unsubscribe(model, release);
        }
        Ok(())
    }

    /// Fire-and-forget release of server subscriptions, as one call.
    pub(super) fn unsubscribe(&self, model: &str, keys: Vec<PrimaryKey>) {
        let schema = match self.schema(model) {
            Ok(schema) => schema,
            Err(e) => {
                warn!(model, error = %e, "cannot unsubscribe");
                return;
            }
        };
        let mut params = Map::new();
        params.insert(
            schema.keys_param(),
            Value::Array(keys.iter().map(PrimaryKey::to_value).collect()),
        );
        debug!(model, count = keys.len(), "releasing subscriptions");
        if let Err(e) = self.submit(
            model,
            "unsubscribe",
            Some(Value::Object(params)),
            RequestKind::Unsubscribe { keys },
        ) {
            warn!(model, error = %e, "unsubscribe not sent");
        }
    }

    fn list_query(&self, model: &str, list_id: &ListId) -> Result<ListQuery, CoreError> {
        self.entity_store(model)?
            .read(|state| state.list(list_id).map(|view| view.query.clone()))
            .ok_or_else(|| CoreError::not_found("list", list_id))
    }

    async fn apply_query(
        &self,
        model: &str,
        list_id: &ListId,
        query: ListQuery,
    ) -> Result<(), CoreError> {
        let store = self.entity_store(model)?;
        let mode = store
            .read(|state| state.list(list_id).map(|view| view.mode))
            .ok_or_else(|| CoreError::not_found("list", list_id))?;

        match mode {
            ListMode::Local => {
                store.mutate(|state, _| {
                    state.with_list(list_id, |view| {
                        view.query = query;
                        true
                    })
                });
                Ok(())
            }
            ListMode::Server => {
                let params = query.to_params();
                let kind = RequestKind::List {
                    list_id: list_id.clone(),
                    query,
                    create: false,
                };
                let ticket = self.submit(model, "list", Some(params), kind)?;
                self.wait(ticket).await.map(drop)
            }
        }
    }
}
