// ── Consumer operations ──
//
// fetch / get / create / update / delete / action / count / cleanup.
// Each one runs its local effects synchronously in `submit`, then awaits
// the response the dispatcher routes back.

use std::sync::Arc;

use serde_json::{Map, Value, json};
use tracing::debug;

use super::request::RequestKind;
use super::{SyncEngine, Ticket};
use crate::error::CoreError;
use crate::list::FilterExpr;
use crate::model::{Entity, ModelParams, PrimaryKey, VerbRoute};
use crate::store::{EntityStore, ModelState};

impl SyncEngine {
    // ── Reads ────────────────────────────────────────────────────────

    /// Load every entity of `model`.
    ///
    /// Cached: once a fetch was issued since the last (re)connect, no
    /// request is sent and the current snapshot is returned (after the
    /// in-flight fetch settles, if there is one).
    pub async fn fetch(&self, model: &str) -> Result<Arc<ModelState>, CoreError> {
        let store = self.entity_store(model)?;
        if self.inner.fetched.contains(model) {
            debug!(model, "fetch served from cache");
            if store.snapshot().fetching {
                self.wait_fetch_settled(&store).await?;
            }
            return Ok(store.snapshot());
        }
        self.fetch_fresh(model).await
    }

    /// Load every entity of `model`, bypassing the fetch cache.
    pub async fn fetch_fresh(&self, model: &str) -> Result<Arc<ModelState>, CoreError> {
        let ticket = self.issue_fetch(model)?;
        self.wait(ticket).await?;
        self.snapshot(model)
    }

    /// Fetch a single entity and cache it.
    pub async fn get(&self, model: &str, key: &PrimaryKey) -> Result<Entity, CoreError> {
        let schema = self.schema(model)?;
        let ticket = self.issue_get(model, key)?;
        let value = self.wait(ticket).await?;
        schema
            .entity(value)
            .ok_or_else(|| CoreError::not_found(model, key))
    }

    /// Number of entities matching `filter` on the service.
    pub async fn count(&self, model: &str, filter: &str) -> Result<u64, CoreError> {
        self.schema(model)?;
        let expr = FilterExpr::parse(filter);
        let params = (!expr.is_empty()).then(|| json!({ "filter": expr.to_wire() }));
        let ticket = self.submit(model, "count", params, RequestKind::Count)?;
        let value = self.wait(ticket).await?;
        value
            .as_u64()
            .or_else(|| value.get("count").and_then(Value::as_u64))
            .ok_or_else(|| CoreError::Internal(format!("unexpected count result: {value}")))
    }

    /// Send an arbitrary method and return its raw result. No store
    /// effects.
    pub async fn call(
        &self,
        model: &str,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, CoreError> {
        let ticket = self.submit(model, method, params, RequestKind::Call)?;
        self.wait(ticket).await
    }

    // ── Mutations ────────────────────────────────────────────────────

    pub async fn create(
        &self,
        model: &str,
        params: impl Into<ModelParams>,
    ) -> Result<Value, CoreError> {
        let params = checked_params(model, params.into())?;
        let ticket = self.submit(model, "create", Some(Value::Object(params)), RequestKind::Create)?;
        self.wait(ticket).await
    }

    /// Update an entity. `params` must carry the primary key. With
    /// optimistic updates enabled the patch is visible immediately and
    /// rolled back if the service rejects it.
    pub async fn update(
        &self,
        model: &str,
        params: impl Into<ModelParams>,
    ) -> Result<Value, CoreError> {
        let schema = self.schema(model)?;
        let params = checked_params(model, params.into())?;
        let key = params
            .get(schema.primary_key())
            .and_then(PrimaryKey::from_value)
            .ok_or_else(|| CoreError::validation(schema.primary_key(), "required for update"))?;

        let kind = RequestKind::Update {
            key,
            patch: params.clone(),
            optimistic: None,
        };
        let ticket = self.submit(model, "update", Some(Value::Object(params)), kind)?;
        self.wait(ticket).await
    }

    /// Delete an entity. A second delete of the same entity while the
    /// first is in flight fails with [`CoreError::ActionConflict`].
    pub async fn delete(&self, model: &str, key: &PrimaryKey) -> Result<(), CoreError> {
        let schema = self.schema(model)?;
        let params = Value::Object(schema.key_params(key));
        let kind = RequestKind::Delete { key: key.clone() };
        let ticket = self.submit(model, "delete", Some(params), kind)?;
        self.wait(ticket).await.map(drop)
    }

    /// Run a per-entity verb declared by the model's schema.
    pub async fn action(
        &self,
        model: &str,
        key: &PrimaryKey,
        verb: &str,
        extra: Option<Map<String, Value>>,
    ) -> Result<Value, CoreError> {
        let schema = self.schema(model)?;
        let spec = schema
            .verb_spec(verb)
            .ok_or_else(|| CoreError::validation("action", format!("{model} has no action '{verb}'")))?;

        let extra = extra.unwrap_or_default();
        let (method, params) = match spec.route {
            VerbRoute::Action => {
                let mut params = schema.key_params(key);
                params.insert("action".into(), Value::String(verb.to_owned()));
                params.insert("extra".into(), Value::Object(extra));
                ("action", params)
            }
            VerbRoute::Method => {
                let mut params = extra;
                params.extend(schema.key_params(key));
                (verb, params)
            }
        };

        let kind = RequestKind::Action {
            key: key.clone(),
            verb: verb.to_owned(),
            flag: spec.flag,
        };
        let ticket = self.submit(model, method, Some(Value::Object(params)), kind)?;
        self.wait(ticket).await
    }

    /// Clear `errors`, `event_errors`, `saved` and `saving`.
    pub fn cleanup(&self, model: &str) -> Result<(), CoreError> {
        self.entity_store(model)?
            .mutate(|state, _| state.cleanup());
        Ok(())
    }

    // ── Internals ────────────────────────────────────────────────────

    pub(super) fn issue_fetch(&self, model: &str) -> Result<Ticket, CoreError> {
        self.inner.fetched.insert(model.to_owned());
        self.submit(model, "list", None, RequestKind::Fetch)
            .inspect_err(|_| {
                self.inner.fetched.remove(model);
            })
    }

    pub(super) fn issue_get(&self, model: &str, key: &PrimaryKey) -> Result<Ticket, CoreError> {
        let params = Value::Object(self.schema(model)?.key_params(key));
        self.submit(model, "get", Some(params), RequestKind::Get)
    }

    async fn wait_fetch_settled(&self, store: &EntityStore) -> Result<(), CoreError> {
        let mut stream = store.subscribe();
        let timeout = self.inner.config.request_timeout;
        let settled = async {
            while stream.latest().fetching {
                if stream.changed().await.is_none() {
                    return Err(CoreError::disconnected());
                }
            }
            Ok(())
        };
        tokio::time::timeout(timeout, settled)
            .await
            .map_err(|_| super::timeout_error(&format!("{}.list", store.schema().name()), timeout))?
    }
}

/// Typed params must belong to `model`.
fn checked_params(model: &str, params: ModelParams) -> Result<Map<String, Value>, CoreError> {
    if let Some(owner) = params.model() {
        if owner != model {
            return Err(CoreError::validation(
                "params",
                format!("{owner} params used for {model}"),
            ));
        }
    }
    params.into_map()
}
