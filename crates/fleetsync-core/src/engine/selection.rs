// ── Selection ──
//
// Selected keys and the single active key of each model. Only keys that
// are in the store can be selected; removal prunes both.

use serde_json::{Map, Value};

use super::SyncEngine;
use super::request::RequestKind;
use crate::error::CoreError;
use crate::model::PrimaryKey;

impl SyncEngine {
    /// Add keys to the selection. Fails without selecting anything if a
    /// key is not in the store.
    pub fn select(&self, model: &str, keys: &[PrimaryKey]) -> Result<(), CoreError> {
        self.entity_store(model)?.mutate(|state, schema| {
            if let Some(missing) = keys.iter().find(|key| !state.contains(key)) {
                return Err(CoreError::not_found(schema.name(), missing));
            }
            state.select(keys);
            Ok(())
        })
    }

    pub fn deselect(&self, model: &str, keys: &[PrimaryKey]) -> Result<(), CoreError> {
        self.entity_store(model)?
            .mutate(|state, _| state.deselect(keys));
        Ok(())
    }

    pub fn select_all(&self, model: &str) -> Result<(), CoreError> {
        self.entity_store(model)?.mutate(|state, _| state.select_all());
        Ok(())
    }

    pub fn clear_selection(&self, model: &str) -> Result<(), CoreError> {
        self.entity_store(model)?
            .mutate(|state, _| state.clear_selection());
        Ok(())
    }

    /// Set (or with `None` clear) the active entity. Models whose service
    /// tracks the active entity are told first; an error there leaves no
    /// active entity.
    pub async fn set_active(&self, model: &str, key: Option<&PrimaryKey>) -> Result<(), CoreError> {
        let store = self.entity_store(model)?;
        if let Some(key) = key {
            if !store.snapshot().contains(key) {
                return Err(CoreError::not_found(model, key));
            }
        }

        let schema = store.schema();
        if !schema.has_remote_active() {
            store.mutate(|state, _| state.set_active(key.cloned()));
            return Ok(());
        }

        let mut params = Map::new();
        params.insert(
            schema.primary_key().to_owned(),
            key.map_or(Value::Null, PrimaryKey::to_value),
        );
        let kind = RequestKind::SetActive { key: key.cloned() };
        let ticket = self.submit(model, "set_active", Some(Value::Object(params)), kind)?;
        self.wait(ticket).await.map(drop)
    }
}
