// ── Model registry ──
//
// Maps model names to their schema and (lazily created) entity store.

use std::sync::Arc;

use dashmap::DashMap;

use super::EntityStore;
use crate::error::CoreError;
use crate::model::ModelSchema;

/// All models known to one engine.
#[derive(Debug, Default)]
pub struct DataStore {
    schemas: DashMap<String, Arc<ModelSchema>>,
    stores: DashMap<String, Arc<EntityStore>>,
}

impl DataStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) a schema. Stores already created for the
    /// model keep the schema they were created with.
    pub fn register(&self, schema: ModelSchema) {
        self.schemas
            .insert(schema.name().to_owned(), Arc::new(schema));
    }

    pub fn schema(&self, model: &str) -> Result<Arc<ModelSchema>, CoreError> {
        self.schemas
            .get(model)
            .map(|s| Arc::clone(s.value()))
            .ok_or_else(|| CoreError::UnknownModel {
                model: model.to_owned(),
            })
    }

    /// The store for `model`, created on first use.
    pub fn store(&self, model: &str) -> Result<Arc<EntityStore>, CoreError> {
        if let Some(store) = self.stores.get(model) {
            return Ok(Arc::clone(store.value()));
        }
        let schema = self.schema(model)?;
        let store = self
            .stores
            .entry(model.to_owned())
            .or_insert_with(|| Arc::new(EntityStore::new(schema)));
        Ok(Arc::clone(store.value()))
    }

    /// Names of every registered model, sorted.
    pub fn models(&self) -> Vec<String> {
        let mut names: Vec<String> = self.schemas.iter().map(|r| r.key().clone()).collect();
        names.sort();
        names
    }

    /// Stores created so far.
    pub(crate) fn live_stores(&self) -> Vec<Arc<EntityStore>> {
        self.stores.iter().map(|r| Arc::clone(r.value())).collect()
    }
}
