// ── Model schemas ──
//
// A schema is all the engine knows about a model: where the primary key
// lives, which fields free-text filters search, which per-entity verbs
// exist and the status flag each one raises.

use std::collections::BTreeMap;

use serde_json::Value;

use super::{Entity, PrimaryKey};
use crate::store::StatusFlag;

/// How a verb reaches the service.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbRoute {
    /// `model.action` with `{ <pk>, action: <verb>, extra }`.
    Action,
    /// `model.<verb>` with `{ <pk>, ..extra }`.
    Method,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VerbSpec {
    pub flag: StatusFlag,
    pub route: VerbRoute,
}

/// Description of one model.
#[derive(Debug, Clone)]
pub struct ModelSchema {
    name: String,
    primary_key: String,
    search_fields: Vec<String>,
    verbs: BTreeMap<String, VerbSpec>,
    remote_active: bool,
    server_lists: bool,
}

impl ModelSchema {
    pub fn new(name: impl Into<String>, primary_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: primary_key.into(),
            search_fields: Vec::new(),
            verbs: BTreeMap::new(),
            remote_active: false,
            server_lists: false,
        }
    }

    /// Fields matched by free-text filter terms. Dotted paths allowed.
    pub fn searchable<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.search_fields = fields.into_iter().map(Into::into).collect();
        self
    }

    /// A verb dispatched through the model's `action` method.
    pub fn verb(mut self, verb: impl Into<String>, flag: StatusFlag) -> Self {
        self.verbs.insert(
            verb.into(),
            VerbSpec {
                flag,
                route: VerbRoute::Action,
            },
        );
        self
    }

    /// A verb that is its own method on the service.
    pub fn method_verb(mut self, verb: impl Into<String>, flag: StatusFlag) -> Self {
        self.verbs.insert(
            verb.into(),
            VerbSpec {
                flag,
                route: VerbRoute::Method,
            },
        );
        self
    }

    /// The service tracks the active entity and must be told about it.
    pub fn remote_active(mut self, on: bool) -> Self {
        self.remote_active = on;
        self
    }

    /// The service can filter, group and paginate lists itself.
    pub fn server_lists(mut self, on: bool) -> Self {
        self.server_lists = on;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn primary_key(&self) -> &str {
        &self.primary_key
    }

    pub fn search_fields(&self) -> &[String] {
        &self.search_fields
    }

    pub fn verbs(&self) -> impl Iterator<Item = (&str, &VerbSpec)> {
        self.verbs.iter().map(|(name, spec)| (name.as_str(), spec))
    }

    pub fn verb_spec(&self, verb: &str) -> Option<VerbSpec> {
        self.verbs.get(verb).copied()
    }

    pub fn has_remote_active(&self) -> bool {
        self.remote_active
    }

    pub fn supports_server_lists(&self) -> bool {
        self.server_lists
    }

    /// Parameter name used when unsubscribing keys, e.g. `system_ids`.
    pub fn keys_param(&self) -> String {
        format!("{}s", self.primary_key)
    }

    pub fn entity(&self, value: Value) -> Option<Entity> {
        Entity::from_value(value, &self.primary_key)
    }

    /// Key of a payload that is either a full record or a bare key.
    pub fn key_of(&self, value: &Value) -> Option<PrimaryKey> {
        match value {
            Value::Object(fields) => fields.get(&self.primary_key).and_then(PrimaryKey::from_value),
            other => PrimaryKey::from_value(other),
        }
    }

    /// `{ <pk>: key }`
    pub fn key_params(&self, key: &PrimaryKey) -> serde_json::Map<String, Value> {
        let mut params = serde_json::Map::new();
        params.insert(self.primary_key.clone(), key.to_value());
        params
    }
}
