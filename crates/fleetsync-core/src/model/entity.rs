// ── Entity records ──
//
// An entity is an immutable snapshot of one server record. Fields stay
// as JSON so the cache is model-agnostic; typed views are decoded on
// demand. Mutation means replacing the whole snapshot.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Serialize, Serializer};
use serde_json::{Map, Value};

use super::PrimaryKey;

/// One cached record, keyed by its primary key.
///
/// Cloning is cheap (the field map is shared). Equality is structural.
#[derive(Debug, Clone)]
pub struct Entity {
    key: PrimaryKey,
    fields: Arc<Map<String, Value>>,
}

impl Entity {
    /// Build an entity from a JSON object, reading the key from `pk_field`.
    ///
    /// Returns `None` if `value` is not an object or lacks a usable key.
    pub fn from_value(value: Value, pk_field: &str) -> Option<Self> {
        let Value::Object(fields) = value else {
            return None;
        };
        let key = fields.get(pk_field).and_then(PrimaryKey::from_value)?;
        Some(Self {
            key,
            fields: Arc::new(fields),
        })
    }

    pub fn key(&self) -> &PrimaryKey {
        &self.key
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Look up a dotted path such as `pool.name`.
    pub fn get_path(&self, path: &str) -> Option<&Value> {
        let mut parts = path.split('.');
        let mut current = self.fields.get(parts.next()?)?;
        for part in parts {
            current = current.as_object()?.get(part)?;
        }
        Some(current)
    }

    pub fn to_value(&self) -> Value {
        Value::Object((*self.fields).clone())
    }

    /// Decode into a typed record.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        serde_json::from_value(self.to_value())
    }

    /// A copy with `patch` laid over the current fields. The key never
    /// changes.
    pub(crate) fn merged(&self, patch: &Map<String, Value>) -> Self {
        let mut fields = (*self.fields).clone();
        for (name, value) in patch {
            fields.insert(name.clone(), value.clone());
        }
        Self {
            key: self.key.clone(),
            fields: Arc::new(fields),
        }
    }
}

impl PartialEq for Entity {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
            && (Arc::ptr_eq(&self.fields, &other.fields) || self.fields == other.fields)
    }
}

impl Serialize for Entity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}
