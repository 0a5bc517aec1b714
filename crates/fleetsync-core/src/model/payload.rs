// ── Service error payloads ──
//
// The service reports errors as a plain message, as a map of field name
// to messages, or as anything else. Strings frequently carry JSON, so
// they are decoded before classification.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;
use serde_json::{Map, Value};

/// A stored error: model-level `errors`, per-event errors and list errors.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ErrorPayload {
    Message(String),
    Fields(BTreeMap<String, Vec<String>>),
    Other(Value),
}

impl ErrorPayload {
    /// Classify a raw error value as received on the wire.
    pub fn from_wire(value: Value) -> Self {
        match value {
            Value::String(text) => match serde_json::from_str::<Value>(&text) {
                Ok(Value::Object(map)) => Self::from_object(map),
                Ok(Value::String(inner)) => Self::Message(inner),
                _ => Self::Message(text),
            },
            Value::Object(map) => Self::from_object(map),
            other => Self::Other(other),
        }
    }

    fn from_object(map: Map<String, Value>) -> Self {
        match field_messages(&map) {
            Some(fields) => Self::Fields(fields),
            None => Self::Other(Value::Object(map)),
        }
    }

    pub fn field_errors(&self) -> Option<&BTreeMap<String, Vec<String>>> {
        match self {
            Self::Fields(f) => Some(f),
            _ => None,
        }
    }
}

/// `field -> message | [message, ..]`, or `None` for any other shape.
fn field_messages(map: &Map<String, Value>) -> Option<BTreeMap<String, Vec<String>>> {
    map.iter()
        .map(|(name, value)| {
            let messages = match value {
                Value::String(s) => vec![s.clone()],
                Value::Array(items) => items
                    .iter()
                    .map(|item| item.as_str().map(str::to_owned))
                    .collect::<Option<Vec<_>>>()?,
                _ => return None,
            };
            Some((name.clone(), messages))
        })
        .collect()
}

impl fmt::Display for ErrorPayload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Message(m) => f.write_str(m),
            Self::Fields(fields) => {
                for (i, (name, messages)) in fields.iter().enumerate() {
                    if i > 0 {
                        f.write_str("; ")?;
                    }
                    write!(f, "{name}: {}", messages.join(", "))?;
                }
                Ok(())
            }
            Self::Other(v) => write!(f, "{v}"),
        }
    }
}

impl From<&str> for ErrorPayload {
    fn from(s: &str) -> Self {
        Self::Message(s.to_owned())
    }
}
