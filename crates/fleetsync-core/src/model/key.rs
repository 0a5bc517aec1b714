// ── Primary keys ──
//
// Models key their entities either by integer (`id`) or by string
// (`system_id`). One enum covers both so stores, statuses and lists can
// stay model-agnostic.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Primary key of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PrimaryKey {
    Int(i64),
    Str(String),
}

impl PrimaryKey {
    /// Read a key out of a JSON scalar. Floats, bools and containers are
    /// not keys.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::Number(n) => n.as_i64().map(Self::Int),
            Value::String(s) => Some(Self::Str(s.clone())),
            _ => None,
        }
    }

    pub fn to_value(&self) -> Value {
        match self {
            Self::Int(i) => Value::from(*i),
            Self::Str(s) => Value::from(s.as_str()),
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Str(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            Self::Int(_) => None,
        }
    }
}

impl fmt::Display for PrimaryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(i) => write!(f, "{i}"),
            Self::Str(s) => write!(f, "{s}"),
        }
    }
}

/// Parses integers as [`PrimaryKey::Int`], anything else as a string key.
impl FromStr for PrimaryKey {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.parse::<i64>()
            .map_or_else(|_| Self::Str(s.to_owned()), Self::Int))
    }
}

impl From<i64> for PrimaryKey {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<i32> for PrimaryKey {
    fn from(i: i32) -> Self {
        Self::Int(i64::from(i))
    }
}

impl From<String> for PrimaryKey {
    fn from(s: String) -> Self {
        Self::Str(s)
    }
}

impl From<&str> for PrimaryKey {
    fn from(s: &str) -> Self {
        Self::Str(s.to_owned())
    }
}
