// ── Availability zones ──

use serde::Serialize;

use super::ModelSchema;

pub const MODEL: &str = "zone";

pub fn schema() -> ModelSchema {
    ModelSchema::new(MODEL, "id").searchable(["name", "description"])
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ZoneParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}
