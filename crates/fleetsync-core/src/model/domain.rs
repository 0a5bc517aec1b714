// ── DNS domains ──

use serde::Serialize;

use super::ModelSchema;

pub const MODEL: &str = "domain";

pub fn schema() -> ModelSchema {
    ModelSchema::new(MODEL, "id")
        .searchable(["name"])
        .remote_active(true)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DomainParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub authoritative: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ttl: Option<u32>,
}
