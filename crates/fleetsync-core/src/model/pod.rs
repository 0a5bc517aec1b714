// ── VM hosts ──

use serde::Serialize;

use super::ModelSchema;
use crate::store::StatusFlag;

pub const MODEL: &str = "pod";

pub fn schema() -> ModelSchema {
    ModelSchema::new(MODEL, "id")
        .searchable(["name", "type", "power_address", "pool.name", "zone.name"])
        .method_verb("refresh", StatusFlag::Refreshing)
        .method_verb("compose", StatusFlag::Deploying)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PodParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub pod_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_pass: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cpu_over_commit_ratio: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub memory_over_commit_ratio: Option<f64>,
}
