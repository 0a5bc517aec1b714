// ── Controllers ──

use serde::Serialize;

use super::ModelSchema;
use super::machine::NamedRef;
use crate::store::StatusFlag;

pub const MODEL: &str = "controller";

pub fn schema() -> ModelSchema {
    ModelSchema::new(MODEL, "system_id")
        .searchable(["hostname", "fqdn", "system_id", "node_type_display", "zone.name"])
        .verb("set-zone", StatusFlag::SettingZone)
        .verb("tag", StatusFlag::Tagging)
        .verb("untag", StatusFlag::Untagging)
        .method_verb("check_power", StatusFlag::CheckingPower)
        .remote_active(true)
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ControllerParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<NamedRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<NamedRef>,
}
