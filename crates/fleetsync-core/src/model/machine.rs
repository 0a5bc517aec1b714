// ── Machines ──
//
// The largest model: keyed by `system_id`, listed server-side, and the
// only one with a full set of lifecycle verbs.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ModelSchema;
use crate::store::StatusFlag;

pub const MODEL: &str = "machine";

pub fn schema() -> ModelSchema {
    ModelSchema::new(MODEL, "system_id")
        .searchable([
            "hostname",
            "fqdn",
            "system_id",
            "owner",
            "status",
            "pool.name",
            "zone.name",
            "architecture",
        ])
        .verb("abort", StatusFlag::Aborting)
        .verb("acquire", StatusFlag::Acquiring)
        .verb("commission", StatusFlag::Commissioning)
        .verb("deploy", StatusFlag::Deploying)
        .verb("exit-rescue-mode", StatusFlag::ExitingRescueMode)
        .verb("lock", StatusFlag::Locking)
        .verb("mark-broken", StatusFlag::MarkingBroken)
        .verb("mark-fixed", StatusFlag::MarkingFixed)
        .verb("off", StatusFlag::PoweringOff)
        .verb("on", StatusFlag::PoweringOn)
        .verb("override-failed-testing", StatusFlag::OverridingFailedTesting)
        .verb("release", StatusFlag::Releasing)
        .verb("rescue-mode", StatusFlag::EnteringRescueMode)
        .verb("set-pool", StatusFlag::SettingPool)
        .verb("set-zone", StatusFlag::SettingZone)
        .verb("tag", StatusFlag::Tagging)
        .verb("test", StatusFlag::Testing)
        .verb("unlock", StatusFlag::Unlocking)
        .verb("untag", StatusFlag::Untagging)
        .method_verb("check_power", StatusFlag::CheckingPower)
        .remote_active(true)
        .server_lists(true)
}

/// Create/update parameters.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MachineParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hostname: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub architecture: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_hwe_kernel: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<NamedRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<NamedRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pool: Option<NamedRef>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub power_parameters: Option<Map<String, Value>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pxe_mac: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub extra_macs: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commission: Option<bool>,
}

/// `{ id, name }` reference to a related object.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NamedRef {
    pub id: i64,
    pub name: String,
}

/// Typed view of a cached machine.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct Machine {
    pub system_id: String,
    pub hostname: String,
    #[serde(default)]
    pub fqdn: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub power_state: Option<String>,
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub architecture: Option<String>,
    #[serde(default)]
    pub cpu_count: Option<u32>,
    #[serde(default)]
    pub memory: Option<f64>,
    #[serde(default)]
    pub pool: Option<NamedRef>,
    #[serde(default)]
    pub zone: Option<NamedRef>,
    #[serde(default)]
    pub locked: bool,
    #[serde(default)]
    pub tags: Vec<i64>,
}
