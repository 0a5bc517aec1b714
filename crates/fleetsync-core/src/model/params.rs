// ── Typed operation parameters ──
//
// Create/update payloads are typed per model. `Raw` covers models that
// are registered at runtime and have no typed params.

use serde_json::{Map, Value};

use super::{
    controller::ControllerParams, domain::DomainParams, machine::MachineParams, pod::PodParams,
    user::UserParams, zone::ZoneParams,
};
use crate::error::CoreError;

/// Parameters for `create` and `update`.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelParams {
    Machine(MachineParams),
    Controller(ControllerParams),
    Domain(DomainParams),
    Pod(PodParams),
    User(UserParams),
    Zone(ZoneParams),
    Raw(Map<String, Value>),
}

impl ModelParams {
    /// Build untyped params from a JSON object.
    pub fn raw(value: Value) -> Result<Self, CoreError> {
        match value {
            Value::Object(map) => Ok(Self::Raw(map)),
            other => Err(CoreError::validation(
                "params",
                format!("expected an object, got {other}"),
            )),
        }
    }

    /// The model typed params belong to. `None` for raw params.
    pub fn model(&self) -> Option<&'static str> {
        match self {
            Self::Machine(_) => Some(super::machine::MODEL),
            Self::Controller(_) => Some(super::controller::MODEL),
            Self::Domain(_) => Some(super::domain::MODEL),
            Self::Pod(_) => Some(super::pod::MODEL),
            Self::User(_) => Some(super::user::MODEL),
            Self::Zone(_) => Some(super::zone::MODEL),
            Self::Raw(_) => None,
        }
    }

    pub fn into_map(self) -> Result<Map<String, Value>, CoreError> {
        let value = match self {
            Self::Machine(p) => serde_json::to_value(p),
            Self::Controller(p) => serde_json::to_value(p),
            Self::Domain(p) => serde_json::to_value(p),
            Self::Pod(p) => serde_json::to_value(p),
            Self::User(p) => serde_json::to_value(p),
            Self::Zone(p) => serde_json::to_value(p),
            Self::Raw(map) => return Ok(map),
        };
        match value {
            Ok(Value::Object(map)) => Ok(map),
            Ok(other) => Err(CoreError::Internal(format!(
                "params serialized to a non-object: {other}"
            ))),
            Err(e) => Err(CoreError::Internal(format!("params serialization failed: {e}"))),
        }
    }
}

impl From<MachineParams> for ModelParams {
    fn from(p: MachineParams) -> Self {
        Self::Machine(p)
    }
}

impl From<ControllerParams> for ModelParams {
    fn from(p: ControllerParams) -> Self {
        Self::Controller(p)
    }
}

impl From<DomainParams> for ModelParams {
    fn from(p: DomainParams) -> Self {
        Self::Domain(p)
    }
}

impl From<PodParams> for ModelParams {
    fn from(p: PodParams) -> Self {
        Self::Pod(p)
    }
}

impl From<UserParams> for ModelParams {
    fn from(p: UserParams) -> Self {
        Self::User(p)
    }
}

impl From<ZoneParams> for ModelParams {
    fn from(p: ZoneParams) -> Self {
        Self::Zone(p)
    }
}

impl From<Map<String, Value>> for ModelParams {
    fn from(map: Map<String, Value>) -> Self {
        Self::Raw(map)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn typed_params_know_their_model() {
        let params = ModelParams::from(ZoneParams {
            name: Some("edge".into()),
            ..ZoneParams::default()
        });
        assert_eq!(params.model(), Some("zone"));
        assert_eq!(
            Value::Object(params.into_map().unwrap()),
            json!({"name": "edge"})
        );
    }

    #[test]
    fn raw_params_must_be_objects() {
        assert!(ModelParams::raw(json!({"id": 1})).is_ok());
        assert!(matches!(
            ModelParams::raw(json!([1])),
            Err(CoreError::ValidationFailed { .. })
        ));
    }
}
