// ── Users ──

use serde::Serialize;

use super::ModelSchema;

pub const MODEL: &str = "user";

pub fn schema() -> ModelSchema {
    ModelSchema::new(MODEL, "id").searchable(["username", "email", "last_name"])
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct UserParams {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_superuser: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password1: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password2: Option<String>,
}
