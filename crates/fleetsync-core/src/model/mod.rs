// ── Domain model ──
//
// Generic entity/key/schema types plus the built-in model schemas and
// their typed parameters.

pub mod controller;
pub mod domain;
mod entity;
mod key;
pub mod machine;
mod params;
mod payload;
pub mod pod;
mod schema;
pub mod user;
pub mod zone;

pub use entity::Entity;
pub use key::PrimaryKey;
pub use params::ModelParams;
pub use payload::ErrorPayload;
pub use schema::{ModelSchema, VerbRoute, VerbSpec};

/// Schemas registered on every new engine.
pub fn builtin_schemas() -> Vec<ModelSchema> {
    vec![
        controller::schema(),
        domain::schema(),
        machine::schema(),
        pod::schema(),
        user::schema(),
        zone::schema(),
    ]
}
