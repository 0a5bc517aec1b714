//! Shared helpers for command handlers.

use std::path::Path;

use serde_json::{Map, Value};

use fleetsync_core::{Entity, ModelSchema, ModelState, PrimaryKey};

use crate::error::CliError;

/// Parse a primary key argument. Integers become integer keys.
pub fn parse_key(raw: &str) -> PrimaryKey {
    let Ok(key) = raw.parse::<PrimaryKey>();
    key
}

/// Human label for an entity: the first searchable field holding a
/// string, else `name`, else empty.
pub fn display_name(entity: &Entity, schema: &ModelSchema) -> String {
    schema
        .search_fields()
        .iter()
        .map(String::as_str)
        .chain(["name"])
        .find_map(|field| entity.get_path(field).and_then(Value::as_str))
        .unwrap_or_default()
        .to_owned()
}

/// Raised status flags of an entity, comma separated.
pub fn status_label(state: &ModelState, key: &PrimaryKey) -> String {
    state
        .status(key)
        .raised()
        .map(|flag| flag.to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Prompt for confirmation, auto-approving if `--yes` was passed.
pub fn confirm(message: &str, yes_flag: bool) -> Result<bool, CliError> {
    if yes_flag {
        return Ok(true);
    }
    let confirmed = dialoguer::Confirm::new()
        .with_prompt(message)
        .default(false)
        .interact()
        .map_err(|e| CliError::Io(std::io::Error::other(e)))?;
    Ok(confirmed)
}

/// Parse an inline JSON object argument.
pub fn parse_object(field: &str, raw: &str) -> Result<Map<String, Value>, CliError> {
    match serde_json::from_str(raw)? {
        Value::Object(map) => Ok(map),
        other => Err(CliError::Validation {
            field: field.into(),
            reason: format!("expected a JSON object, got {other}"),
        }),
    }
}

/// Read and parse a JSON object file for `--from-file` flags.
pub fn read_json_file(path: &Path) -> Result<Map<String, Value>, CliError> {
    let contents = std::fs::read_to_string(path)?;
    parse_object("from-file", &contents)
}
