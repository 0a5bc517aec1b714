//! Built-in model listing. Needs no connection.

use serde::Serialize;
use tabled::Tabled;

use fleetsync_core::model::builtin_schemas;

use crate::cli::GlobalOpts;
use crate::error::CliError;
use crate::output;

#[derive(Serialize)]
struct ModelInfo {
    name: String,
    primary_key: String,
    server_lists: bool,
    remote_active: bool,
    verbs: Vec<String>,
}

#[derive(Tabled)]
struct ModelRow {
    #[tabled(rename = "Model")]
    name: String,
    #[tabled(rename = "Key")]
    primary_key: String,
    #[tabled(rename = "Server lists")]
    server_lists: String,
    #[tabled(rename = "Actions")]
    verbs: String,
}

impl From<&ModelInfo> for ModelRow {
    fn from(m: &ModelInfo) -> Self {
        Self {
            name: m.name.clone(),
            primary_key: m.primary_key.clone(),
            server_lists: if m.server_lists { "yes".into() } else { String::new() },
            verbs: m.verbs.join(", "),
        }
    }
}

pub fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let models: Vec<ModelInfo> = builtin_schemas()
        .iter()
        .map(|schema| ModelInfo {
            name: schema.name().to_owned(),
            primary_key: schema.primary_key().to_owned(),
            server_lists: schema.supports_server_lists(),
            remote_active: schema.has_remote_active(),
            verbs: schema.verbs().map(|(verb, _)| verb.to_owned()).collect(),
        })
        .collect();

    let out = output::render_list(&global.output, &models, |m| ModelRow::from(m), |m| m.name.clone())?;
    output::print_output(&out, global.quiet);
    Ok(())
}
