//! Entity command handlers: fetch, get, count, create, update, delete,
//! action.

use serde_json::Value;
use tabled::Tabled;

use fleetsync_core::{Entity, ModelParams, ModelSchema, ModelState, SyncEngine};

use crate::cli::{ActionArgs, CountArgs, DeleteArgs, GlobalOpts, KeyArgs, ModelArg, WriteArgs};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Tabled)]
pub(super) struct EntityRow {
    #[tabled(rename = "Key")]
    pub key: String,
    #[tabled(rename = "Name")]
    pub name: String,
    #[tabled(rename = "Status")]
    pub status: String,
}

impl EntityRow {
    pub fn new(entity: &Entity, schema: &ModelSchema, state: &ModelState, color: bool) -> Self {
        Self {
            key: entity.key().to_string(),
            name: util::display_name(entity, schema),
            status: output::paint_status(&util::status_label(state, entity.key()), color),
        }
    }
}

fn entity_detail(entity: &Entity) -> String {
    let pairs: Vec<(String, String)> = entity
        .fields()
        .iter()
        .map(|(field, value)| {
            let shown = match value {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            (field.clone(), shown)
        })
        .collect();
    output::render_detail(&pairs)
}

// ── Handlers ────────────────────────────────────────────────────────

pub async fn fetch(engine: &SyncEngine, args: ModelArg, global: &GlobalOpts) -> Result<(), CliError> {
    let schema = engine.schema(&args.model)?;
    let state = engine.fetch(&args.model).await?;
    let entities: Vec<Entity> = state.entities().cloned().collect();
    let color = output::should_color(&global.color);

    let out = output::render_list(
        &global.output,
        &entities,
        |e| EntityRow::new(e, &schema, &state, color),
        |e| e.key().to_string(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn get(engine: &SyncEngine, args: KeyArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let key = util::parse_key(&args.key);
    let entity = engine.get(&args.model, &key).await?;
    let out = output::render_single(&global.output, &entity, entity_detail, |e| {
        e.key().to_string()
    })?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn count(engine: &SyncEngine, args: CountArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let total = engine.count(&args.model, &args.filter).await?;
    let out = output::render_single(&global.output, &total, u64::to_string, u64::to_string)?;
    output::print_output(&out, global.quiet);
    Ok(())
}

pub async fn create(engine: &SyncEngine, args: WriteArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let schema = engine.schema(&args.model)?;
    let params = write_params(&args)?;
    let created = engine.create(&args.model, params).await?;
    print_written(&created, &schema, global)
}

pub async fn update(engine: &SyncEngine, args: WriteArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let schema = engine.schema(&args.model)?;
    let params = write_params(&args)?;

    // Seed the cache so an optimistic patch has something to apply to.
    engine.fetch(&args.model).await?;
    let updated = engine.update(&args.model, params).await?;
    print_written(&updated, &schema, global)
}

pub async fn delete(engine: &SyncEngine, args: DeleteArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let prompt = format!("Delete {} {}?", args.keys.len(), args.model);
    if !util::confirm(&prompt, global.yes)? {
        return Ok(());
    }

    // Seed the cache so delete flags land on known entities.
    engine.fetch(&args.model).await?;
    for raw in &args.keys {
        let key = util::parse_key(raw);
        engine.delete(&args.model, &key).await?;
        output::print_note(&format!("Deleted {} {key}", args.model), global.quiet);
    }
    Ok(())
}

pub async fn action(engine: &SyncEngine, args: ActionArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let key = util::parse_key(&args.key);
    let extra = args
        .extra
        .as_deref()
        .map(|raw| util::parse_object("extra", raw))
        .transpose()?;

    engine.fetch(&args.model).await?;
    let result = engine.action(&args.model, &key, &args.verb, extra).await?;
    let out = output::render_single(&global.output, &result, Value::to_string, |_| key.to_string())?;
    output::print_output(&out, global.quiet);
    Ok(())
}

fn print_written(record: &Value, schema: &ModelSchema, global: &GlobalOpts) -> Result<(), CliError> {
    let out = output::render_single(
        &global.output,
        record,
        |v| match schema.entity(v.clone()) {
            Some(entity) => entity_detail(&entity),
            None => v.to_string(),
        },
        |v| schema.key_of(v).map(|k| k.to_string()).unwrap_or_default(),
    )?;
    output::print_output(&out, global.quiet);
    Ok(())
}

fn write_params(args: &WriteArgs) -> Result<ModelParams, CliError> {
    let map = match (&args.data, &args.from_file) {
        (Some(raw), _) => util::parse_object("data", raw)?,
        (None, Some(path)) => util::read_json_file(path)?,
        (None, None) => {
            return Err(CliError::Validation {
                field: "data".into(),
                reason: "pass --data or --from-file".into(),
            });
        }
    };
    Ok(ModelParams::Raw(map))
}
