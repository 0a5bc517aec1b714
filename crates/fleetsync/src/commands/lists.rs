//! List and watch command handlers.

use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tabled::Tabled;

use fleetsync_core::{
    Entity, ListGroup, ListMode, ListQuery, ModelSchema, ModelState, PollFactory, PollRequest,
    SortDirection, SyncEngine,
};

use crate::cli::{GlobalOpts, ListArgs, OutputFormat, WatchArgs};
use crate::error::CliError;
use crate::output;

use super::util;

// ── Table row ───────────────────────────────────────────────────────

#[derive(Clone, Serialize, Tabled)]
struct ListRow {
    #[tabled(rename = "Group")]
    group: String,
    #[tabled(rename = "Key")]
    key: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Status")]
    status: String,
}

/// Structured output for one page.
#[derive(Serialize)]
struct ListPage<'a> {
    count: usize,
    cur_page: usize,
    num_pages: usize,
    groups: &'a [ListGroup],
    items: Vec<&'a Entity>,
}

// ── List ────────────────────────────────────────────────────────────

pub async fn list(engine: &SyncEngine, args: ListArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let schema = engine.schema(&args.model)?;
    let query = build_query(&args)?;
    let mode = if args.server {
        ListMode::Server
    } else {
        // Local lists project the cache, so fill it first.
        engine.fetch(&args.model).await?;
        ListMode::Local
    };

    let list_id = engine.list(&args.model, query, mode).await?;
    let state = engine.snapshot(&args.model)?;
    let rendered = render_page(&state, &list_id, &schema, global);
    engine.clear_list(&args.model, &list_id)?;

    let (out, footer) = rendered?;
    output::print_output(&out, global.quiet);
    if matches!(global.output, OutputFormat::Table) {
        output::print_note(&footer, global.quiet);
    }
    Ok(())
}

fn build_query(args: &ListArgs) -> Result<ListQuery, CliError> {
    let mut query = ListQuery::new()
        .filter(args.filter.clone())
        .page(to_usize("page", args.page)?);
    if let Some(size) = args.page_size {
        query = query.page_size(to_usize("page-size", size)?);
    }
    if let Some(ref group) = args.group_by {
        query = query.group_by(group.clone());
        for name in &args.collapse {
            query = query.collapse(name.clone());
        }
    }
    if let Some(ref sort) = args.sort {
        let direction = if args.desc {
            SortDirection::Descending
        } else {
            SortDirection::Ascending
        };
        query = query.sort_by(sort.clone(), direction);
    }
    Ok(query)
}

fn to_usize(field: &str, value: u64) -> Result<usize, CliError> {
    usize::try_from(value).map_err(|_| CliError::Validation {
        field: field.into(),
        reason: format!("{value} is too large"),
    })
}

fn render_page(
    state: &ModelState,
    list_id: &fleetsync_core::ListId,
    schema: &ModelSchema,
    global: &GlobalOpts,
) -> Result<(String, String), CliError> {
    let view = state
        .list(list_id)
        .ok_or_else(|| CliError::Internal(format!("list {list_id} vanished")))?;
    let footer = format!(
        "page {}/{} · {} {}",
        view.cur_page,
        view.num_pages.max(1),
        view.count,
        schema.name()
    );

    let out = match global.output {
        OutputFormat::Table | OutputFormat::Plain => {
            let color = output::should_color(&global.color);
            let rows = page_rows(state, &view.groups, schema, color);
            let rows: Vec<ListRow> = if matches!(global.output, OutputFormat::Plain) {
                rows.into_iter().filter(|r| !r.key.is_empty()).collect()
            } else {
                rows
            };
            output::render_list(&global.output, &rows, Clone::clone, |r| r.key.clone())?
        }
        _ => {
            let page = ListPage {
                count: view.count,
                cur_page: view.cur_page,
                num_pages: view.num_pages,
                groups: &view.groups,
                items: state.list_entities(list_id),
            };
            output::render_single(&global.output, &page, |_| String::new(), |_| String::new())?
        }
    };
    Ok((out, footer))
}

/// Flatten groups into rows: one header per named group, then members.
fn page_rows(
    state: &ModelState,
    groups: &[ListGroup],
    schema: &ModelSchema,
    color: bool,
) -> Vec<ListRow> {
    let mut rows = Vec::new();
    for group in groups {
        if let Some(ref name) = group.name {
            let count = group.count.map(|c| format!(" ({c})")).unwrap_or_default();
            let marker = if group.collapsed { "▸" } else { "▾" };
            rows.push(ListRow {
                group: output::paint_group(&format!("{marker} {name}{count}"), color),
                key: String::new(),
                name: String::new(),
                status: String::new(),
            });
        }
        for key in &group.keys {
            let Some(entity) = state.get(key) else {
                continue;
            };
            rows.push(ListRow {
                group: String::new(),
                key: key.to_string(),
                name: util::display_name(entity, schema),
                status: output::paint_status(&util::status_label(state, key), color),
            });
        }
    }
    rows
}

// ── Watch ───────────────────────────────────────────────────────────

pub async fn watch(engine: &SyncEngine, args: WatchArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let schema = engine.schema(&args.model)?;
    let mut stream = engine.subscribe(&args.model)?;
    let initial = engine.fetch(&args.model).await?;
    print_snapshot(&initial, &schema, global)?;

    let poll_id = format!("cli.watch.{}", args.model);
    if let Some(interval) = args.poll {
        let model = args.model.clone();
        let factory: PollFactory = Arc::new(move || PollRequest::Fetch {
            model: model.clone(),
        });
        engine.start_poll(poll_id.clone(), factory, interval.into())?;
    }

    let limit = args.duration.map(Duration::from);
    let deadline = async move {
        match limit {
            Some(d) => tokio::time::sleep(d).await,
            None => std::future::pending::<()>().await,
        }
    };
    tokio::pin!(deadline);

    let mut last_revision = initial.revision();
    loop {
        tokio::select! {
            biased;
            _ = tokio::signal::ctrl_c() => break,
            () = &mut deadline => break,
            next = stream.changed() => {
                let Some(state) = next else { break };
                if state.revision() == last_revision {
                    continue;
                }
                last_revision = state.revision();
                print_snapshot(&state, &schema, global)?;
            }
        }
    }

    engine.stop_poll(&poll_id);
    Ok(())
}

fn print_snapshot(state: &ModelState, schema: &ModelSchema, global: &GlobalOpts) -> Result<(), CliError> {
    let entities: Vec<&Entity> = state.entities().collect();
    let out = match global.output {
        // One line per snapshot keeps the stream greppable.
        OutputFormat::Json | OutputFormat::JsonCompact => serde_json::to_string(&entities)?,
        _ => {
            let color = output::should_color(&global.color);
            output::render_list(
                &global.output,
                &entities,
                |e| super::entities::EntityRow::new(e, schema, state, color),
                |e| e.key().to_string(),
            )?
        }
    };
    output::print_note(
        &format!(
            "── {} · revision {} · {} entities{} ──",
            schema.name(),
            state.revision(),
            state.len(),
            if state.loading { " · loading" } else { "" }
        ),
        global.quiet,
    );
    output::print_output(&out, global.quiet);
    Ok(())
}
