//! Command dispatch: bridges CLI args -> engine operations -> output formatting.

pub mod config_cmd;
pub mod entities;
pub mod lists;
pub mod models;
pub mod util;

use fleetsync_core::SyncEngine;

use crate::cli::{Command, GlobalOpts};
use crate::error::CliError;

/// Route a connected command to its handler.
pub async fn dispatch(
    cmd: Command,
    engine: &SyncEngine,
    global: &GlobalOpts,
) -> Result<(), CliError> {
    match cmd {
        Command::Fetch(args) => entities::fetch(engine, args, global).await,
        Command::Get(args) => entities::get(engine, args, global).await,
        Command::Count(args) => entities::count(engine, args, global).await,
        Command::Create(args) => entities::create(engine, args, global).await,
        Command::Update(args) => entities::update(engine, args, global).await,
        Command::Delete(args) => entities::delete(engine, args, global).await,
        Command::Action(args) => entities::action(engine, args, global).await,
        Command::List(args) => lists::list(engine, args, global).await,
        Command::Watch(args) => lists::watch(engine, args, global).await,
        Command::Models | Command::Config(_) | Command::Completions(_) => Err(CliError::Internal(
            "local command routed to the connected dispatcher".into(),
        )),
    }
}
