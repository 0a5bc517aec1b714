mod cli;
mod commands;
mod config;
mod error;
mod output;

use std::sync::Arc;

use clap::Parser;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use fleetsync_api::websocket::{ReconnectConfig, WebSocketTransport};
use fleetsync_core::SyncEngine;

use crate::cli::{Cli, Command};
use crate::error::CliError;

#[tokio::main]
async fn main() {
    // Parse CLI arguments
    let cli = Cli::parse();

    // Setup tracing based on verbosity
    init_tracing(cli.global.verbose, cli.global.log_json);

    // Dispatch and handle errors with proper exit codes
    if let Err(err) = run(cli).await {
        let code = err.exit_code();
        eprintln!("{:?}", miette::Report::new(err));
        std::process::exit(code);
    }
}

fn init_tracing(verbosity: u8, json: bool) {
    let level = match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    let filter = EnvFilter::try_from_env("FLEETSYNC_LOG")
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);
    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

async fn run(cli: Cli) -> Result<(), CliError> {
    match cli.command {
        // Local commands don't need a connection
        Command::Config(args) => commands::config_cmd::handle(args, &cli.global),
        Command::Models => commands::models::handle(&cli.global),

        // Shell completions generation
        Command::Completions(args) => {
            use clap::CommandFactory;
            use clap_complete::generate;

            let mut cmd = Cli::command();
            generate(args.shell, &mut cmd, "fleetsync", &mut std::io::stdout());
            Ok(())
        }

        // All other commands require a live engine
        cmd => {
            let settings = config::resolve_settings(&cli.global)?;
            let url = settings.url.to_string();
            tracing::debug!(profile = %settings.profile, %url, "connecting");

            let cancel = CancellationToken::new();
            let transport = WebSocketTransport::connect(
                settings.url,
                ReconnectConfig::default(),
                cancel.child_token(),
                settings.cookie,
            );
            let engine = SyncEngine::new(settings.engine, Arc::new(transport));
            engine.start().await?;

            let result = match engine.wait_until_connected().await {
                Ok(()) => {
                    tracing::debug!(command = ?cmd, "dispatching command");
                    commands::dispatch(cmd, &engine, &cli.global).await
                }
                Err(e) => Err(CliError::ConnectionFailed {
                    url,
                    reason: e.to_string(),
                }),
            };

            engine.shutdown().await;
            cancel.cancel();
            result
        }
    }
}
