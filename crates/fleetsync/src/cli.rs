//! Clap derive structures for the `fleetsync` CLI.
//!
//! Defines the command tree, global flags, and shared types.

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};

// ── Top-Level CLI ────────────────────────────────────────────────────

/// fleetsync -- inspect and drive a live entity sync session
#[derive(Debug, Parser)]
#[command(
    name = "fleetsync",
    version,
    about = "Fetch, list and act on fleet entities from the command line",
    long_about = "A thin consumer of the fleetsync engine.\n\n\
        Connects to the service websocket, keeps a normalized cache per model,\n\
        and renders entities, live lists and action results.",
    propagate_version = true,
    subcommand_required = true,
    arg_required_else_help = true
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalOpts,

    #[command(subcommand)]
    pub command: Command,
}

// ── Global Options ───────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct GlobalOpts {
    /// Service profile to use
    #[arg(long, short = 'p', env = "FLEETSYNC_PROFILE", global = true)]
    pub profile: Option<String>,

    /// Service websocket URL (overrides profile)
    #[arg(long, short = 'u', env = "FLEETSYNC_URL", global = true)]
    pub url: Option<String>,

    /// Session token (overrides profile and keyring)
    #[arg(long, env = "FLEETSYNC_SESSION", global = true, hide_env = true)]
    pub session: Option<String>,

    /// Output format
    #[arg(
        long,
        short = 'o',
        env = "FLEETSYNC_OUTPUT",
        default_value = "table",
        global = true
    )]
    pub output: OutputFormat,

    /// When to use color output
    #[arg(long, default_value = "auto", global = true)]
    pub color: ColorMode,

    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(long, short = 'v', action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Emit logs as JSON lines on stderr
    #[arg(long, global = true)]
    pub log_json: bool,

    /// Suppress non-error output
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    /// Skip confirmation prompts
    #[arg(long, short = 'y', global = true)]
    pub yes: bool,

    /// Request timeout in seconds (overrides profile)
    #[arg(long, env = "FLEETSYNC_TIMEOUT", global = true)]
    pub timeout: Option<u64>,
}

// ── Output & Color Enums ─────────────────────────────────────────────

#[derive(Debug, Clone, ValueEnum)]
pub enum OutputFormat {
    /// Pretty table (default, interactive)
    Table,
    /// Pretty-printed JSON
    Json,
    /// Compact single-line JSON
    JsonCompact,
    /// YAML
    Yaml,
    /// Plain text, one key per line (scripting)
    Plain,
}

#[derive(Debug, Clone, ValueEnum)]
pub enum ColorMode {
    /// Auto-detect (color if terminal is interactive)
    Auto,
    /// Always emit color codes
    Always,
    /// Never emit color codes
    Never,
}

// ── Top-Level Command Enum ───────────────────────────────────────────

#[derive(Debug, Subcommand)]
pub enum Command {
    /// List the models this build knows about
    Models,

    /// Fetch every entity of a model
    #[command(alias = "ls-all")]
    Fetch(ModelArg),

    /// Show one entity
    Get(KeyArgs),

    /// Show a filtered, grouped, sorted page of a model
    #[command(alias = "ls")]
    List(ListArgs),

    /// Follow a model's cache as notifications arrive
    Watch(WatchArgs),

    /// Count entities matching a filter on the service
    Count(CountArgs),

    /// Create an entity from a JSON object
    Create(WriteArgs),

    /// Update an entity from a JSON object (must carry the primary key)
    Update(WriteArgs),

    /// Delete one or more entities
    #[command(alias = "rm")]
    Delete(DeleteArgs),

    /// Run a per-entity action (deploy, lock, refresh, ...)
    Action(ActionArgs),

    /// Manage CLI configuration and profiles
    Config(ConfigArgs),

    /// Generate shell completions
    Completions(CompletionsArgs),
}

// ── Entity Arguments ─────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ModelArg {
    /// Model name (machine, controller, domain, pod, user, zone)
    pub model: String,
}

#[derive(Debug, Args)]
pub struct KeyArgs {
    /// Model name
    pub model: String,

    /// Primary key (integers are parsed as integer keys)
    pub key: String,
}

#[derive(Debug, Args)]
pub struct ListArgs {
    /// Model name
    pub model: String,

    /// Filter text (`term`, `field:value`, `!term`)
    #[arg(long, short = 'f', default_value = "")]
    pub filter: String,

    /// Field (or dotted path) to group by
    #[arg(long, short = 'g')]
    pub group_by: Option<String>,

    /// Group names to collapse (repeatable)
    #[arg(long, requires = "group_by")]
    pub collapse: Vec<String>,

    /// Field (or dotted path) to sort by
    #[arg(long, short = 's')]
    pub sort: Option<String>,

    /// Sort descending
    #[arg(long, requires = "sort")]
    pub desc: bool,

    /// Page number (1-based)
    #[arg(long, default_value = "1", value_parser = clap::value_parser!(u64).range(1..))]
    pub page: u64,

    /// Items per page (defaults to the profile's page size)
    #[arg(long, short = 'l', value_parser = clap::value_parser!(u64).range(1..))]
    pub page_size: Option<u64>,

    /// Let the service compute the page instead of the local cache
    #[arg(long)]
    pub server: bool,
}

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Model name
    pub model: String,

    /// Re-fetch on this interval (e.g. `30s`) in addition to notifications
    #[arg(long)]
    pub poll: Option<humantime::Duration>,

    /// Stop after this long (e.g. `5m`); runs until Ctrl-C otherwise
    #[arg(long)]
    pub duration: Option<humantime::Duration>,
}

#[derive(Debug, Args)]
pub struct CountArgs {
    /// Model name
    pub model: String,

    /// Filter text
    #[arg(long, short = 'f', default_value = "")]
    pub filter: String,
}

#[derive(Debug, Args)]
pub struct WriteArgs {
    /// Model name
    pub model: String,

    /// Inline JSON object
    #[arg(long, short = 'd', conflicts_with = "from_file", required_unless_present = "from_file")]
    pub data: Option<String>,

    /// Read the JSON object from a file
    #[arg(long, short = 'F')]
    pub from_file: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct DeleteArgs {
    /// Model name
    pub model: String,

    /// Primary keys
    #[arg(required = true)]
    pub keys: Vec<String>,
}

#[derive(Debug, Args)]
pub struct ActionArgs {
    /// Model name
    pub model: String,

    /// Primary key
    pub key: String,

    /// Verb declared by the model (e.g. deploy, lock, refresh)
    pub verb: String,

    /// Extra parameters as an inline JSON object
    #[arg(long, short = 'd')]
    pub extra: Option<String>,
}

// ── Config ───────────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub command: ConfigCommand,
}

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Print the config file path
    Path,

    /// Show the resolved configuration (sessions redacted)
    Show,

    /// List configured profiles
    Profiles,

    /// Store a session token in the system keyring
    SetSession {
        /// Token; prompted for when omitted
        #[arg(long)]
        token: Option<String>,
    },
}

// ── Completions ──────────────────────────────────────────────────────

#[derive(Debug, Args)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    pub shell: clap_complete::Shell,
}
