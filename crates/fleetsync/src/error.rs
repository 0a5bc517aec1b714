//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` variants into user-facing errors
//! with actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use fleetsync_config::ConfigError;
use fleetsync_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONFLICT: i32 = 6;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────
    #[error("Could not connect to {url}")]
    #[diagnostic(
        code(fleetsync::connection_failed),
        help(
            "Check that the service is running and reachable.\n\
             Reason: {reason}"
        )
    )]
    ConnectionFailed { url: String, reason: String },

    #[error("{method} timed out after {timeout_ms}ms")]
    #[diagnostic(
        code(fleetsync::timeout),
        help("Increase timeout with --timeout or check service responsiveness.")
    )]
    Timeout { method: String, timeout_ms: u64 },

    // ── Authentication ───────────────────────────────────────────────
    #[error("No session configured for profile '{profile}'")]
    #[diagnostic(
        code(fleetsync::no_session),
        help(
            "Store one with: fleetsync config set-session --profile {profile}\n\
             Or set FLEETSYNC_SESSION."
        )
    )]
    NoSession { profile: String },

    // ── Entities ─────────────────────────────────────────────────────
    #[error("{model} '{key}' not found")]
    #[diagnostic(
        code(fleetsync::not_found),
        help("Run: fleetsync fetch {model} to see available keys")
    )]
    NotFound { model: String, key: String },

    #[error("Unknown model '{model}'")]
    #[diagnostic(
        code(fleetsync::unknown_model),
        help("Run: fleetsync models to see the known models")
    )]
    UnknownModel { model: String },

    #[error("{message}")]
    #[diagnostic(
        code(fleetsync::conflict),
        help("Wait for the running action to finish and try again.")
    )]
    Conflict { message: String },

    // ── Service ──────────────────────────────────────────────────────
    #[error("Service rejected the request: {message}")]
    #[diagnostic(code(fleetsync::rejected))]
    Rejected { message: String },

    // ── Validation ───────────────────────────────────────────────────
    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(fleetsync::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────
    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(fleetsync::profile_not_found),
        help("Available profiles: {available}")
    )]
    ProfileNotFound { name: String, available: String },

    #[error("No service URL configured")]
    #[diagnostic(
        code(fleetsync::no_config),
        help(
            "Pass --url, set FLEETSYNC_URL, or add a profile to:\n\
             {path}"
        )
    )]
    NoConfig { path: String },

    #[error(transparent)]
    #[diagnostic(code(fleetsync::config))]
    Config(ConfigError),

    // ── Interactive ──────────────────────────────────────────────────
    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(fleetsync::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── IO / Serialization ───────────────────────────────────────────
    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Invalid JSON payload: {0}")]
    #[diagnostic(code(fleetsync::json), help("Check the JSON contents and try again."))]
    Json(#[from] serde_json::Error),

    #[error("Internal error: {0}")]
    #[diagnostic(code(fleetsync::internal))]
    Internal(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::NoSession { .. } => exit_code::AUTH,
            Self::NotFound { .. } | Self::UnknownModel { .. } | Self::ProfileNotFound { .. } => {
                exit_code::NOT_FOUND
            }
            Self::Conflict { .. } => exit_code::CONFLICT,
            Self::Validation { .. } | Self::NoConfig { .. } | Self::NonInteractiveRequiresYes { .. } => {
                exit_code::USAGE
            }
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::ValidationFailed { .. } => CliError::Validation {
                field: "input".into(),
                reason: err.to_string(),
            },
            CoreError::Rejected { message } => CliError::Rejected { message },
            CoreError::ActionConflict { .. } => CliError::Conflict {
                message: err.to_string(),
            },
            CoreError::NotFound { model, key } => CliError::NotFound { model, key },
            CoreError::UnknownModel { model } => CliError::UnknownModel { model },
            CoreError::Connection { reason } => CliError::ConnectionFailed {
                url: "(current session)".into(),
                reason,
            },
            CoreError::Timeout { method, timeout_ms } => CliError::Timeout { method, timeout_ms },
            CoreError::Config { message } => CliError::Validation {
                field: "config".into(),
                reason: message,
            },
            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::NoCredentials { profile } => CliError::NoSession { profile },
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            other => CliError::Config(other),
        }
    }
}
