// ── Core error types ──
//
// User-facing errors from fleetsync-core. Consumers never see raw frames
// or codec failures: the `From<fleetsync_api::Error>` impl folds every
// transport-layer problem into a connection error, and service error
// payloads are sorted into field validation vs. plain rejection.

use std::collections::BTreeMap;
use std::fmt::Write as _;

use thiserror::Error;

use crate::model::{ErrorPayload, PrimaryKey};
use crate::store::StatusFlag;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Service-reported errors ──────────────────────────────────────
    #[error("Validation failed: {}", format_fields(fields))]
    ValidationFailed {
        fields: BTreeMap<String, Vec<String>>,
    },

    #[error("Operation rejected by service: {message}")]
    Rejected { message: String },

    // ── Local guards ─────────────────────────────────────────────────
    #[error("{model} {key} is already {flag}")]
    ActionConflict {
        model: String,
        key: PrimaryKey,
        flag: StatusFlag,
    },

    #[error("{model} '{key}' not found")]
    NotFound { model: String, key: String },

    #[error("Unknown model: {model}")]
    UnknownModel { model: String },

    // ── Connection errors ────────────────────────────────────────────
    #[error("Connection lost: {reason}")]
    Connection { reason: String },

    #[error("{method} timed out after {timeout_ms}ms")]
    Timeout { method: String, timeout_ms: u64 },

    // ── Configuration errors ─────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal errors ──────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// A single-field validation failure raised locally.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ValidationFailed {
            fields: BTreeMap::from([(field.into(), vec![message.into()])]),
        }
    }

    pub fn not_found(model: &str, key: impl ToString) -> Self {
        Self::NotFound {
            model: model.to_owned(),
            key: key.to_string(),
        }
    }

    pub fn disconnected() -> Self {
        Self::Connection {
            reason: "not connected".into(),
        }
    }

    /// Returns `true` for errors caused by the connection rather than
    /// by the request itself.
    pub fn is_connection(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout { .. })
    }
}

fn format_fields(fields: &BTreeMap<String, Vec<String>>) -> String {
    let mut out = String::new();
    for (i, (field, messages)) in fields.iter().enumerate() {
        if i > 0 {
            out.push_str("; ");
        }
        let _ = write!(out, "{field}: {}", messages.join(", "));
    }
    out
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<fleetsync_api::Error> for CoreError {
    fn from(err: fleetsync_api::Error) -> Self {
        match err {
            fleetsync_api::Error::InvalidUrl(e) => Self::Config {
                message: format!("Invalid URL: {e}"),
            },
            fleetsync_api::Error::Codec(e) => Self::Internal(format!("frame encoding failed: {e}")),
            other => Self::Connection {
                reason: other.to_string(),
            },
        }
    }
}

// ── Conversion from service error payloads ───────────────────────────

impl From<ErrorPayload> for CoreError {
    fn from(payload: ErrorPayload) -> Self {
        match payload {
            ErrorPayload::Fields(fields) => Self::ValidationFailed { fields },
            other => Self::Rejected {
                message: other.to_string(),
            },
        }
    }
}
