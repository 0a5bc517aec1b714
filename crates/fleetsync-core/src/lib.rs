//! Normalized entity cache and live list projections between
//! `fleetsync-api` and its consumers.
//!
//! - **[`SyncEngine`]**: Central facade. Issues requests through a
//!   [`Transport`](fleetsync_api::Transport), correlates responses,
//!   applies optimistic and confirmed mutations, merges change
//!   notifications, runs polls and keeps list views current.
//!
//! - **[`DataStore`]** / **[`EntityStore`]**: One store per model, created
//!   lazily. Each publishes immutable [`ModelState`] snapshots through a
//!   `tokio::sync::watch` channel.
//!
//! - **[`ModelStream`]**: Subscription handle with `current()` /
//!   `latest()` / `changed()` and a `Stream` adapter.
//!
//! - **Lists** ([`list`]): Filtered, grouped, sorted and paginated views,
//!   computed locally or mirrored from the service.
//!
//! - **Domain model** ([`model`]): Generic [`Entity`] / [`PrimaryKey`] /
//!   [`ModelSchema`] plus the built-in schemas and typed [`ModelParams`].

pub mod config;
pub mod engine;
pub mod error;
pub mod list;
pub mod model;
pub mod store;
pub mod stream;

// ── Primary re-exports ──────────────────────────────────────────────
pub use config::EngineConfig;
pub use engine::{ConnectionState, PollFactory, PollRequest, SyncEngine};
pub use error::CoreError;
pub use list::{ListGroup, ListId, ListMode, ListQuery, ListView, SortDirection};
pub use model::{Entity, ErrorPayload, ModelParams, ModelSchema, PrimaryKey};
pub use store::{
    BulkFlag, DataStore, EntityStatus, EntityStore, EventError, ModelState, StatusFlag,
};
pub use stream::ModelStream;
