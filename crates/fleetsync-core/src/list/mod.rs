// ── List projections ──
//
// Descriptors, filter parsing, value ordering and the materialized list
// views kept inside each model's state.

mod filter;
mod order;
mod query;
mod view;

pub use filter::{FilterExpr, FilterTerm};
pub use query::{ListId, ListMode, ListQuery, SortDirection};
pub use view::{ListGroup, ListView, UNKNOWN_GROUP};

pub(crate) use view::ServerPage;
