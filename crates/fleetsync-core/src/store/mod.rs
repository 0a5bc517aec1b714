// ── Entity storage ──
//
// One `EntityStore` per model, all reachable through the `DataStore`
// registry.

mod data_store;
mod entity_store;
mod state;
mod status;

pub use data_store::DataStore;
pub use entity_store::EntityStore;
pub use state::{BulkFlag, EventError, ModelState};
pub use status::{EntityStatus, StatusFlag};
