mod connector_entry;
mod runtime;

pub use connector_entry::ConnectorEntry;
pub use runtime::{aggregate_state, Runtime, RuntimeEvent};
