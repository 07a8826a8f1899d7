//! # Replicant Shared
//! Protocol-level types shared between replicant transports & the replicant-client crate.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

mod change_set;
mod channel;
mod connector_state;
mod rate_limited_value;
mod schema;

pub use change_set::{
    change_set::{ChangeSet, ChannelAction, EntityChange, EntityChannel, EntityData, EntityKey},
    error::ChangeSetError,
};
pub use channel::{
    channel_address::ChannelAddress,
    channel_change::{ChannelActionKind, ChannelChange},
    error::ChannelDescriptorError,
};
pub use connector_state::ConnectorState;
pub use rate_limited_value::{RateLimitError, RateLimitedValue};
pub use schema::{
    error::SchemaError,
    system_schema::{ChannelSchema, EntityTypeSchema, FilterType, SystemSchema},
};
