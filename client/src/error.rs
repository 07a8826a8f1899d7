use thiserror::Error;

use replicant_shared::{ChangeSetError, ChannelAddress, EntityKey, RateLimitError, SchemaError};

use crate::{area_of_interest::AreaOfInterestAction, connection::RequestId};

/// Programmer-error class violations of the replication invariants
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum InvariantError {
    /// A request of the wrong kind was handed to an action-specific step
    #[error("Expected a {expected:?} request for {address} but got {actual:?}")]
    UnexpectedRequestAction {
        address: ChannelAddress,
        expected: AreaOfInterestAction,
        actual: AreaOfInterestAction,
    },

    /// Subscribe requested for an address already explicitly subscribed
    #[error("Duplicate subscribe for {address}: an explicit subscription already exists")]
    DuplicateSubscription { address: ChannelAddress },

    /// Unsubscribe requested for an address with no subscription
    #[error("Unsubscribe requested for {address} but no subscription exists")]
    RemoveWithoutSubscription { address: ChannelAddress },

    /// Unsubscribe requested for a subscription the application never asked for
    #[error("Unsubscribe requested for {address} but the subscription is implicit")]
    RemoveOfImplicitSubscription { address: ChannelAddress },

    /// Filter update requested for an address with no subscription
    #[error("Subscription update requested for {address} but no subscription exists")]
    UpdateWithoutSubscription { address: ChannelAddress },

    /// A second live subscription was about to be created for an address
    #[error("A subscription already exists for {address}")]
    SubscriptionAlreadyExists { address: ChannelAddress },

    /// Change message referenced a request this connection is not tracking
    #[error("Change message references unknown request {request_id}")]
    UnknownRequest { request_id: RequestId },

    /// Entity was found with no linked subscriptions
    #[error("Entity {key} is not linked to any subscription")]
    OrphanedEntity { key: EntityKey },
}

/// Errors raised while applying the channel actions of a change message
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelActionError {
    #[error("Server removed subscription {address} but no such subscription exists")]
    RemoveWithoutSubscription { address: ChannelAddress },

    #[error("Server updated subscription {address} but no such subscription exists")]
    UpdateWithoutSubscription { address: ChannelAddress },

    #[error("Server updated implicit subscription {address} without an explicit update request")]
    UpdateOnImplicitSubscription { address: ChannelAddress },

    #[error("Channel action targets invalid channel: {0}")]
    Schema(#[from] SchemaError),
}

/// Errors raised while applying the entity changes of a change message
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EntityChangeError {
    #[error("Server removed entity {key} but it does not exist")]
    RemoveOfMissingEntity { key: EntityKey },

    #[error("Entity change for {key} names no channels")]
    NoChannels { key: EntityKey },

    #[error("Change mapper failed for entity {key}: {reason}")]
    Mapper { key: EntityKey, reason: String },

    #[error("Failed to link entity {key}: {reason}")]
    Link { key: EntityKey, reason: String },

    #[error("Entity change targets invalid channel: {0}")]
    Schema(#[from] SchemaError),
}

/// Top-level error returned from Connector operations & ticks
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConnectorError {
    #[error("Invariant violation: {0}")]
    Invariant(#[from] InvariantError),

    #[error("Channel action failed: {0}")]
    ChannelAction(#[from] ChannelActionError),

    #[error("Entity change failed: {0}")]
    EntityChange(#[from] EntityChangeError),

    #[error("Failed to read change message: {0}")]
    MessageRead(#[from] ChangeSetError),

    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Change message sequence was not after the last received sequence
    #[error("Change message sequence {sequence} does not follow last received sequence {last_rx_sequence}")]
    SequenceRegression { sequence: u64, last_rx_sequence: u64 },

    /// Entity self-verification failed after a message was applied
    #[error("Entity {key} failed verification: {reason}")]
    EntityValidation { key: EntityKey, reason: String },

    /// Filter update requested on a channel whose filter is not dynamic
    #[error("Channel {address} does not accept filter updates")]
    FilterNotUpdatable { address: ChannelAddress },

    /// Filter supplied for a channel that takes none
    #[error("Channel {address} does not accept a filter")]
    FilterNotAccepted { address: ChannelAddress },

    /// Operation requires an established connection
    #[error("Connector for schema {schema_id} is not connected")]
    NotConnected { schema_id: i32 },

    #[error("Request {request_id} is not tracked by the connection")]
    UnknownRequest { request_id: RequestId },

    #[error("Connector has been disposed")]
    Disposed,
}

/// Errors returned from the Runtime
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RuntimeError {
    #[error("A connector for schema {system_id} is already registered")]
    DuplicateConnector { system_id: i32 },

    #[error("No connector registered for schema {system_id}")]
    UnknownConnector { system_id: i32 },

    #[error("Invalid rate limit for schema {system_id}: {source}")]
    RateLimit {
        system_id: i32,
        #[source]
        source: RateLimitError,
    },

    #[error("Connector for schema {system_id} failed: {source}")]
    Connector {
        system_id: i32,
        #[source]
        source: ConnectorError,
    },
}
