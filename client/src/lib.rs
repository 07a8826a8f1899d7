//! # Replicant Client
//! A client-side replication engine: keeps a local, subscription-scoped
//! replica of server-owned entities consistent with an ordered stream of
//! change messages, while reconciling the application's areas of interest
//! with the subscriptions the server has active.

#![deny(trivial_numeric_casts, unstable_features, unused_import_braces)]

pub use replicant_shared as shared;

mod area_of_interest;
mod config;
mod connection;
mod connector;
mod error;
mod events;
mod runtime;
mod transport;
mod world;

pub use area_of_interest::{
    remove_explicit_subscriptions, remove_unneeded_add_requests, remove_unneeded_remove_requests,
    remove_unneeded_update_requests, AreaOfInterestAction, AreaOfInterestRequest,
};
pub use config::{ConnectorConfig, RateLimitConfig, RuntimeConfig};
pub use connection::{CompletionAction, Connection, MessageResponse, RequestEntry, RequestId};
pub use connector::Connector;
pub use error::{
    ChannelActionError, ConnectorError, EntityChangeError, InvariantError, RuntimeError,
};
pub use events::{ConnectorEvent, ConnectorListener, EventBroker, MessageStats};
pub use runtime::{aggregate_state, ConnectorEntry, Runtime, RuntimeEvent};
pub use transport::{CacheEntry, CacheService, RequestCompletion, Transport, TransportContext};
pub use world::{
    ChangeMapper, Disposable, DisposedSubscription, Entity, EntityLookup, Linkable, Replica,
    ReplicaError, ReplicaRegistry, Subscription, Verifiable,
};
