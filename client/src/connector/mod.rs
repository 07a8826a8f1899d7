mod lifecycle;
mod pipeline;
mod requests;

use std::{
    collections::{BTreeMap, VecDeque},
    sync::{
        atomic::{AtomicU64, Ordering},
        mpsc::{self, Receiver, Sender},
        Arc,
    },
};

use log::{debug, info};
use serde_json::Value;

use replicant_shared::{ChannelAddress, ConnectorState, SystemSchema};

use crate::{
    area_of_interest::AreaOfInterestRequest,
    config::ConnectorConfig,
    connection::{Connection, RequestId},
    error::ConnectorError,
    events::{ConnectorEvent, ConnectorListener, EventBroker, MessageStats},
    transport::{CacheService, Transport, TransportEvent},
    world::{ChangeMapper, DisposedSubscription, ReplicaRegistry},
};

/// Replicates one system: drives the connection lifecycle, reconciles the
/// application's areas of interest with the server and applies inbound change
/// messages to the local replica, one bounded step per tick.
pub struct Connector {
    schema: SystemSchema,
    config: ConnectorConfig,
    state: ConnectorState,
    transport: Box<dyn Transport>,
    change_mapper: Box<dyn ChangeMapper>,
    cache: Option<Box<dyn CacheService>>,
    registry: ReplicaRegistry,
    connection: Option<Connection>,
    area_of_interest_requests: VecDeque<AreaOfInterestRequest>,
    desired_areas_of_interest: BTreeMap<ChannelAddress, Option<Value>>,
    events: EventBroker,
    post_message_response_hook: Option<Box<dyn FnMut(&MessageStats)>>,
    transport_sender: Sender<TransportEvent>,
    transport_receiver: Receiver<TransportEvent>,
    last_rx_sequence: Arc<AtomicU64>,
    next_request_id: u64,
    disposed: bool,
}

impl Connector {
    pub fn new(
        schema: SystemSchema,
        config: ConnectorConfig,
        transport: Box<dyn Transport>,
        change_mapper: Box<dyn ChangeMapper>,
    ) -> Self {
        let (transport_sender, transport_receiver) = mpsc::channel();
        Self {
            schema,
            config,
            state: ConnectorState::Disconnected,
            transport,
            change_mapper,
            cache: None,
            registry: ReplicaRegistry::new(),
            connection: None,
            area_of_interest_requests: VecDeque::new(),
            desired_areas_of_interest: BTreeMap::new(),
            events: EventBroker::new(),
            post_message_response_hook: None,
            transport_sender,
            transport_receiver,
            last_rx_sequence: Arc::new(AtomicU64::new(0)),
            next_request_id: 0,
            disposed: false,
        }
    }

    /// Attach a cache so subscribe payloads on cacheable channels can be
    /// answered by etag
    pub fn with_cache(mut self, cache: Box<dyn CacheService>) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn schema(&self) -> &SystemSchema {
        &self.schema
    }

    pub fn schema_id(&self) -> i32 {
        self.schema.id()
    }

    pub fn config(&self) -> &ConnectorConfig {
        &self.config
    }

    pub fn state(&self) -> ConnectorState {
        self.state
    }

    pub fn registry(&self) -> &ReplicaRegistry {
        &self.registry
    }

    pub fn connection(&self) -> Option<&Connection> {
        self.connection.as_ref()
    }

    pub fn connection_mut(&mut self) -> Option<&mut Connection> {
        self.connection.as_mut()
    }

    /// Sequence of the last in-band change message committed on the current
    /// connection
    pub fn last_rx_sequence(&self) -> u64 {
        self.last_rx_sequence.load(Ordering::Acquire)
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    // Events

    pub fn add_listener(&mut self, listener: impl ConnectorListener + 'static) {
        self.events.add_listener(Box::new(listener));
    }

    /// Drains every event delivered since the last call
    pub fn take_events(&mut self) -> Vec<ConnectorEvent> {
        self.events.take_events()
    }

    /// Run after every committed change message
    pub fn set_post_message_response_hook(&mut self, hook: impl FnMut(&MessageStats) + 'static) {
        self.post_message_response_hook = Some(Box::new(hook));
    }

    // Scheduling

    /// Advances the connector by one bounded unit of work. Returns whether
    /// anything happened, so a driver can keep ticking until idle.
    ///
    /// Listeners see none of the events emitted during the tick until it ends.
    pub fn tick(&mut self) -> Result<bool, ConnectorError> {
        if self.disposed {
            return Ok(false);
        }
        self.events.acquire_lock();
        let result = self.tick_locked();
        self.events.release_lock();
        result
    }

    fn tick_locked(&mut self) -> Result<bool, ConnectorError> {
        let mut worked = self.process_transport_events()?;
        if self.state == ConnectorState::Connected {
            worked |= self.progress_area_of_interest_requests()?;
            worked |= self.progress_response_processing()?;
        }
        Ok(worked)
    }

    /// Tears down all replicated state. Later ticks do nothing and later
    /// lifecycle calls fail. Safe to call more than once.
    pub fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        info!("Disposing connector for schema {}", self.schema.name());
        self.disposed = true;
        self.dispose_subscriptions();
        self.connection = None;
        self.area_of_interest_requests.clear();
        self.desired_areas_of_interest.clear();
        self.set_state(ConnectorState::Disconnected);
    }

    // Internals shared by the submodules

    fn emit(&mut self, event: ConnectorEvent) {
        self.events.emit(event);
    }

    fn set_state(&mut self, state: ConnectorState) {
        if self.state == state {
            return;
        }
        debug!(
            "Connector {} state {} -> {}",
            self.schema.name(),
            self.state,
            state
        );
        self.state = state;
        self.emit(ConnectorEvent::StateChanged(state));
    }

    fn next_request_id(&mut self) -> RequestId {
        self.next_request_id += 1;
        RequestId::new(self.next_request_id.to_string())
    }

    fn emit_disposed(&mut self, disposed: DisposedSubscription) {
        for key in disposed.disposed_entities {
            self.emit(ConnectorEvent::EntityDisposed(key));
        }
        self.emit(ConnectorEvent::SubscriptionDisposed(disposed.address));
    }

    fn dispose_subscriptions(&mut self) {
        for disposed in self.registry.dispose_all() {
            self.emit_disposed(disposed);
        }
    }
}
