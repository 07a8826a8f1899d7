use std::mem;

use log::trace;

use replicant_shared::{ChannelAddress, ConnectorState, EntityKey};

use crate::connection::RequestId;

/// Per-message counters collected while a change message moves through the pipeline
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct MessageStats {
    pub sequence: u64,
    pub request_id: Option<RequestId>,
    pub out_of_band: bool,
    pub channel_add_count: usize,
    pub channel_update_count: usize,
    pub channel_remove_count: usize,
    pub entity_add_count: usize,
    pub entity_update_count: usize,
    pub entity_remove_count: usize,
    pub entity_link_count: usize,
}

/// Domain events emitted by a Connector
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ConnectorEvent {
    StateChanged(ConnectorState),
    Connected,
    ConnectFailure { error: String },
    Disconnected,
    DisconnectFailure { error: String },
    MessageProcessed(MessageStats),
    MessageProcessFailure { error: String },
    MessageReadFailure { error: String },
    SubscribeStarted(ChannelAddress),
    SubscribeCompleted(ChannelAddress),
    SubscribeFailed { address: ChannelAddress, error: String },
    SubscriptionUpdateStarted(ChannelAddress),
    SubscriptionUpdateCompleted(ChannelAddress),
    SubscriptionUpdateFailed { address: ChannelAddress, error: String },
    UnsubscribeStarted(ChannelAddress),
    UnsubscribeCompleted(ChannelAddress),
    UnsubscribeFailed { address: ChannelAddress, error: String },
    SubscriptionCreated(ChannelAddress),
    SubscriptionDisposed(ChannelAddress),
    EntityDisposed(EntityKey),
}

/// Observer of connector events
pub trait ConnectorListener {
    fn on_event(&mut self, event: &ConnectorEvent);
}

impl<F: FnMut(&ConnectorEvent)> ConnectorListener for F {
    fn on_event(&mut self, event: &ConnectorEvent) {
        self(event)
    }
}

/// Buffers connector events and fans them out to listeners.
///
/// While the scheduler lock is held (for the duration of a tick) events are
/// queued, so listeners never observe the replica mid-step. Releasing the
/// outermost lock delivers everything queued.
pub struct EventBroker {
    pending: Vec<ConnectorEvent>,
    delivered: Vec<ConnectorEvent>,
    listeners: Vec<Box<dyn ConnectorListener>>,
    lock_depth: usize,
}

impl Default for EventBroker {
    fn default() -> Self {
        Self::new()
    }
}

impl EventBroker {
    pub fn new() -> Self {
        Self {
            pending: Vec::new(),
            delivered: Vec::new(),
            listeners: Vec::new(),
            lock_depth: 0,
        }
    }

    pub fn add_listener(&mut self, listener: Box<dyn ConnectorListener>) {
        self.listeners.push(listener);
    }

    pub fn is_locked(&self) -> bool {
        self.lock_depth > 0
    }

    pub(crate) fn acquire_lock(&mut self) {
        self.lock_depth += 1;
    }

    pub(crate) fn release_lock(&mut self) {
        self.lock_depth = self.lock_depth.saturating_sub(1);
        if self.lock_depth == 0 {
            self.flush();
        }
    }

    pub(crate) fn emit(&mut self, event: ConnectorEvent) {
        trace!("Connector event: {:?}", event);
        self.pending.push(event);
        if !self.is_locked() {
            self.flush();
        }
    }

    /// Drains every event delivered so far
    pub fn take_events(&mut self) -> Vec<ConnectorEvent> {
        mem::take(&mut self.delivered)
    }

    fn flush(&mut self) {
        for event in mem::take(&mut self.pending) {
            for listener in self.listeners.iter_mut() {
                listener.on_event(&event);
            }
            self.delivered.push(event);
        }
    }
}
