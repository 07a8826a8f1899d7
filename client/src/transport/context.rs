use std::sync::{
    atomic::{AtomicU64, Ordering},
    mpsc::Sender,
    Arc,
};

use log::trace;

use crate::connection::RequestId;

pub(crate) enum TransportEvent {
    Connected { connection_id: String },
    ConnectFailed { error: String },
    Disconnected,
    DisconnectFailed { error: String },
    MessageReceived { raw: String },
    MessageReadFailure { error: String },
    DisconnectRequested,
    RequestSucceeded { request_id: RequestId, success: RequestSuccess },
    RequestFailed { request_id: RequestId, error: String },
}

/// How the server answered a successful subscription call
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum RequestSuccess {
    /// A change message tagged with the request id follows
    WithResults,
    /// Nothing follows
    WithoutResults,
    /// The cached payload is current
    FromCache,
}

/// Handle a transport uses to report back to its Connector.
///
/// Reports are queued and applied on the Connector's next tick, so the
/// handle may be cloned & used from any thread.
#[derive(Clone)]
pub struct TransportContext {
    schema_id: i32,
    sender: Sender<TransportEvent>,
    last_rx_sequence: Arc<AtomicU64>,
}

impl TransportContext {
    pub(crate) fn new(
        schema_id: i32,
        sender: Sender<TransportEvent>,
        last_rx_sequence: Arc<AtomicU64>,
    ) -> Self {
        Self {
            schema_id,
            sender,
            last_rx_sequence,
        }
    }

    pub fn schema_id(&self) -> i32 {
        self.schema_id
    }

    /// Sequence of the last in-band change message fully applied
    pub fn last_rx_sequence(&self) -> u64 {
        self.last_rx_sequence.load(Ordering::Acquire)
    }

    pub fn on_connect(&self, connection_id: &str) {
        self.send(TransportEvent::Connected {
            connection_id: connection_id.to_string(),
        });
    }

    pub fn on_connect_failure(&self, error: &str) {
        self.send(TransportEvent::ConnectFailed {
            error: error.to_string(),
        });
    }

    pub fn on_disconnect(&self) {
        self.send(TransportEvent::Disconnected);
    }

    pub fn on_disconnect_failure(&self, error: &str) {
        self.send(TransportEvent::DisconnectFailed {
            error: error.to_string(),
        });
    }

    pub fn on_message_received(&self, raw: &str) {
        self.send(TransportEvent::MessageReceived {
            raw: raw.to_string(),
        });
    }

    pub fn on_message_read_failure(&self, error: &str) {
        self.send(TransportEvent::MessageReadFailure {
            error: error.to_string(),
        });
    }

    /// Ask the Connector to disconnect, unless it is already mid-transition
    pub fn disconnect(&self) {
        self.send(TransportEvent::DisconnectRequested);
    }

    fn send(&self, event: TransportEvent) {
        if self.sender.send(event).is_err() {
            trace!("Connector for schema {} is gone, dropping transport report", self.schema_id);
        }
    }
}

/// Completion handle for one subscription call. Consuming it reports the
/// outcome; dropping it without reporting leaves the request in flight.
pub struct RequestCompletion {
    request_id: RequestId,
    sender: Sender<TransportEvent>,
}

impl RequestCompletion {
    pub(crate) fn new(request_id: RequestId, sender: Sender<TransportEvent>) -> Self {
        Self { request_id, sender }
    }

    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    /// Server accepted the call and will answer with a change message
    /// carrying the request id
    pub fn succeed(self) {
        self.finish(RequestSuccess::WithResults);
    }

    /// Server accepted the call and sends no change message for it
    pub fn succeed_without_results(self) {
        self.finish(RequestSuccess::WithoutResults);
    }

    /// Server confirmed the etag sent with a subscribe: the cached payload is current
    pub fn succeed_with_cache(self) {
        self.finish(RequestSuccess::FromCache);
    }

    pub fn fail(self, error: &str) {
        let _ = self.sender.send(TransportEvent::RequestFailed {
            request_id: self.request_id,
            error: error.to_string(),
        });
    }

    fn finish(self, success: RequestSuccess) {
        let _ = self.sender.send(TransportEvent::RequestSucceeded {
            request_id: self.request_id,
            success,
        });
    }
}
