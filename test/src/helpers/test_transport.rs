use std::{cell::RefCell, collections::VecDeque, rc::Rc};

use serde_json::Value;

use replicant_client::{RequestCompletion, Transport, TransportContext};
use replicant_shared::ChannelAddress;

/// A call the Connector made on its transport
#[derive(Clone, Debug, PartialEq)]
pub enum TransportCall {
    Connect,
    Disconnect,
    Subscribe {
        address: ChannelAddress,
        filter: Option<Value>,
        etag: Option<String>,
    },
    BulkSubscribe {
        addresses: Vec<ChannelAddress>,
        filter: Option<Value>,
    },
    SubscriptionUpdate {
        address: ChannelAddress,
        filter: Option<Value>,
    },
    BulkSubscriptionUpdate {
        addresses: Vec<ChannelAddress>,
        filter: Option<Value>,
    },
    Unsubscribe {
        address: ChannelAddress,
    },
    BulkUnsubscribe {
        addresses: Vec<ChannelAddress>,
    },
}

impl TransportCall {
    pub fn is_subscription_call(&self) -> bool {
        !matches!(self, Self::Connect | Self::Disconnect)
    }
}

#[derive(Default)]
struct TransportLog {
    calls: Vec<TransportCall>,
    context: Option<TransportContext>,
    completions: VecDeque<RequestCompletion>,
}

/// Records every call & keeps the handles the Connector passes in, so a test
/// can play the server's part by hand. Clones share the same log.
#[derive(Clone, Default)]
pub struct TestTransport {
    log: Rc<RefCell<TransportLog>>,
}

impl TestTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<TransportCall> {
        self.log.borrow().calls.clone()
    }

    pub fn subscription_calls(&self) -> Vec<TransportCall> {
        self.calls()
            .into_iter()
            .filter(TransportCall::is_subscription_call)
            .collect()
    }

    pub fn clear_calls(&self) {
        self.log.borrow_mut().calls.clear();
    }

    pub fn context(&self) -> TransportContext {
        self.log
            .borrow()
            .context
            .clone()
            .expect("connector has not asked to connect")
    }

    /// Oldest completion handle not yet used
    pub fn take_completion(&self) -> RequestCompletion {
        self.log
            .borrow_mut()
            .completions
            .pop_front()
            .expect("no subscription request in flight")
    }

    pub fn pending_completion_count(&self) -> usize {
        self.log.borrow().completions.len()
    }

    pub fn complete_connect(&self, connection_id: &str) {
        self.context().on_connect(connection_id);
    }

    pub fn complete_disconnect(&self) {
        self.context().on_disconnect();
    }

    pub fn deliver(&self, message: &Value) {
        self.context().on_message_received(&message.to_string());
    }

    pub fn deliver_raw(&self, raw: &str) {
        self.context().on_message_received(raw);
    }

    fn record(&self, call: TransportCall, completion: Option<RequestCompletion>) {
        let mut log = self.log.borrow_mut();
        log.calls.push(call);
        if let Some(completion) = completion {
            log.completions.push_back(completion);
        }
    }
}

impl Transport for TestTransport {
    fn request_connect(&mut self, context: TransportContext) {
        self.log.borrow_mut().context = Some(context);
        self.record(TransportCall::Connect, None);
    }

    fn request_disconnect(&mut self) {
        self.record(TransportCall::Disconnect, None);
    }

    fn request_subscribe(
        &mut self,
        address: &ChannelAddress,
        filter: Option<&Value>,
        etag: Option<&str>,
        completion: RequestCompletion,
    ) {
        self.record(
            TransportCall::Subscribe {
                address: *address,
                filter: filter.cloned(),
                etag: etag.map(str::to_string),
            },
            Some(completion),
        );
    }

    fn request_bulk_subscribe(
        &mut self,
        addresses: &[ChannelAddress],
        filter: Option<&Value>,
        completion: RequestCompletion,
    ) {
        self.record(
            TransportCall::BulkSubscribe {
                addresses: addresses.to_vec(),
                filter: filter.cloned(),
            },
            Some(completion),
        );
    }

    fn request_subscription_update(
        &mut self,
        address: &ChannelAddress,
        filter: Option<&Value>,
        completion: RequestCompletion,
    ) {
        self.record(
            TransportCall::SubscriptionUpdate {
                address: *address,
                filter: filter.cloned(),
            },
            Some(completion),
        );
    }

    fn request_bulk_subscription_update(
        &mut self,
        addresses: &[ChannelAddress],
        filter: Option<&Value>,
        completion: RequestCompletion,
    ) {
        self.record(
            TransportCall::BulkSubscriptionUpdate {
                addresses: addresses.to_vec(),
                filter: filter.cloned(),
            },
            Some(completion),
        );
    }

    fn request_unsubscribe(&mut self, address: &ChannelAddress, completion: RequestCompletion) {
        self.record(
            TransportCall::Unsubscribe { address: *address },
            Some(completion),
        );
    }

    fn request_bulk_unsubscribe(
        &mut self,
        addresses: &[ChannelAddress],
        completion: RequestCompletion,
    ) {
        self.record(
            TransportCall::BulkUnsubscribe {
                addresses: addresses.to_vec(),
            },
            Some(completion),
        );
    }
}
