use log::{debug, trace, warn};
use serde_json::Value;

use replicant_shared::{ChannelAddress, FilterType};

use crate::{
    area_of_interest::{
        remove_explicit_subscriptions, remove_unneeded_add_requests,
        remove_unneeded_remove_requests, remove_unneeded_update_requests, AreaOfInterestAction,
        AreaOfInterestRequest,
    },
    connection::{CompletionAction, RequestId},
    connector::Connector,
    error::ConnectorError,
    events::ConnectorEvent,
    transport::{RequestCompletion, RequestSuccess},
};

impl Connector {
    // Area of interest

    /// Ask for the channel to be replicated. The request is remembered, so it
    /// is re-sent whenever a new connection is established.
    pub fn request_subscribe(
        &mut self,
        address: ChannelAddress,
        filter: Option<Value>,
    ) -> Result<(), ConnectorError> {
        self.check_area_of_interest(&address, filter.as_ref())?;
        self.desired_areas_of_interest.insert(address, filter.clone());
        self.enqueue_area_of_interest_request(AreaOfInterestAction::Add, address, filter);
        Ok(())
    }

    /// Replace the filter of a subscription. Only channels with a dynamic
    /// filter accept updates.
    pub fn request_subscription_update(
        &mut self,
        address: ChannelAddress,
        filter: Option<Value>,
    ) -> Result<(), ConnectorError> {
        self.check_area_of_interest(&address, filter.as_ref())?;
        let channel = self.schema.channel_for(&address)?;
        if channel.filter_type != FilterType::Dynamic {
            return Err(ConnectorError::FilterNotUpdatable { address });
        }
        self.desired_areas_of_interest.insert(address, filter.clone());
        self.enqueue_area_of_interest_request(AreaOfInterestAction::Update, address, filter);
        Ok(())
    }

    pub fn request_unsubscribe(&mut self, address: ChannelAddress) -> Result<(), ConnectorError> {
        self.schema.channel_for(&address)?;
        self.desired_areas_of_interest.remove(&address);
        self.enqueue_area_of_interest_request(AreaOfInterestAction::Remove, address, None);
        Ok(())
    }

    /// Whether an equivalent request is queued or in flight
    pub fn is_area_of_interest_request_pending(
        &self,
        action: AreaOfInterestAction,
        address: &ChannelAddress,
        filter: Option<&Value>,
    ) -> bool {
        self.last_index_of_pending_area_of_interest_request(action, address, filter)
            .is_some()
    }

    /// Position of the last equivalent request, counting the in-flight batch
    /// first and then the queue
    pub fn last_index_of_pending_area_of_interest_request(
        &self,
        action: AreaOfInterestAction,
        address: &ChannelAddress,
        filter: Option<&Value>,
    ) -> Option<usize> {
        self.pending_area_of_interest_requests()
            .enumerate()
            .filter(|(_, request)| request.matches(action, address, filter))
            .map(|(index, _)| index)
            .last()
    }

    /// The in-flight batch followed by the queued requests
    pub fn pending_area_of_interest_requests(
        &self,
    ) -> impl Iterator<Item = &AreaOfInterestRequest> + '_ {
        self.connection
            .iter()
            .flat_map(|connection| connection.current_area_of_interest_requests().iter())
            .chain(self.area_of_interest_requests.iter())
    }

    /// The desired state re-sent on every new connection
    pub fn desired_areas_of_interest(
        &self,
    ) -> impl Iterator<Item = (&ChannelAddress, Option<&Value>)> + '_ {
        self.desired_areas_of_interest
            .iter()
            .map(|(address, filter)| (address, filter.as_ref()))
    }

    fn check_area_of_interest(
        &self,
        address: &ChannelAddress,
        filter: Option<&Value>,
    ) -> Result<(), ConnectorError> {
        let channel = self.schema.channel_for(address)?;
        if filter.is_some() && channel.filter_type == FilterType::None {
            return Err(ConnectorError::FilterNotAccepted { address: *address });
        }
        Ok(())
    }

    fn enqueue_area_of_interest_request(
        &mut self,
        action: AreaOfInterestAction,
        address: ChannelAddress,
        filter: Option<Value>,
    ) {
        // only the latest request for an address says what is wanted
        let latest = self
            .pending_area_of_interest_requests()
            .filter(|request| request.address() == &address)
            .last();
        if latest.is_some_and(|request| request.matches(action, &address, filter.as_ref())) {
            debug!("Ignoring duplicate {} request for {}", action, address);
            return;
        }
        trace!("Queueing {} request for {}", action, address);
        self.area_of_interest_requests
            .push_back(AreaOfInterestRequest::new(address, action, filter));
    }

    /// Takes the next group of queued requests, drops those the current
    /// subscriptions make redundant and sends the rest to the server. Only one
    /// group is in flight at a time.
    pub fn progress_area_of_interest_requests(&mut self) -> Result<bool, ConnectorError> {
        let Some(connection) = self.connection.as_ref() else {
            return Ok(false);
        };
        if !connection.current_area_of_interest_requests().is_empty() {
            return Ok(false);
        }
        let Some(head) = self.area_of_interest_requests.pop_front() else {
            return Ok(false);
        };

        let action = head.action();
        let mut batch = vec![head];
        while let Some(next) = self.area_of_interest_requests.front() {
            if !batch[0].can_group_with(next) {
                break;
            }
            if let Some(next) = self.area_of_interest_requests.pop_front() {
                batch.push(next);
            }
        }

        let check_invariants = self.config.check_invariants;
        let reconciled = match action {
            AreaOfInterestAction::Add => {
                remove_unneeded_add_requests(&mut batch, &mut self.registry)
            }
            AreaOfInterestAction::Update => {
                remove_unneeded_update_requests(&mut batch, &self.registry, check_invariants)
            }
            AreaOfInterestAction::Remove => {
                remove_unneeded_remove_requests(&mut batch, &self.registry, check_invariants)
            }
        };
        let dropped = match reconciled {
            Ok(dropped) => dropped,
            Err(failure) => {
                for request in &batch {
                    warn!(
                        "Discarding {} of {} after failed reconciliation: {}",
                        action,
                        request.address(),
                        failure
                    );
                }
                return Err(failure.into());
            }
        };
        for request in &dropped {
            debug!("{} of {} needs no request", action, request.address());
            self.emit(completed_event(action, *request.address()));
        }
        if batch.is_empty() {
            return Ok(true);
        }

        for request in batch.iter_mut() {
            request.mark_as_in_progress();
        }
        for request in &batch {
            self.emit(started_event(action, *request.address()));
        }
        self.send_area_of_interest_requests(action, batch);
        Ok(true)
    }

    fn send_area_of_interest_requests(
        &mut self,
        action: AreaOfInterestAction,
        batch: Vec<AreaOfInterestRequest>,
    ) {
        let addresses: Vec<ChannelAddress> = batch.iter().map(|request| *request.address()).collect();
        let filter = batch[0].filter().cloned();

        let cache_key = match (action, addresses.as_slice()) {
            (AreaOfInterestAction::Add, [address]) if self.is_cacheable(address) => {
                Some(address.cache_key())
            }
            _ => None,
        };
        let etag = match (&cache_key, &self.cache) {
            (Some(key), Some(cache)) => cache.lookup(key).map(|entry| entry.etag),
            _ => None,
        };

        let request_id = self.next_request_id();
        let name = format!("{}({})", action, describe(&addresses));
        let Some(connection) = self.connection.as_mut() else {
            return;
        };
        connection.new_request(request_id.clone(), &name, cache_key, true);
        connection.set_current_area_of_interest_requests(request_id.clone(), batch);

        debug!("Sending {} as request {}", name, request_id);
        let completion = RequestCompletion::new(request_id, self.transport_sender.clone());
        let filter = filter.as_ref();
        match (action, addresses.as_slice()) {
            (AreaOfInterestAction::Add, [address]) => {
                self.transport
                    .request_subscribe(address, filter, etag.as_deref(), completion)
            }
            (AreaOfInterestAction::Add, _) => {
                self.transport
                    .request_bulk_subscribe(&addresses, filter, completion)
            }
            (AreaOfInterestAction::Update, [address]) => {
                self.transport
                    .request_subscription_update(address, filter, completion)
            }
            (AreaOfInterestAction::Update, _) => {
                self.transport
                    .request_bulk_subscription_update(&addresses, filter, completion)
            }
            (AreaOfInterestAction::Remove, [address]) => {
                self.transport.request_unsubscribe(address, completion)
            }
            (AreaOfInterestAction::Remove, _) => {
                self.transport.request_bulk_unsubscribe(&addresses, completion)
            }
        }
    }

    fn is_cacheable(&self, address: &ChannelAddress) -> bool {
        self.schema
            .channel(address.channel_id())
            .map(|channel| channel.cacheable)
            .unwrap_or(false)
    }

    pub(super) fn on_area_of_interest_success(
        &mut self,
        request_id: &RequestId,
        success: RequestSuccess,
    ) -> Result<(), ConnectorError> {
        let Some(connection) = self.connection.as_mut() else {
            warn!("Ignoring completion of request {} without a connection", request_id);
            return Ok(());
        };
        if !connection.is_current_area_of_interest_request(request_id) {
            warn!("Ignoring completion of unknown request {}", request_id);
            return Ok(());
        }

        if success == RequestSuccess::WithoutResults {
            if let Some(entry) = connection.request_mut(request_id) {
                entry.stop_expecting_results();
            }
        }
        if success != RequestSuccess::FromCache {
            if let Some(action) =
                connection.complete_request(request_id, CompletionAction::CompleteAreaOfInterest)?
            {
                self.run_completion_action(action)?;
            }
            return Ok(());
        }

        let cached = connection
            .request(request_id)
            .and_then(|entry| entry.cache_key())
            .and_then(|key| self.cache.as_ref().and_then(|cache| cache.lookup(key)));
        match cached {
            Some(entry) => {
                debug!("Request {} answered from cache with etag {}", request_id, entry.etag);
                connection.remove_request(request_id);
                connection.enqueue_out_of_band_response(
                    entry.content,
                    CompletionAction::CompleteAreaOfInterest,
                );
            }
            None => self.on_area_of_interest_failure(
                request_id,
                "Server accepted the cached payload but none is cached",
            ),
        }
        Ok(())
    }

    pub(super) fn on_area_of_interest_failure(&mut self, request_id: &RequestId, error: &str) {
        let Some(connection) = self.connection.as_mut() else {
            return;
        };
        if !connection.is_current_area_of_interest_request(request_id) {
            warn!("Ignoring failure of unknown request {}: {}", request_id, error);
            return;
        }
        connection.remove_request(request_id);
        let requests = connection.take_current_area_of_interest_requests();

        for request in requests {
            let address = *request.address();
            warn!("{} of {} failed: {}", request.action(), address, error);
            if request.action() == AreaOfInterestAction::Add {
                self.desired_areas_of_interest.remove(&address);
                if let Some(cache) = self.cache.as_mut() {
                    cache.invalidate(&address.cache_key());
                }
            }
            let error = error.to_string();
            let event = match request.action() {
                AreaOfInterestAction::Add => ConnectorEvent::SubscribeFailed { address, error },
                AreaOfInterestAction::Update => {
                    ConnectorEvent::SubscriptionUpdateFailed { address, error }
                }
                AreaOfInterestAction::Remove => {
                    ConnectorEvent::UnsubscribeFailed { address, error }
                }
            };
            self.emit(event);
        }
    }

    pub(super) fn run_completion_action(
        &mut self,
        action: CompletionAction,
    ) -> Result<(), ConnectorError> {
        match action {
            CompletionAction::CompleteAreaOfInterest => self.complete_area_of_interest_requests(),
            CompletionAction::Callback(callback) => {
                callback();
                Ok(())
            }
        }
    }

    fn complete_area_of_interest_requests(&mut self) -> Result<(), ConnectorError> {
        let Some(connection) = self.connection.as_mut() else {
            return Ok(());
        };
        let requests = connection.take_current_area_of_interest_requests();
        let Some(action) = requests.first().map(AreaOfInterestRequest::action) else {
            return Ok(());
        };
        if action == AreaOfInterestAction::Remove {
            remove_explicit_subscriptions(&requests, &mut self.registry)?;
        }
        for request in &requests {
            self.emit(completed_event(action, *request.address()));
        }
        Ok(())
    }

    // Generic requests

    /// Track an application RPC so its completion can wait for the change
    /// message the server sends in answer to it
    pub fn new_request(
        &mut self,
        name: &str,
        cache_key: Option<String>,
        expecting_results: bool,
    ) -> Result<RequestId, ConnectorError> {
        if self.connection.is_none() {
            return Err(ConnectorError::NotConnected {
                schema_id: self.schema.id(),
            });
        }
        let request_id = self.next_request_id();
        if let Some(connection) = self.connection.as_mut() {
            connection.new_request(request_id.clone(), name, cache_key, expecting_results);
        }
        Ok(request_id)
    }

    /// Report that the RPC completed. `action` runs now if no results are
    /// outstanding, otherwise once the change message carrying the request
    /// id commits.
    pub fn complete_request(
        &mut self,
        request_id: &RequestId,
        action: impl FnOnce() + 'static,
    ) -> Result<(), ConnectorError> {
        let Some(connection) = self.connection.as_mut() else {
            return Err(ConnectorError::NotConnected {
                schema_id: self.schema.id(),
            });
        };
        if let Some(action) =
            connection.complete_request(request_id, CompletionAction::Callback(Box::new(action)))?
        {
            self.run_completion_action(action)?;
        }
        Ok(())
    }

    /// Queue a message that arrived outside the sequenced stream. It is
    /// applied in turn but never advances the receive sequence.
    pub fn enqueue_out_of_band_message(
        &mut self,
        raw: &str,
        on_complete: impl FnOnce() + 'static,
    ) -> Result<(), ConnectorError> {
        let Some(connection) = self.connection.as_mut() else {
            return Err(ConnectorError::NotConnected {
                schema_id: self.schema.id(),
            });
        };
        connection.enqueue_out_of_band_response(
            raw.to_string(),
            CompletionAction::Callback(Box::new(on_complete)),
        );
        Ok(())
    }
}

fn started_event(action: AreaOfInterestAction, address: ChannelAddress) -> ConnectorEvent {
    match action {
        AreaOfInterestAction::Add => ConnectorEvent::SubscribeStarted(address),
        AreaOfInterestAction::Update => ConnectorEvent::SubscriptionUpdateStarted(address),
        AreaOfInterestAction::Remove => ConnectorEvent::UnsubscribeStarted(address),
    }
}

fn completed_event(action: AreaOfInterestAction, address: ChannelAddress) -> ConnectorEvent {
    match action {
        AreaOfInterestAction::Add => ConnectorEvent::SubscribeCompleted(address),
        AreaOfInterestAction::Update => ConnectorEvent::SubscriptionUpdateCompleted(address),
        AreaOfInterestAction::Remove => ConnectorEvent::UnsubscribeCompleted(address),
    }
}

fn describe(addresses: &[ChannelAddress]) -> String {
    addresses
        .iter()
        .map(ChannelAddress::to_string)
        .collect::<Vec<_>>()
        .join(",")
}
