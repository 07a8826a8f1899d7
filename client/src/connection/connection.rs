use std::{
    collections::{HashMap, VecDeque},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use log::{debug, trace};

use replicant_shared::ChannelAddress;

use crate::{
    area_of_interest::{AreaOfInterestAction, AreaOfInterestRequest},
    connection::{CompletionAction, MessageResponse, RequestEntry, RequestId},
    error::ConnectorError,
};

/// State scoped to one established connection: the outstanding requests, the
/// inbound message queues and the receive sequence. Dropped, with everything
/// in flight, when the connection is lost.
pub struct Connection {
    connection_id: String,
    last_rx_sequence: u64,
    /// Last in-band sequence taken through the pipeline, committed or not
    last_applied_sequence: u64,
    // mirror read by the transport through its context
    shared_last_rx_sequence: Arc<AtomicU64>,
    requests: HashMap<RequestId, RequestEntry>,
    /// Raw messages in arrival order
    unparsed_responses: VecDeque<MessageResponse>,
    /// Parsed messages that arrived ahead of their turn, sorted by sequence
    pending_responses: Vec<MessageResponse>,
    current_message_response: Option<MessageResponse>,
    current_area_of_interest_request_id: Option<RequestId>,
    current_area_of_interest_requests: Vec<AreaOfInterestRequest>,
}

impl Connection {
    pub fn new(connection_id: &str, shared_last_rx_sequence: Arc<AtomicU64>) -> Self {
        shared_last_rx_sequence.store(0, Ordering::Release);
        Self {
            connection_id: connection_id.to_string(),
            last_rx_sequence: 0,
            last_applied_sequence: 0,
            shared_last_rx_sequence,
            requests: HashMap::new(),
            unparsed_responses: VecDeque::new(),
            pending_responses: Vec::new(),
            current_message_response: None,
            current_area_of_interest_request_id: None,
            current_area_of_interest_requests: Vec::new(),
        }
    }

    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }

    pub fn last_rx_sequence(&self) -> u64 {
        self.last_rx_sequence
    }

    pub fn set_last_rx_sequence(&mut self, sequence: u64) {
        self.last_rx_sequence = sequence;
        self.last_applied_sequence = sequence;
        self.shared_last_rx_sequence.store(sequence, Ordering::Release);
    }

    /// Sequence the next in-band message must carry
    pub fn next_expected_sequence(&self) -> u64 {
        self.last_applied_sequence + 1
    }

    /// Moves past a message that was applied but may not advance the receive
    /// sequence
    pub(crate) fn skip_sequence(&mut self, sequence: u64) {
        self.last_applied_sequence = sequence;
    }

    // Requests

    pub fn new_request(
        &mut self,
        request_id: RequestId,
        name: &str,
        cache_key: Option<String>,
        expecting_results: bool,
    ) -> &RequestEntry {
        debug!("Request {} ({}) issued", request_id, name);
        self.requests
            .entry(request_id.clone())
            .or_insert_with(|| RequestEntry::new(request_id, name, cache_key, expecting_results))
    }

    pub fn request(&self, request_id: &RequestId) -> Option<&RequestEntry> {
        self.requests.get(request_id)
    }

    pub(crate) fn request_mut(&mut self, request_id: &RequestId) -> Option<&mut RequestEntry> {
        self.requests.get_mut(request_id)
    }

    pub fn request_count(&self) -> usize {
        self.requests.len()
    }

    pub fn remove_request(&mut self, request_id: &RequestId) -> Option<RequestEntry> {
        self.requests.remove(request_id)
    }

    /// Records that the request itself completed. If its results are still
    /// outstanding the action is parked on the entry and None is returned,
    /// otherwise the entry is removed and the action handed back to run now.
    pub(crate) fn complete_request(
        &mut self,
        request_id: &RequestId,
        action: CompletionAction,
    ) -> Result<Option<CompletionAction>, ConnectorError> {
        let Some(entry) = self.requests.get_mut(request_id) else {
            return Err(ConnectorError::UnknownRequest {
                request_id: request_id.clone(),
            });
        };
        if entry.can_complete() {
            trace!("Request {} complete", request_id);
            self.requests.remove(request_id);
            Ok(Some(action))
        } else {
            trace!("Request {} complete, waiting on results", request_id);
            entry.set_completion_action(action);
            Ok(None)
        }
    }

    // Inbound messages

    pub fn enqueue_response(&mut self, raw: String) {
        self.unparsed_responses.push_back(MessageResponse::new(raw));
    }

    /// Out-of-band messages queue behind anything already received
    pub fn enqueue_out_of_band_response(&mut self, raw: String, action: CompletionAction) {
        self.unparsed_responses
            .push_back(MessageResponse::out_of_band(raw, action));
    }

    pub fn unparsed_response_count(&self) -> usize {
        self.unparsed_responses.len()
    }

    pub fn pending_response_count(&self) -> usize {
        self.pending_responses.len()
    }

    pub fn current_message_response(&self) -> Option<&MessageResponse> {
        self.current_message_response.as_ref()
    }

    pub fn has_queued_responses(&self) -> bool {
        self.current_message_response.is_some()
            || !self.unparsed_responses.is_empty()
            || self.next_pending_index().is_some()
    }

    /// Promotes a message to current if none is. A parked message whose turn
    /// has come wins over the next raw message.
    pub(crate) fn select_next_message_response(&mut self) -> bool {
        if self.current_message_response.is_some() {
            return true;
        }
        if let Some(index) = self.next_pending_index() {
            self.current_message_response = Some(self.pending_responses.remove(index));
            return true;
        }
        match self.unparsed_responses.pop_front() {
            Some(response) => {
                self.current_message_response = Some(response);
                true
            }
            None => false,
        }
    }

    pub(crate) fn take_current_message_response(&mut self) -> Option<MessageResponse> {
        self.current_message_response.take()
    }

    pub(crate) fn restore_current_message_response(&mut self, response: MessageResponse) {
        self.current_message_response = Some(response);
    }

    /// Holds a parsed message that arrived ahead of its predecessor
    pub(crate) fn park(&mut self, response: MessageResponse) {
        let sequence = response.sequence().unwrap_or(0);
        let index = self
            .pending_responses
            .partition_point(|pending| pending.sequence().unwrap_or(0) <= sequence);
        self.pending_responses.insert(index, response);
    }

    fn next_pending_index(&self) -> Option<usize> {
        let next_sequence = self.next_expected_sequence();
        self.pending_responses.iter().position(|response| {
            response.is_out_of_band() || response.sequence() == Some(next_sequence)
        })
    }

    // Area of interest

    pub fn current_area_of_interest_requests(&self) -> &[AreaOfInterestRequest] {
        &self.current_area_of_interest_requests
    }

    pub fn current_area_of_interest_request_id(&self) -> Option<&RequestId> {
        self.current_area_of_interest_request_id.as_ref()
    }

    pub(crate) fn is_current_area_of_interest_request(&self, request_id: &RequestId) -> bool {
        self.current_area_of_interest_request_id.as_ref() == Some(request_id)
    }

    pub(crate) fn set_current_area_of_interest_requests(
        &mut self,
        request_id: RequestId,
        requests: Vec<AreaOfInterestRequest>,
    ) {
        self.current_area_of_interest_request_id = Some(request_id);
        self.current_area_of_interest_requests = requests;
    }

    pub(crate) fn take_current_area_of_interest_requests(&mut self) -> Vec<AreaOfInterestRequest> {
        self.current_area_of_interest_request_id = None;
        std::mem::take(&mut self.current_area_of_interest_requests)
    }

    /// Whether an in-flight request of one of `actions` targets `address`
    pub(crate) fn has_in_progress_request(
        &self,
        actions: &[AreaOfInterestAction],
        address: &ChannelAddress,
    ) -> bool {
        self.current_area_of_interest_requests.iter().any(|request| {
            request.is_in_progress()
                && request.address() == address
                && actions.contains(&request.action())
        })
    }
}
