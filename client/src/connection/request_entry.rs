use std::fmt;

/// Correlates an outbound request with the change message the server sends
/// in answer to it
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub struct RequestId(String);

impl RequestId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RequestId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for RequestId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Work to run once a request has both completed and had its results applied
pub enum CompletionAction {
    /// Finish the connection's in-flight area-of-interest batch
    CompleteAreaOfInterest,
    Callback(Box<dyn FnOnce()>),
}

impl fmt::Debug for CompletionAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::CompleteAreaOfInterest => f.write_str("CompleteAreaOfInterest"),
            Self::Callback(_) => f.write_str("Callback"),
        }
    }
}

/// An outstanding client-originated request.
///
/// Lives until both the request's own completion has been reported and, if
/// results were expected, the change message carrying its id has committed.
#[derive(Debug)]
pub struct RequestEntry {
    request_id: RequestId,
    name: String,
    cache_key: Option<String>,
    expecting_results: bool,
    results_arrived: bool,
    completion_action: Option<CompletionAction>,
}

impl RequestEntry {
    pub fn new(
        request_id: RequestId,
        name: &str,
        cache_key: Option<String>,
        expecting_results: bool,
    ) -> Self {
        Self {
            request_id,
            name: name.to_string(),
            cache_key,
            expecting_results,
            results_arrived: false,
            completion_action: None,
        }
    }

    pub fn request_id(&self) -> &RequestId {
        &self.request_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn cache_key(&self) -> Option<&str> {
        self.cache_key.as_deref()
    }

    pub fn is_expecting_results(&self) -> bool {
        self.expecting_results
    }

    pub fn have_results_arrived(&self) -> bool {
        self.results_arrived
    }

    pub fn has_completion_action(&self) -> bool {
        self.completion_action.is_some()
    }

    pub(crate) fn mark_results_arrived(&mut self) {
        self.results_arrived = true;
    }

    /// The server said no change message will answer this request
    pub(crate) fn stop_expecting_results(&mut self) {
        self.expecting_results = false;
    }

    /// Whether the completion action may run now rather than wait for results
    pub(crate) fn can_complete(&self) -> bool {
        !self.expecting_results || self.results_arrived
    }

    pub(crate) fn set_completion_action(&mut self, action: CompletionAction) {
        self.completion_action = Some(action);
    }

    pub(crate) fn take_completion_action(&mut self) -> Option<CompletionAction> {
        self.completion_action.take()
    }
}
