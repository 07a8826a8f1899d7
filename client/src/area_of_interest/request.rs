use std::fmt;

use serde_json::Value;

use replicant_shared::ChannelAddress;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AreaOfInterestAction {
    Add,
    Update,
    Remove,
}

impl fmt::Display for AreaOfInterestAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Add => "Subscribe",
            Self::Update => "SubscriptionUpdate",
            Self::Remove => "Unsubscribe",
        };
        f.write_str(name)
    }
}

/// A desired mutation of one subscription, queued until the Connector can
/// reconcile it against the live subscriptions & send it to the server
#[derive(Debug, Clone, PartialEq)]
pub struct AreaOfInterestRequest {
    address: ChannelAddress,
    action: AreaOfInterestAction,
    filter: Option<Value>,
    in_progress: bool,
}

impl AreaOfInterestRequest {
    pub fn new(address: ChannelAddress, action: AreaOfInterestAction, filter: Option<Value>) -> Self {
        // removal never carries a filter, so dedupe ignores it
        let filter = if action == AreaOfInterestAction::Remove {
            None
        } else {
            filter
        };
        Self {
            address,
            action,
            filter,
            in_progress: false,
        }
    }

    pub fn address(&self) -> &ChannelAddress {
        &self.address
    }

    pub fn action(&self) -> AreaOfInterestAction {
        self.action
    }

    pub fn filter(&self) -> Option<&Value> {
        self.filter.as_ref()
    }

    pub fn is_in_progress(&self) -> bool {
        self.in_progress
    }

    pub(crate) fn mark_as_in_progress(&mut self) {
        self.in_progress = true;
    }

    /// Key identifying requests that are interchangeable
    pub fn cache_key(&self) -> String {
        format!("{}:{}", self.action, self.address)
    }

    pub fn matches(
        &self,
        action: AreaOfInterestAction,
        address: &ChannelAddress,
        filter: Option<&Value>,
    ) -> bool {
        self.action == action
            && self.address == *address
            && (action == AreaOfInterestAction::Remove || self.filter.as_ref() == filter)
    }

    /// Requests can share one bulk call if they do the same thing to
    /// instances of the same channel with the same filter
    pub fn can_group_with(&self, other: &AreaOfInterestRequest) -> bool {
        self.action == other.action
            && self.address.system_id() == other.address.system_id()
            && self.address.channel_id() == other.address.channel_id()
            && self.address.is_instance_channel()
            && other.address.is_instance_channel()
            && (self.action == AreaOfInterestAction::Remove || self.filter == other.filter)
    }
}
