use std::collections::BTreeSet;

use serde_json::Value;

use replicant_shared::{ChannelAddress, EntityKey};

/// A live subscription and the entities it keeps alive
pub struct Subscription {
    address: ChannelAddress,
    filter: Option<Value>,
    explicit: bool,
    entities: BTreeSet<EntityKey>,
}

impl Subscription {
    pub(crate) fn new(address: ChannelAddress, filter: Option<Value>, explicit: bool) -> Self {
        Self {
            address,
            filter,
            explicit,
            entities: BTreeSet::new(),
        }
    }

    pub fn address(&self) -> &ChannelAddress {
        &self.address
    }

    pub fn filter(&self) -> Option<&Value> {
        self.filter.as_ref()
    }

    /// Explicit subscriptions were asked for by the application, implicit
    /// ones exist only because entities arrived on the channel
    pub fn is_explicit(&self) -> bool {
        self.explicit
    }

    pub fn entities(&self) -> &BTreeSet<EntityKey> {
        &self.entities
    }

    pub(crate) fn set_filter(&mut self, filter: Option<Value>) {
        self.filter = filter;
    }

    pub(crate) fn set_explicit(&mut self, explicit: bool) {
        self.explicit = explicit;
    }

    pub(crate) fn link_entity(&mut self, key: EntityKey) {
        self.entities.insert(key);
    }

    pub(crate) fn delink_entity(&mut self, key: &EntityKey) -> bool {
        self.entities.remove(key)
    }
}
