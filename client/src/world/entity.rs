use std::collections::BTreeSet;

use replicant_shared::{ChannelAddress, EntityKey};

use crate::world::Replica;

/// A replicated entity. Lives exactly as long as some subscription links to it.
pub struct Entity {
    key: EntityKey,
    instance_id: u64,
    subscriptions: BTreeSet<ChannelAddress>,
    // taken out while the replica's own hooks run against the registry
    replica: Option<Box<dyn Replica>>,
}

impl Entity {
    pub(crate) fn new(key: EntityKey, instance_id: u64, replica: Box<dyn Replica>) -> Self {
        Self {
            key,
            instance_id,
            subscriptions: BTreeSet::new(),
            replica: Some(replica),
        }
    }

    pub fn key(&self) -> &EntityKey {
        &self.key
    }

    /// Distinguishes successive incarnations of the same key
    pub fn instance_id(&self) -> u64 {
        self.instance_id
    }

    pub fn subscriptions(&self) -> &BTreeSet<ChannelAddress> {
        &self.subscriptions
    }

    pub fn replica(&self) -> Option<&dyn Replica> {
        self.replica.as_deref()
    }

    pub fn replica_mut(&mut self) -> Option<&mut (dyn Replica + 'static)> {
        self.replica.as_deref_mut()
    }

    /// Downcast the replica to the application's concrete type
    pub fn replica_as<T: Replica>(&self) -> Option<&T> {
        self.replica()
            .and_then(|replica| replica.as_any().downcast_ref::<T>())
    }

    pub(crate) fn take_replica(&mut self) -> Option<Box<dyn Replica>> {
        self.replica.take()
    }

    pub(crate) fn restore_replica(&mut self, replica: Box<dyn Replica>) {
        self.replica = Some(replica);
    }

    pub(crate) fn link_subscription(&mut self, address: ChannelAddress) {
        self.subscriptions.insert(address);
    }

    pub(crate) fn delink_subscription(&mut self, address: &ChannelAddress) -> bool {
        self.subscriptions.remove(address)
    }
}
