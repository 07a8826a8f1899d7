use std::collections::{BTreeMap, HashMap};

use log::debug;
use serde_json::Value;

use replicant_shared::{ChannelAddress, EntityKey};

use crate::{
    error::InvariantError,
    world::{
        Disposable, Entity, EntityLookup, Linkable, Replica, ReplicaError, Subscription,
        Verifiable,
    },
};

/// What disposing a subscription tore down
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DisposedSubscription {
    pub address: ChannelAddress,
    /// Entities destroyed because this subscription was their last link
    pub disposed_entities: Vec<EntityKey>,
}

/// Arena of subscriptions & entities.
///
/// The many-to-many links between them are stored as keys on both sides and
/// are only used for lookup & reference counting: an entity is destroyed the
/// moment its last subscription link is removed.
pub struct ReplicaRegistry {
    subscriptions: BTreeMap<ChannelAddress, Subscription>,
    entities: HashMap<EntityKey, Entity>,
    next_instance_id: u64,
}

impl Default for ReplicaRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl ReplicaRegistry {
    pub fn new() -> Self {
        Self {
            subscriptions: BTreeMap::new(),
            entities: HashMap::new(),
            next_instance_id: 0,
        }
    }

    // Subscriptions

    pub fn subscription(&self, address: &ChannelAddress) -> Option<&Subscription> {
        self.subscriptions.get(address)
    }

    pub(crate) fn subscription_mut(&mut self, address: &ChannelAddress) -> Option<&mut Subscription> {
        self.subscriptions.get_mut(address)
    }

    pub fn has_subscription(&self, address: &ChannelAddress) -> bool {
        self.subscriptions.contains_key(address)
    }

    pub fn subscriptions(&self) -> impl Iterator<Item = &Subscription> {
        self.subscriptions.values()
    }

    pub fn subscription_count(&self) -> usize {
        self.subscriptions.len()
    }

    pub(crate) fn create_subscription(
        &mut self,
        address: ChannelAddress,
        filter: Option<Value>,
        explicit: bool,
    ) -> Result<(), InvariantError> {
        if self.subscriptions.contains_key(&address) {
            return Err(InvariantError::SubscriptionAlreadyExists { address });
        }
        debug!(
            "Creating {} subscription {}",
            if explicit { "explicit" } else { "implicit" },
            address
        );
        self.subscriptions
            .insert(address, Subscription::new(address, filter, explicit));
        Ok(())
    }

    /// Removes the subscription, delinking its entities & destroying any
    /// left with no subscriptions. Returns None if no such subscription exists.
    pub(crate) fn dispose_subscription(
        &mut self,
        address: &ChannelAddress,
    ) -> Option<DisposedSubscription> {
        let subscription = self.subscriptions.remove(address)?;
        debug!("Disposing subscription {}", address);

        let mut disposed_entities = Vec::new();
        for key in subscription.entities() {
            let now_orphaned = match self.entities.get_mut(key) {
                Some(entity) => {
                    entity.delink_subscription(address);
                    entity.subscriptions().is_empty()
                }
                None => false,
            };
            if now_orphaned {
                self.destroy_entity(key);
                disposed_entities.push(*key);
            }
        }

        Some(DisposedSubscription {
            address: *address,
            disposed_entities,
        })
    }

    /// Disposes every subscription, which in turn destroys every entity
    pub(crate) fn dispose_all(&mut self) -> Vec<DisposedSubscription> {
        let addresses: Vec<ChannelAddress> = self.subscriptions.keys().copied().collect();
        addresses
            .iter()
            .filter_map(|address| self.dispose_subscription(address))
            .collect()
    }

    // Entities

    pub fn entity(&self, key: &EntityKey) -> Option<&Entity> {
        self.entities.get(key)
    }

    pub(crate) fn entity_mut(&mut self, key: &EntityKey) -> Option<&mut Entity> {
        self.entities.get_mut(key)
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }

    pub fn entities(&self) -> impl Iterator<Item = &Entity> {
        self.entities.values()
    }

    /// Returns true if the given incarnation of the entity is still alive
    pub fn is_entity_alive(&self, key: &EntityKey, instance_id: u64) -> bool {
        self.entities
            .get(key)
            .map(|entity| entity.instance_id() == instance_id)
            .unwrap_or(false)
    }

    /// Registers a new entity. It must be linked to a subscription before the
    /// current pipeline step completes.
    pub(crate) fn insert_entity(&mut self, key: EntityKey, replica: Box<dyn Replica>) -> u64 {
        let instance_id = self.next_instance_id;
        self.next_instance_id += 1;
        self.entities
            .insert(key, Entity::new(key, instance_id, replica));
        instance_id
    }

    pub(crate) fn link(&mut self, key: &EntityKey, address: &ChannelAddress) -> bool {
        let (Some(entity), Some(subscription)) = (
            self.entities.get_mut(key),
            self.subscriptions.get_mut(address),
        ) else {
            return false;
        };
        entity.link_subscription(*address);
        subscription.link_entity(*key);
        true
    }

    /// Removes one link, destroying the entity if it was the last.
    /// Returns whether the entity was destroyed.
    pub(crate) fn delink(&mut self, key: &EntityKey, address: &ChannelAddress) -> bool {
        if let Some(subscription) = self.subscriptions.get_mut(address) {
            subscription.delink_entity(key);
        }
        let now_orphaned = match self.entities.get_mut(key) {
            Some(entity) => {
                entity.delink_subscription(address);
                entity.subscriptions().is_empty()
            }
            None => return false,
        };
        if now_orphaned {
            self.destroy_entity(key);
        }
        now_orphaned
    }

    /// Removes every link of the entity, destroying it.
    /// Returns false if the entity did not exist.
    pub(crate) fn remove_entity(&mut self, key: &EntityKey) -> bool {
        let Some(entity) = self.entities.get(key) else {
            return false;
        };
        let addresses: Vec<ChannelAddress> = entity.subscriptions().iter().copied().collect();
        for address in &addresses {
            if let Some(subscription) = self.subscriptions.get_mut(address) {
                subscription.delink_entity(key);
            }
        }
        self.destroy_entity(key);
        true
    }

    /// Runs the entity's link hook with read access to the rest of the world
    pub(crate) fn link_entity(&mut self, key: &EntityKey) -> Result<(), ReplicaError> {
        let Some(mut replica) = self.entities.get_mut(key).and_then(Entity::take_replica) else {
            return Ok(());
        };
        let result = replica.link(self);
        if let Some(entity) = self.entities.get_mut(key) {
            entity.restore_replica(replica);
        }
        result
    }

    pub(crate) fn verify_entity(&self, key: &EntityKey) -> Result<(), ReplicaError> {
        match self.entities.get(key).and_then(Entity::replica) {
            Some(replica) => replica.verify(self),
            None => Ok(()),
        }
    }

    fn destroy_entity(&mut self, key: &EntityKey) {
        if let Some(mut entity) = self.entities.remove(key) {
            debug!("Destroying entity {}", key);
            if let Some(replica) = entity.replica_mut() {
                replica.dispose();
            }
        }
    }
}

impl EntityLookup for ReplicaRegistry {
    fn has_entity(&self, key: &EntityKey) -> bool {
        self.entities.contains_key(key)
    }

    fn replica(&self, key: &EntityKey) -> Option<&dyn Replica> {
        self.entities.get(key).and_then(Entity::replica)
    }
}
