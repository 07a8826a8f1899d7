use std::any::Any;

use thiserror::Error;

use replicant_shared::{EntityData, EntityKey};

/// Failure reported by an application-supplied replica hook or change mapper
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct ReplicaError(pub String);

impl ReplicaError {
    pub fn new(reason: &str) -> Self {
        Self(reason.to_string())
    }
}

/// Read access to the replicated entities, handed to linking & verification hooks
pub trait EntityLookup {
    fn has_entity(&self, key: &EntityKey) -> bool;

    fn replica(&self, key: &EntityKey) -> Option<&dyn Replica>;
}

/// Resolves references to other entities once a message's changes are applied
pub trait Linkable {
    fn link(&mut self, _world: &dyn EntityLookup) -> Result<(), ReplicaError> {
        Ok(())
    }
}

/// Self-check run after a message is applied, when validation is enabled
pub trait Verifiable {
    fn verify(&self, _world: &dyn EntityLookup) -> Result<(), ReplicaError> {
        Ok(())
    }
}

/// Called once when the owning entity is destroyed
pub trait Disposable {
    fn dispose(&mut self) {}
}

/// The application's domain object for one replicated entity
pub trait Replica: Linkable + Verifiable + Disposable + Any {
    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;
}

/// Maps wire-level entity changes onto the application's domain objects
pub trait ChangeMapper {
    /// Build the domain object for an entity seen for the first time
    fn create(&mut self, key: EntityKey, data: &EntityData) -> Result<Box<dyn Replica>, ReplicaError>;

    /// Apply new attribute values to an existing domain object
    fn update(
        &mut self,
        key: EntityKey,
        replica: &mut dyn Replica,
        data: &EntityData,
    ) -> Result<(), ReplicaError>;
}
