use std::{any::Any, cell::RefCell, rc::Rc};

use serde_json::Value;

use replicant_client::{
    ChangeMapper, Disposable, EntityLookup, Linkable, Replica, ReplicaError, Verifiable,
};
use replicant_shared::{EntityData, EntityKey};

/// Shared record of which entities have been disposed, in order
pub type DisposalLog = Rc<RefCell<Vec<EntityKey>>>;

/// Domain object driven by its attribute data:
/// - `"ref": {"type": t, "id": i}` names an entity that must exist at link time
/// - `"valid": false` fails verification
pub struct TestReplica {
    key: EntityKey,
    data: EntityData,
    link_count: usize,
    disposals: DisposalLog,
}

impl TestReplica {
    pub fn key(&self) -> EntityKey {
        self.key
    }

    pub fn data(&self) -> &EntityData {
        &self.data
    }

    pub fn link_count(&self) -> usize {
        self.link_count
    }

    fn reference(&self) -> Option<EntityKey> {
        let reference = self.data.get("ref")?;
        let entity_type = reference.get("type")?.as_i64()?;
        let id = reference.get("id")?.as_i64()?;
        Some(EntityKey::new(
            i32::try_from(entity_type).ok()?,
            i32::try_from(id).ok()?,
        ))
    }
}

impl Linkable for TestReplica {
    fn link(&mut self, world: &dyn EntityLookup) -> Result<(), ReplicaError> {
        if let Some(target) = self.reference() {
            if !world.has_entity(&target) {
                return Err(ReplicaError::new(&format!(
                    "{} references missing entity {}",
                    self.key, target
                )));
            }
        }
        self.link_count += 1;
        Ok(())
    }
}

impl Verifiable for TestReplica {
    fn verify(&self, _world: &dyn EntityLookup) -> Result<(), ReplicaError> {
        if self.data.get("valid") == Some(&Value::Bool(false)) {
            return Err(ReplicaError::new("marked invalid"));
        }
        Ok(())
    }
}

impl Disposable for TestReplica {
    fn dispose(&mut self) {
        self.disposals.borrow_mut().push(self.key);
    }
}

impl Replica for TestReplica {
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// Builds TestReplicas. Data carrying `"reject": true` is refused.
#[derive(Clone, Default)]
pub struct TestChangeMapper {
    disposals: DisposalLog,
}

impl TestChangeMapper {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn disposals(&self) -> DisposalLog {
        self.disposals.clone()
    }
}

fn check_rejected(key: EntityKey, data: &EntityData) -> Result<(), ReplicaError> {
    if data.get("reject") == Some(&Value::Bool(true)) {
        return Err(ReplicaError::new(&format!("{} rejected", key)));
    }
    Ok(())
}

impl ChangeMapper for TestChangeMapper {
    fn create(&mut self, key: EntityKey, data: &EntityData) -> Result<Box<dyn Replica>, ReplicaError> {
        check_rejected(key, data)?;
        Ok(Box::new(TestReplica {
            key,
            data: data.clone(),
            link_count: 0,
            disposals: self.disposals.clone(),
        }))
    }

    fn update(
        &mut self,
        key: EntityKey,
        replica: &mut dyn Replica,
        data: &EntityData,
    ) -> Result<(), ReplicaError> {
        check_rejected(key, data)?;
        let Some(replica) = replica.as_any_mut().downcast_mut::<TestReplica>() else {
            return Err(ReplicaError::new("not a TestReplica"));
        };
        replica.data = data.clone();
        Ok(())
    }
}
