mod entity;
mod registry;
mod replica;
mod subscription;

pub use entity::Entity;
pub use registry::{DisposedSubscription, ReplicaRegistry};
pub use replica::{ChangeMapper, Disposable, EntityLookup, Linkable, Replica, ReplicaError, Verifiable};
pub use subscription::Subscription;
