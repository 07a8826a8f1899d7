mod reconcile;
mod request;

pub use reconcile::{
    remove_explicit_subscriptions, remove_unneeded_add_requests, remove_unneeded_remove_requests,
    remove_unneeded_update_requests,
};
pub use request::{AreaOfInterestAction, AreaOfInterestRequest};
