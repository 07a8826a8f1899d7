//! Reductions applied to a batch of area-of-interest requests against the
//! live subscriptions, so only requests that change server state go out.
//!
//! Each `remove_unneeded_*` function takes the requests it drops out of the
//! batch & returns them, and is idempotent: a second pass over a reduced batch
//! drops nothing.

use log::warn;

use crate::{
    area_of_interest::{AreaOfInterestAction, AreaOfInterestRequest},
    error::InvariantError,
    world::ReplicaRegistry,
};

fn check_action(
    request: &AreaOfInterestRequest,
    expected: AreaOfInterestAction,
) -> Result<(), InvariantError> {
    if request.action() != expected {
        return Err(InvariantError::UnexpectedRequestAction {
            address: *request.address(),
            expected,
            actual: request.action(),
        });
    }
    Ok(())
}

/// Once the server has confirmed an unsubscribe, the subscription stops being
/// explicit. It is not disposed here: entities may still be routed through it
/// until the server sends the matching channel removal.
pub fn remove_explicit_subscriptions(
    requests: &[AreaOfInterestRequest],
    registry: &mut ReplicaRegistry,
) -> Result<(), InvariantError> {
    for request in requests {
        check_action(request, AreaOfInterestAction::Remove)?;
        if let Some(subscription) = registry.subscription_mut(request.address()) {
            subscription.set_explicit(false);
        }
    }
    Ok(())
}

/// An ADD for an address that already has an implicit subscription needs no
/// round-trip: the subscription is upgraded to explicit in place.
pub fn remove_unneeded_add_requests(
    requests: &mut Vec<AreaOfInterestRequest>,
    registry: &mut ReplicaRegistry,
) -> Result<Vec<AreaOfInterestRequest>, InvariantError> {
    for request in requests.iter() {
        check_action(request, AreaOfInterestAction::Add)?;
        if let Some(subscription) = registry.subscription(request.address()) {
            if subscription.is_explicit() {
                return Err(InvariantError::DuplicateSubscription {
                    address: *request.address(),
                });
            }
        }
    }

    let mut dropped = Vec::new();
    let mut kept = Vec::with_capacity(requests.len());
    for request in requests.drain(..) {
        match registry.subscription_mut(request.address()) {
            Some(subscription) => {
                subscription.set_explicit(true);
                dropped.push(request);
            }
            None => kept.push(request),
        }
    }
    *requests = kept;
    Ok(dropped)
}

/// Drops REMOVE requests for addresses with no explicit subscription. Those
/// are invariant violations, tolerated only when `check_invariants` is off.
pub fn remove_unneeded_remove_requests(
    requests: &mut Vec<AreaOfInterestRequest>,
    registry: &ReplicaRegistry,
    check_invariants: bool,
) -> Result<Vec<AreaOfInterestRequest>, InvariantError> {
    let mut dropped = Vec::new();
    let mut kept = Vec::with_capacity(requests.len());
    for request in requests.drain(..) {
        check_action(&request, AreaOfInterestAction::Remove)?;
        let violation = match registry.subscription(request.address()) {
            None => Some(InvariantError::RemoveWithoutSubscription {
                address: *request.address(),
            }),
            Some(subscription) if !subscription.is_explicit() => {
                Some(InvariantError::RemoveOfImplicitSubscription {
                    address: *request.address(),
                })
            }
            Some(_) => None,
        };
        match violation {
            None => kept.push(request),
            Some(error) if check_invariants => return Err(error),
            Some(error) => {
                warn!("Dropping unsubscribe request: {}", error);
                dropped.push(request);
            }
        }
    }
    *requests = kept;
    Ok(dropped)
}

/// Drops UPDATE requests for addresses with no subscription. Tolerated only
/// when `check_invariants` is off.
pub fn remove_unneeded_update_requests(
    requests: &mut Vec<AreaOfInterestRequest>,
    registry: &ReplicaRegistry,
    check_invariants: bool,
) -> Result<Vec<AreaOfInterestRequest>, InvariantError> {
    let mut dropped = Vec::new();
    let mut kept = Vec::with_capacity(requests.len());
    for request in requests.drain(..) {
        check_action(&request, AreaOfInterestAction::Update)?;
        if registry.has_subscription(request.address()) {
            kept.push(request);
            continue;
        }
        let error = InvariantError::UpdateWithoutSubscription {
            address: *request.address(),
        };
        if check_invariants {
            return Err(error);
        }
        warn!("Dropping subscription update request: {}", error);
        dropped.push(request);
    }
    *requests = kept;
    Ok(dropped)
}
