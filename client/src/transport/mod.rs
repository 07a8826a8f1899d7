mod cache;
mod context;

pub use cache::{CacheEntry, CacheService};
pub use context::{RequestCompletion, TransportContext};
pub(crate) use context::{RequestSuccess, TransportEvent};

use serde_json::Value;

use replicant_shared::ChannelAddress;

/// The byte pump a Connector drives. Implementations report outcomes back
/// through the `TransportContext` handed to `request_connect`, and through the
/// `RequestCompletion` handed to each subscription call.
///
/// Every completion carries the request id the server must echo back in the
/// change message that results from the call.
pub trait Transport {
    fn request_connect(&mut self, context: TransportContext);

    fn request_disconnect(&mut self);

    /// `etag` is set when a cached payload exists for the address, so the
    /// server can answer with `RequestCompletion::succeed_with_cache`
    fn request_subscribe(
        &mut self,
        address: &ChannelAddress,
        filter: Option<&Value>,
        etag: Option<&str>,
        completion: RequestCompletion,
    );

    fn request_bulk_subscribe(
        &mut self,
        addresses: &[ChannelAddress],
        filter: Option<&Value>,
        completion: RequestCompletion,
    );

    fn request_subscription_update(
        &mut self,
        address: &ChannelAddress,
        filter: Option<&Value>,
        completion: RequestCompletion,
    );

    fn request_bulk_subscription_update(
        &mut self,
        addresses: &[ChannelAddress],
        filter: Option<&Value>,
        completion: RequestCompletion,
    );

    fn request_unsubscribe(&mut self, address: &ChannelAddress, completion: RequestCompletion);

    fn request_bulk_unsubscribe(
        &mut self,
        addresses: &[ChannelAddress],
        completion: RequestCompletion,
    );
}
