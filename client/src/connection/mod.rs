mod connection;
mod message_response;
mod request_entry;

pub use connection::Connection;
pub use message_response::MessageResponse;
pub use request_entry::{CompletionAction, RequestEntry, RequestId};
