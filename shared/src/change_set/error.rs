use thiserror::Error;

/// Errors that can occur while decoding a change message received from the server
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChangeSetError {
    /// Payload was not a well-formed change message
    #[error("Malformed change message: {reason}")]
    Malformed { reason: String },

    /// Payload declared a schema other than the one the receiving connector replicates
    #[error("Change message declares schema {actual} but connector replicates schema {expected}")]
    SchemaMismatch { expected: i32, actual: i32 },
}
