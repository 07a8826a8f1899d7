use thiserror::Error;

/// Errors that can occur while parsing a compact channel-change descriptor
/// such as `+4.12` or `-3`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChannelDescriptorError {
    /// Descriptor was an empty string
    #[error("Empty channel change descriptor")]
    Empty,

    /// Leading character was not one of `+`, `-`, `=` or `!`
    #[error("Unknown action '{sign}' in channel change descriptor '{descriptor}'")]
    UnknownAction { descriptor: String, sign: char },

    /// Channel id was missing or not a non-negative integer
    #[error("Invalid channel id in channel change descriptor '{descriptor}'")]
    InvalidChannelId { descriptor: String },

    /// Sub-channel id followed a '.' but was not an integer
    #[error("Invalid sub-channel id in channel change descriptor '{descriptor}'")]
    InvalidSubChannelId { descriptor: String },
}
