pub mod channel_address;
pub mod channel_change;
pub mod error;
