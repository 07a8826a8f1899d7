use thiserror::Error;

/// Errors that can occur when building or consulting a SystemSchema
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    /// Two channels were declared with the same id
    #[error("Schema {schema} declares channel {channel_id} more than once")]
    DuplicateChannel { schema: String, channel_id: i32 },

    /// Two entity types were declared with the same id
    #[error("Schema {schema} declares entity type {entity_type} more than once")]
    DuplicateEntityType { schema: String, entity_type: i32 },

    /// Address belongs to another system
    #[error("Address {address} does not belong to schema {schema} (id {schema_id})")]
    SystemMismatch {
        schema: String,
        schema_id: i32,
        address: String,
    },

    /// Channel id is not declared by the schema
    #[error("Schema {schema} has no channel {channel_id}")]
    UnknownChannel { schema: String, channel_id: i32 },

    /// Instance channel addressed without a sub-channel id
    #[error("Channel {channel} is an instance channel but address {address} has no sub-channel id")]
    MissingSubChannel { channel: String, address: String },

    /// Type channel addressed with a sub-channel id
    #[error("Channel {channel} is a type channel but address {address} has a sub-channel id")]
    UnexpectedSubChannel { channel: String, address: String },
}
