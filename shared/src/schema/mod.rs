pub mod error;
pub mod system_schema;
