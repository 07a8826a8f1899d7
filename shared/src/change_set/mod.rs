pub mod change_set;
pub mod error;
