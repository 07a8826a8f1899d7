//! Scripted transport, cache & replica fixtures for driving a replicant
//! Connector through whole message exchanges in tests.


pub use helpers::*;
