// skv-common - Protocol building blocks shared across the SentinelKV client
//
// This crate defines the wire codec and the configuration data model

pub mod error;
pub mod host;
pub mod info;
pub mod resp;

// Re-export for convenience
pub use error::*;
pub use host::*;
pub use info::*;
pub use resp::*;
