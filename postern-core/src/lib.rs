//! Postern Core - shared identifiers, errors, configuration and logging
//!
//! Everything the access engine, the read model and the CLI agree on lives
//! here: entity identifiers, the ownership facts the resolver returns, the
//! unified error type and the configuration/logging plumbing.

pub mod async_utils;
pub mod config;
pub mod error;
pub mod logging;
pub mod traits;
pub mod types;

pub use async_utils::*;
pub use config::*;
pub use error::*;
pub use logging::*;
pub use traits::*;
pub use types::*;

// Re-export commonly used external types
pub use async_trait::async_trait;
pub use tracing;
