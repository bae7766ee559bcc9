//! Passkey credential lifecycle
//!
//! [`Passkey`] is the aggregate and owns every state transition.
//! [`PasskeyService`] wires it to authorization and persistence.

mod aggregate;
mod error;
mod service;
mod store;

pub use aggregate::{
    Passkey, PasskeyAlgorithm, PasskeyRegistration, PasskeySnapshot, PasskeyState, Revocation,
};
pub use error::PasskeyError;
pub use service::PasskeyService;
pub use store::{InMemoryPasskeyStore, PasskeyStore, WriteOutcome};
