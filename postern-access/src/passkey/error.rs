use crate::AccessError;
use postern_core::PosternError;
use thiserror::Error;

/// Passkey lifecycle failures. Aggregate-level variants leave the passkey
/// unchanged.
#[derive(Error, Debug)]
pub enum PasskeyError {
    #[error("passkey has been revoked")]
    Revoked,

    /// Presented counter went backwards: possible cloned authenticator
    #[error("passkey sign count is not monotonic")]
    ClonedOrInvalid,

    #[error("invalid passkey registration: {field} is required")]
    InvalidRegistration { field: &'static str },

    #[error("credential id is already registered")]
    DuplicateCredential,

    #[error("passkey not found")]
    NotFound,

    #[error("passkey was modified concurrently")]
    ConcurrencyConflict,

    #[error(transparent)]
    Access(#[from] AccessError),

    #[error(transparent)]
    Store(#[from] PosternError),
}

impl PasskeyError {
    /// Stable error code for command handlers
    pub fn code(&self) -> &'static str {
        match self {
            PasskeyError::Revoked => "ERR_PASSKEY_REVOKED",
            PasskeyError::ClonedOrInvalid => "ERR_PASSKEY_CLONED_OR_INVALID",
            PasskeyError::InvalidRegistration { .. } => "ERR_INVALID_PASSKEY_REGISTRATION",
            PasskeyError::DuplicateCredential => "ERR_PASSKEY_DUPLICATE_CREDENTIAL",
            PasskeyError::NotFound => "ERR_PASSKEY_NOT_FOUND",
            PasskeyError::ConcurrencyConflict => "ERR_PASSKEY_CONCURRENCY_CONFLICT",
            PasskeyError::Access(error) => error.code(),
            PasskeyError::Store(_) => "ERR_STORAGE",
        }
    }
}
