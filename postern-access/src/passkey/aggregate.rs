//! Passkey aggregate
//!
//! Only the sign counter, the last-used timestamp and the revocation record
//! change after registration. Revocation is terminal.

use super::error::PasskeyError;
use chrono::{DateTime, Utc};
use postern_core::{validation_error, PasskeyId, UserId};
use serde::{Deserialize, Serialize};
use std::fmt;

/// COSE algorithm identifier of the credential's public key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PasskeyAlgorithm(pub i32);

impl PasskeyAlgorithm {
    pub const ES256: Self = Self(-7);
    pub const EDDSA: Self = Self(-8);
    pub const RS256: Self = Self(-257);

    pub fn name(&self) -> Option<&'static str> {
        match self.0 {
            -7 => Some("ES256"),
            -8 => Some("EdDSA"),
            -257 => Some("RS256"),
            _ => None,
        }
    }
}

impl fmt::Display for PasskeyAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.name() {
            Some(name) => f.write_str(name),
            None => write!(f, "COSE({})", self.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PasskeyState {
    Active,
    Revoked,
}

/// Who revoked a passkey and when; always set together
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Revocation {
    pub revoked_at: DateTime<Utc>,
    pub revoked_by: UserId,
}

/// Input to [`Passkey::register`]
///
/// `credential_id` and `public_key` are opaque authenticator bytes carried as
/// unpadded base64url text, as WebAuthn clients send them.
#[derive(Debug, Clone)]
pub struct PasskeyRegistration {
    pub user_id: UserId,
    pub credential_id: String,
    pub public_key: String,
    pub sign_count: u32,
    pub display_name: String,
    pub algorithm: PasskeyAlgorithm,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Passkey {
    id: PasskeyId,
    user_id: UserId,
    /// base64url
    credential_id: String,
    /// base64url COSE key
    public_key: String,
    sign_count: u32,
    algorithm: PasskeyAlgorithm,
    display_name: String,
    registered_at: DateTime<Utc>,
    last_used_at: Option<DateTime<Utc>>,
    revocation: Option<Revocation>,
    revision: u64,
}

impl Passkey {
    /// Create a new active passkey. Credential-id uniqueness is the
    /// caller's responsibility.
    pub fn register(
        registration: PasskeyRegistration,
        now: DateTime<Utc>,
    ) -> Result<Self, PasskeyError> {
        let PasskeyRegistration {
            user_id,
            credential_id,
            public_key,
            sign_count,
            display_name,
            algorithm,
        } = registration;

        if user_id.is_empty() {
            return Err(PasskeyError::InvalidRegistration { field: "user_id" });
        }
        if !is_base64url(&credential_id) {
            return Err(PasskeyError::InvalidRegistration {
                field: "credential_id",
            });
        }
        if !is_base64url(&public_key) {
            return Err(PasskeyError::InvalidRegistration {
                field: "public_key",
            });
        }
        let display_name = display_name.trim().to_string();
        if display_name.is_empty() {
            return Err(PasskeyError::InvalidRegistration {
                field: "display_name",
            });
        }

        Ok(Self {
            id: PasskeyId::generate(),
            user_id,
            credential_id,
            public_key,
            sign_count,
            algorithm,
            display_name,
            registered_at: now,
            last_used_at: None,
            revocation: None,
            revision: 0,
        })
    }

    /// Accept a successful assertion. Equal counters are accepted since
    /// some authenticators never increment.
    pub fn record_authentication(
        &mut self,
        new_sign_count: u32,
        used_at: DateTime<Utc>,
    ) -> Result<(), PasskeyError> {
        if self.is_revoked() {
            return Err(PasskeyError::Revoked);
        }
        if new_sign_count < self.sign_count {
            return Err(PasskeyError::ClonedOrInvalid);
        }

        self.sign_count = new_sign_count;
        self.last_used_at = Some(used_at);
        Ok(())
    }

    pub fn revoke(&mut self, revoked_by: UserId, now: DateTime<Utc>) -> Result<(), PasskeyError> {
        if self.is_revoked() {
            return Err(PasskeyError::Revoked);
        }

        self.revocation = Some(Revocation {
            revoked_at: now,
            revoked_by,
        });
        Ok(())
    }

    pub fn id(&self) -> PasskeyId {
        self.id
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn credential_id(&self) -> &str {
        &self.credential_id
    }

    pub fn public_key(&self) -> &str {
        &self.public_key
    }

    pub fn sign_count(&self) -> u32 {
        self.sign_count
    }

    pub fn algorithm(&self) -> PasskeyAlgorithm {
        self.algorithm
    }

    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn registered_at(&self) -> DateTime<Utc> {
        self.registered_at
    }

    pub fn last_used_at(&self) -> Option<DateTime<Utc>> {
        self.last_used_at
    }

    pub fn revocation(&self) -> Option<&Revocation> {
        self.revocation.as_ref()
    }

    pub fn is_revoked(&self) -> bool {
        self.revocation.is_some()
    }

    pub fn state(&self) -> PasskeyState {
        if self.is_revoked() {
            PasskeyState::Revoked
        } else {
            PasskeyState::Active
        }
    }

    /// Revision this aggregate was loaded at; 0 for a never-saved passkey
    pub fn revision(&self) -> u64 {
        self.revision
    }

    pub fn snapshot(&self) -> PasskeySnapshot {
        PasskeySnapshot {
            id: self.id,
            user_id: self.user_id.clone(),
            credential_id: self.credential_id.clone(),
            public_key: self.public_key.clone(),
            sign_count: self.sign_count,
            algorithm: self.algorithm,
            display_name: self.display_name.clone(),
            registered_at: self.registered_at,
            last_used_at: self.last_used_at,
            is_revoked: self.is_revoked(),
            revoked_at: self.revocation.as_ref().map(|r| r.revoked_at),
            revoked_by_user_id: self.revocation.as_ref().map(|r| r.revoked_by.clone()),
            revision: self.revision,
        }
    }

    /// Rehydrate from persisted state
    pub fn from_snapshot(snapshot: PasskeySnapshot) -> Result<Self, PasskeyError> {
        let revocation = match (
            snapshot.is_revoked,
            snapshot.revoked_at,
            snapshot.revoked_by_user_id,
        ) {
            (false, None, None) => None,
            (true, Some(revoked_at), Some(revoked_by)) => Some(Revocation {
                revoked_at,
                revoked_by,
            }),
            _ => {
                return Err(validation_error!(
                    format!("inconsistent revocation fields for passkey {}", snapshot.id),
                    "is_revoked",
                    "passkey"
                )
                .into())
            }
        };

        Ok(Self {
            id: snapshot.id,
            user_id: snapshot.user_id,
            credential_id: snapshot.credential_id,
            public_key: snapshot.public_key,
            sign_count: snapshot.sign_count,
            algorithm: snapshot.algorithm,
            display_name: snapshot.display_name,
            registered_at: snapshot.registered_at,
            last_used_at: snapshot.last_used_at,
            revocation,
            revision: snapshot.revision,
        })
    }
}

/// Flat persisted form of a passkey
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasskeySnapshot {
    pub id: PasskeyId,
    pub user_id: UserId,
    pub credential_id: String,
    pub public_key: String,
    pub sign_count: u32,
    pub algorithm: PasskeyAlgorithm,
    pub display_name: String,
    pub registered_at: DateTime<Utc>,
    pub last_used_at: Option<DateTime<Utc>>,
    pub is_revoked: bool,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoked_by_user_id: Option<UserId>,
    pub revision: u64,
}

fn is_base64url(value: &str) -> bool {
    !value.is_empty()
        && value
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}
