//! Passkey commands and queries

use crate::identity::SystemRole;
use crate::passkey::PasskeyAlgorithm;
use crate::policy::Authorizer;
use crate::requirements::Requirement;
use postern_core::{PasskeyId, UserId};
use serde::{Deserialize, Serialize};

/// Register a new credential for the calling user
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterPasskey {
    /// Unpadded base64url
    pub credential_id: String,
    /// Unpadded base64url COSE key
    pub public_key: String,
    #[serde(default)]
    pub sign_count: u32,
    pub display_name: String,
    pub algorithm: PasskeyAlgorithm,
}

impl Authorizer for RegisterPasskey {
    fn requirements(&self) -> Vec<Requirement> {
        vec![Requirement::MustBeAuthenticated]
    }
}

/// Counter update after a login ceremony. Runs before an actor exists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecordPasskeyAuthentication {
    pub credential_id: String,
    pub sign_count: u32,
}

impl Authorizer for RecordPasskeyAuthentication {
    fn requirements(&self) -> Vec<Requirement> {
        Vec::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RevokePasskey {
    pub passkey_id: PasskeyId,
    /// Owner of the passkey
    pub user_id: UserId,
}

impl Authorizer for RevokePasskey {
    fn requirements(&self) -> Vec<Requirement> {
        self_or_user_manager(&self.user_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListPasskeys {
    pub user_id: UserId,
}

impl Authorizer for ListPasskeys {
    fn requirements(&self) -> Vec<Requirement> {
        self_or_user_manager(&self.user_id)
    }
}

fn self_or_user_manager(user_id: &UserId) -> Vec<Requirement> {
    vec![
        Requirement::MustBeAuthenticated,
        Requirement::MustBeSelfOrHaveSystemRole {
            user_id: user_id.clone(),
            role: SystemRole::UserManagement,
        },
    ]
}
