//! Passkey persistence seam

use super::aggregate::{Passkey, PasskeySnapshot};
use super::error::PasskeyError;
use async_trait::async_trait;
use postern_core::{PasskeyId, UserId};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Result of a conditional write
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Written,
    /// The stored revision no longer matches the one the aggregate was
    /// loaded at
    Conflict,
}

/// Storage for passkey aggregates with optimistic concurrency.
///
/// `update` must write only when the stored revision equals
/// `passkey.revision()`, and bump the stored revision on success.
#[async_trait]
pub trait PasskeyStore: Send + Sync {
    async fn find_by_credential_id(&self, credential_id: &str)
        -> Result<Option<Passkey>, PasskeyError>;

    async fn get(&self, id: PasskeyId) -> Result<Option<Passkey>, PasskeyError>;

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Passkey>, PasskeyError>;

    /// Insert a new passkey; `Conflict` when the credential id is taken
    async fn insert(&self, passkey: &Passkey) -> Result<WriteOutcome, PasskeyError>;

    async fn update(&self, passkey: &Passkey) -> Result<WriteOutcome, PasskeyError>;
}

/// In-memory store for tests and single-process tooling
#[derive(Debug, Clone, Default)]
pub struct InMemoryPasskeyStore {
    passkeys: Arc<RwLock<HashMap<PasskeyId, PasskeySnapshot>>>,
}

impl InMemoryPasskeyStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.passkeys.read().await.len()
    }
}

#[async_trait]
impl PasskeyStore for InMemoryPasskeyStore {
    async fn find_by_credential_id(
        &self,
        credential_id: &str,
    ) -> Result<Option<Passkey>, PasskeyError> {
        let passkeys = self.passkeys.read().await;
        passkeys
            .values()
            .find(|p| p.credential_id == credential_id)
            .cloned()
            .map(Passkey::from_snapshot)
            .transpose()
    }

    async fn get(&self, id: PasskeyId) -> Result<Option<Passkey>, PasskeyError> {
        let passkeys = self.passkeys.read().await;
        passkeys
            .get(&id)
            .cloned()
            .map(Passkey::from_snapshot)
            .transpose()
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Passkey>, PasskeyError> {
        let passkeys = self.passkeys.read().await;
        let mut owned: Vec<_> = passkeys
            .values()
            .filter(|p| &p.user_id == user_id)
            .cloned()
            .collect();
        owned.sort_by_key(|p| p.registered_at);
        owned.into_iter().map(Passkey::from_snapshot).collect()
    }

    async fn insert(&self, passkey: &Passkey) -> Result<WriteOutcome, PasskeyError> {
        let mut passkeys = self.passkeys.write().await;
        let taken = passkeys.contains_key(&passkey.id())
            || passkeys
                .values()
                .any(|p| p.credential_id == passkey.credential_id());
        if taken {
            return Ok(WriteOutcome::Conflict);
        }

        let mut snapshot = passkey.snapshot();
        snapshot.revision = 1;
        passkeys.insert(passkey.id(), snapshot);
        Ok(WriteOutcome::Written)
    }

    async fn update(&self, passkey: &Passkey) -> Result<WriteOutcome, PasskeyError> {
        let mut passkeys = self.passkeys.write().await;
        let Some(stored) = passkeys.get_mut(&passkey.id()) else {
            return Err(PasskeyError::NotFound);
        };
        if stored.revision != passkey.revision() {
            return Ok(WriteOutcome::Conflict);
        }

        let mut snapshot = passkey.snapshot();
        snapshot.revision = stored.revision + 1;
        *stored = snapshot;
        Ok(WriteOutcome::Written)
    }
}
