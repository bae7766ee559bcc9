//! Passkey command handlers
//!
//! Every operation goes through the policy evaluator first, then loads the
//! aggregate, applies one transition and writes it back conditionally.

use super::aggregate::{Passkey, PasskeyRegistration};
use super::error::PasskeyError;
use super::store::{PasskeyStore, WriteOutcome};
use crate::context::RequestContext;
use crate::evaluator::PolicyEvaluator;
use crate::requests::{ListPasskeys, RecordPasskeyAuthentication, RegisterPasskey, RevokePasskey};
use chrono::Utc;
use postern_core::{log_operation_error, log_operation_start, log_operation_success, PasskeyId};
use std::sync::Arc;
use tracing::warn;

pub struct PasskeyService {
    evaluator: Arc<PolicyEvaluator>,
    store: Arc<dyn PasskeyStore>,
}

impl PasskeyService {
    pub fn new(evaluator: Arc<PolicyEvaluator>, store: Arc<dyn PasskeyStore>) -> Self {
        Self { evaluator, store }
    }

    /// Register a credential for the calling user
    pub async fn register(
        &self,
        ctx: &RequestContext,
        request: RegisterPasskey,
    ) -> Result<Passkey, PasskeyError> {
        let user_id = ctx.actor().user_id().clone();
        let store = self.store.as_ref();

        self.evaluator
            .run(ctx, request, |request| async move {
                log_operation_start!("passkey_register", user_id = %user_id);

                if store
                    .find_by_credential_id(&request.credential_id)
                    .await?
                    .is_some()
                {
                    return Err(PasskeyError::DuplicateCredential);
                }

                let passkey = Passkey::register(
                    PasskeyRegistration {
                        user_id,
                        credential_id: request.credential_id,
                        public_key: request.public_key,
                        sign_count: request.sign_count,
                        display_name: request.display_name,
                        algorithm: request.algorithm,
                    },
                    Utc::now(),
                )?;

                match store.insert(&passkey).await? {
                    WriteOutcome::Written => {
                        log_operation_success!(
                            "passkey_register",
                            passkey_id = %passkey.id(),
                            algorithm = %passkey.algorithm()
                        );
                        reload(store, passkey.id()).await
                    }
                    WriteOutcome::Conflict => Err(PasskeyError::DuplicateCredential),
                }
            })
            .await
    }

    /// Apply the counter from a verified assertion
    pub async fn record_authentication(
        &self,
        ctx: &RequestContext,
        request: RecordPasskeyAuthentication,
    ) -> Result<Passkey, PasskeyError> {
        let store = self.store.as_ref();

        self.evaluator
            .run(ctx, request, |request| async move {
                let mut passkey = store
                    .find_by_credential_id(&request.credential_id)
                    .await?
                    .ok_or(PasskeyError::NotFound)?;

                if let Err(error) = passkey.record_authentication(request.sign_count, Utc::now()) {
                    log_operation_error!(
                        "passkey_authenticate",
                        error,
                        passkey_id = %passkey.id(),
                        user_id = %passkey.user_id(),
                        stored_sign_count = passkey.sign_count(),
                        presented_sign_count = request.sign_count,
                        code = error.code()
                    );
                    return Err(error);
                }

                save(store, &passkey).await
            })
            .await
    }

    /// Revoke a passkey owned by `request.user_id`
    pub async fn revoke(
        &self,
        ctx: &RequestContext,
        request: RevokePasskey,
    ) -> Result<Passkey, PasskeyError> {
        let revoked_by = ctx.actor().user_id().clone();
        let store = self.store.as_ref();

        self.evaluator
            .run(ctx, request, |request| async move {
                // The policy checked the claimed owner, so the passkey must
                // belong to that owner
                let mut passkey = store
                    .get(request.passkey_id)
                    .await?
                    .filter(|p| p.user_id() == &request.user_id)
                    .ok_or(PasskeyError::NotFound)?;

                passkey.revoke(revoked_by.clone(), Utc::now())?;
                let revoked = save(store, &passkey).await?;

                log_operation_success!(
                    "passkey_revoke",
                    passkey_id = %revoked.id(),
                    revoked_by = %revoked_by
                );
                Ok(revoked)
            })
            .await
    }

    pub async fn list(
        &self,
        ctx: &RequestContext,
        request: ListPasskeys,
    ) -> Result<Vec<Passkey>, PasskeyError> {
        let store = self.store.as_ref();

        self.evaluator
            .run(ctx, request, |request| async move {
                store.list_for_user(&request.user_id).await
            })
            .await
    }
}

/// Conditional write; returns the row as persisted, revision included
async fn save(store: &dyn PasskeyStore, passkey: &Passkey) -> Result<Passkey, PasskeyError> {
    match store.update(passkey).await? {
        WriteOutcome::Written => reload(store, passkey.id()).await,
        WriteOutcome::Conflict => {
            warn!(passkey_id = %passkey.id(), "Concurrent passkey update lost");
            Err(PasskeyError::ConcurrencyConflict)
        }
    }
}

async fn reload(store: &dyn PasskeyStore, id: PasskeyId) -> Result<Passkey, PasskeyError> {
    store.get(id).await?.ok_or(PasskeyError::NotFound)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::{ActorDescriptorBuilder, SystemRole};
    use crate::passkey::{InMemoryPasskeyStore, PasskeyAlgorithm, PasskeyState};
    use crate::policy::PolicyRegistry;
    use crate::AccessError;
    use postern_core::{async_trait, EntityKind, EntityResolver, Ownership, PosternResult, UserId};
    use uuid::Uuid;

    struct NoRows;

    #[async_trait]
    impl EntityResolver for NoRows {
        async fn resolve_ownership(
            &self,
            _kind: EntityKind,
            _id: Uuid,
        ) -> PosternResult<Option<Ownership>> {
            Ok(None)
        }
    }

    fn service() -> (PasskeyService, InMemoryPasskeyStore) {
        let store = InMemoryPasskeyStore::new();
        let evaluator = PolicyEvaluator::new(Arc::new(PolicyRegistry::standard()), Arc::new(NoRows));
        (
            PasskeyService::new(Arc::new(evaluator), Arc::new(store.clone())),
            store,
        )
    }

    fn as_user(id: &str) -> RequestContext {
        RequestContext::new(ActorDescriptorBuilder::new().with_user_id(id).build())
    }

    fn register_request(credential_id: &str) -> RegisterPasskey {
        RegisterPasskey {
            credential_id: credential_id.to_string(),
            public_key: "pk".to_string(),
            sign_count: 3,
            display_name: "Phone".to_string(),
            algorithm: PasskeyAlgorithm::EDDSA,
        }
    }

    #[tokio::test]
    async fn register_binds_passkey_to_caller_and_rejects_duplicates() {
        let (service, store) = service();

        let passkey = service
            .register(&as_user("alice"), register_request("cred-1"))
            .await
            .unwrap();
        assert_eq!(passkey.user_id().as_str(), "alice");
        assert_eq!(store.len().await, 1);

        let duplicate = service
            .register(&as_user("bob"), register_request("cred-1"))
            .await;
        assert!(matches!(duplicate, Err(PasskeyError::DuplicateCredential)));

        let anonymous = service
            .register(&RequestContext::anonymous(), register_request("cred-2"))
            .await;
        assert!(matches!(
            anonymous,
            Err(PasskeyError::Access(AccessError::Unauthenticated))
        ));
    }

    #[tokio::test]
    async fn authentication_runs_without_actor_and_enforces_counter() {
        let (service, _) = service();
        service
            .register(&as_user("alice"), register_request("cred-1"))
            .await
            .unwrap();

        let anonymous = RequestContext::anonymous();
        let updated = service
            .record_authentication(
                &anonymous,
                RecordPasskeyAuthentication {
                    credential_id: "cred-1".to_string(),
                    sign_count: 7,
                },
            )
            .await
            .unwrap();
        assert_eq!(updated.sign_count(), 7);
        assert!(updated.last_used_at().is_some());

        let replay = service
            .record_authentication(
                &anonymous,
                RecordPasskeyAuthentication {
                    credential_id: "cred-1".to_string(),
                    sign_count: 6,
                },
            )
            .await;
        assert_eq!(replay.unwrap_err().code(), "ERR_PASSKEY_CLONED_OR_INVALID");

        let unknown = service
            .record_authentication(
                &anonymous,
                RecordPasskeyAuthentication {
                    credential_id: "nope".to_string(),
                    sign_count: 1,
                },
            )
            .await;
        assert!(matches!(unknown, Err(PasskeyError::NotFound)));
    }

    #[tokio::test]
    async fn revoke_is_limited_to_owner_or_user_manager() {
        let (service, _) = service();
        let passkey = service
            .register(&as_user("alice"), register_request("cred-1"))
            .await
            .unwrap();
        let revoke = || RevokePasskey {
            passkey_id: passkey.id(),
            user_id: UserId::new("alice"),
        };

        let by_bob = service.revoke(&as_user("bob"), revoke()).await;
        assert!(matches!(
            by_bob,
            Err(PasskeyError::Access(AccessError::Forbidden))
        ));

        // Bob naming himself as owner does not reach alice's passkey
        let disguised = service
            .revoke(
                &as_user("bob"),
                RevokePasskey {
                    passkey_id: passkey.id(),
                    user_id: UserId::new("bob"),
                },
            )
            .await;
        assert!(matches!(disguised, Err(PasskeyError::NotFound)));

        let manager = RequestContext::new(
            ActorDescriptorBuilder::new()
                .with_user_id("support")
                .with_role(SystemRole::UserManagement)
                .build(),
        );
        let revoked = service.revoke(&manager, revoke()).await.unwrap();
        assert_eq!(revoked.state(), PasskeyState::Revoked);
        assert_eq!(
            revoked.revocation().map(|r| r.revoked_by.as_str()),
            Some("support")
        );

        let again = service.revoke(&as_user("alice"), revoke()).await;
        assert!(matches!(again, Err(PasskeyError::Revoked)));

        let login = service
            .record_authentication(
                &RequestContext::anonymous(),
                RecordPasskeyAuthentication {
                    credential_id: "cred-1".to_string(),
                    sign_count: 50,
                },
            )
            .await;
        assert!(matches!(login, Err(PasskeyError::Revoked)));
    }

    #[tokio::test]
    async fn returned_passkeys_carry_the_stored_revision() {
        let (service, store) = service();
        let registered = service
            .register(&as_user("alice"), register_request("cred-1"))
            .await
            .unwrap();
        let stored = store.get(registered.id()).await.unwrap().unwrap();
        assert_eq!(registered.revision(), stored.revision());

        let authenticated = service
            .record_authentication(
                &RequestContext::anonymous(),
                RecordPasskeyAuthentication {
                    credential_id: "cred-1".to_string(),
                    sign_count: 9,
                },
            )
            .await
            .unwrap();
        let stored = store.get(registered.id()).await.unwrap().unwrap();
        assert_eq!(authenticated, stored);

        // The returned value is current, so writing it back does not conflict
        let mut next = authenticated;
        next.record_authentication(10, Utc::now()).unwrap();
        let saved = save(&store, &next).await.unwrap();
        assert_eq!(saved.sign_count(), 10);
        assert_eq!(saved.revision(), stored.revision() + 1);

        let revoked = service
            .revoke(
                &as_user("alice"),
                RevokePasskey {
                    passkey_id: registered.id(),
                    user_id: UserId::new("alice"),
                },
            )
            .await
            .unwrap();
        assert_eq!(revoked, store.get(registered.id()).await.unwrap().unwrap());
    }

    #[tokio::test]
    async fn rejected_authentication_leaves_stored_passkey_untouched() {
        let (service, store) = service();
        let registered = service
            .register(&as_user("alice"), register_request("cred-1"))
            .await
            .unwrap();

        let rejected = service
            .record_authentication(
                &RequestContext::anonymous(),
                RecordPasskeyAuthentication {
                    credential_id: "cred-1".to_string(),
                    sign_count: 1,
                },
            )
            .await;
        assert!(matches!(rejected, Err(PasskeyError::ClonedOrInvalid)));
        assert_eq!(store.get(registered.id()).await.unwrap().unwrap(), registered);
    }

    #[tokio::test]
    async fn stale_writes_conflict() {
        let store = InMemoryPasskeyStore::new();
        let passkey = Passkey::register(
            PasskeyRegistration {
                user_id: UserId::new("alice"),
                credential_id: "cred-1".to_string(),
                public_key: "pk".to_string(),
                sign_count: 0,
                display_name: "Key".to_string(),
                algorithm: PasskeyAlgorithm::ES256,
            },
            Utc::now(),
        )
        .unwrap();
        store.insert(&passkey).await.unwrap();

        let mut first = store.get(passkey.id()).await.unwrap().unwrap();
        let mut second = first.clone();

        first.record_authentication(1, Utc::now()).unwrap();
        second.record_authentication(2, Utc::now()).unwrap();

        assert!(save(&store, &first).await.is_ok());
        assert!(matches!(
            save(&store, &second).await,
            Err(PasskeyError::ConcurrencyConflict)
        ));
        assert_eq!(store.get(passkey.id()).await.unwrap().unwrap().sign_count(), 1);
    }

    #[tokio::test]
    async fn list_requires_self_or_manager() {
        let (service, _) = service();
        service
            .register(&as_user("alice"), register_request("cred-1"))
            .await
            .unwrap();
        service
            .register(&as_user("alice"), register_request("cred-2"))
            .await
            .unwrap();

        let own = service
            .list(
                &as_user("alice"),
                ListPasskeys {
                    user_id: UserId::new("alice"),
                },
            )
            .await
            .unwrap();
        assert_eq!(own.len(), 2);

        let other = service
            .list(
                &as_user("mallory"),
                ListPasskeys {
                    user_id: UserId::new("alice"),
                },
            )
            .await;
        assert_eq!(other.unwrap_err().code(), "ERR_FORBIDDEN");
    }
}
