//! Ownership lookup adapter
//!
//! Wraps the read model's [`EntityResolver`] for use inside requirement
//! evaluation: every lookup is bounded by a timeout, and missing rows,
//! storage failures and timeouts all come back as denial reasons instead of
//! errors.

use crate::requirements::DenialReason;
use postern_core::{with_timeout, EntityKind, EntityResolver, Ownership};
use tracing::{debug, warn};
use uuid::Uuid;

pub struct OwnershipLookup<'a> {
    resolver: &'a dyn EntityResolver,
    timeout_ms: u64,
}

impl<'a> OwnershipLookup<'a> {
    pub fn new(resolver: &'a dyn EntityResolver, timeout_ms: u64) -> Self {
        Self {
            resolver,
            timeout_ms,
        }
    }

    /// Resolve an entity to its owning domain and subdomain
    pub async fn resolve(&self, kind: EntityKind, id: Uuid) -> Result<Ownership, DenialReason> {
        let lookup = self.resolver.resolve_ownership(kind, id);

        match with_timeout(lookup, self.timeout_ms, "resolve_ownership").await {
            Ok(Ok(Some(ownership))) => {
                debug!(kind = %kind, id = %id, domain_id = %ownership.domain_id, "Resolved ownership");
                Ok(ownership)
            }
            Ok(Ok(None)) => {
                debug!(kind = %kind, id = %id, "Ownership target not found");
                Err(DenialReason::TargetNotFound { kind, id })
            }
            Ok(Err(error)) => {
                error.log();
                warn!(kind = %kind, id = %id, "Ownership lookup failed, denying");
                Err(DenialReason::ResolutionFailed { kind, id })
            }
            Err(_timeout) => {
                warn!(
                    kind = %kind,
                    id = %id,
                    timeout_ms = self.timeout_ms,
                    "Ownership lookup timed out, denying"
                );
                Err(DenialReason::ResolutionFailed { kind, id })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use postern_core::{async_trait, storage_error, DomainId, PosternResult, SubdomainId};
    use std::time::Duration;

    enum Behaviour {
        Found(Ownership),
        Missing,
        Failing,
        Slow,
    }

    struct FakeResolver(Behaviour);

    #[async_trait]
    impl EntityResolver for FakeResolver {
        async fn resolve_ownership(
            &self,
            _kind: EntityKind,
            _id: Uuid,
        ) -> PosternResult<Option<Ownership>> {
            match &self.0 {
                Behaviour::Found(ownership) => Ok(Some(*ownership)),
                Behaviour::Missing => Ok(None),
                Behaviour::Failing => Err(storage_error!("disk on fire", "test")),
                Behaviour::Slow => {
                    tokio::time::sleep(Duration::from_millis(500)).await;
                    Ok(None)
                }
            }
        }
    }

    #[tokio::test]
    async fn found_rows_resolve() {
        let ownership = Ownership {
            domain_id: DomainId::generate(),
            subdomain_id: SubdomainId::generate(),
        };
        let resolver = FakeResolver(Behaviour::Found(ownership));
        let lookup = OwnershipLookup::new(&resolver, 1000);

        let resolved = lookup.resolve(EntityKind::Email, Uuid::new_v4()).await;
        assert_eq!(resolved, Ok(ownership));
    }

    #[tokio::test]
    async fn missing_rows_are_target_not_found() {
        let resolver = FakeResolver(Behaviour::Missing);
        let lookup = OwnershipLookup::new(&resolver, 1000);
        let id = Uuid::new_v4();

        let resolved = lookup.resolve(EntityKind::Campaign, id).await;
        assert_eq!(
            resolved,
            Err(DenialReason::TargetNotFound {
                kind: EntityKind::Campaign,
                id
            })
        );
    }

    #[tokio::test]
    async fn storage_failures_and_timeouts_deny() {
        let id = Uuid::new_v4();

        let failing = FakeResolver(Behaviour::Failing);
        let resolved = OwnershipLookup::new(&failing, 1000)
            .resolve(EntityKind::Subdomain, id)
            .await;
        assert!(matches!(
            resolved,
            Err(DenialReason::ResolutionFailed { .. })
        ));

        let slow = FakeResolver(Behaviour::Slow);
        let resolved = OwnershipLookup::new(&slow, 10)
            .resolve(EntityKind::Subdomain, id)
            .await;
        assert!(matches!(
            resolved,
            Err(DenialReason::ResolutionFailed { .. })
        ));
    }
}
