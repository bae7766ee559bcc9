//! Requirement Primitives
//!
//! A requirement is a small predicate over the actor descriptor and the
//! target id(s) it was constructed with. Requirements never fail with an
//! error: they answer [`Decision::Authorized`] or [`Decision::Denied`] with an
//! internal reason the evaluator logs.
//!
//! Hierarchy rules:
//! - the domain-admin role passes every domain/subdomain check
//! - moderating a domain implies moderating each subdomain it owns
//! - moderating a subdomain says nothing about its parent domain
//! - viewers pass access checks but never moderation checks

use crate::identity::{ActorDescriptor, SystemRole};
use crate::resolver::OwnershipLookup;
use postern_core::{
    CampaignId, ChaosAddressId, DomainId, EmailId, EntityKind, Ownership, SubdomainId, UserId,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Atomic authorization predicate
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "requirement", content = "target", rename_all = "snake_case")]
pub enum Requirement {
    MustBeAuthenticated,
    MustHaveSystemRole(SystemRole),
    MustBeSelfOrHaveSystemRole { user_id: UserId, role: SystemRole },
    MustBeModeratorToDomain(DomainId),
    MustBeModeratorToSubdomain(SubdomainId),
    MustHaveAccessToSubdomain(SubdomainId),
    MustHaveAccessToCampaign(CampaignId),
    MustHaveAccessToSubdomainViaEmail(EmailId),
    MustBeModeratorToSubdomainViaEmail(EmailId),
    MustHaveAccessToChaosAddress(ChaosAddressId),
    MustBeModeratorToChaosAddress(ChaosAddressId),
    /// Gate for unscoped domain searches
    MustBeModeratorToAtLeastOneDomain,
    /// Gate for unscoped subdomain/resource searches
    MustBeModeratorToAtLeastOneSubdomain,
}

/// Why a requirement denied. Internal only: never shown to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DenialReason {
    Unauthenticated,
    MissingSystemRole(SystemRole),
    NotSelf,
    NotModerator,
    NoAccess,
    NoModeratedScope,
    TargetNotFound { kind: EntityKind, id: Uuid },
    ResolutionFailed { kind: EntityKind, id: Uuid },
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DenialReason::Unauthenticated => write!(f, "actor is not authenticated"),
            DenialReason::MissingSystemRole(role) => write!(f, "missing system role {}", role),
            DenialReason::NotSelf => write!(f, "actor is not the target user"),
            DenialReason::NotModerator => write!(f, "actor does not moderate the target"),
            DenialReason::NoAccess => write!(f, "actor has no access to the target"),
            DenialReason::NoModeratedScope => write!(f, "actor moderates nothing in scope"),
            DenialReason::TargetNotFound { kind, id } => write!(f, "{} {} not found", kind, id),
            DenialReason::ResolutionFailed { kind, id } => {
                write!(f, "could not resolve {} {}", kind, id)
            }
        }
    }
}

/// Result of evaluating one requirement
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    Authorized,
    Denied(DenialReason),
}

impl Decision {
    pub fn is_authorized(&self) -> bool {
        matches!(self, Decision::Authorized)
    }

    fn deny_unless(condition: bool, reason: DenialReason) -> Self {
        if condition {
            Decision::Authorized
        } else {
            Decision::Denied(reason)
        }
    }
}

impl Requirement {
    /// Stable name used in logs and CLI output
    pub fn name(&self) -> &'static str {
        match self {
            Requirement::MustBeAuthenticated => "MustBeAuthenticated",
            Requirement::MustHaveSystemRole(_) => "MustHaveSystemRole",
            Requirement::MustBeSelfOrHaveSystemRole { .. } => "MustBeSelfOrHaveSystemRole",
            Requirement::MustBeModeratorToDomain(_) => "MustBeModeratorToDomain",
            Requirement::MustBeModeratorToSubdomain(_) => "MustBeModeratorToSubdomain",
            Requirement::MustHaveAccessToSubdomain(_) => "MustHaveAccessToSubdomain",
            Requirement::MustHaveAccessToCampaign(_) => "MustHaveAccessToCampaign",
            Requirement::MustHaveAccessToSubdomainViaEmail(_) => {
                "MustHaveAccessToSubdomainViaEmail"
            }
            Requirement::MustBeModeratorToSubdomainViaEmail(_) => {
                "MustBeModeratorToSubdomainViaEmail"
            }
            Requirement::MustHaveAccessToChaosAddress(_) => "MustHaveAccessToChaosAddress",
            Requirement::MustBeModeratorToChaosAddress(_) => "MustBeModeratorToChaosAddress",
            Requirement::MustBeModeratorToAtLeastOneDomain => "MustBeModeratorToAtLeastOneDomain",
            Requirement::MustBeModeratorToAtLeastOneSubdomain => {
                "MustBeModeratorToAtLeastOneSubdomain"
            }
        }
    }

    /// Evaluate against an actor, consulting the read model where the
    /// requirement needs ownership facts
    pub async fn evaluate(&self, actor: &ActorDescriptor, lookup: &OwnershipLookup<'_>) -> Decision {
        match self {
            Requirement::MustBeAuthenticated => {
                Decision::deny_unless(actor.is_authenticated(), DenialReason::Unauthenticated)
            }
            Requirement::MustHaveSystemRole(role) => {
                Decision::deny_unless(actor.has_role(*role), DenialReason::MissingSystemRole(*role))
            }
            Requirement::MustBeSelfOrHaveSystemRole { user_id, role } => Decision::deny_unless(
                actor.has_role(*role)
                    || (actor.is_authenticated() && !user_id.is_empty() && actor.user_id() == user_id),
                DenialReason::NotSelf,
            ),
            Requirement::MustBeModeratorToDomain(domain_id) => Decision::deny_unless(
                actor.is_domain_admin() || actor.moderates_domain(domain_id),
                DenialReason::NotModerator,
            ),
            Requirement::MustBeModeratorToSubdomain(subdomain_id) => {
                subdomain_check(actor, *subdomain_id, Level::Moderate, lookup).await
            }
            Requirement::MustHaveAccessToSubdomain(subdomain_id) => {
                subdomain_check(actor, *subdomain_id, Level::Access, lookup).await
            }
            Requirement::MustHaveAccessToCampaign(campaign_id) => {
                resource_check(actor, EntityKind::Campaign, campaign_id.0, Level::Access, lookup)
                    .await
            }
            Requirement::MustHaveAccessToSubdomainViaEmail(email_id) => {
                resource_check(actor, EntityKind::Email, email_id.0, Level::Access, lookup).await
            }
            Requirement::MustBeModeratorToSubdomainViaEmail(email_id) => {
                resource_check(actor, EntityKind::Email, email_id.0, Level::Moderate, lookup)
                    .await
            }
            Requirement::MustHaveAccessToChaosAddress(address_id) => {
                resource_check(
                    actor,
                    EntityKind::ChaosAddress,
                    address_id.0,
                    Level::Access,
                    lookup,
                )
                .await
            }
            Requirement::MustBeModeratorToChaosAddress(address_id) => {
                resource_check(
                    actor,
                    EntityKind::ChaosAddress,
                    address_id.0,
                    Level::Moderate,
                    lookup,
                )
                .await
            }
            Requirement::MustBeModeratorToAtLeastOneDomain => Decision::deny_unless(
                actor.is_domain_admin() || !actor.moderated_domain_ids().is_empty(),
                DenialReason::NoModeratedScope,
            ),
            Requirement::MustBeModeratorToAtLeastOneSubdomain => Decision::deny_unless(
                actor.is_domain_admin()
                    || !actor.moderated_subdomain_ids().is_empty()
                    || !actor.moderated_domain_ids().is_empty(),
                DenialReason::NoModeratedScope,
            ),
        }
    }
}

impl fmt::Display for Requirement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Requirement::MustBeAuthenticated
            | Requirement::MustBeModeratorToAtLeastOneDomain
            | Requirement::MustBeModeratorToAtLeastOneSubdomain => f.write_str(self.name()),
            Requirement::MustHaveSystemRole(role) => write!(f, "{}({})", self.name(), role),
            Requirement::MustBeSelfOrHaveSystemRole { user_id, role } => {
                write!(f, "{}({}, {})", self.name(), user_id, role)
            }
            Requirement::MustBeModeratorToDomain(id) => write!(f, "{}({})", self.name(), id),
            Requirement::MustBeModeratorToSubdomain(id)
            | Requirement::MustHaveAccessToSubdomain(id) => write!(f, "{}({})", self.name(), id),
            Requirement::MustHaveAccessToCampaign(id) => write!(f, "{}({})", self.name(), id),
            Requirement::MustHaveAccessToSubdomainViaEmail(id)
            | Requirement::MustBeModeratorToSubdomainViaEmail(id) => {
                write!(f, "{}({})", self.name(), id)
            }
            Requirement::MustHaveAccessToChaosAddress(id)
            | Requirement::MustBeModeratorToChaosAddress(id) => write!(f, "{}({})", self.name(), id),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    /// Read/write administration
    Moderate,
    /// Moderation or read-only viewing
    Access,
}

impl Level {
    fn denial(self) -> DenialReason {
        match self {
            Level::Moderate => DenialReason::NotModerator,
            Level::Access => DenialReason::NoAccess,
        }
    }
}

/// Grant check once the owning domain is known
fn admits(actor: &ActorDescriptor, ownership: &Ownership, level: Level) -> bool {
    actor.is_domain_admin()
        || actor.moderates_domain(&ownership.domain_id)
        || actor.moderates_subdomain_directly(&ownership.subdomain_id)
        || (level == Level::Access && actor.views_subdomain(&ownership.subdomain_id))
}

async fn subdomain_check(
    actor: &ActorDescriptor,
    subdomain_id: SubdomainId,
    level: Level,
    lookup: &OwnershipLookup<'_>,
) -> Decision {
    if actor.is_domain_admin()
        || actor.moderates_subdomain_directly(&subdomain_id)
        || (level == Level::Access && actor.views_subdomain(&subdomain_id))
    {
        return Decision::Authorized;
    }

    // Only a domain grant can still admit the actor
    if actor.moderated_domain_ids().is_empty() {
        return Decision::Denied(level.denial());
    }

    match lookup.resolve(EntityKind::Subdomain, subdomain_id.0).await {
        Ok(ownership) => Decision::deny_unless(
            actor.moderates_domain(&ownership.domain_id),
            level.denial(),
        ),
        Err(reason) => Decision::Denied(reason),
    }
}

/// Resolve a resource to its subdomain, then apply the subdomain rule.
/// An unresolvable resource denies exactly like a forbidden one.
async fn resource_check(
    actor: &ActorDescriptor,
    kind: EntityKind,
    id: Uuid,
    level: Level,
    lookup: &OwnershipLookup<'_>,
) -> Decision {
    if !actor.has_any_domain_grant() {
        return Decision::Denied(level.denial());
    }

    match lookup.resolve(kind, id).await {
        Ok(ownership) => Decision::deny_unless(admits(actor, &ownership, level), level.denial()),
        Err(reason) => Decision::Denied(reason),
    }
}
