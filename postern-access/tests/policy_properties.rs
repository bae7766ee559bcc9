//! End-to-end authorization properties over the standard request catalogue

use chrono::{Duration, Utc};
use postern_access::requests::*;
use postern_access::{
    AccessError, ActorDescriptor, ActorDescriptorBuilder, Decision, EvaluatedRequirement,
    IdentityAttribute, Passkey, PasskeyAlgorithm, PasskeyError, PasskeyRegistration,
    PolicyEvaluator, PolicyRegistry, RequestContext, Requirement, SystemRole,
};
use postern_core::{
    async_trait, CampaignId, ChaosAddressId, DomainId, EmailId, EntityKind, EntityResolver,
    Ownership, PosternResult, SearchParams, SortOrder, SubdomainId, UserId,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

const D: &str = "11111111-1111-1111-1111-000000000001";
const S: &str = "22222222-2222-2222-2222-000000000002";

/// Read-model double that counts every lookup
#[derive(Default)]
struct CountingResolver {
    rows: HashMap<Uuid, Ownership>,
    calls: AtomicUsize,
}

impl CountingResolver {
    fn own(mut self, id: Uuid, domain_id: DomainId, subdomain_id: SubdomainId) -> Self {
        self.rows.insert(
            id,
            Ownership {
                domain_id,
                subdomain_id,
            },
        );
        self
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl EntityResolver for CountingResolver {
    async fn resolve_ownership(
        &self,
        _kind: EntityKind,
        id: Uuid,
    ) -> PosternResult<Option<Ownership>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.rows.get(&id).copied())
    }
}

struct World {
    d1: DomainId,
    s1: SubdomainId,
    d2: DomainId,
    s2: SubdomainId,
    campaign: CampaignId,
    email: EmailId,
    chaos: ChaosAddressId,
    resolver: Arc<CountingResolver>,
}

fn world() -> World {
    let d1: DomainId = D.parse().unwrap();
    let s1: SubdomainId = S.parse().unwrap();
    let d2 = DomainId::generate();
    let s2 = SubdomainId::generate();
    let campaign = CampaignId::generate();
    let email = EmailId::generate();
    let chaos = ChaosAddressId::generate();

    let resolver = CountingResolver::default()
        .own(s1.0, d1, s1)
        .own(s2.0, d2, s2)
        .own(campaign.0, d1, s1)
        .own(email.0, d2, s2)
        .own(chaos.0, d1, s1);

    World {
        d1,
        s1,
        d2,
        s2,
        campaign,
        email,
        chaos,
        resolver: Arc::new(resolver),
    }
}

fn evaluator(world: &World) -> PolicyEvaluator {
    PolicyEvaluator::new(
        Arc::new(PolicyRegistry::standard()),
        world.resolver.clone(),
    )
}

fn ctx(actor: ActorDescriptor) -> RequestContext {
    RequestContext::new(actor)
}

#[tokio::test]
async fn domain_admin_passes_every_scoped_request() {
    let w = world();
    let evaluator = evaluator(&w);
    let admin = ctx(ActorDescriptorBuilder::new()
        .with_user_id("root")
        .with_role(SystemRole::DomainManagement)
        .build());

    assert_eq!(evaluator.authorize(&admin, &DeleteDomain { domain_id: w.d2 }).await, Ok(()));
    assert_eq!(
        evaluator
            .authorize(&admin, &DeleteSubdomain { subdomain_id: w.s2 })
            .await,
        Ok(())
    );
    assert_eq!(
        evaluator
            .authorize(&admin, &GetCampaign { campaign_id: w.campaign })
            .await,
        Ok(())
    );
    assert_eq!(
        evaluator.authorize(&admin, &DeleteEmail { email_id: w.email }).await,
        Ok(())
    );
    assert_eq!(
        evaluator.authorize(&admin, &SearchDomains::default()).await,
        Ok(())
    );
}

#[tokio::test]
async fn domain_moderation_reaches_owned_subdomains_only() {
    let w = world();
    let evaluator = evaluator(&w);
    let moderator = ctx(ActorDescriptorBuilder::new()
        .with_user_id("mod")
        .moderating_domain(w.d1)
        .build());

    assert_eq!(
        evaluator
            .authorize(&moderator, &UpdateSubdomain { subdomain_id: w.s1, name: None })
            .await,
        Ok(())
    );
    assert_eq!(
        evaluator
            .authorize(&moderator, &GetSubdomain { subdomain_id: w.s1 })
            .await,
        Ok(())
    );

    // Cross-tenant: S2 belongs to an unrelated domain
    assert_eq!(
        evaluator
            .authorize(&moderator, &GetSubdomain { subdomain_id: w.s2 })
            .await,
        Err(AccessError::Forbidden)
    );
    assert_eq!(
        evaluator.authorize(&moderator, &GetEmail { email_id: w.email }).await,
        Err(AccessError::Forbidden)
    );
}

#[tokio::test]
async fn viewers_read_but_never_moderate() {
    let w = world();
    let evaluator = evaluator(&w);
    let viewer = ctx(ActorDescriptorBuilder::new()
        .with_user_id("viewer")
        .viewing_subdomain(w.s1)
        .build());

    assert_eq!(
        evaluator
            .authorize(&viewer, &GetSubdomain { subdomain_id: w.s1 })
            .await,
        Ok(())
    );
    assert_eq!(
        evaluator
            .authorize(
                &viewer,
                &AddSubdomainViewer {
                    subdomain_id: w.s1,
                    user_id: UserId::new("friend")
                }
            )
            .await,
        Err(AccessError::Forbidden)
    );
    assert_eq!(
        evaluator
            .authorize(&viewer, &GetCampaign { campaign_id: w.campaign })
            .await,
        Ok(())
    );
}

#[tokio::test]
async fn viewers_see_chaos_addresses_but_cannot_update_them() {
    let w = world();
    let evaluator = evaluator(&w);
    let viewer = ctx(ActorDescriptorBuilder::new()
        .with_user_id("viewer")
        .viewing_subdomain(w.s1)
        .build());
    let moderator = ctx(ActorDescriptorBuilder::new()
        .with_user_id("mod")
        .moderating_subdomain(w.s1)
        .build());
    let update = UpdateChaosAddress {
        chaos_address_id: w.chaos,
        enabled: Some(false),
        reply_code: Some(550),
    };

    assert_eq!(
        evaluator
            .authorize(&viewer, &GetChaosAddress { chaos_address_id: w.chaos })
            .await,
        Ok(())
    );
    assert_eq!(
        evaluator.authorize(&viewer, &update).await,
        Err(AccessError::Forbidden)
    );
    assert_eq!(evaluator.authorize(&moderator, &update).await, Ok(()));
}

#[tokio::test]
async fn missing_and_forbidden_targets_look_identical() {
    let w = world();
    let evaluator = evaluator(&w);
    let moderator = ctx(ActorDescriptorBuilder::new()
        .with_user_id("mod")
        .moderating_domain(w.d1)
        .build());

    let missing = evaluator
        .authorize(&moderator, &GetCampaign { campaign_id: CampaignId::generate() })
        .await;
    let foreign = evaluator
        .authorize(&moderator, &GetEmail { email_id: w.email })
        .await;

    assert_eq!(missing, Err(AccessError::Forbidden));
    assert_eq!(missing, foreign);
}

#[test]
fn unscoped_search_policy_is_always_two_requirements() {
    let registry = PolicyRegistry::standard();
    let actor = ctx(ActorDescriptorBuilder::new().with_user_id("u").build());

    let variants = [
        SearchParams::default(),
        SearchParams {
            term: Some("invoice".to_string()),
            sort: SortOrder::Descending,
            page: 40,
            page_size: 5,
        },
    ];

    for params in variants {
        let subdomains = registry
            .build(&actor, &SearchSubdomains { params: params.clone() })
            .unwrap();
        assert_eq!(
            subdomains.requirements(),
            &[
                Requirement::MustBeAuthenticated,
                Requirement::MustBeModeratorToAtLeastOneSubdomain
            ]
        );

        let emails = registry
            .build(
                &actor,
                &SearchEmails {
                    subdomain_id: None,
                    params: params.clone(),
                },
            )
            .unwrap();
        assert_eq!(emails.len(), 2);

        let domains = registry
            .build(&actor, &SearchDomains { params })
            .unwrap();
        assert_eq!(
            domains.requirements()[1],
            Requirement::MustBeModeratorToAtLeastOneDomain
        );
    }
}

#[test]
fn internal_marker_empties_every_policy() {
    let registry = PolicyRegistry::standard();
    let internal = RequestContext::internal();
    let s = SubdomainId::generate();

    assert!(registry
        .build(&internal, &PurgeExpiredEmails { older_than_days: 30 })
        .unwrap()
        .is_empty());
    assert!(registry
        .build(&internal, &DeleteSubdomain { subdomain_id: s })
        .unwrap()
        .is_empty());
    assert!(registry
        .build(&internal, &CreateDomain { name: "x.test".to_string() })
        .unwrap()
        .is_empty());
}

#[test]
fn public_ingestion_has_empty_policy() {
    let registry = PolicyRegistry::standard();
    let policy = registry
        .build(
            &RequestContext::anonymous(),
            &IngestInboundMail {
                recipient: "probe@s.acme.test".to_string(),
                sender: "mta@example.test".to_string(),
                size_bytes: 512,
            },
        )
        .unwrap();
    assert!(policy.is_empty());
}

#[tokio::test]
async fn moderator_of_domain_d_may_act_on_subdomain_s() {
    let w = world();
    let evaluator = evaluator(&w);
    let actor = ActorDescriptor::from_attribute_list(&[
        IdentityAttribute::new("sub", "moderator-1"),
        IdentityAttribute::new("moderates_domain", D),
    ]);
    let ctx = ctx(actor);
    let request = GetSubdomain {
        subdomain_id: S.parse().unwrap(),
    };

    let policy = evaluator.registry().build(&ctx, &request).unwrap();
    let evaluation = evaluator.evaluate(&ctx, &policy).await;

    assert_eq!(
        evaluation.steps,
        vec![
            EvaluatedRequirement {
                requirement: Requirement::MustBeAuthenticated,
                decision: Decision::Authorized,
            },
            EvaluatedRequirement {
                requirement: Requirement::MustHaveAccessToSubdomain(S.parse().unwrap()),
                decision: Decision::Authorized,
            },
        ]
    );

    let forwarded = evaluator
        .run(&ctx, request, |request| async move {
            Ok::<_, AccessError>(request.subdomain_id)
        })
        .await;
    assert_eq!(forwarded, Ok(w.s1));
}

#[tokio::test]
async fn unauthenticated_actor_is_rejected_before_any_lookup() {
    let w = world();
    let evaluator = evaluator(&w);
    let anonymous = RequestContext::anonymous();

    for subdomain_id in [w.s1, w.s2, SubdomainId::generate()] {
        let result = evaluator
            .authorize(&anonymous, &GetSubdomain { subdomain_id })
            .await;
        assert_eq!(result, Err(AccessError::Unauthenticated));
    }
    let result = evaluator
        .authorize(&anonymous, &GetCampaign { campaign_id: w.campaign })
        .await;
    assert_eq!(result, Err(AccessError::Unauthenticated));

    assert_eq!(w.resolver.calls(), 0);
}

fn active_passkey(sign_count: u32) -> Passkey {
    Passkey::register(
        PasskeyRegistration {
            user_id: UserId::new("alice"),
            credential_id: "cred".to_string(),
            public_key: "pk".to_string(),
            sign_count,
            display_name: "YubiKey".to_string(),
            algorithm: PasskeyAlgorithm::ES256,
        },
        Utc::now() - Duration::days(1),
    )
    .unwrap()
}

#[test]
fn passkey_equal_counter_updates_last_used() {
    let mut passkey = active_passkey(0);
    let used_at = Utc::now();

    passkey.record_authentication(0, used_at).unwrap();
    assert_eq!(passkey.sign_count(), 0);
    assert_eq!(passkey.last_used_at(), Some(used_at));
}

#[test]
fn passkey_decreasing_counter_is_rejected_without_change() {
    let mut passkey = active_passkey(10);
    let first_use = Utc::now();
    passkey.record_authentication(12, first_use).unwrap();

    let result = passkey.record_authentication(11, first_use + Duration::seconds(5));
    assert!(matches!(result, Err(PasskeyError::ClonedOrInvalid)));
    assert_eq!(passkey.sign_count(), 12);
    assert_eq!(passkey.last_used_at(), Some(first_use));
}

#[test]
fn revoked_passkey_rejects_every_counter() {
    let mut passkey = active_passkey(3);
    passkey.revoke(UserId::new("alice"), Utc::now()).unwrap();

    for count in [0, 3, 4, u32::MAX] {
        let result = passkey.record_authentication(count, Utc::now());
        assert!(matches!(result, Err(PasskeyError::Revoked)));
    }
    assert!(passkey.last_used_at().is_none());
}

#[test]
fn revoke_twice_fails_and_keeps_other_fields() {
    let mut passkey = active_passkey(7);
    let before = passkey.clone();

    passkey.revoke(UserId::new("admin"), Utc::now()).unwrap();
    assert_eq!(passkey.user_id(), before.user_id());
    assert_eq!(passkey.display_name(), before.display_name());
    assert_eq!(passkey.algorithm(), before.algorithm());
    assert_eq!(passkey.sign_count(), before.sign_count());

    let second = passkey.revoke(UserId::new("admin"), Utc::now());
    assert_eq!(second.unwrap_err().code(), "ERR_PASSKEY_REVOKED");
}
