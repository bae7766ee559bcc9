//! Policy Evaluator
//!
//! Runs a request's requirement list in declaration order against the
//! request's actor and stops at the first denial. Callers only ever see
//! [`AccessError::Unauthenticated`] or [`AccessError::Forbidden`]; which
//! requirement failed and why goes to the log.

use crate::context::RequestContext;
use crate::policy::{Authorizer, Policy, PolicyRegistry};
use crate::requirements::{Decision, DenialReason, Requirement};
use crate::resolver::OwnershipLookup;
use crate::{AccessError, AccessResult};
use postern_core::{AccessConfig, EntityResolver};
use std::any::Any;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, error, info};

/// One evaluated step of a policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EvaluatedRequirement {
    pub requirement: Requirement,
    pub decision: Decision,
}

/// Trace of a policy evaluation, up to and including the first denial
#[derive(Debug, Clone)]
pub struct Evaluation {
    pub request_name: &'static str,
    pub steps: Vec<EvaluatedRequirement>,
    /// Requirements never reached because of an earlier denial
    pub skipped: usize,
    authenticated: bool,
}

impl Evaluation {
    pub fn is_authorized(&self) -> bool {
        self.denial().is_none()
    }

    /// The failing requirement and its reason, if any
    pub fn denial(&self) -> Option<(&Requirement, &DenialReason)> {
        self.steps.iter().find_map(|step| match &step.decision {
            Decision::Denied(reason) => Some((&step.requirement, reason)),
            Decision::Authorized => None,
        })
    }

    /// Collapse to the uniform caller-facing outcome
    pub fn outcome(&self) -> AccessResult<()> {
        match self.denial() {
            None => Ok(()),
            Some(_) if !self.authenticated => Err(AccessError::Unauthenticated),
            Some(_) => Err(AccessError::Forbidden),
        }
    }
}

/// Evaluates policies for every inbound request
pub struct PolicyEvaluator {
    registry: Arc<PolicyRegistry>,
    resolver: Arc<dyn EntityResolver>,
    resolver_timeout_ms: u64,
}

impl PolicyEvaluator {
    pub fn new(registry: Arc<PolicyRegistry>, resolver: Arc<dyn EntityResolver>) -> Self {
        Self {
            registry,
            resolver,
            resolver_timeout_ms: AccessConfig::default().resolver_timeout_ms,
        }
    }

    /// Create an evaluator using the access section of the configuration
    pub fn from_config(
        registry: Arc<PolicyRegistry>,
        resolver: Arc<dyn EntityResolver>,
        config: &AccessConfig,
    ) -> Self {
        Self::new(registry, resolver).with_resolver_timeout(config.resolver_timeout_ms)
    }

    pub fn with_resolver_timeout(mut self, timeout_ms: u64) -> Self {
        self.resolver_timeout_ms = timeout_ms;
        self
    }

    pub fn registry(&self) -> &PolicyRegistry {
        &self.registry
    }

    /// Evaluate a built policy for the context's actor
    pub async fn evaluate(&self, ctx: &RequestContext, policy: &Policy) -> Evaluation {
        let actor = ctx.actor();
        let lookup = OwnershipLookup::new(self.resolver.as_ref(), self.resolver_timeout_ms);
        let mut steps = Vec::with_capacity(policy.len());

        for requirement in policy.requirements() {
            let decision = requirement.evaluate(actor, &lookup).await;
            let denied = !decision.is_authorized();
            steps.push(EvaluatedRequirement {
                requirement: requirement.clone(),
                decision,
            });
            if denied {
                break;
            }
        }

        Evaluation {
            request_name: policy.request_name(),
            skipped: policy.len() - steps.len(),
            steps,
            authenticated: actor.is_authenticated(),
        }
    }

    /// Authorize a typed request
    pub async fn authorize<R: Authorizer>(
        &self,
        ctx: &RequestContext,
        request: &R,
    ) -> AccessResult<()> {
        self.authorize_dyn(ctx, request).await
    }

    /// Authorize a type-erased request, failing closed on unregistered types
    pub async fn authorize_dyn(&self, ctx: &RequestContext, request: &dyn Any) -> AccessResult<()> {
        let Some(policy) = self.registry.build_dyn(ctx, request) else {
            error!(
                request_id = ctx.request_id(),
                "No authorizer registered for request type, rejecting"
            );
            return Err(AccessError::Forbidden);
        };

        if policy.is_empty() {
            debug!(
                request = policy.request_name(),
                request_id = ctx.request_id(),
                internal = ctx.is_internal_call(),
                "Empty policy, request allowed"
            );
            return Ok(());
        }

        let evaluation = self.evaluate(ctx, &policy).await;
        let outcome = evaluation.outcome();

        match evaluation.denial() {
            Some((requirement, reason)) => info!(
                request = policy.request_name(),
                request_id = ctx.request_id(),
                actor = %ctx.actor().summary(),
                requirement = %requirement,
                reason = %reason,
                "Request denied"
            ),
            None => debug!(
                request = policy.request_name(),
                request_id = ctx.request_id(),
                requirements = policy.len(),
                "Request authorized"
            ),
        }

        outcome
    }

    /// Authorize `request` and hand it unchanged to `handler`.
    ///
    /// The handler never runs for a rejected request.
    pub async fn run<R, T, E, F, Fut>(
        &self,
        ctx: &RequestContext,
        request: R,
        handler: F,
    ) -> Result<T, E>
    where
        R: Authorizer,
        E: From<AccessError>,
        F: FnOnce(R) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        self.authorize(ctx, &request).await?;
        handler(request).await
    }
}
