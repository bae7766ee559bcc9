//! Policy Builder
//!
//! Each request type has exactly one [`Authorizer`] that turns a request
//! instance into an ordered list of requirements. The [`PolicyRegistry`] is
//! the explicit table of registered request types; a type missing from it is
//! rejected by the evaluator rather than allowed.

use crate::context::RequestContext;
use crate::requirements::Requirement;
use serde::Serialize;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::fmt;
use tracing::debug;

/// Ordered, immutable requirement list for one request. Empty means allowed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Policy {
    request_name: &'static str,
    requirements: Vec<Requirement>,
}

impl Policy {
    pub fn new(request_name: &'static str, requirements: Vec<Requirement>) -> Self {
        Self {
            request_name,
            requirements,
        }
    }

    /// The unconditional policy
    pub fn empty(request_name: &'static str) -> Self {
        Self::new(request_name, Vec::new())
    }

    pub fn request_name(&self) -> &'static str {
        self.request_name
    }

    pub fn requirements(&self) -> &[Requirement] {
        &self.requirements
    }

    pub fn is_empty(&self) -> bool {
        self.requirements.is_empty()
    }

    pub fn len(&self) -> usize {
        self.requirements.len()
    }
}

impl fmt::Display for Policy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [", self.request_name)?;
        for (i, requirement) in self.requirements.iter().enumerate() {
            if i > 0 {
                f.write_str(", ")?;
            }
            write!(f, "{}", requirement)?;
        }
        f.write_str("]")
    }
}

/// Per-request-type policy builder.
///
/// Implementations read only the request payload. The internal-call marker is
/// handled by the registry before an authorizer is ever consulted.
pub trait Authorizer: Send + Sync + 'static {
    fn requirements(&self) -> Vec<Requirement>;

    /// Short request type name used in logs
    fn request_name() -> &'static str
    where
        Self: Sized,
    {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }
}

type BuildFn = Box<dyn Fn(&dyn Any) -> Option<Vec<Requirement>> + Send + Sync>;

struct Registration {
    request_name: &'static str,
    build: BuildFn,
}

/// Table of request types and their authorizers
#[derive(Default)]
pub struct PolicyRegistry {
    registrations: HashMap<TypeId, Registration>,
}

impl PolicyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the authorizer for request type `R`. Re-registering replaces.
    pub fn register_authorizer<R: Authorizer>(&mut self) -> &mut Self {
        let request_name = R::request_name();
        let build: BuildFn = Box::new(|request: &dyn Any| {
            request
                .downcast_ref::<R>()
                .map(|request| request.requirements())
        });

        self.registrations.insert(
            TypeId::of::<R>(),
            Registration {
                request_name,
                build,
            },
        );
        self
    }

    /// Builder-style registration
    pub fn with_authorizer<R: Authorizer>(mut self) -> Self {
        self.register_authorizer::<R>();
        self
    }

    pub fn is_registered<R: Authorizer>(&self) -> bool {
        self.registrations.contains_key(&TypeId::of::<R>())
    }

    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Registered request names, sorted
    pub fn request_names(&self) -> Vec<&'static str> {
        let mut names: Vec<_> = self
            .registrations
            .values()
            .map(|r| r.request_name)
            .collect();
        names.sort_unstable();
        names
    }

    /// Build the policy for a typed request. `None` when `R` is unregistered.
    pub fn build<R: Authorizer>(&self, ctx: &RequestContext, request: &R) -> Option<Policy> {
        self.build_dyn(ctx, request)
    }

    /// Build the policy for a type-erased request
    pub fn build_dyn(&self, ctx: &RequestContext, request: &dyn Any) -> Option<Policy> {
        let registration = self.registrations.get(&request.type_id());

        if ctx.is_internal_call() {
            let request_name = registration.map_or("internal", |r| r.request_name);
            debug!(
                request = request_name,
                request_id = ctx.request_id(),
                "Internal call, empty policy"
            );
            return Some(Policy::empty(request_name));
        }

        let registration = registration?;
        let requirements = (registration.build)(request)?;
        Some(Policy::new(registration.request_name, requirements))
    }
}

impl fmt::Debug for PolicyRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PolicyRegistry")
            .field("requests", &self.request_names())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::ActorDescriptorBuilder;
    use postern_core::DomainId;

    struct Renamed {
        domain_id: DomainId,
    }

    impl Authorizer for Renamed {
        fn requirements(&self) -> Vec<Requirement> {
            vec![
                Requirement::MustBeAuthenticated,
                Requirement::MustBeModeratorToDomain(self.domain_id),
            ]
        }
    }

    struct Unregistered;

    impl Authorizer for Unregistered {
        fn requirements(&self) -> Vec<Requirement> {
            Vec::new()
        }
    }

    fn external() -> RequestContext {
        RequestContext::new(ActorDescriptorBuilder::new().with_user_id("u").build())
    }

    #[test]
    fn registered_requests_build_in_declaration_order() {
        let registry = PolicyRegistry::new().with_authorizer::<Renamed>();
        let domain_id = DomainId::generate();

        let policy = registry
            .build(&external(), &Renamed { domain_id })
            .unwrap();

        assert_eq!(policy.request_name(), "Renamed");
        assert_eq!(
            policy.requirements(),
            &[
                Requirement::MustBeAuthenticated,
                Requirement::MustBeModeratorToDomain(domain_id)
            ]
        );
        assert!(policy.to_string().starts_with("Renamed [MustBeAuthenticated, "));
    }

    #[test]
    fn unregistered_requests_have_no_policy() {
        let registry = PolicyRegistry::new().with_authorizer::<Renamed>();
        assert!(registry.build(&external(), &Unregistered).is_none());
        assert!(!registry.is_registered::<Unregistered>());
    }

    #[test]
    fn internal_marker_short_circuits_to_empty_policy() {
        let registry = PolicyRegistry::new().with_authorizer::<Renamed>();
        let ctx = external().into_internal();

        let policy = registry
            .build(&ctx, &Renamed {
                domain_id: DomainId::generate(),
            })
            .unwrap();
        assert!(policy.is_empty());
        assert_eq!(policy.request_name(), "Renamed");

        assert!(registry.build(&ctx, &Unregistered).unwrap().is_empty());
    }
}
