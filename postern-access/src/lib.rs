//! Postern Access - per-request authorization and credential trust
//!
//! Every command and query passes through the same pipeline:
//!
//! - **Identity** ([`identity`]): signed attributes become an immutable
//!   [`ActorDescriptor`]
//! - **Policy** ([`policy`], [`requests`]): the request type's authorizer emits
//!   an ordered list of [`Requirement`]s
//! - **Evaluation** ([`evaluator`]): requirements run in order, consulting the
//!   read model through [`resolver`], and the first denial rejects the request
//! - **Row filtering** ([`row_filter`]): list/search handlers narrow their
//!   result sets to what the actor may see
//!
//! The [`passkey`] module holds the credential lifecycle aggregate that
//! shares the same trust boundary.

pub mod context;
pub mod evaluator;
pub mod identity;
pub mod passkey;
pub mod policy;
pub mod requests;
pub mod requirements;
pub mod resolver;
pub mod row_filter;

pub use context::RequestContext;
pub use evaluator::{Evaluation, EvaluatedRequirement, PolicyEvaluator};
pub use identity::{ActorDescriptor, ActorDescriptorBuilder, IdentityAttribute, SystemRole};
pub use passkey::{
    InMemoryPasskeyStore, Passkey, PasskeyAlgorithm, PasskeyError, PasskeyRegistration,
    PasskeyService, PasskeySnapshot, PasskeyState, PasskeyStore, WriteOutcome,
};
pub use policy::{Authorizer, Policy, PolicyRegistry};
pub use requests::CatalogRequest;
pub use requirements::{Decision, DenialReason, Requirement};
pub use resolver::OwnershipLookup;
pub use row_filter::RowFilter;

/// Outcome surfaced to callers when a request is rejected.
///
/// Deliberately carries no detail about which requirement failed; that
/// detail is logged by the evaluator instead.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AccessError {
    /// No authenticated actor is attached to the request
    #[error("authentication required")]
    Unauthenticated,

    /// The actor lacks the relationship the request needs
    #[error("forbidden")]
    Forbidden,
}

impl AccessError {
    /// Stable error code for transport layers
    pub fn code(&self) -> &'static str {
        match self {
            AccessError::Unauthenticated => "ERR_UNAUTHENTICATED",
            AccessError::Forbidden => "ERR_FORBIDDEN",
        }
    }
}

pub type AccessResult<T> = Result<T, AccessError>;
