//! Request Context
//!
//! Everything the policy engine knows about one inbound command or query
//! besides its payload: the actor and the internal-call marker.

use crate::identity::{ActorDescriptor, IdentityAttribute};

/// Per-request authorization context
#[derive(Debug, Clone)]
pub struct RequestContext {
    actor: ActorDescriptor,
    internal_call: bool,
    request_id: String,
}

impl RequestContext {
    /// Create a context for an external request
    pub fn new(actor: ActorDescriptor) -> Self {
        Self {
            actor,
            internal_call: false,
            request_id: uuid::Uuid::new_v4().to_string(),
        }
    }

    /// Create a context from the signed attributes of an external request
    pub fn from_attributes(attributes: &[IdentityAttribute]) -> Self {
        Self::new(ActorDescriptor::from_attribute_list(attributes))
    }

    /// Create an anonymous context
    pub fn anonymous() -> Self {
        Self::new(ActorDescriptor::anonymous())
    }

    /// Create a context for a request the system dispatches to itself.
    ///
    /// Requests carrying this marker get an empty policy whatever their
    /// payload; the marker can only be set in-process, never from a payload.
    pub fn internal() -> Self {
        Self::anonymous().into_internal()
    }

    /// Mark an existing context as a system-internal call
    pub fn into_internal(mut self) -> Self {
        self.internal_call = true;
        self
    }

    pub fn actor(&self) -> &ActorDescriptor {
        &self.actor
    }

    pub fn is_internal_call(&self) -> bool {
        self.internal_call
    }

    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Create a summary string for logging
    pub fn summary(&self) -> String {
        format!(
            "RequestContext[id={}, internal={}, {}]",
            self.request_id,
            self.internal_call,
            self.actor.summary()
        )
    }
}
