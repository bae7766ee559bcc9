//! Actor Identity
//!
//! Turns the signed identity attributes attached to a request into an
//! immutable [`ActorDescriptor`]. Attributes arrive already verified by the
//! upstream authentication layer; this is a pure transform with no storage
//! access.

use postern_core::{DomainId, SubdomainId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use tracing::debug;

/// Attribute keys understood by [`ActorDescriptor::from_attributes`]
pub mod attribute_keys {
    pub const USER_ID: &str = "sub";
    pub const NAME: &str = "name";
    pub const EMAIL: &str = "email";
    pub const ROLE: &str = "role";
    pub const MODERATES_DOMAIN: &str = "moderates_domain";
    pub const MODERATES_SUBDOMAIN: &str = "moderates_subdomain";
    pub const VIEWS_SUBDOMAIN: &str = "views_subdomain";
}

/// System-wide roles. Holding one grants blanket access to its resource family.
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
pub enum SystemRole {
    /// Every domain, subdomain and the resources below them
    DomainManagement,
    /// User accounts and their credentials
    UserManagement,
}

impl std::fmt::Display for SystemRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SystemRole::DomainManagement => write!(f, "domain_management"),
            SystemRole::UserManagement => write!(f, "user_management"),
        }
    }
}

impl std::str::FromStr for SystemRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "").as_str() {
            "domainmanagement" => Ok(SystemRole::DomainManagement),
            "usermanagement" => Ok(SystemRole::UserManagement),
            _ => Err(format!("Unknown system role: {}", s)),
        }
    }
}

/// A single signed key/value attribute; keys may repeat
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityAttribute {
    pub key: String,
    pub value: String,
}

impl IdentityAttribute {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// Snapshot of who is making a request and what they administer.
///
/// The sets are fixed when the descriptor is built and never change for the
/// lifetime of the request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActorDescriptor {
    user_id: UserId,
    display_name: Option<String>,
    email: Option<String>,
    system_roles: HashSet<SystemRole>,
    moderated_domain_ids: HashSet<DomainId>,
    moderated_subdomain_ids: HashSet<SubdomainId>,
    viewable_subdomain_ids: HashSet<SubdomainId>,
}

impl ActorDescriptor {
    /// The unauthenticated actor
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Build a descriptor from a bag of signed attributes.
    ///
    /// Unknown keys and malformed values (a non-UUID domain id, an unknown
    /// role) are dropped one by one. Grants attached to a bag without a user
    /// id are ignored.
    pub fn from_attributes<I, K, V>(attributes: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: AsRef<str>,
    {
        use attribute_keys::*;

        let mut builder = ActorDescriptorBuilder::new();
        let mut user_id: Option<UserId> = None;
        let mut dropped = 0usize;

        for (key, value) in attributes {
            let key = key.as_ref().trim();
            let value = value.as_ref().trim();

            match key {
                USER_ID => {
                    if user_id.is_none() && !value.is_empty() {
                        user_id = Some(UserId::new(value));
                    }
                }
                NAME => {
                    if builder.display_name.is_none() && !value.is_empty() {
                        builder = builder.with_display_name(value);
                    }
                }
                EMAIL => {
                    if builder.email.is_none() && !value.is_empty() {
                        builder = builder.with_email(value);
                    }
                }
                ROLE => match value.parse::<SystemRole>() {
                    Ok(role) => builder = builder.with_role(role),
                    Err(_) => dropped += 1,
                },
                MODERATES_DOMAIN => match value.parse::<DomainId>() {
                    Ok(id) => builder = builder.moderating_domain(id),
                    Err(_) => dropped += 1,
                },
                MODERATES_SUBDOMAIN => match value.parse::<SubdomainId>() {
                    Ok(id) => builder = builder.moderating_subdomain(id),
                    Err(_) => dropped += 1,
                },
                VIEWS_SUBDOMAIN => match value.parse::<SubdomainId>() {
                    Ok(id) => builder = builder.viewing_subdomain(id),
                    Err(_) => dropped += 1,
                },
                _ => {}
            }
        }

        if dropped > 0 {
            debug!(dropped, "Dropped malformed identity attributes");
        }

        match user_id {
            Some(user_id) => builder.with_user_id(user_id).build(),
            None => Self::anonymous(),
        }
    }

    /// Build a descriptor from typed attribute records
    pub fn from_attribute_list(attributes: &[IdentityAttribute]) -> Self {
        Self::from_attributes(
            attributes
                .iter()
                .map(|a| (a.key.as_str(), a.value.as_str())),
        )
    }

    pub fn user_id(&self) -> &UserId {
        &self.user_id
    }

    pub fn is_authenticated(&self) -> bool {
        !self.user_id.is_empty()
    }

    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    pub fn system_roles(&self) -> &HashSet<SystemRole> {
        &self.system_roles
    }

    pub fn moderated_domain_ids(&self) -> &HashSet<DomainId> {
        &self.moderated_domain_ids
    }

    pub fn moderated_subdomain_ids(&self) -> &HashSet<SubdomainId> {
        &self.moderated_subdomain_ids
    }

    pub fn viewable_subdomain_ids(&self) -> &HashSet<SubdomainId> {
        &self.viewable_subdomain_ids
    }

    pub fn has_role(&self, role: SystemRole) -> bool {
        self.system_roles.contains(&role)
    }

    /// Holder of the domain-admin flag
    pub fn is_domain_admin(&self) -> bool {
        self.has_role(SystemRole::DomainManagement)
    }

    pub fn moderates_domain(&self, domain_id: &DomainId) -> bool {
        self.moderated_domain_ids.contains(domain_id)
    }

    /// Direct subdomain moderation only; see the requirement primitives for
    /// the hierarchy-aware check
    pub fn moderates_subdomain_directly(&self, subdomain_id: &SubdomainId) -> bool {
        self.moderated_subdomain_ids.contains(subdomain_id)
    }

    pub fn views_subdomain(&self, subdomain_id: &SubdomainId) -> bool {
        self.viewable_subdomain_ids.contains(subdomain_id)
    }

    /// True when the actor holds at least one domain-family grant of any kind
    pub fn has_any_domain_grant(&self) -> bool {
        self.is_domain_admin()
            || !self.moderated_domain_ids.is_empty()
            || !self.moderated_subdomain_ids.is_empty()
            || !self.viewable_subdomain_ids.is_empty()
    }

    /// Create a summary string for logging
    pub fn summary(&self) -> String {
        let user = if self.is_authenticated() {
            self.user_id.as_str()
        } else {
            "anonymous"
        };

        format!(
            "Actor[user={}, roles={}, domains={}, subdomains={}, viewable={}]",
            user,
            self.system_roles.len(),
            self.moderated_domain_ids.len(),
            self.moderated_subdomain_ids.len(),
            self.viewable_subdomain_ids.len()
        )
    }
}

/// Builder for actor descriptors, used by tests and trusted in-process callers
#[derive(Debug, Default)]
pub struct ActorDescriptorBuilder {
    user_id: UserId,
    display_name: Option<String>,
    email: Option<String>,
    system_roles: HashSet<SystemRole>,
    moderated_domain_ids: HashSet<DomainId>,
    moderated_subdomain_ids: HashSet<SubdomainId>,
    viewable_subdomain_ids: HashSet<SubdomainId>,
}

impl ActorDescriptorBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user_id(mut self, user_id: impl Into<UserId>) -> Self {
        self.user_id = user_id.into();
        self
    }

    pub fn with_display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    pub fn with_role(mut self, role: SystemRole) -> Self {
        self.system_roles.insert(role);
        self
    }

    pub fn moderating_domain(mut self, domain_id: DomainId) -> Self {
        self.moderated_domain_ids.insert(domain_id);
        self
    }

    pub fn moderating_subdomain(mut self, subdomain_id: SubdomainId) -> Self {
        self.moderated_subdomain_ids.insert(subdomain_id);
        self
    }

    pub fn viewing_subdomain(mut self, subdomain_id: SubdomainId) -> Self {
        self.viewable_subdomain_ids.insert(subdomain_id);
        self
    }

    pub fn build(self) -> ActorDescriptor {
        ActorDescriptor {
            user_id: self.user_id,
            display_name: self.display_name,
            email: self.email,
            system_roles: self.system_roles,
            moderated_domain_ids: self.moderated_domain_ids,
            moderated_subdomain_ids: self.moderated_subdomain_ids,
            viewable_subdomain_ids: self.viewable_subdomain_ids,
        }
    }
}
