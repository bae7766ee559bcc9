//! Subdomain commands and queries

use crate::policy::Authorizer;
use crate::requirements::Requirement;
use postern_core::{DomainId, SearchParams, SubdomainId, UserId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateSubdomain {
    pub domain_id: DomainId,
    pub name: String,
}

impl Authorizer for CreateSubdomain {
    fn requirements(&self) -> Vec<Requirement> {
        vec![
            Requirement::MustBeAuthenticated,
            Requirement::MustBeModeratorToDomain(self.domain_id),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateSubdomain {
    pub subdomain_id: SubdomainId,
    pub name: Option<String>,
}

impl Authorizer for UpdateSubdomain {
    fn requirements(&self) -> Vec<Requirement> {
        moderator_of(self.subdomain_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteSubdomain {
    pub subdomain_id: SubdomainId,
}

impl Authorizer for DeleteSubdomain {
    fn requirements(&self) -> Vec<Requirement> {
        moderator_of(self.subdomain_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetSubdomain {
    pub subdomain_id: SubdomainId,
}

impl Authorizer for GetSubdomain {
    fn requirements(&self) -> Vec<Requirement> {
        access_to(self.subdomain_id)
    }
}

/// Unscoped subdomain search
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchSubdomains {
    #[serde(flatten)]
    pub params: SearchParams,
}

impl Authorizer for SearchSubdomains {
    fn requirements(&self) -> Vec<Requirement> {
        vec![
            Requirement::MustBeAuthenticated,
            Requirement::MustBeModeratorToAtLeastOneSubdomain,
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListSubdomainModerators {
    pub subdomain_id: SubdomainId,
}

impl Authorizer for ListSubdomainModerators {
    fn requirements(&self) -> Vec<Requirement> {
        access_to(self.subdomain_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddSubdomainModerator {
    pub subdomain_id: SubdomainId,
    pub user_id: UserId,
}

impl Authorizer for AddSubdomainModerator {
    fn requirements(&self) -> Vec<Requirement> {
        moderator_of(self.subdomain_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AddSubdomainViewer {
    pub subdomain_id: SubdomainId,
    pub user_id: UserId,
}

impl Authorizer for AddSubdomainViewer {
    fn requirements(&self) -> Vec<Requirement> {
        moderator_of(self.subdomain_id)
    }
}

fn moderator_of(subdomain_id: SubdomainId) -> Vec<Requirement> {
    vec![
        Requirement::MustBeAuthenticated,
        Requirement::MustBeModeratorToSubdomain(subdomain_id),
    ]
}

pub(crate) fn access_to(subdomain_id: SubdomainId) -> Vec<Requirement> {
    vec![
        Requirement::MustBeAuthenticated,
        Requirement::MustHaveAccessToSubdomain(subdomain_id),
    ]
}

/// Policy shared by the resource searches: scoped to one subdomain, or
/// unscoped and narrowed by the row filter
pub(crate) fn scoped_or_unscoped(subdomain_id: Option<SubdomainId>) -> Vec<Requirement> {
    match subdomain_id {
        Some(subdomain_id) => access_to(subdomain_id),
        None => vec![
            Requirement::MustBeAuthenticated,
            Requirement::MustBeModeratorToAtLeastOneSubdomain,
        ],
    }
}
