//! Domain commands and queries

use crate::identity::SystemRole;
use crate::policy::Authorizer;
use crate::requirements::Requirement;
use postern_core::{DomainId, SearchParams};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateDomain {
    pub name: String,
}

impl Authorizer for CreateDomain {
    fn requirements(&self) -> Vec<Requirement> {
        vec![
            Requirement::MustBeAuthenticated,
            Requirement::MustHaveSystemRole(SystemRole::DomainManagement),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateDomain {
    pub domain_id: DomainId,
    pub name: Option<String>,
    pub retention_days: Option<u32>,
}

impl Authorizer for UpdateDomain {
    fn requirements(&self) -> Vec<Requirement> {
        moderator_of(self.domain_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteDomain {
    pub domain_id: DomainId,
}

impl Authorizer for DeleteDomain {
    fn requirements(&self) -> Vec<Requirement> {
        moderator_of(self.domain_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetDomain {
    pub domain_id: DomainId,
}

impl Authorizer for GetDomain {
    fn requirements(&self) -> Vec<Requirement> {
        moderator_of(self.domain_id)
    }
}

/// Unscoped domain search; visible rows are narrowed by the row filter
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchDomains {
    #[serde(flatten)]
    pub params: SearchParams,
}

impl Authorizer for SearchDomains {
    fn requirements(&self) -> Vec<Requirement> {
        vec![
            Requirement::MustBeAuthenticated,
            Requirement::MustBeModeratorToAtLeastOneDomain,
        ]
    }
}

fn moderator_of(domain_id: DomainId) -> Vec<Requirement> {
    vec![
        Requirement::MustBeAuthenticated,
        Requirement::MustBeModeratorToDomain(domain_id),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use postern_core::SortOrder;

    #[test]
    fn search_policy_ignores_paging_and_term() {
        let plain = SearchDomains::default().requirements();
        let busy = SearchDomains {
            params: SearchParams {
                term: Some("acme".to_string()),
                sort: SortOrder::Descending,
                page: 9,
                page_size: 3,
            },
        }
        .requirements();

        assert_eq!(plain, busy);
        assert_eq!(plain.len(), 2);
    }

    #[test]
    fn domain_writes_need_domain_moderation() {
        let domain_id = DomainId::generate();
        assert_eq!(
            DeleteDomain { domain_id }.requirements()[1],
            Requirement::MustBeModeratorToDomain(domain_id)
        );
        assert_eq!(
            CreateDomain {
                name: "acme.test".to_string()
            }
            .requirements()[1],
            Requirement::MustHaveSystemRole(SystemRole::DomainManagement)
        );
    }
}
