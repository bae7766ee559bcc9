//! Captured email commands and queries

use super::subdomains::scoped_or_unscoped;
use crate::identity::SystemRole;
use crate::policy::Authorizer;
use crate::requirements::Requirement;
use postern_core::{EmailId, SearchParams, SubdomainId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchEmails {
    pub subdomain_id: Option<SubdomainId>,
    #[serde(flatten)]
    pub params: SearchParams,
}

impl Authorizer for SearchEmails {
    fn requirements(&self) -> Vec<Requirement> {
        scoped_or_unscoped(self.subdomain_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetEmail {
    pub email_id: EmailId,
}

impl Authorizer for GetEmail {
    fn requirements(&self) -> Vec<Requirement> {
        vec![
            Requirement::MustBeAuthenticated,
            Requirement::MustHaveAccessToSubdomainViaEmail(self.email_id),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeleteEmail {
    pub email_id: EmailId,
}

impl Authorizer for DeleteEmail {
    fn requirements(&self) -> Vec<Requirement> {
        vec![
            Requirement::MustBeAuthenticated,
            Requirement::MustBeModeratorToSubdomainViaEmail(self.email_id),
        ]
    }
}

/// Mail arriving from the SMTP edge. Public: there is no actor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestInboundMail {
    pub recipient: String,
    pub sender: String,
    pub size_bytes: u64,
}

impl Authorizer for IngestInboundMail {
    fn requirements(&self) -> Vec<Requirement> {
        Vec::new()
    }
}

/// Retention sweep. Housekeeping issues it with the internal marker.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PurgeExpiredEmails {
    pub older_than_days: u32,
}

impl Authorizer for PurgeExpiredEmails {
    fn requirements(&self) -> Vec<Requirement> {
        vec![
            Requirement::MustBeAuthenticated,
            Requirement::MustHaveSystemRole(SystemRole::DomainManagement),
        ]
    }
}
