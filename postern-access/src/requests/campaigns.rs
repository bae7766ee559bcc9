//! Campaign and chaos-address commands and queries

use super::subdomains::scoped_or_unscoped;
use crate::policy::Authorizer;
use crate::requirements::Requirement;
use postern_core::{CampaignId, ChaosAddressId, SearchParams, SubdomainId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchCampaigns {
    pub subdomain_id: Option<SubdomainId>,
    #[serde(flatten)]
    pub params: SearchParams,
}

impl Authorizer for SearchCampaigns {
    fn requirements(&self) -> Vec<Requirement> {
        scoped_or_unscoped(self.subdomain_id)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetCampaign {
    pub campaign_id: CampaignId,
}

impl Authorizer for GetCampaign {
    fn requirements(&self) -> Vec<Requirement> {
        vec![
            Requirement::MustBeAuthenticated,
            Requirement::MustHaveAccessToCampaign(self.campaign_id),
        ]
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GetChaosAddress {
    pub chaos_address_id: ChaosAddressId,
}

impl Authorizer for GetChaosAddress {
    fn requirements(&self) -> Vec<Requirement> {
        vec![
            Requirement::MustBeAuthenticated,
            Requirement::MustHaveAccessToChaosAddress(self.chaos_address_id),
        ]
    }
}

/// Change the failure behaviour configured for a chaos address
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UpdateChaosAddress {
    pub chaos_address_id: ChaosAddressId,
    pub enabled: Option<bool>,
    pub reply_code: Option<u16>,
}

impl Authorizer for UpdateChaosAddress {
    fn requirements(&self) -> Vec<Requirement> {
        vec![
            Requirement::MustBeAuthenticated,
            Requirement::MustBeModeratorToChaosAddress(self.chaos_address_id),
        ]
    }
}
