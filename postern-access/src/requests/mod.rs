//! Request Catalogue
//!
//! The platform's commands and queries, each with its authorizer, grouped by
//! resource family. [`CatalogRequest`] is the tagged wire form used by the
//! CLI; [`PolicyRegistry::standard`] registers every type listed here.

pub mod campaigns;
pub mod domains;
pub mod emails;
pub mod passkeys;
pub mod subdomains;
pub mod users;

pub use campaigns::*;
pub use domains::*;
pub use emails::*;
pub use passkeys::*;
pub use subdomains::*;
pub use users::*;

use crate::policy::PolicyRegistry;
use serde::{Deserialize, Serialize};
use std::any::Any;

macro_rules! catalog {
    ($($request:ident),* $(,)?) => {
        /// Any request in the catalogue, tagged by its type name
        #[derive(Debug, Clone, Serialize, Deserialize)]
        #[serde(tag = "type")]
        pub enum CatalogRequest {
            $($request($request),)*
        }

        impl CatalogRequest {
            /// The inner request, for type-erased policy building
            pub fn as_any(&self) -> &dyn Any {
                match self {
                    $(CatalogRequest::$request(request) => request,)*
                }
            }

            pub fn name(&self) -> &'static str {
                match self {
                    $(CatalogRequest::$request(_) => stringify!($request),)*
                }
            }
        }

        impl PolicyRegistry {
            /// Registry with every catalogued request type
            pub fn standard() -> Self {
                let mut registry = Self::new();
                $(registry.register_authorizer::<$request>();)*
                registry
            }
        }
    };
}

catalog!(
    CreateDomain,
    UpdateDomain,
    DeleteDomain,
    GetDomain,
    SearchDomains,
    CreateSubdomain,
    UpdateSubdomain,
    DeleteSubdomain,
    GetSubdomain,
    SearchSubdomains,
    ListSubdomainModerators,
    AddSubdomainModerator,
    AddSubdomainViewer,
    SearchEmails,
    GetEmail,
    DeleteEmail,
    IngestInboundMail,
    PurgeExpiredEmails,
    SearchCampaigns,
    GetCampaign,
    GetChaosAddress,
    UpdateChaosAddress,
    SearchUsers,
    RegisterPasskey,
    RecordPasskeyAuthentication,
    RevokePasskey,
    ListPasskeys,
);
