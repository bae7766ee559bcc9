//! User management queries

use crate::identity::SystemRole;
use crate::policy::Authorizer;
use crate::requirements::Requirement;
use postern_core::SearchParams;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SearchUsers {
    #[serde(flatten)]
    pub params: SearchParams,
}

impl Authorizer for SearchUsers {
    fn requirements(&self) -> Vec<Requirement> {
        vec![
            Requirement::MustBeAuthenticated,
            Requirement::MustHaveSystemRole(SystemRole::UserManagement),
        ]
    }
}
