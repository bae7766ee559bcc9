//! Row-Level Filter
//!
//! Computes which rows of a list/search query an actor may see. The filter
//! is data only; the store turns it into a SQL predicate so that totals and
//! pagination are computed over exactly the visible rows.

use crate::context::RequestContext;
use crate::identity::ActorDescriptor;
use postern_core::{DomainId, Ownership, SubdomainId};
use std::collections::BTreeSet;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowFilter {
    /// Domain admins see everything
    Unrestricted,
    /// Visible when the row's domain is in `domain_ids` or its subdomain is
    /// in `subdomain_ids` (moderated plus viewable)
    Restricted {
        domain_ids: BTreeSet<DomainId>,
        subdomain_ids: BTreeSet<SubdomainId>,
    },
}

impl RowFilter {
    pub fn for_actor(actor: &ActorDescriptor) -> Self {
        if actor.is_domain_admin() {
            return RowFilter::Unrestricted;
        }

        RowFilter::Restricted {
            domain_ids: actor.moderated_domain_ids().iter().copied().collect(),
            subdomain_ids: actor
                .moderated_subdomain_ids()
                .iter()
                .chain(actor.viewable_subdomain_ids())
                .copied()
                .collect(),
        }
    }

    /// Internal calls run unfiltered, like their empty policy
    pub fn for_context(ctx: &RequestContext) -> Self {
        if ctx.is_internal_call() {
            return RowFilter::Unrestricted;
        }
        Self::for_actor(ctx.actor())
    }

    pub fn is_unrestricted(&self) -> bool {
        matches!(self, RowFilter::Unrestricted)
    }

    /// True when no row can pass
    pub fn admits_nothing(&self) -> bool {
        match self {
            RowFilter::Unrestricted => false,
            RowFilter::Restricted {
                domain_ids,
                subdomain_ids,
            } => domain_ids.is_empty() && subdomain_ids.is_empty(),
        }
    }

    /// In-memory form of the predicate, for rows already loaded
    pub fn admits(&self, ownership: &Ownership) -> bool {
        match self {
            RowFilter::Unrestricted => true,
            RowFilter::Restricted {
                domain_ids,
                subdomain_ids,
            } => {
                domain_ids.contains(&ownership.domain_id)
                    || subdomain_ids.contains(&ownership.subdomain_id)
            }
        }
    }
}
