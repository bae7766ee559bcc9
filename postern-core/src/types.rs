//! Core data type definitions
//!
//! Identifiers for every entity in the domain → subdomain → resource
//! hierarchy, plus the ownership facts the read model hands back.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(pub Uuid);

        impl $name {
            /// Generate a fresh random identifier
            pub fn generate() -> Self {
                Self(Uuid::new_v4())
            }

            pub fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl From<Uuid> for $name {
            fn from(id: Uuid) -> Self {
                Self(id)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl FromStr for $name {
            type Err = uuid::Error;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Uuid::parse_str(s.trim()).map(Self)
            }
        }
    };
}

uuid_id!(
    /// Top-level tenant: a mail domain such as `acme.test`
    DomainId
);
uuid_id!(
    /// A subdomain, owned by exactly one domain for its whole lifetime
    SubdomainId
);
uuid_id!(
    /// A captured email
    EmailId
);
uuid_id!(CampaignId);
uuid_id!(ChaosAddressId);
uuid_id!(PasskeyId);

/// Opaque user identifier issued by the identity provider
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into().trim().to_string())
    }

    /// The anonymous user id
    pub fn empty() -> Self {
        Self(String::new())
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for UserId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for UserId {
    fn from(id: String) -> Self {
        Self::new(id)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Kinds of entity whose owning subdomain can be looked up in the read model
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Subdomain,
    Email,
    Campaign,
    ChaosAddress,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntityKind::Subdomain => write!(f, "subdomain"),
            EntityKind::Email => write!(f, "email"),
            EntityKind::Campaign => write!(f, "campaign"),
            EntityKind::ChaosAddress => write!(f, "chaos_address"),
        }
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "subdomain" => Ok(EntityKind::Subdomain),
            "email" => Ok(EntityKind::Email),
            "campaign" => Ok(EntityKind::Campaign),
            "chaos_address" => Ok(EntityKind::ChaosAddress),
            _ => Err(format!("Unknown entity kind: {}", s)),
        }
    }
}

/// Where an entity sits in the hierarchy. For a subdomain the
/// `subdomain_id` is the subdomain itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ownership {
    pub domain_id: DomainId,
    pub subdomain_id: SubdomainId,
}

/// Sort direction for search processors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    #[default]
    Ascending,
    Descending,
}

/// Paging and free-text parameters shared by every search/list request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchParams {
    pub term: Option<String>,
    pub sort: SortOrder,
    /// 1-based page number
    pub page: u32,
    pub page_size: u32,
}

impl Default for SearchParams {
    fn default() -> Self {
        Self {
            term: None,
            sort: SortOrder::Ascending,
            page: 1,
            page_size: 25,
        }
    }
}

impl SearchParams {
    /// Clamp paging into the configured bounds
    pub fn normalized(&self, max_page_size: u32) -> Self {
        Self {
            term: self
                .term
                .as_ref()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty()),
            sort: self.sort,
            page: self.page.max(1),
            page_size: self.page_size.clamp(1, max_page_size.max(1)),
        }
    }

    pub fn offset(&self) -> u64 {
        u64::from(self.page.saturating_sub(1)) * u64::from(self.page_size)
    }
}

/// One page of search results; `total_count` only counts visible rows
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total_count: u64,
    pub page: u32,
    pub page_size: u32,
}

impl<T> Page<T> {
    pub fn total_pages(&self) -> u64 {
        if self.page_size == 0 {
            return 0;
        }
        self.total_count.div_ceil(u64::from(self.page_size))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_parse_and_display() {
        let raw = "11111111-1111-1111-1111-000000000001";
        let domain: DomainId = raw.parse().unwrap();
        assert_eq!(domain.to_string(), raw);
        assert!("not-a-uuid".parse::<SubdomainId>().is_err());
    }

    #[test]
    fn user_id_trims_and_detects_empty() {
        assert!(UserId::new("   ").is_empty());
        assert_eq!(UserId::new(" alice ").as_str(), "alice");
    }

    #[test]
    fn search_params_normalize_paging() {
        let params = SearchParams {
            term: Some("   ".to_string()),
            sort: SortOrder::Descending,
            page: 0,
            page_size: 500,
        }
        .normalized(100);

        assert_eq!(params.term, None);
        assert_eq!(params.page, 1);
        assert_eq!(params.page_size, 100);
        assert_eq!(params.offset(), 0);

        let third = SearchParams {
            page: 3,
            page_size: 10,
            ..SearchParams::default()
        };
        assert_eq!(third.offset(), 20);
    }

    #[test]
    fn page_counts_total_pages() {
        let page: Page<u8> = Page {
            items: vec![],
            total_count: 21,
            page: 1,
            page_size: 10,
        };
        assert_eq!(page.total_pages(), 3);
    }
}
