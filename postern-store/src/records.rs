//! Read-model records
//!
//! Rows are stored with TEXT ids and RFC 3339 timestamps; the `*Row` types
//! mirror the columns and convert into the typed records handed to callers.

use chrono::{DateTime, SecondsFormat, Utc};
use postern_core::{
    storage_error, CampaignId, ChaosAddressId, DomainId, EmailId, Ownership, PosternResult,
    SubdomainId,
};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainRecord {
    pub id: DomainId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubdomainRecord {
    pub id: SubdomainId,
    pub domain_id: DomainId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmailRecord {
    pub id: EmailId,
    pub domain_id: DomainId,
    pub subdomain_id: SubdomainId,
    pub sender: String,
    pub recipient: String,
    pub subject: String,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CampaignRecord {
    pub id: CampaignId,
    pub domain_id: DomainId,
    pub subdomain_id: SubdomainId,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChaosAddressRecord {
    pub id: ChaosAddressId,
    pub domain_id: DomainId,
    pub subdomain_id: SubdomainId,
    pub local_part: String,
    pub enabled: bool,
}

impl EmailRecord {
    pub fn ownership(&self) -> Ownership {
        Ownership {
            domain_id: self.domain_id,
            subdomain_id: self.subdomain_id,
        }
    }
}

impl CampaignRecord {
    pub fn ownership(&self) -> Ownership {
        Ownership {
            domain_id: self.domain_id,
            subdomain_id: self.subdomain_id,
        }
    }
}

pub(crate) fn parse_id<T>(raw: &str, column: &str) -> PosternResult<T>
where
    T: FromStr<Err = uuid::Error>,
{
    raw.parse::<T>()
        .map_err(|e| storage_error!(format!("Invalid id in column {}: {}", column, raw), "store", e))
}

/// Fixed-width RFC 3339 in UTC, so TEXT ordering matches time ordering
pub(crate) fn format_time(time: &DateTime<Utc>) -> String {
    time.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

pub(crate) fn parse_time(raw: &str, column: &str) -> PosternResult<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| storage_error!(format!("Invalid timestamp in column {}: {}", column, raw), "store", e))
}

pub(crate) fn parse_optional_time(
    raw: Option<&str>,
    column: &str,
) -> PosternResult<Option<DateTime<Utc>>> {
    raw.map(|raw| parse_time(raw, column)).transpose()
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct DomainRow {
    id: String,
    name: String,
    created_at: String,
}

impl DomainRow {
    pub(crate) fn into_record(self) -> PosternResult<DomainRecord> {
        Ok(DomainRecord {
            id: parse_id(&self.id, "domains.id")?,
            name: self.name,
            created_at: parse_time(&self.created_at, "domains.created_at")?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct SubdomainRow {
    id: String,
    domain_id: String,
    name: String,
    created_at: String,
}

impl SubdomainRow {
    pub(crate) fn into_record(self) -> PosternResult<SubdomainRecord> {
        Ok(SubdomainRecord {
            id: parse_id(&self.id, "subdomains.id")?,
            domain_id: parse_id(&self.domain_id, "subdomains.domain_id")?,
            name: self.name,
            created_at: parse_time(&self.created_at, "subdomains.created_at")?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct EmailRow {
    id: String,
    domain_id: String,
    subdomain_id: String,
    sender: String,
    recipient: String,
    subject: String,
    received_at: String,
}

impl EmailRow {
    pub(crate) fn into_record(self) -> PosternResult<EmailRecord> {
        Ok(EmailRecord {
            id: parse_id(&self.id, "emails.id")?,
            domain_id: parse_id(&self.domain_id, "emails.domain_id")?,
            subdomain_id: parse_id(&self.subdomain_id, "emails.subdomain_id")?,
            sender: self.sender,
            recipient: self.recipient,
            subject: self.subject,
            received_at: parse_time(&self.received_at, "emails.received_at")?,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
pub(crate) struct CampaignRow {
    id: String,
    domain_id: String,
    subdomain_id: String,
    name: String,
    created_at: String,
}

impl CampaignRow {
    pub(crate) fn into_record(self) -> PosternResult<CampaignRecord> {
        Ok(CampaignRecord {
            id: parse_id(&self.id, "campaigns.id")?,
            domain_id: parse_id(&self.domain_id, "campaigns.domain_id")?,
            subdomain_id: parse_id(&self.subdomain_id, "campaigns.subdomain_id")?,
            name: self.name,
            created_at: parse_time(&self.created_at, "campaigns.created_at")?,
        })
    }
}

/// Ownership columns shared by every resolvable table
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct OwnershipRow {
    domain_id: String,
    subdomain_id: String,
}

impl OwnershipRow {
    pub(crate) fn into_ownership(self) -> PosternResult<Ownership> {
        Ok(Ownership {
            domain_id: parse_id(&self.domain_id, "domain_id")?,
            subdomain_id: parse_id(&self.subdomain_id, "subdomain_id")?,
        })
    }
}
