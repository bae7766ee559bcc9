//! SQLite read model
//!
//! Owns the connection pool, answers ownership lookups for the policy engine
//! and provides the seeding helpers used by tooling and tests.

use crate::db_error;
use crate::records::{
    format_time, CampaignRecord, ChaosAddressRecord, DomainRecord, EmailRecord, OwnershipRow,
    SubdomainRecord,
};
use crate::schema;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use postern_core::{
    not_found_error, validation_error, CampaignId, ChaosAddressId, DomainId, EmailId, EntityKind,
    EntityResolver, Ownership, PosternResult, StoreConfig, SubdomainId,
};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;
use tracing::{debug, info};
use uuid::Uuid;

/// Input for [`SqliteReadModel::create_email`]
#[derive(Debug, Clone)]
pub struct NewEmail {
    pub sender: String,
    pub recipient: String,
    pub subject: String,
    pub received_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct SqliteReadModel {
    pub(crate) pool: SqlitePool,
}

impl SqliteReadModel {
    /// Open the configured database, creating the file if needed
    pub async fn connect(config: &StoreConfig) -> PosternResult<Self> {
        let options = SqliteConnectOptions::from_str(&config.database_url)
            .map_err(db_error("parse_database_url"))?
            .create_if_missing(true);

        // Each in-memory connection is its own database
        let max_connections = if config.database_url.contains(":memory:") {
            1
        } else {
            config.max_connections
        };

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections)
            .connect_with(options)
            .await
            .map_err(db_error("connect"))?;

        info!(
            database_url = %config.database_url,
            max_connections,
            "Connected to read model"
        );

        if config.run_migrations {
            schema::migrate(&pool).await?;
        }
        Ok(Self { pool })
    }

    /// Wrap an existing pool and make sure the schema exists
    pub async fn from_pool(pool: SqlitePool) -> PosternResult<Self> {
        schema::migrate(&pool).await?;
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn create_domain(&self, name: &str) -> PosternResult<DomainRecord> {
        let name = required(name, "name")?;
        let record = DomainRecord {
            id: DomainId::generate(),
            name,
            created_at: Utc::now(),
        };

        sqlx::query("INSERT INTO domains (id, name, created_at) VALUES (?, ?, ?)")
            .bind(record.id.to_string())
            .bind(&record.name)
            .bind(format_time(&record.created_at))
            .execute(&self.pool)
            .await
            .map_err(db_error("create_domain"))?;

        debug!(domain_id = %record.id, name = %record.name, "Domain created");
        Ok(record)
    }

    pub async fn create_subdomain(
        &self,
        domain_id: DomainId,
        name: &str,
    ) -> PosternResult<SubdomainRecord> {
        let name = required(name, "name")?;
        let exists: Option<String> = sqlx::query_scalar("SELECT id FROM domains WHERE id = ?")
            .bind(domain_id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("create_subdomain"))?;
        if exists.is_none() {
            return Err(not_found_error!(format!("domain {}", domain_id), "store"));
        }

        let record = SubdomainRecord {
            id: SubdomainId::generate(),
            domain_id,
            name,
            created_at: Utc::now(),
        };

        sqlx::query("INSERT INTO subdomains (id, domain_id, name, created_at) VALUES (?, ?, ?, ?)")
            .bind(record.id.to_string())
            .bind(record.domain_id.to_string())
            .bind(&record.name)
            .bind(format_time(&record.created_at))
            .execute(&self.pool)
            .await
            .map_err(db_error("create_subdomain"))?;

        debug!(subdomain_id = %record.id, domain_id = %domain_id, "Subdomain created");
        Ok(record)
    }

    pub async fn create_email(
        &self,
        subdomain_id: SubdomainId,
        email: NewEmail,
    ) -> PosternResult<EmailRecord> {
        let owner = self.owning_subdomain(subdomain_id).await?;
        let record = EmailRecord {
            id: EmailId::generate(),
            domain_id: owner.domain_id,
            subdomain_id,
            sender: email.sender,
            recipient: email.recipient,
            subject: email.subject,
            received_at: email.received_at,
        };

        sqlx::query(
            r#"
            INSERT INTO emails (id, domain_id, subdomain_id, sender, recipient, subject, received_at)
            VALUES (?, ?, ?, ?, ?, ?, ?)
        "#,
        )
        .bind(record.id.to_string())
        .bind(record.domain_id.to_string())
        .bind(record.subdomain_id.to_string())
        .bind(&record.sender)
        .bind(&record.recipient)
        .bind(&record.subject)
        .bind(format_time(&record.received_at))
        .execute(&self.pool)
        .await
        .map_err(db_error("create_email"))?;

        Ok(record)
    }

    pub async fn create_campaign(
        &self,
        subdomain_id: SubdomainId,
        name: &str,
    ) -> PosternResult<CampaignRecord> {
        let name = required(name, "name")?;
        let owner = self.owning_subdomain(subdomain_id).await?;
        let record = CampaignRecord {
            id: CampaignId::generate(),
            domain_id: owner.domain_id,
            subdomain_id,
            name,
            created_at: Utc::now(),
        };

        sqlx::query(
            "INSERT INTO campaigns (id, domain_id, subdomain_id, name, created_at) VALUES (?, ?, ?, ?, ?)",
        )
        .bind(record.id.to_string())
        .bind(record.domain_id.to_string())
        .bind(record.subdomain_id.to_string())
        .bind(&record.name)
        .bind(format_time(&record.created_at))
        .execute(&self.pool)
        .await
        .map_err(db_error("create_campaign"))?;

        Ok(record)
    }

    pub async fn create_chaos_address(
        &self,
        subdomain_id: SubdomainId,
        local_part: &str,
    ) -> PosternResult<ChaosAddressRecord> {
        let local_part = required(local_part, "local_part")?;
        let owner = self.owning_subdomain(subdomain_id).await?;
        let record = ChaosAddressRecord {
            id: ChaosAddressId::generate(),
            domain_id: owner.domain_id,
            subdomain_id,
            local_part,
            enabled: true,
        };

        sqlx::query(
            r#"
            INSERT INTO chaos_addresses (id, domain_id, subdomain_id, local_part, enabled, created_at)
            VALUES (?, ?, ?, ?, ?, ?)
        "#,
        )
        .bind(record.id.to_string())
        .bind(record.domain_id.to_string())
        .bind(record.subdomain_id.to_string())
        .bind(&record.local_part)
        .bind(record.enabled)
        .bind(format_time(&Utc::now()))
        .execute(&self.pool)
        .await
        .map_err(db_error("create_chaos_address"))?;

        Ok(record)
    }

    async fn owning_subdomain(&self, subdomain_id: SubdomainId) -> PosternResult<Ownership> {
        self.resolve_ownership(EntityKind::Subdomain, subdomain_id.0)
            .await?
            .ok_or_else(|| not_found_error!(format!("subdomain {}", subdomain_id), "store"))
    }
}

fn required(value: &str, field: &str) -> PosternResult<String> {
    let value = value.trim();
    if value.is_empty() {
        return Err(validation_error!(
            format!("{} must not be empty", field),
            field,
            "store"
        ));
    }
    Ok(value.to_string())
}

fn ownership_query(kind: EntityKind) -> &'static str {
    match kind {
        EntityKind::Subdomain => "SELECT domain_id, id AS subdomain_id FROM subdomains WHERE id = ?",
        EntityKind::Email => "SELECT domain_id, subdomain_id FROM emails WHERE id = ?",
        EntityKind::Campaign => "SELECT domain_id, subdomain_id FROM campaigns WHERE id = ?",
        EntityKind::ChaosAddress => {
            "SELECT domain_id, subdomain_id FROM chaos_addresses WHERE id = ?"
        }
    }
}

#[async_trait]
impl EntityResolver for SqliteReadModel {
    async fn resolve_ownership(
        &self,
        kind: EntityKind,
        id: Uuid,
    ) -> PosternResult<Option<Ownership>> {
        let row: Option<OwnershipRow> = sqlx::query_as(ownership_query(kind))
            .bind(id.to_string())
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("resolve_ownership"))?;

        row.map(OwnershipRow::into_ownership).transpose()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn read_model() -> SqliteReadModel {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        SqliteReadModel::from_pool(pool).await.unwrap()
    }

    #[tokio::test]
    async fn resolves_every_entity_kind_to_its_owners() {
        let store = read_model().await;
        let domain = store.create_domain("acme.test").await.unwrap();
        let subdomain = store.create_subdomain(domain.id, "qa").await.unwrap();
        let email = store
            .create_email(
                subdomain.id,
                NewEmail {
                    sender: "a@example.test".to_string(),
                    recipient: "probe@qa.acme.test".to_string(),
                    subject: "Hello".to_string(),
                    received_at: Utc::now(),
                },
            )
            .await
            .unwrap();
        let campaign = store.create_campaign(subdomain.id, "Spring").await.unwrap();
        let chaos = store
            .create_chaos_address(subdomain.id, "bounce")
            .await
            .unwrap();

        let expected = Some(Ownership {
            domain_id: domain.id,
            subdomain_id: subdomain.id,
        });
        for (kind, id) in [
            (EntityKind::Subdomain, subdomain.id.0),
            (EntityKind::Email, email.id.0),
            (EntityKind::Campaign, campaign.id.0),
            (EntityKind::ChaosAddress, chaos.id.0),
        ] {
            assert_eq!(store.resolve_ownership(kind, id).await.unwrap(), expected);
        }
    }

    #[tokio::test]
    async fn missing_rows_resolve_to_none() {
        let store = read_model().await;
        let resolved = store
            .resolve_ownership(EntityKind::Campaign, Uuid::new_v4())
            .await
            .unwrap();
        assert!(resolved.is_none());
    }

    #[tokio::test]
    async fn seeding_checks_parents_and_names() {
        let store = read_model().await;

        let orphan = store
            .create_campaign(SubdomainId::generate(), "Lost")
            .await;
        assert!(matches!(
            orphan,
            Err(postern_core::PosternError::NotFound { .. })
        ));

        let blank = store.create_domain("   ").await;
        assert!(matches!(
            blank,
            Err(postern_core::PosternError::Validation { .. })
        ));
    }

    #[tokio::test]
    async fn connect_honours_store_config() {
        let config = StoreConfig {
            database_url: "sqlite::memory:".to_string(),
            max_connections: 8,
            run_migrations: true,
        };
        let store = SqliteReadModel::connect(&config).await.unwrap();
        assert!(store.create_domain("acme.test").await.is_ok());
    }
}
