//! Table and index definitions
//!
//! Every searchable table carries both `domain_id` and `subdomain_id` so the
//! row filter is a pair of indexed membership tests.

use crate::db_error;
use postern_core::PosternResult;
use sqlx::SqlitePool;
use tracing::info;

const STATEMENTS: &[&str] = &[
    r#"CREATE TABLE IF NOT EXISTS domains (
        id TEXT PRIMARY KEY,
        name TEXT UNIQUE NOT NULL,
        created_at TEXT NOT NULL
    )"#,
    r#"CREATE TABLE IF NOT EXISTS subdomains (
        id TEXT PRIMARY KEY,
        domain_id TEXT NOT NULL REFERENCES domains(id),
        name TEXT NOT NULL,
        created_at TEXT NOT NULL,
        UNIQUE (domain_id, name)
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_subdomains_domain_id ON subdomains(domain_id)",
    r#"CREATE TABLE IF NOT EXISTS emails (
        id TEXT PRIMARY KEY,
        domain_id TEXT NOT NULL,
        subdomain_id TEXT NOT NULL REFERENCES subdomains(id),
        sender TEXT NOT NULL,
        recipient TEXT NOT NULL,
        subject TEXT NOT NULL,
        received_at TEXT NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_emails_domain_id ON emails(domain_id)",
    "CREATE INDEX IF NOT EXISTS idx_emails_subdomain_id ON emails(subdomain_id)",
    r#"CREATE TABLE IF NOT EXISTS campaigns (
        id TEXT PRIMARY KEY,
        domain_id TEXT NOT NULL,
        subdomain_id TEXT NOT NULL REFERENCES subdomains(id),
        name TEXT NOT NULL,
        created_at TEXT NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_campaigns_domain_id ON campaigns(domain_id)",
    "CREATE INDEX IF NOT EXISTS idx_campaigns_subdomain_id ON campaigns(subdomain_id)",
    r#"CREATE TABLE IF NOT EXISTS chaos_addresses (
        id TEXT PRIMARY KEY,
        domain_id TEXT NOT NULL,
        subdomain_id TEXT NOT NULL REFERENCES subdomains(id),
        local_part TEXT NOT NULL,
        enabled BOOLEAN NOT NULL DEFAULT TRUE,
        created_at TEXT NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_chaos_addresses_domain_id ON chaos_addresses(domain_id)",
    "CREATE INDEX IF NOT EXISTS idx_chaos_addresses_subdomain_id ON chaos_addresses(subdomain_id)",
    r#"CREATE TABLE IF NOT EXISTS passkeys (
        id TEXT PRIMARY KEY,
        user_id TEXT NOT NULL,
        credential_id TEXT UNIQUE NOT NULL,
        public_key TEXT NOT NULL,
        sign_count INTEGER NOT NULL,
        algorithm INTEGER NOT NULL,
        display_name TEXT NOT NULL,
        registered_at TEXT NOT NULL,
        last_used_at TEXT,
        is_revoked BOOLEAN NOT NULL DEFAULT FALSE,
        revoked_at TEXT,
        revoked_by_user_id TEXT,
        revision INTEGER NOT NULL
    )"#,
    "CREATE INDEX IF NOT EXISTS idx_passkeys_user_id ON passkeys(user_id)",
];

/// Create all tables and indexes. Safe to run repeatedly.
pub async fn migrate(pool: &SqlitePool) -> PosternResult<()> {
    for statement in STATEMENTS {
        sqlx::query(statement)
            .execute(pool)
            .await
            .map_err(db_error("migrate"))?;
    }

    info!(statements = STATEMENTS.len(), "Read model schema ready");
    Ok(())
}
