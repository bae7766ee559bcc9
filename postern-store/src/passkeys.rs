//! SQLite passkey persistence
//!
//! Optimistic concurrency rides on the `revision` column: an update only
//! matches the row when the stored revision is the one the aggregate was
//! loaded at, and bumps it in the same statement.

use crate::db_error;
use crate::read_model::SqliteReadModel;
use crate::records::{format_time, parse_id, parse_optional_time, parse_time};
use async_trait::async_trait;
use postern_access::{Passkey, PasskeyAlgorithm, PasskeyError, PasskeySnapshot, PasskeyStore, WriteOutcome};
use postern_core::{storage_error, PasskeyId, PosternResult, UserId};
use sqlx::SqlitePool;
use tracing::debug;

const COLUMNS: &str = "id, user_id, credential_id, public_key, sign_count, algorithm, display_name, \
     registered_at, last_used_at, is_revoked, revoked_at, revoked_by_user_id, revision";

#[derive(Debug, sqlx::FromRow)]
struct PasskeyRow {
    id: String,
    user_id: String,
    credential_id: String,
    public_key: String,
    sign_count: i64,
    algorithm: i64,
    display_name: String,
    registered_at: String,
    last_used_at: Option<String>,
    is_revoked: bool,
    revoked_at: Option<String>,
    revoked_by_user_id: Option<String>,
    revision: i64,
}

impl PasskeyRow {
    fn into_snapshot(self) -> PosternResult<PasskeySnapshot> {
        Ok(PasskeySnapshot {
            id: parse_id(&self.id, "passkeys.id")?,
            user_id: UserId::new(self.user_id),
            credential_id: self.credential_id,
            public_key: self.public_key,
            sign_count: u32::try_from(self.sign_count)
                .map_err(|e| storage_error!("passkeys.sign_count out of range", "store", e))?,
            algorithm: PasskeyAlgorithm(
                i32::try_from(self.algorithm)
                    .map_err(|e| storage_error!("passkeys.algorithm out of range", "store", e))?,
            ),
            display_name: self.display_name,
            registered_at: parse_time(&self.registered_at, "passkeys.registered_at")?,
            last_used_at: parse_optional_time(self.last_used_at.as_deref(), "passkeys.last_used_at")?,
            is_revoked: self.is_revoked,
            revoked_at: parse_optional_time(self.revoked_at.as_deref(), "passkeys.revoked_at")?,
            revoked_by_user_id: self.revoked_by_user_id.map(UserId::new),
            revision: u64::try_from(self.revision)
                .map_err(|e| storage_error!("passkeys.revision out of range", "store", e))?,
        })
    }

    fn into_passkey(self) -> Result<Passkey, PasskeyError> {
        Passkey::from_snapshot(self.into_snapshot()?)
    }
}

#[derive(Debug, Clone)]
pub struct SqlitePasskeyStore {
    pool: SqlitePool,
}

impl SqlitePasskeyStore {
    /// Share the read model's pool; the schema is created by the read model
    pub fn new(read_model: &SqliteReadModel) -> Self {
        Self {
            pool: read_model.pool().clone(),
        }
    }

    async fn fetch_one_by(
        &self,
        column: &'static str,
        value: String,
    ) -> Result<Option<Passkey>, PasskeyError> {
        let query = format!("SELECT {} FROM passkeys WHERE {} = ?", COLUMNS, column);
        let row: Option<PasskeyRow> = sqlx::query_as(&query)
            .bind(value)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_error("passkey_fetch"))?;

        row.map(PasskeyRow::into_passkey).transpose()
    }
}

#[async_trait]
impl PasskeyStore for SqlitePasskeyStore {
    async fn find_by_credential_id(
        &self,
        credential_id: &str,
    ) -> Result<Option<Passkey>, PasskeyError> {
        self.fetch_one_by("credential_id", credential_id.to_string())
            .await
    }

    async fn get(&self, id: PasskeyId) -> Result<Option<Passkey>, PasskeyError> {
        self.fetch_one_by("id", id.to_string()).await
    }

    async fn list_for_user(&self, user_id: &UserId) -> Result<Vec<Passkey>, PasskeyError> {
        let query = format!(
            "SELECT {} FROM passkeys WHERE user_id = ? ORDER BY registered_at ASC",
            COLUMNS
        );
        let rows: Vec<PasskeyRow> = sqlx::query_as(&query)
            .bind(user_id.as_str())
            .fetch_all(&self.pool)
            .await
            .map_err(db_error("passkey_list"))?;

        rows.into_iter().map(PasskeyRow::into_passkey).collect()
    }

    async fn insert(&self, passkey: &Passkey) -> Result<WriteOutcome, PasskeyError> {
        let snapshot = passkey.snapshot();
        let query = format!(
            "INSERT INTO passkeys ({}) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 1) \
             ON CONFLICT DO NOTHING",
            COLUMNS
        );

        let result = sqlx::query(&query)
            .bind(snapshot.id.to_string())
            .bind(snapshot.user_id.as_str())
            .bind(&snapshot.credential_id)
            .bind(&snapshot.public_key)
            .bind(i64::from(snapshot.sign_count))
            .bind(i64::from(snapshot.algorithm.0))
            .bind(&snapshot.display_name)
            .bind(format_time(&snapshot.registered_at))
            .bind(snapshot.last_used_at.as_ref().map(format_time))
            .bind(snapshot.is_revoked)
            .bind(snapshot.revoked_at.as_ref().map(format_time))
            .bind(snapshot.revoked_by_user_id.as_ref().map(|u| u.as_str().to_string()))
            .execute(&self.pool)
            .await
            .map_err(db_error("passkey_insert"))?;

        if result.rows_affected() == 0 {
            debug!(credential_id = %snapshot.credential_id, "Passkey insert conflicted");
            return Ok(WriteOutcome::Conflict);
        }
        Ok(WriteOutcome::Written)
    }

    async fn update(&self, passkey: &Passkey) -> Result<WriteOutcome, PasskeyError> {
        let snapshot = passkey.snapshot();
        let expected = i64::try_from(snapshot.revision)
            .map_err(|e| storage_error!("passkey revision out of range", "store", e))?;

        let result = sqlx::query(
            r#"
            UPDATE passkeys
            SET sign_count = ?, last_used_at = ?, is_revoked = ?, revoked_at = ?,
                revoked_by_user_id = ?, revision = revision + 1
            WHERE id = ? AND revision = ?
        "#,
        )
        .bind(i64::from(snapshot.sign_count))
        .bind(snapshot.last_used_at.as_ref().map(format_time))
        .bind(snapshot.is_revoked)
        .bind(snapshot.revoked_at.as_ref().map(format_time))
        .bind(snapshot.revoked_by_user_id.as_ref().map(|u| u.as_str().to_string()))
        .bind(snapshot.id.to_string())
        .bind(expected)
        .execute(&self.pool)
        .await
        .map_err(db_error("passkey_update"))?;

        if result.rows_affected() == 1 {
            return Ok(WriteOutcome::Written);
        }

        match self.get(snapshot.id).await? {
            Some(_) => Ok(WriteOutcome::Conflict),
            None => Err(PasskeyError::NotFound),
        }
    }
}
