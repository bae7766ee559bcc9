//! Postern Store - SQLite read model
//!
//! Backs the access engine's ownership lookups, runs list/search queries
//! with the actor's row filter pushed into SQL, and persists passkeys.

pub mod passkeys;
pub mod queries;
pub mod read_model;
pub mod records;
pub mod schema;
pub mod search;

pub use passkeys::SqlitePasskeyStore;
pub use queries::{QueryError, SearchService};
pub use read_model::{NewEmail, SqliteReadModel};
pub use records::{CampaignRecord, ChaosAddressRecord, DomainRecord, EmailRecord, SubdomainRecord};
pub use search::RowScope;

use postern_core::{storage_error, PosternError};
use tracing::error;

/// Map a sqlx failure into a storage error, logging it once here
pub(crate) fn db_error(operation: &'static str) -> impl FnOnce(sqlx::Error) -> PosternError {
    move |e| {
        error!(operation, error = %e, "Database operation failed");
        let mut err = storage_error!(format!("{} failed: {}", operation, e), "store", e);
        if let PosternError::Storage { context, .. } = &mut err {
            context.operation = Some(operation.to_string());
        }
        err
    }
}
