//! Core trait definitions

use crate::error::PosternResult;
use crate::types::{EntityKind, Ownership};
use async_trait::async_trait;
use uuid::Uuid;

/// Keyed ownership lookup over the read model.
///
/// Implementations must be idempotent and side-effect free, and must return
/// `Ok(None)` for a missing row rather than an error. Concurrent calls for
/// different entities are independent.
#[async_trait]
pub trait EntityResolver: Send + Sync {
    /// Resolve the owning domain and subdomain of an entity
    async fn resolve_ownership(
        &self,
        kind: EntityKind,
        id: Uuid,
    ) -> PosternResult<Option<Ownership>>;
}
