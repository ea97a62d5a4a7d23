//! Tamper-evident audit log persistence (C8, spec.md §4.6).
//!
//! The repository only ever appends; there is no update or delete method by
//! design — mutating a persisted record would break the hash chain.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared_error::AppError;
use uuid::Uuid;

use super::model::AuditRecord;

#[async_trait]
pub trait AuditLogRepository: Send + Sync {
    /// Returns the most recently persisted record's `integrity_hash` for
    /// this tenant, or `None` if the chain is empty (the caller substitutes
    /// `AUDIT_GENESIS_HASH`). Must be read and the subsequent `append`
    /// serialised with respect to other appends for the same tenant
    /// (spec.md §5 "Ordering guarantees").
    async fn current_tip_hash(&self, tenant_id: Uuid) -> Result<Option<String>, AppError>;

    /// Persist a fully-computed record (hash fields already set by the
    /// service layer).
    async fn append(&self, record: &AuditRecord) -> Result<AuditRecord, AppError>;

    /// Records in `[from, to]` creation-time order, for `verify_chain`.
    /// Returned in ascending order so the caller can walk the chain once.
    async fn range(
        &self,
        tenant_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AuditRecord>, AppError>;

    async fn find_by_id(&self, id: Uuid) -> Result<Option<AuditRecord>, AppError>;
}
