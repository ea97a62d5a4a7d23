//! PostgreSQL implementation of the C9 session manager's authoritative store
//! (C9, spec.md §4.7). Grounded on the teacher's `PgSessionRepository` query
//! shape; rewritten against this system's `Session` model and the
//! `find_active_by_user`/`delete_expired_before` contract the session
//! manager's eviction and sweep logic actually calls.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::PgPool;
use uuid::Uuid;

use security_service_core::domains::auth::domain::{model::Session, repository::SessionRepository};
use shared_error::AppError;

#[derive(Clone)]
pub struct PgSessionRepository {
    pool: PgPool,
}

impl PgSessionRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl SessionRepository for PgSessionRepository {
    async fn create(&self, session: &Session) -> Result<Session, AppError> {
        let created = sqlx::query_as::<_, Session>(
            r#"
            INSERT INTO sessions (
                session_id, user_id, tenant_id, device_fingerprint,
                ip_address, user_agent, location,
                created_at, last_activity, expires_at, active
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(session.session_id)
        .bind(session.user_id)
        .bind(session.tenant_id)
        .bind(&session.device_fingerprint)
        .bind(&session.ip_address)
        .bind(&session.user_agent)
        .bind(&session.location)
        .bind(session.created_at)
        .bind(session.last_activity)
        .bind(session.expires_at)
        .bind(session.active)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn find_by_id(&self, session_id: Uuid) -> Result<Option<Session>, AppError> {
        let session = sqlx::query_as::<_, Session>("SELECT * FROM sessions WHERE session_id = $1")
            .bind(session_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(session)
    }

    async fn find_active_by_user(&self, user_id: Uuid) -> Result<Vec<Session>, AppError> {
        let sessions = sqlx::query_as::<_, Session>(
            r#"
            SELECT * FROM sessions
            WHERE user_id = $1 AND active AND expires_at > NOW()
            ORDER BY last_activity ASC, session_id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(sessions)
    }

    async fn touch(&self, session_id: Uuid, expires_at: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE sessions SET last_activity = NOW(), expires_at = $2 WHERE session_id = $1",
        )
        .bind(session_id)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn terminate(&self, session_id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE sessions SET active = FALSE WHERE session_id = $1")
            .bind(session_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn terminate_all_for_user(&self, user_id: Uuid) -> Result<u64, AppError> {
        let result = sqlx::query(
            "UPDATE sessions SET active = FALSE WHERE user_id = $1 AND active",
        )
        .bind(user_id)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }

    async fn delete_expired_before(&self, older_than: DateTime<Utc>) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM sessions WHERE expires_at < $1")
            .bind(older_than)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
