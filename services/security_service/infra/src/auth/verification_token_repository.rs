//! PostgreSQL implementation of the unified C12/C13 verification token store
//! (spec.md §3 "Verification token"). Grounded on the teacher's
//! `PgEmailVerificationRepository`/`PgPasswordResetRepository` query shape
//! (single-use hashed token row, `invalidate prior` before insert, expiry
//! sweep) — consolidated into one table/trait per
//! `core`'s `VerificationTokenRepository` since both flows are identical
//! apart from the `token_type` discriminant.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use security_service_core::domains::auth::domain::{
    model::{VerificationToken, VerificationTokenType},
    verification_token_repository::VerificationTokenRepository,
};
use shared_error::AppError;

#[derive(Clone)]
pub struct PgVerificationTokenRepository {
    pool: PgPool,
}

impl PgVerificationTokenRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl VerificationTokenRepository for PgVerificationTokenRepository {
    async fn create(&self, token: &VerificationToken) -> Result<VerificationToken, AppError> {
        let created = sqlx::query_as::<_, VerificationToken>(
            r#"
            INSERT INTO verification_tokens (
                token_id, user_id, tenant_id, token_hash, token_type,
                expires_at, used_at, ip_address, user_agent, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
            RETURNING *
            "#,
        )
        .bind(token.token_id)
        .bind(token.user_id)
        .bind(token.tenant_id)
        .bind(&token.token_hash)
        .bind(token.token_type)
        .bind(token.expires_at)
        .bind(token.used_at)
        .bind(&token.ip_address)
        .bind(&token.user_agent)
        .bind(token.created_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<VerificationToken>, AppError> {
        let token = sqlx::query_as::<_, VerificationToken>(
            "SELECT * FROM verification_tokens WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(token)
    }

    async fn invalidate_all_for_user(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
        token_type: VerificationTokenType,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE verification_tokens
            SET used_at = NOW()
            WHERE user_id = $1 AND tenant_id = $2 AND token_type = $3 AND used_at IS NULL
            "#,
        )
        .bind(user_id)
        .bind(tenant_id)
        .bind(token_type)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_used(&self, token_id: Uuid) -> Result<(), AppError> {
        sqlx::query("UPDATE verification_tokens SET used_at = NOW() WHERE token_id = $1")
            .bind(token_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn delete_expired(&self) -> Result<u64, AppError> {
        let result = sqlx::query("DELETE FROM verification_tokens WHERE expires_at < NOW()")
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }
}
