//! PostgreSQL implementation of the C7 MFA config store. Grounded on
//! `repository.rs`'s `PgUserRepository` query shape (tenant-scoped lookups,
//! `RETURNING *`), adapted to `MfaConfig`'s single-row-per-user shape and
//! the atomic backup-code redemption the trait requires.

use async_trait::async_trait;
use sqlx::PgPool;
use uuid::Uuid;

use security_service_core::domains::auth::domain::{model::MfaConfig, repository::MfaRepository};
use shared_error::AppError;

#[derive(Clone)]
pub struct PgMfaRepository {
    pool: PgPool,
}

impl PgMfaRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl MfaRepository for PgMfaRepository {
    async fn find_by_user(&self, user_id: Uuid, tenant_id: Uuid) -> Result<Option<MfaConfig>, AppError> {
        let config = sqlx::query_as::<_, MfaConfig>(
            "SELECT * FROM mfa_configs WHERE user_id = $1 AND tenant_id = $2",
        )
        .bind(user_id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(config)
    }

    async fn upsert(&self, config: &MfaConfig) -> Result<MfaConfig, AppError> {
        let upserted = sqlx::query_as::<_, MfaConfig>(
            r#"
            INSERT INTO mfa_configs (
                user_id, tenant_id, mfa_type, secret_key_encrypted,
                backup_code_hashes, enabled, created_at, updated_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (user_id, tenant_id) DO UPDATE SET
                mfa_type = EXCLUDED.mfa_type,
                secret_key_encrypted = EXCLUDED.secret_key_encrypted,
                backup_code_hashes = EXCLUDED.backup_code_hashes,
                enabled = EXCLUDED.enabled,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(config.user_id)
        .bind(config.tenant_id)
        .bind(&config.mfa_type)
        .bind(&config.secret_key_encrypted)
        .bind(&config.backup_code_hashes)
        .bind(config.enabled)
        .bind(config.created_at)
        .bind(config.updated_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(upserted)
    }

    async fn delete(&self, user_id: Uuid, tenant_id: Uuid) -> Result<(), AppError> {
        sqlx::query("DELETE FROM mfa_configs WHERE user_id = $1 AND tenant_id = $2")
            .bind(user_id)
            .bind(tenant_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn redeem_backup_code(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
        code_hash: &str,
    ) -> Result<bool, AppError> {
        let result = sqlx::query(
            r#"
            UPDATE mfa_configs
            SET backup_code_hashes = backup_code_hashes - $3, updated_at = NOW()
            WHERE user_id = $1 AND tenant_id = $2
              AND backup_code_hashes ? $3
            "#,
        )
        .bind(user_id)
        .bind(tenant_id)
        .bind(code_hash)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}
