//! PostgreSQL-backed `ServiceIdentityResolver` (spec.md §4.8 "Service
//! API-key strategy"). Grounded on `repository.rs`'s single-row lookup
//! shape; service API keys are pre-provisioned out of band (no self-service
//! creation endpoint in scope), so this is read-only.

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use uuid::Uuid;

use security_service_core::domains::auth::domain::strategies::ServiceIdentityResolver;
use shared_error::AppError;

#[derive(Clone)]
pub struct PgServiceIdentityResolver {
    pool: PgPool,
}

impl PgServiceIdentityResolver {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn hash_key(api_key: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(api_key.as_bytes());
        hex::encode(hasher.finalize())
    }
}

#[async_trait]
impl ServiceIdentityResolver for PgServiceIdentityResolver {
    async fn resolve(&self, api_key: &str) -> Result<Option<(Uuid, String)>, AppError> {
        let key_hash = Self::hash_key(api_key);

        let row: Option<(Uuid, String)> = sqlx::query_as(
            r#"
            SELECT service_id, service_role FROM service_identities
            WHERE api_key_hash = $1 AND revoked_at IS NULL
            "#,
        )
        .bind(&key_hash)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row)
    }
}
