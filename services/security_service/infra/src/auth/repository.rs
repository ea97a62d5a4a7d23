//! PostgreSQL implementations of the C10 user/tenant store adapter.
//! Grounded on the teacher's `PgUserRepository`/`PgTenantRepository`
//! (query shape, `QueryBuilder`-based pagination, `RETURNING *`) rewritten
//! against this system's `User`/`Tenant` shape — the Kanidm-specific
//! lookup/upsert methods have no counterpart here and are dropped.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared_error::AppError;
use sqlx::PgPool;
use uuid::Uuid;

use security_service_core::domains::auth::domain::{
    model::{Tenant, User},
    repository::{TenantRepository, UserRepository},
};

#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    async fn find_by_email(&self, email: &str, tenant_id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE email = $1 AND tenant_id = $2 AND deleted_at IS NULL",
        )
        .bind(email)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid, tenant_id: Uuid) -> Result<Option<User>, AppError> {
        let user = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE user_id = $1 AND tenant_id = $2 AND deleted_at IS NULL",
        )
        .bind(id)
        .bind(tenant_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(user)
    }

    async fn create(&self, user: &User) -> Result<User, AppError> {
        let created = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (
                user_id, tenant_id, email, password_hash, account_status, kyc_status,
                subscription_tier, email_verified, phone_verified, full_name, phone, role,
                failed_login_attempts, locked_until, password_changed_at,
                last_login_at, last_login_ip, last_device_fingerprint,
                created_at, updated_at, deleted_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18, $19, $20, $21)
            RETURNING *
            "#,
        )
        .bind(user.user_id)
        .bind(user.tenant_id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.account_status)
        .bind(user.kyc_status)
        .bind(user.subscription_tier)
        .bind(user.email_verified)
        .bind(user.phone_verified)
        .bind(&user.full_name)
        .bind(&user.phone)
        .bind(&user.role)
        .bind(user.failed_login_attempts)
        .bind(user.locked_until)
        .bind(user.password_changed_at)
        .bind(user.last_login_at)
        .bind(&user.last_login_ip)
        .bind(&user.last_device_fingerprint)
        .bind(user.created_at)
        .bind(user.updated_at)
        .bind(user.deleted_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn update(&self, user: &User) -> Result<User, AppError> {
        let updated = sqlx::query_as::<_, User>(
            r#"
            UPDATE users
            SET email = $2, password_hash = $3, account_status = $4, kyc_status = $5,
                subscription_tier = $6, email_verified = $7, phone_verified = $8,
                full_name = $9, phone = $10, role = $11, failed_login_attempts = $12,
                locked_until = $13, password_changed_at = $14, last_login_at = $15,
                last_login_ip = $16, last_device_fingerprint = $17, updated_at = NOW()
            WHERE user_id = $1 AND tenant_id = $18 AND deleted_at IS NULL
            RETURNING *
            "#,
        )
        .bind(user.user_id)
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(user.account_status)
        .bind(user.kyc_status)
        .bind(user.subscription_tier)
        .bind(user.email_verified)
        .bind(user.phone_verified)
        .bind(&user.full_name)
        .bind(&user.phone)
        .bind(&user.role)
        .bind(user.failed_login_attempts)
        .bind(user.locked_until)
        .bind(user.password_changed_at)
        .bind(user.last_login_at)
        .bind(&user.last_login_ip)
        .bind(&user.last_device_fingerprint)
        .bind(user.tenant_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(updated)
    }

    async fn list(&self, tenant_id: Uuid, page: i32, page_size: i32) -> Result<(Vec<User>, i64), AppError> {
        let page = page.max(1);
        let page_size = page_size.clamp(1, 100);
        let offset = ((page as i64) - 1) * (page_size as i64);

        let total: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM users WHERE tenant_id = $1 AND deleted_at IS NULL",
        )
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;

        let users = sqlx::query_as::<_, User>(
            "SELECT * FROM users WHERE tenant_id = $1 AND deleted_at IS NULL ORDER BY created_at DESC LIMIT $2 OFFSET $3",
        )
        .bind(tenant_id)
        .bind(page_size as i64)
        .bind(offset)
        .fetch_all(&self.pool)
        .await?;

        Ok((users, total.0))
    }

    async fn email_exists(&self, email: &str, tenant_id: Uuid) -> Result<bool, AppError> {
        let exists: (bool,) = sqlx::query_as(
            "SELECT EXISTS(SELECT 1 FROM users WHERE email = $1 AND tenant_id = $2 AND deleted_at IS NULL)",
        )
        .bind(email)
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(exists.0)
    }

    async fn increment_failed_attempts(&self, user_id: Uuid, tenant_id: Uuid) -> Result<i32, AppError> {
        let row: (i32,) = sqlx::query_as(
            r#"
            UPDATE users
            SET failed_login_attempts = failed_login_attempts + 1, updated_at = NOW()
            WHERE user_id = $1 AND tenant_id = $2 AND deleted_at IS NULL
            RETURNING failed_login_attempts
            "#,
        )
        .bind(user_id)
        .bind(tenant_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    async fn reset_failed_attempts(&self, user_id: Uuid, tenant_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE users SET failed_login_attempts = 0, updated_at = NOW() WHERE user_id = $1 AND tenant_id = $2",
        )
        .bind(user_id)
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn lock_account(&self, user_id: Uuid, tenant_id: Uuid, locked_until: DateTime<Utc>) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE users
            SET account_status = 'LOCKED', locked_until = $3, updated_at = NOW()
            WHERE user_id = $1 AND tenant_id = $2
            "#,
        )
        .bind(user_id)
        .bind(tenant_id)
        .bind(locked_until)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn unlock_account(&self, user_id: Uuid, tenant_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE users
            SET account_status = 'ACTIVE', locked_until = NULL, failed_login_attempts = 0, updated_at = NOW()
            WHERE user_id = $1 AND tenant_id = $2
            "#,
        )
        .bind(user_id)
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn record_login(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
        ip_address: Option<&str>,
        device_fingerprint: Option<&str>,
    ) -> Result<(), AppError> {
        sqlx::query(
            r#"
            UPDATE users
            SET last_login_at = NOW(), last_login_ip = $3, last_device_fingerprint = $4, updated_at = NOW()
            WHERE user_id = $1 AND tenant_id = $2
            "#,
        )
        .bind(user_id)
        .bind(tenant_id)
        .bind(ip_address)
        .bind(device_fingerprint)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn set_password_hash(&self, user_id: Uuid, tenant_id: Uuid, password_hash: &str) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE users SET password_hash = $3, password_changed_at = NOW(), updated_at = NOW() WHERE user_id = $1 AND tenant_id = $2",
        )
        .bind(user_id)
        .bind(tenant_id)
        .bind(password_hash)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn mark_email_verified(&self, user_id: Uuid, tenant_id: Uuid) -> Result<(), AppError> {
        sqlx::query(
            "UPDATE users SET email_verified = true, updated_at = NOW() WHERE user_id = $1 AND tenant_id = $2",
        )
        .bind(user_id)
        .bind(tenant_id)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[derive(Clone)]
pub struct PgTenantRepository {
    pool: PgPool,
}

impl PgTenantRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl TenantRepository for PgTenantRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Tenant>, AppError> {
        let tenant = sqlx::query_as::<_, Tenant>(
            "SELECT * FROM tenants WHERE tenant_id = $1 AND deleted_at IS NULL",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(tenant)
    }

    async fn create(&self, tenant: &Tenant) -> Result<Tenant, AppError> {
        let created = sqlx::query_as::<_, Tenant>(
            r#"
            INSERT INTO tenants (
                tenant_id, name, slug, plan, plan_expires_at, settings, status,
                owner_user_id, created_at, updated_at, deleted_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
            RETURNING *
            "#,
        )
        .bind(tenant.tenant_id)
        .bind(&tenant.name)
        .bind(&tenant.slug)
        .bind(&tenant.plan)
        .bind(tenant.plan_expires_at)
        .bind(&tenant.settings)
        .bind(&tenant.status)
        .bind(tenant.owner_user_id)
        .bind(tenant.created_at)
        .bind(tenant.updated_at)
        .bind(tenant.deleted_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(created)
    }

    async fn find_by_name(&self, name: &str) -> Result<Option<Tenant>, AppError> {
        let tenant = sqlx::query_as::<_, Tenant>(
            "SELECT * FROM tenants WHERE name = $1 AND deleted_at IS NULL",
        )
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(tenant)
    }

    async fn find_by_slug(&self, slug: &str) -> Result<Option<Tenant>, AppError> {
        let tenant = sqlx::query_as::<_, Tenant>(
            "SELECT * FROM tenants WHERE slug = $1 AND deleted_at IS NULL",
        )
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        Ok(tenant)
    }
}
