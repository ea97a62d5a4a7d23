use async_trait::async_trait;
use chrono::{DateTime, Utc};
use shared_error::AppError;
use uuid::Uuid;

use super::model::{MfaConfig, Session, Tenant, User};

/// User store adapter (C10): the authoritative-store-facing half of
/// account lifecycle. Implementations must scope every lookup by
/// `tenant_id` — email is only unique within a tenant.
#[async_trait]
pub trait UserRepository: Send + Sync {
    async fn find_by_email(&self, email: &str, tenant_id: Uuid) -> Result<Option<User>, AppError>;
    async fn find_by_id(&self, id: Uuid, tenant_id: Uuid) -> Result<Option<User>, AppError>;
    async fn create(&self, user: &User) -> Result<User, AppError>;
    async fn update(&self, user: &User) -> Result<User, AppError>;
    async fn list(&self, tenant_id: Uuid, page: i32, page_size: i32) -> Result<(Vec<User>, i64), AppError>;
    async fn email_exists(&self, email: &str, tenant_id: Uuid) -> Result<bool, AppError>;

    /// Atomically increments `failed_login_attempts` and returns the new
    /// count, so the caller can compare against `max_failed_attempts`
    /// without a read-then-write race.
    async fn increment_failed_attempts(&self, user_id: Uuid, tenant_id: Uuid) -> Result<i32, AppError>;

    async fn reset_failed_attempts(&self, user_id: Uuid, tenant_id: Uuid) -> Result<(), AppError>;

    async fn lock_account(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
        locked_until: DateTime<Utc>,
    ) -> Result<(), AppError>;

    async fn unlock_account(&self, user_id: Uuid, tenant_id: Uuid) -> Result<(), AppError>;

    async fn record_login(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
        ip_address: Option<&str>,
        device_fingerprint: Option<&str>,
    ) -> Result<(), AppError>;

    async fn set_password_hash(&self, user_id: Uuid, tenant_id: Uuid, password_hash: &str) -> Result<(), AppError>;

    async fn mark_email_verified(&self, user_id: Uuid, tenant_id: Uuid) -> Result<(), AppError>;
}

#[async_trait]
pub trait TenantRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Tenant>, AppError>;
    async fn create(&self, tenant: &Tenant) -> Result<Tenant, AppError>;
    async fn find_by_name(&self, name: &str) -> Result<Option<Tenant>, AppError>;
    async fn find_by_slug(&self, slug: &str) -> Result<Option<Tenant>, AppError>;
}

/// C9's authoritative-store side. The session manager owns the Redis
/// mirror/indexes on top of this; this trait only covers the transactional
/// record of truth.
#[async_trait]
pub trait SessionRepository: Send + Sync {
    async fn create(&self, session: &Session) -> Result<Session, AppError>;
    async fn find_by_id(&self, session_id: Uuid) -> Result<Option<Session>, AppError>;

    /// Active sessions ordered oldest `last_activity` first — the order the
    /// eviction policy walks (spec.md §4.7 step 2).
    async fn find_active_by_user(&self, user_id: Uuid) -> Result<Vec<Session>, AppError>;

    async fn touch(&self, session_id: Uuid, expires_at: DateTime<Utc>) -> Result<(), AppError>;
    async fn terminate(&self, session_id: Uuid) -> Result<(), AppError>;
    async fn terminate_all_for_user(&self, user_id: Uuid) -> Result<u64, AppError>;

    /// The 5-minute sweep's authoritative-store cleanup (spec.md §4.7
    /// "Cleanup"): purge expired rows older than `older_than`.
    async fn delete_expired_before(&self, older_than: DateTime<Utc>) -> Result<u64, AppError>;
}

#[async_trait]
pub trait MfaRepository: Send + Sync {
    async fn find_by_user(&self, user_id: Uuid, tenant_id: Uuid) -> Result<Option<MfaConfig>, AppError>;
    async fn upsert(&self, config: &MfaConfig) -> Result<MfaConfig, AppError>;
    async fn delete(&self, user_id: Uuid, tenant_id: Uuid) -> Result<(), AppError>;

    /// Atomically removes one backup code hash from the set, returning
    /// whether it was present (spec.md §3 "MFA configuration" invariant:
    /// redemption is atomic).
    async fn redeem_backup_code(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
        code_hash: &str,
    ) -> Result<bool, AppError>;
}

/// C6's revocation-set contract. Backed by the in-memory store (Redis) in
/// `infra`; kept as its own trait so the token service in `core` never
/// depends on a concrete cache client.
#[async_trait]
pub trait RevocationStore: Send + Sync {
    /// Marks `jti` revoked. Must be atomic (e.g. Redis `SET ... NX`) and
    /// returns `true` only if this call is the one that performed the
    /// revocation — `false` means `jti` was already revoked, which callers
    /// that depend on single-use semantics (token refresh) must treat as a
    /// hard rejection rather than proceeding.
    async fn revoke(&self, jti: &str, ttl: std::time::Duration) -> Result<bool, AppError>;
    async fn is_revoked(&self, jti: &str) -> Result<bool, AppError>;

    /// Sets the earliest `iat` (unix seconds) a token for `user_id` may
    /// carry to still be considered valid — used to invalidate every
    /// outstanding refresh/access token for a user at once (password
    /// reset/change, spec.md §4.10) without needing to enumerate their
    /// individual `jti`s.
    async fn set_user_token_floor(&self, user_id: Uuid, floor_iat: i64) -> Result<(), AppError>;
    async fn user_token_floor(&self, user_id: Uuid) -> Result<Option<i64>, AppError>;
}
