use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::collections::HashSet;
use uuid::Uuid;

/// Account status (spec.md §3 "User"). LOCKED always carries a future
/// `locked_until`; DEACTIVATED is terminal — users are never hard-deleted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "UPPERCASE")]
pub enum AccountStatus {
    Active,
    Suspended,
    Locked,
    Deactivated,
}

impl std::fmt::Display for AccountStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AccountStatus::Active => "ACTIVE",
            AccountStatus::Suspended => "SUSPENDED",
            AccountStatus::Locked => "LOCKED",
            AccountStatus::Deactivated => "DEACTIVATED",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "UPPERCASE")]
pub enum KycStatus {
    Pending,
    InProgress,
    Approved,
    Rejected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "UPPERCASE")]
pub enum SubscriptionTier {
    Free,
    Premium,
    Enterprise,
}

/// User entity (domain model). Maps directly to the `users` table; the
/// canonical email (lowercased + trimmed) is what uniqueness and lookups
/// are keyed on — callers must canonicalise before calling a repository
/// method, the repository itself does not re-normalise.
#[derive(Debug, Clone, FromRow)]
pub struct User {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub password_hash: Option<String>,
    pub account_status: AccountStatus,
    pub kyc_status: KycStatus,
    pub subscription_tier: SubscriptionTier,
    pub email_verified: bool,
    pub phone_verified: bool,
    pub full_name: Option<String>,
    pub phone: Option<String>,
    pub role: String,

    pub failed_login_attempts: i32,
    pub locked_until: Option<DateTime<Utc>>,
    pub password_changed_at: Option<DateTime<Utc>>,
    pub last_login_at: Option<DateTime<Utc>>,
    pub last_login_ip: Option<String>,
    pub last_device_fingerprint: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

impl User {
    /// Invariant check kept alongside the entity so every call site that
    /// mutates kyc/subscription can assert it rather than re-deriving the
    /// rule (spec.md §3 "User" invariants).
    pub fn kyc_invariant_holds(&self) -> bool {
        match self.subscription_tier {
            SubscriptionTier::Premium | SubscriptionTier::Enterprise => {
                self.kyc_status == KycStatus::Approved
            }
            SubscriptionTier::Free => true,
        }
    }

    pub fn is_locked(&self) -> bool {
        self.account_status == AccountStatus::Locked
            && self.locked_until.map(|t| t > Utc::now()).unwrap_or(false)
    }
}

/// Tenant entity — unchanged in shape from the teacher, still the
/// multi-tenancy anchor every repository method scopes by.
#[derive(Debug, Clone, FromRow)]
pub struct Tenant {
    pub tenant_id: Uuid,
    pub name: String,
    pub slug: String,
    pub plan: String,
    pub plan_expires_at: Option<DateTime<Utc>>,
    pub settings: sqlx::types::Json<serde_json::Value>,
    pub status: String,
    pub owner_user_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub deleted_at: Option<DateTime<Utc>>,
}

/// Session entity (spec.md §3 "Session"). `session_id` is an unguessable
/// 128-bit value (UUIDv4); `location` is derived at creation time from the
/// IP via the geo-IP adapter and never re-derived afterwards.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct Session {
    pub session_id: Uuid,
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub device_fingerprint: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub location: String,
    pub created_at: DateTime<Utc>,
    pub last_activity: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub active: bool,
}

impl Session {
    pub fn is_live(&self, now: DateTime<Utc>) -> bool {
        self.active && self.expires_at > now
    }
}

/// MFA configuration (spec.md §3 "MFA configuration"). `secret_key` is the
/// C5-encrypted TOTP secret; `backup_codes` stores bcrypt hashes, never the
/// plaintext codes handed to the user at enrollment time.
#[derive(Debug, Clone, FromRow)]
pub struct MfaConfig {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub mfa_type: String,
    pub secret_key_encrypted: String,
    pub backup_code_hashes: sqlx::types::Json<Vec<String>>,
    pub enabled: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl MfaConfig {
    pub fn backup_codes_remaining(&self) -> usize {
        self.backup_code_hashes.0.len()
    }

    /// Used by the in-memory replay guard, not by persistence.
    pub fn verified_step_key(user_id: Uuid, step: i64) -> String {
        format!("mfa_replay:{}:{}", user_id, step)
    }
}

/// Event types the audit log records. Kept as a closed enum rather than a
/// free string, matching the risk-scoring strategy's need to pattern-match
/// on them exhaustively (spec.md §4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuditEventType {
    LoginSuccess,
    LoginFailure,
    Logout,
    AccountLocked,
    AccountUnlocked,
    MfaVerificationFailed,
    MfaEnrolled,
    UserRegistration,
    PasswordReset,
    PasswordChange,
    EmailVerified,
    SessionTerminated,
    TokenRefreshed,
    TokenRevoked,
    MfaBackupCodesExhausted,
    AdminUserAccess,
}

impl std::fmt::Display for AuditEventType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            AuditEventType::LoginSuccess => "LOGIN_SUCCESS",
            AuditEventType::LoginFailure => "LOGIN_FAILURE",
            AuditEventType::Logout => "LOGOUT",
            AuditEventType::AccountLocked => "ACCOUNT_LOCKED",
            AuditEventType::AccountUnlocked => "ACCOUNT_UNLOCKED",
            AuditEventType::MfaVerificationFailed => "MFA_VERIFICATION_FAILED",
            AuditEventType::MfaEnrolled => "MFA_ENROLLED",
            AuditEventType::UserRegistration => "USER_REGISTRATION",
            AuditEventType::PasswordReset => "PASSWORD_RESET",
            AuditEventType::PasswordChange => "PASSWORD_CHANGE",
            AuditEventType::EmailVerified => "EMAIL_VERIFIED",
            AuditEventType::SessionTerminated => "SESSION_TERMINATED",
            AuditEventType::TokenRefreshed => "TOKEN_REFRESHED",
            AuditEventType::TokenRevoked => "TOKEN_REVOKED",
            AuditEventType::MfaBackupCodesExhausted => "MFA_BACKUP_CODES_EXHAUSTED",
            AuditEventType::AdminUserAccess => "ADMIN_USER_ACCESS",
        };
        write!(f, "{}", s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventStatus {
    Success,
    Failed,
    Blocked,
    Pending,
}

impl std::fmt::Display for EventStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EventStatus::Success => "SUCCESS",
            EventStatus::Failed => "FAILED",
            EventStatus::Blocked => "BLOCKED",
            EventStatus::Pending => "PENDING",
        };
        write!(f, "{}", s)
    }
}

/// Hash-chained audit record (spec.md §3 "Audit record" / §4.6). Never
/// mutated once persisted; `verify_chain` recomputes `integrity_hash` for
/// a range and compares.
#[derive(Debug, Clone, FromRow)]
pub struct AuditRecord {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub user_id: Option<Uuid>,
    pub event_type: String,
    pub event_status: String,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub device_fingerprint: Option<String>,
    pub details: sqlx::types::Json<serde_json::Value>,
    pub risk_score: i32,
    pub session_id: Option<Uuid>,
    pub correlation_id: Option<Uuid>,
    pub created_at: DateTime<Utc>,
    pub previous_hash: String,
    pub integrity_hash: String,
}

/// The fixed previous-hash value for the first record in a tenant's chain.
pub const AUDIT_GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

/// A new audit event, not yet assigned `previous_hash`/`integrity_hash` —
/// those are computed by the audit log service at append time.
#[derive(Debug, Clone)]
pub struct NewAuditEvent {
    pub tenant_id: Uuid,
    pub user_id: Option<Uuid>,
    pub event_type: AuditEventType,
    pub event_status: EventStatus,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub device_fingerprint: Option<String>,
    pub details: serde_json::Value,
    pub session_id: Option<Uuid>,
    pub correlation_id: Option<Uuid>,
}

/// Verification token kind (spec.md §3 "Verification token"). Kept as one
/// table/type with a discriminant rather than two separate entities, since
/// every operation (invalidate-prior, validity check) is identical across
/// both kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "snake_case")]
pub enum VerificationTokenType {
    EmailVerification,
    PasswordReset,
}

#[derive(Debug, Clone, FromRow)]
pub struct VerificationToken {
    pub token_id: Uuid,
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub token_hash: String,
    pub token_type: VerificationTokenType,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl VerificationToken {
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.used_at.is_none() && self.expires_at > now
    }
}

/// In-memory-only plaintext half of a data key, paired with its persisted
/// ciphertext (spec.md §3 "Data key"). `plaintext` must never derive
/// `Debug`/`Display` with the real bytes visible — see its custom impl.
pub struct CachedDataKey {
    pub kms_key_id: String,
    pub plaintext: shared_crypto::DataKey,
    pub ciphertext_material: String,
    pub created_at: DateTime<Utc>,
}

impl CachedDataKey {
    pub fn is_expired(&self, ttl: chrono::Duration, now: DateTime<Utc>) -> bool {
        now - self.created_at > ttl
    }
}

impl std::fmt::Debug for CachedDataKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CachedDataKey")
            .field("kms_key_id", &self.kms_key_id)
            .field("plaintext", &"<redacted>")
            .field("created_at", &self.created_at)
            .finish()
    }
}

/// A generated backup-code set handed to the user once at enrollment time —
/// only the hashes are persisted (`MfaConfig::backup_code_hashes`).
pub struct GeneratedBackupCodes {
    pub plaintext_codes: Vec<String>,
    pub hashes: HashSet<String>,
}
