//! Password management (C13, spec.md §4.10): initiate-reset, reset, and
//! change. All three terminate every active session and revoke outstanding
//! refresh tokens for the affected user.

use std::sync::Arc;

use shared_breaker::BreakerRegistry;
use shared_error::AppError;
use uuid::Uuid;

use super::audit_log_service::AuditLogService;
use super::http_context::HttpContext;
use super::model::{AuditEventType, EventStatus, NewAuditEvent, VerificationTokenType};
use super::repository::{RevocationStore, UserRepository};
use super::session_manager::SessionManager;
use super::token_service::TokenService;
use super::verification_token_repository::{EmailSender, VerificationTokenRepository};

pub struct PasswordManager<U: UserRepository, V: VerificationTokenRepository, E: EmailSender, S: SessionManager, R: RevocationStore, A: AuditLogService> {
    users: Arc<U>,
    tokens: Arc<V>,
    email: Arc<E>,
    sessions: Arc<S>,
    revocation: Arc<R>,
    audit: Arc<A>,
    breakers: Arc<BreakerRegistry>,
    reset_token_ttl_hours: i64,
}

impl<U: UserRepository, V: VerificationTokenRepository, E: EmailSender, S: SessionManager, R: RevocationStore, A: AuditLogService>
    PasswordManager<U, V, E, S, R, A>
{
    pub fn new(
        users: Arc<U>,
        tokens: Arc<V>,
        email: Arc<E>,
        sessions: Arc<S>,
        revocation: Arc<R>,
        audit: Arc<A>,
        breakers: Arc<BreakerRegistry>,
        reset_token_ttl_hours: i64,
    ) -> Self {
        Self { users, tokens, email, sessions, revocation, audit, breakers, reset_token_ttl_hours }
    }

    /// `POST /auth/password/reset/initiate` (spec.md §6). Response to the
    /// client is identical whether the email exists or not — this returns
    /// `Ok(())` unconditionally and only logs internally on a lookup miss.
    pub async fn initiate_reset(&self, email: &str, tenant_id: Uuid, ctx: &HttpContext) -> Result<(), AppError> {
        let canonical = email.trim().to_lowercase();
        let Some(user) = self.users.find_by_email(&canonical, tenant_id).await? else {
            tracing::debug!("password reset requested for unknown email");
            return Ok(());
        };

        self.tokens
            .invalidate_all_for_user(user.user_id, user.tenant_id, VerificationTokenType::PasswordReset)
            .await?;

        let plaintext_token = shared_crypto::random_token(32);
        let token_hash = shared_crypto::sha256_hex(plaintext_token.as_bytes());
        let now = chrono::Utc::now();
        let token = super::model::VerificationToken {
            token_id: Uuid::new_v4(),
            user_id: user.user_id,
            tenant_id: user.tenant_id,
            token_hash,
            token_type: VerificationTokenType::PasswordReset,
            expires_at: now + chrono::Duration::hours(self.reset_token_ttl_hours),
            used_at: None,
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone(),
            created_at: now,
        };
        self.tokens.create(&token).await?;

        let email_sender = self.email.clone();
        let to = user.email.clone();
        let plaintext_for_send = plaintext_token.clone();
        let _ = self
            .breakers
            .execute(shared_breaker::EMAIL, || async move {
                email_sender.send_password_reset_email(&to, &plaintext_for_send).await
            })
            .await;

        self.audit_password_event(user.user_id, user.tenant_id, AuditEventType::PasswordReset, EventStatus::Pending, ctx)
            .await;

        Ok(())
    }

    /// `POST /auth/password/reset/complete` (spec.md §6).
    pub async fn reset(&self, plaintext_token: &str, new_password: &str, ctx: &HttpContext) -> Result<(), AppError> {
        let token_hash = shared_crypto::sha256_hex(plaintext_token.as_bytes());
        let Some(token) = self.tokens.find_by_token_hash(&token_hash).await? else {
            self.audit_password_event(Uuid::nil(), Uuid::nil(), AuditEventType::PasswordReset, EventStatus::Failed, ctx)
                .await;
            return Err(AppError::NotFound("reset token not found".into()));
        };

        if token.token_type != VerificationTokenType::PasswordReset || !token.is_valid(chrono::Utc::now()) {
            self.audit_password_event(token.user_id, token.tenant_id, AuditEventType::PasswordReset, EventStatus::Failed, ctx)
                .await;
            return Err(AppError::ValidationError("token expired or already used".into()));
        }
        if new_password.len() < 8 {
            self.audit_password_event(token.user_id, token.tenant_id, AuditEventType::PasswordReset, EventStatus::Failed, ctx)
                .await;
            return Err(AppError::ValidationError("password must be at least 8 characters".into()));
        }

        self.apply_new_password(token.user_id, token.tenant_id, new_password).await?;
        self.tokens.mark_used(token.token_id).await?;

        self.audit_password_event(token.user_id, token.tenant_id, AuditEventType::PasswordReset, EventStatus::Success, ctx)
            .await;

        Ok(())
    }

    /// `POST /auth/password/change` (spec.md §6). Authenticated — requires
    /// proof of the current password rather than a mailed token.
    pub async fn change(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
        current_password: &str,
        new_password: &str,
        ctx: &HttpContext,
    ) -> Result<(), AppError> {
        let Some(user) = self.users.find_by_id(user_id, tenant_id).await? else {
            self.audit_password_event(user_id, tenant_id, AuditEventType::PasswordChange, EventStatus::Failed, ctx)
                .await;
            return Err(AppError::NotFound("user not found".into()));
        };

        let verified = user
            .password_hash
            .as_deref()
            .map(|hash| bcrypt::verify(current_password, hash).unwrap_or(false))
            .unwrap_or(false);
        if !verified {
            self.audit_password_event(user_id, tenant_id, AuditEventType::PasswordChange, EventStatus::Failed, ctx)
                .await;
            return Err(AppError::BadCredentials);
        }
        if new_password.len() < 8 {
            self.audit_password_event(user_id, tenant_id, AuditEventType::PasswordChange, EventStatus::Failed, ctx)
                .await;
            return Err(AppError::ValidationError("password must be at least 8 characters".into()));
        }

        self.apply_new_password(user_id, tenant_id, new_password).await?;

        self.audit_password_event(user_id, tenant_id, AuditEventType::PasswordChange, EventStatus::Success, ctx)
            .await;

        Ok(())
    }

    async fn apply_new_password(&self, user_id: Uuid, tenant_id: Uuid, new_password: &str) -> Result<(), AppError> {
        let hash = bcrypt::hash(new_password, bcrypt::DEFAULT_COST)
            .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))?;
        self.users.set_password_hash(user_id, tenant_id, &hash).await?;

        // spec.md §4.10: all three operations invalidate every active
        // session and revoke outstanding refresh tokens for the user. The
        // latter is implemented as a token-floor bump (see
        // `RevocationStore::set_user_token_floor`) rather than enumerating
        // individual jtis.
        self.sessions.terminate_all_for_user(user_id).await?;
        self.revocation
            .set_user_token_floor(user_id, chrono::Utc::now().timestamp() + 1)
            .await?;

        Ok(())
    }

    async fn audit_password_event(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
        event_type: AuditEventType,
        status: EventStatus,
        ctx: &HttpContext,
    ) {
        let _ = self
            .audit
            .append(NewAuditEvent {
                tenant_id,
                user_id: Some(user_id),
                event_type,
                event_status: status,
                ip_address: ctx.ip_address.clone(),
                user_agent: ctx.user_agent.clone(),
                device_fingerprint: Some(ctx.device_fingerprint.clone()),
                details: serde_json::json!({}),
                session_id: None,
                correlation_id: Some(ctx.correlation_id),
            })
            .await;
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicU64, Ordering};

    use tokio::sync::Mutex as AsyncMutex;
    use uuid::Uuid;

    use super::super::model::{AccountStatus, KycStatus, Session, SubscriptionTier, User, VerificationToken};
    use super::*;

    fn ctx() -> HttpContext {
        HttpContext {
            ip_address: Some("127.0.0.1".to_string()),
            user_agent: Some("test-agent".to_string()),
            device_fingerprint: "fp-1".to_string(),
            correlation_id: Uuid::new_v4(),
        }
    }

    fn user(tenant_id: Uuid, password_hash: &str) -> User {
        let now = chrono::Utc::now();
        User {
            user_id: Uuid::new_v4(),
            tenant_id,
            email: "trader@example.com".to_string(),
            password_hash: Some(password_hash.to_string()),
            account_status: AccountStatus::Active,
            kyc_status: KycStatus::Approved,
            subscription_tier: SubscriptionTier::Free,
            email_verified: true,
            phone_verified: false,
            full_name: Some("Jane Trader".to_string()),
            phone: None,
            role: "user".to_string(),
            failed_login_attempts: 0,
            locked_until: None,
            password_changed_at: None,
            last_login_at: None,
            last_login_ip: None,
            last_device_fingerprint: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    #[derive(Default)]
    struct InMemoryUserRepository {
        users: AsyncMutex<HashMap<Uuid, User>>,
    }

    impl InMemoryUserRepository {
        fn seeded(user: User) -> Self {
            let mut map = HashMap::new();
            map.insert(user.user_id, user);
            Self { users: AsyncMutex::new(map) }
        }
    }

    #[async_trait::async_trait]
    impl UserRepository for InMemoryUserRepository {
        async fn find_by_email(&self, email: &str, tenant_id: Uuid) -> Result<Option<User>, AppError> {
            Ok(self.users.lock().await.values().find(|u| u.email == email && u.tenant_id == tenant_id).cloned())
        }

        async fn find_by_id(&self, id: Uuid, tenant_id: Uuid) -> Result<Option<User>, AppError> {
            Ok(self.users.lock().await.get(&id).filter(|u| u.tenant_id == tenant_id).cloned())
        }

        async fn create(&self, user: &User) -> Result<User, AppError> {
            self.users.lock().await.insert(user.user_id, user.clone());
            Ok(user.clone())
        }

        async fn update(&self, user: &User) -> Result<User, AppError> {
            self.users.lock().await.insert(user.user_id, user.clone());
            Ok(user.clone())
        }

        async fn list(&self, tenant_id: Uuid, _page: i32, _page_size: i32) -> Result<(Vec<User>, i64), AppError> {
            let users: Vec<User> = self.users.lock().await.values().filter(|u| u.tenant_id == tenant_id).cloned().collect();
            let total = users.len() as i64;
            Ok((users, total))
        }

        async fn email_exists(&self, email: &str, tenant_id: Uuid) -> Result<bool, AppError> {
            Ok(self.users.lock().await.values().any(|u| u.email == email && u.tenant_id == tenant_id))
        }

        async fn increment_failed_attempts(&self, _user_id: Uuid, _tenant_id: Uuid) -> Result<i32, AppError> {
            Ok(0)
        }

        async fn reset_failed_attempts(&self, _user_id: Uuid, _tenant_id: Uuid) -> Result<(), AppError> {
            Ok(())
        }

        async fn lock_account(&self, _user_id: Uuid, _tenant_id: Uuid, _locked_until: chrono::DateTime<Utc>) -> Result<(), AppError> {
            Ok(())
        }

        async fn unlock_account(&self, _user_id: Uuid, _tenant_id: Uuid) -> Result<(), AppError> {
            Ok(())
        }

        async fn record_login(
            &self,
            _user_id: Uuid,
            _tenant_id: Uuid,
            _ip_address: Option<&str>,
            _device_fingerprint: Option<&str>,
        ) -> Result<(), AppError> {
            Ok(())
        }

        async fn set_password_hash(&self, user_id: Uuid, tenant_id: Uuid, password_hash: &str) -> Result<(), AppError> {
            if let Some(u) = self.users.lock().await.get_mut(&user_id).filter(|u| u.tenant_id == tenant_id) {
                u.password_hash = Some(password_hash.to_string());
            }
            Ok(())
        }

        async fn mark_email_verified(&self, _user_id: Uuid, _tenant_id: Uuid) -> Result<(), AppError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct InMemoryVerificationTokenRepository {
        tokens: AsyncMutex<HashMap<Uuid, VerificationToken>>,
    }

    #[async_trait::async_trait]
    impl VerificationTokenRepository for InMemoryVerificationTokenRepository {
        async fn create(&self, token: &VerificationToken) -> Result<VerificationToken, AppError> {
            self.tokens.lock().await.insert(token.token_id, token.clone());
            Ok(token.clone())
        }

        async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<VerificationToken>, AppError> {
            Ok(self.tokens.lock().await.values().find(|t| t.token_hash == token_hash).cloned())
        }

        async fn invalidate_all_for_user(
            &self,
            user_id: Uuid,
            tenant_id: Uuid,
            token_type: VerificationTokenType,
        ) -> Result<(), AppError> {
            for t in self.tokens.lock().await.values_mut() {
                if t.user_id == user_id && t.tenant_id == tenant_id && t.token_type == token_type {
                    t.used_at = Some(chrono::Utc::now());
                }
            }
            Ok(())
        }

        async fn mark_used(&self, token_id: Uuid) -> Result<(), AppError> {
            if let Some(t) = self.tokens.lock().await.get_mut(&token_id) {
                t.used_at = Some(chrono::Utc::now());
            }
            Ok(())
        }

        async fn delete_expired(&self) -> Result<u64, AppError> {
            Ok(0)
        }
    }

    #[derive(Default)]
    struct NullEmailSender;

    #[async_trait::async_trait]
    impl EmailSender for NullEmailSender {
        async fn send_verification_email(&self, _to: &str, _token_plaintext: &str) -> Result<(), AppError> {
            Ok(())
        }

        async fn send_password_reset_email(&self, _to: &str, _token_plaintext: &str) -> Result<(), AppError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct TrackingSessionManager {
        terminate_all_calls: AsyncMutex<Vec<Uuid>>,
    }

    #[async_trait::async_trait]
    impl SessionManager for TrackingSessionManager {
        async fn create(&self, user_id: Uuid, tenant_id: Uuid, _ctx: &HttpContext) -> Result<Session, AppError> {
            let now = chrono::Utc::now();
            Ok(Session {
                session_id: Uuid::new_v4(),
                user_id,
                tenant_id,
                device_fingerprint: "fp-1".to_string(),
                ip_address: None,
                user_agent: None,
                location: "Unknown".to_string(),
                created_at: now,
                last_activity: now,
                expires_at: now + chrono::Duration::minutes(30),
                active: true,
            })
        }

        async fn get(&self, _session_id: Uuid) -> Result<Option<Session>, AppError> {
            Ok(None)
        }

        async fn touch(&self, _session_id: Uuid, _ip_address: Option<&str>) -> Result<(), AppError> {
            Ok(())
        }

        async fn terminate(&self, _session_id: Uuid) -> Result<(), AppError> {
            Ok(())
        }

        async fn terminate_all_for_user(&self, user_id: Uuid) -> Result<u64, AppError> {
            self.terminate_all_calls.lock().await.push(user_id);
            Ok(1)
        }

        async fn cleanup_expired(&self) -> Result<u64, AppError> {
            Ok(0)
        }
    }

    #[derive(Default)]
    struct TrackingRevocationStore {
        floors: AsyncMutex<HashMap<Uuid, i64>>,
    }

    #[async_trait::async_trait]
    impl RevocationStore for TrackingRevocationStore {
        async fn revoke(&self, _jti: &str, _ttl: std::time::Duration) -> Result<bool, AppError> {
            Ok(true)
        }

        async fn is_revoked(&self, _jti: &str) -> Result<bool, AppError> {
            Ok(false)
        }

        async fn set_user_token_floor(&self, user_id: Uuid, floor_iat: i64) -> Result<(), AppError> {
            self.floors.lock().await.insert(user_id, floor_iat);
            Ok(())
        }

        async fn user_token_floor(&self, user_id: Uuid) -> Result<Option<i64>, AppError> {
            Ok(self.floors.lock().await.get(&user_id).copied())
        }
    }

    #[derive(Default)]
    struct InMemoryAuditLog {
        appended: AtomicU64,
    }

    #[async_trait::async_trait]
    impl super::super::audit_log_service::AuditLogService for InMemoryAuditLog {
        async fn append(&self, event: NewAuditEvent) -> Result<super::super::model::AuditRecord, AppError> {
            self.appended.fetch_add(1, Ordering::SeqCst);
            Ok(super::super::model::AuditRecord {
                id: Uuid::new_v4(),
                tenant_id: event.tenant_id,
                user_id: event.user_id,
                event_type: event.event_type.to_string(),
                event_status: format!("{:?}", event.event_status),
                ip_address: event.ip_address,
                user_agent: event.user_agent,
                device_fingerprint: event.device_fingerprint,
                details: sqlx::types::Json(event.details),
                risk_score: 0,
                session_id: event.session_id,
                correlation_id: event.correlation_id,
                created_at: chrono::Utc::now(),
                previous_hash: super::super::model::AUDIT_GENESIS_HASH.to_string(),
                integrity_hash: "test-hash".to_string(),
            })
        }

        async fn verify_chain(
            &self,
            _tenant_id: Uuid,
            _from: chrono::DateTime<Utc>,
            _to: chrono::DateTime<Utc>,
        ) -> Result<Option<Uuid>, AppError> {
            Ok(None)
        }
    }

    type TestManager = PasswordManager<
        InMemoryUserRepository,
        InMemoryVerificationTokenRepository,
        NullEmailSender,
        TrackingSessionManager,
        TrackingRevocationStore,
        InMemoryAuditLog,
    >;

    struct Harness {
        manager: TestManager,
        tokens: Arc<InMemoryVerificationTokenRepository>,
        sessions: Arc<TrackingSessionManager>,
        revocation: Arc<TrackingRevocationStore>,
    }

    fn harness(seed_user: User) -> Harness {
        let users = Arc::new(InMemoryUserRepository::seeded(seed_user));
        let tokens = Arc::new(InMemoryVerificationTokenRepository::default());
        let email = Arc::new(NullEmailSender);
        let sessions = Arc::new(TrackingSessionManager::default());
        let revocation = Arc::new(TrackingRevocationStore::default());
        let audit = Arc::new(InMemoryAuditLog::default());
        let breakers = Arc::new(shared_breaker::BreakerRegistry::new(shared_breaker::BreakerConfig::builder().build()));
        let manager = PasswordManager::new(
            users, tokens.clone(), email, sessions.clone(), revocation.clone(), audit, breakers, 1,
        );
        Harness { manager, tokens, sessions, revocation }
    }

    #[tokio::test]
    async fn initiate_reset_is_silent_for_unknown_email() {
        let tenant_id = Uuid::new_v4();
        let h = harness(user(tenant_id, "irrelevant"));

        let result = h.manager.initiate_reset("nobody@example.com", tenant_id, &ctx()).await;
        assert!(result.is_ok());
        assert!(h.tokens.tokens.lock().await.is_empty());
    }

    #[tokio::test]
    async fn initiate_reset_issues_a_token_for_known_email() {
        let tenant_id = Uuid::new_v4();
        let seed = user(tenant_id, "irrelevant");
        let h = harness(seed.clone());

        h.manager.initiate_reset(&seed.email, tenant_id, &ctx()).await.expect("initiate succeeds");
        assert_eq!(h.tokens.tokens.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn reset_rejects_unknown_token() {
        let tenant_id = Uuid::new_v4();
        let h = harness(user(tenant_id, "irrelevant"));

        let err = h.manager.reset("does-not-exist", "new-password-1", &ctx()).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn reset_applies_new_password_and_revokes_sessions() {
        let tenant_id = Uuid::new_v4();
        let seed = user(tenant_id, "irrelevant");
        let user_id = seed.user_id;
        let h = harness(seed);

        let direct_token = VerificationToken {
            token_id: Uuid::new_v4(),
            user_id,
            tenant_id,
            token_hash: shared_crypto::sha256_hex(b"known-plaintext"),
            token_type: VerificationTokenType::PasswordReset,
            expires_at: chrono::Utc::now() + chrono::Duration::hours(1),
            used_at: None,
            ip_address: None,
            user_agent: None,
            created_at: chrono::Utc::now(),
        };
        h.tokens.create(&direct_token).await.expect("seed token");

        h.manager.reset("known-plaintext", "brand-new-password", &ctx()).await.expect("reset succeeds");

        assert_eq!(h.sessions.terminate_all_calls.lock().await.as_slice(), &[user_id]);
        assert!(h.revocation.floors.lock().await.contains_key(&user_id));
    }

    #[tokio::test]
    async fn reset_rejects_short_password() {
        let tenant_id = Uuid::new_v4();
        let seed = user(tenant_id, "irrelevant");
        let user_id = seed.user_id;
        let h = harness(seed);

        let direct_token = VerificationToken {
            token_id: Uuid::new_v4(),
            user_id,
            tenant_id,
            token_hash: shared_crypto::sha256_hex(b"known-plaintext"),
            token_type: VerificationTokenType::PasswordReset,
            expires_at: chrono::Utc::now() + chrono::Duration::hours(1),
            used_at: None,
            ip_address: None,
            user_agent: None,
            created_at: chrono::Utc::now(),
        };
        h.tokens.create(&direct_token).await.expect("seed token");

        let err = h.manager.reset("known-plaintext", "short", &ctx()).await.unwrap_err();
        assert!(matches!(err, AppError::ValidationError(_)));
    }

    #[tokio::test]
    async fn change_rejects_wrong_current_password() {
        let tenant_id = Uuid::new_v4();
        let seed = user(tenant_id, &bcrypt::hash("correct-horse", 4).expect("hash"));
        let user_id = seed.user_id;
        let h = harness(seed);

        let err = h
            .manager
            .change(user_id, tenant_id, "wrong-current", "brand-new-password", &ctx())
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadCredentials));
    }

    #[tokio::test]
    async fn change_succeeds_and_revokes_sessions() {
        let tenant_id = Uuid::new_v4();
        let seed = user(tenant_id, &bcrypt::hash("correct-horse", 4).expect("hash"));
        let user_id = seed.user_id;
        let h = harness(seed);

        h.manager
            .change(user_id, tenant_id, "correct-horse", "brand-new-password", &ctx())
            .await
            .expect("change succeeds");

        assert_eq!(h.sessions.terminate_all_calls.lock().await.as_slice(), &[user_id]);
        assert!(h.revocation.floors.lock().await.contains_key(&user_id));
    }
}
