//! Auth service (C14 continued): the concrete orchestrator the API layer
//! calls. Wires the strategy registry (C11), registration pipeline (C12),
//! password manager (C13), token service (C6), and session manager (C9)
//! behind the shapes `api` already speaks (spec.md §6 DTOs).

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use shared_error::AppError;
use shared_jwt::TokenKind;

use crate::domains::auth::dto::auth_dto::{
    AuthResp, LoginReq, RefreshReq, RegisterReq, UserInfo, UserListResp,
};

use super::audit_log_service::AuditLogService;
use super::http_context::HttpContext;
use super::model::{AuditEventType, EventStatus, NewAuditEvent, User};
use super::password_management::PasswordManager;
use super::registration::{RegisterInput, RegistrationPipeline};
use super::repository::{RevocationStore, UserRepository};
use super::session_manager::SessionManager;
use super::strategies::{LoginRequest, StrategyRegistry};
use super::token_service::TokenService;
use super::verification_token_repository::{EmailSender, VerificationTokenRepository};

/// Business-logic surface `api`'s handlers call. Every privileged operation
/// additionally carries an `HttpContext` so the implementation can create
/// sessions, audit, and compute device fingerprints without depending on
/// axum types.
#[async_trait]
pub trait AuthService: Send + Sync {
    async fn register(&self, tenant_id: Uuid, req: RegisterReq, ctx: &HttpContext) -> Result<AuthResp, AppError>;
    async fn login(&self, tenant_id: Uuid, req: LoginReq, ctx: &HttpContext) -> Result<AuthResp, AppError>;
    async fn refresh_token(&self, req: RefreshReq, ctx: &HttpContext) -> Result<AuthResp, AppError>;
    async fn logout(&self, access_token: &str, refresh_token: Option<&str>, ctx: &HttpContext) -> Result<(), AppError>;
    async fn list_users(&self, tenant_id: Uuid, page: i32, page_size: i32) -> Result<UserListResp, AppError>;
    async fn get_user(&self, user_id: Uuid, tenant_id: Uuid) -> Result<UserInfo, AppError>;
}

fn user_info_from(user: &User) -> UserInfo {
    let (first_name, last_name) = match &user.full_name {
        Some(name) => match name.split_once(' ') {
            Some((first, rest)) => (first.to_string(), rest.to_string()),
            None => (name.clone(), String::new()),
        },
        None => (String::new(), String::new()),
    };
    UserInfo {
        id: user.user_id,
        email: user.email.clone(),
        first_name,
        last_name,
        tenant_id: user.tenant_id,
        role: user.role.clone(),
        status: user.account_status.to_string().to_lowercase(),
        email_verified: user.email_verified,
        created_at: user.created_at,
    }
}

pub struct AuthServiceImpl<
    U: UserRepository,
    V: VerificationTokenRepository,
    E: EmailSender,
    S: SessionManager,
    R: RevocationStore,
    A: AuditLogService,
    T: TokenService,
> {
    registry: Arc<StrategyRegistry>,
    registration: Arc<RegistrationPipeline<U, V, E, A>>,
    password_manager: Arc<PasswordManager<U, V, E, S, R, A>>,
    users: Arc<U>,
    tokens: Arc<T>,
    sessions: Arc<S>,
    audit: Arc<A>,
}

impl<
        U: UserRepository,
        V: VerificationTokenRepository,
        E: EmailSender,
        S: SessionManager,
        R: RevocationStore,
        A: AuditLogService,
        T: TokenService,
    > AuthServiceImpl<U, V, E, S, R, A, T>
{
    pub fn new(
        registry: Arc<StrategyRegistry>,
        registration: Arc<RegistrationPipeline<U, V, E, A>>,
        password_manager: Arc<PasswordManager<U, V, E, S, R, A>>,
        users: Arc<U>,
        tokens: Arc<T>,
        sessions: Arc<S>,
        audit: Arc<A>,
    ) -> Self {
        Self { registry, registration, password_manager, users, tokens, sessions, audit }
    }

    /// Password reset/change are not part of the `AuthService` surface
    /// (they authenticate differently — a mailed token or the current
    /// password rather than a bearer token) but are wired from the same
    /// composition root, so `api` reaches them through this accessor.
    pub fn password_manager(&self) -> &Arc<PasswordManager<U, V, E, S, R, A>> {
        &self.password_manager
    }

    /// `api`'s auth middleware needs `validate` directly to turn a bearer
    /// token into `Claims` ahead of calling any operation below — exposed
    /// for the same reason as `password_manager` above.
    pub fn tokens(&self) -> &Arc<T> {
        &self.tokens
    }

    /// Registration's email-verification link (`GET /auth/verify/email/{token}`)
    /// is served by the same pipeline `register` uses internally.
    pub fn registration(&self) -> &Arc<RegistrationPipeline<U, V, E, A>> {
        &self.registration
    }

    async fn audit_generic(&self, tenant_id: Uuid, user_id: Option<Uuid>, event_type: AuditEventType, status: EventStatus, ctx: &HttpContext) {
        let _ = self
            .audit
            .append(NewAuditEvent {
                tenant_id,
                user_id,
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

#[async_trait]
impl<
        U: UserRepository,
        V: VerificationTokenRepository,
        E: EmailSender,
        S: SessionManager,
        R: RevocationStore,
        A: AuditLogService,
        T: TokenService,
    > AuthService for AuthServiceImpl<U, V, E, S, R, A, T>
{
    async fn register(&self, tenant_id: Uuid, req: RegisterReq, ctx: &HttpContext) -> Result<AuthResp, AppError> {
        let input = RegisterInput {
            tenant_id,
            email: req.email,
            password: req.password,
            first_name: req.first_name,
            last_name: req.last_name,
            phone_number: req.phone_number,
        };
        let outcome = self.registration.register(input, ctx).await?;

        let pair = self
            .tokens
            .issue(outcome.user.user_id, outcome.user.tenant_id, &outcome.user.role, &ctx.device_fingerprint)
            .await?;
        self.sessions.create(outcome.user.user_id, outcome.user.tenant_id, ctx).await?;

        Ok(AuthResp {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: pair.expires_in,
            user: user_info_from(&outcome.user),
            device_fingerprint: ctx.device_fingerprint.clone(),
            requires_mfa: None,
        })
    }

    async fn login(&self, tenant_id: Uuid, req: LoginReq, ctx: &HttpContext) -> Result<AuthResp, AppError> {
        let login_request = LoginRequest {
            tenant_id,
            email: req.email,
            password: req.password,
            mfa_code: req.mfa_code,
            social_provider: req.social_provider,
            social_token: req.social_token,
            service_api_key: None,
        };

        let Some(strategy) = self.registry.select(&login_request) else {
            self.audit_generic(tenant_id, None, AuditEventType::LoginFailure, EventStatus::Failed, ctx).await;
            return Err(AppError::BadCredentials);
        };

        let response = strategy.execute(&login_request, ctx).await?;

        Ok(AuthResp {
            access_token: response.access_token,
            refresh_token: response.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: response.expires_in,
            user: response.user.as_ref().map(user_info_from).unwrap_or(UserInfo {
                id: Uuid::nil(),
                email: String::new(),
                first_name: String::new(),
                last_name: String::new(),
                tenant_id,
                role: String::new(),
                status: "active".to_string(),
                email_verified: false,
                created_at: chrono::Utc::now(),
            }),
            device_fingerprint: ctx.device_fingerprint.clone(),
            requires_mfa: if response.requires_mfa { Some(true) } else { None },
        })
    }

    async fn refresh_token(&self, req: RefreshReq, ctx: &HttpContext) -> Result<AuthResp, AppError> {
        let pair = match self.tokens.refresh(&req.refresh_token, &ctx.device_fingerprint).await {
            Ok(pair) => pair,
            Err(err) => {
                self.audit_generic(Uuid::nil(), None, AuditEventType::TokenRefreshed, EventStatus::Failed, ctx).await;
                return Err(err);
            }
        };
        let claims = match self.tokens.validate(&pair.access_token, TokenKind::Access).await {
            Ok(claims) => claims,
            Err(err) => {
                self.audit_generic(Uuid::nil(), None, AuditEventType::TokenRefreshed, EventStatus::Failed, ctx).await;
                return Err(err);
            }
        };

        let user = match self.users.find_by_id(claims.sub, claims.tenant_id).await {
            Ok(Some(user)) => user,
            Ok(None) => {
                self.audit_generic(claims.tenant_id, Some(claims.sub), AuditEventType::TokenRefreshed, EventStatus::Failed, ctx)
                    .await;
                return Err(AppError::NotFound("user not found".into()));
            }
            Err(err) => {
                self.audit_generic(claims.tenant_id, Some(claims.sub), AuditEventType::TokenRefreshed, EventStatus::Failed, ctx)
                    .await;
                return Err(err);
            }
        };

        self.audit_generic(claims.tenant_id, Some(claims.sub), AuditEventType::TokenRefreshed, EventStatus::Success, ctx)
            .await;

        Ok(AuthResp {
            access_token: pair.access_token,
            refresh_token: pair.refresh_token,
            token_type: "Bearer".to_string(),
            expires_in: pair.expires_in,
            user: user_info_from(&user),
            device_fingerprint: ctx.device_fingerprint.clone(),
            requires_mfa: None,
        })
    }

    async fn logout(&self, access_token: &str, refresh_token: Option<&str>, ctx: &HttpContext) -> Result<(), AppError> {
        let claims = match self.tokens.validate(access_token, TokenKind::Access).await {
            Ok(claims) => claims,
            Err(err) => {
                self.audit_generic(Uuid::nil(), None, AuditEventType::Logout, EventStatus::Failed, ctx).await;
                return Err(err);
            }
        };
        if let Err(err) = self.tokens.revoke(access_token).await {
            self.audit_generic(claims.tenant_id, Some(claims.sub), AuditEventType::Logout, EventStatus::Failed, ctx)
                .await;
            return Err(err);
        }
        if let Some(refresh_token) = refresh_token {
            // A malformed/absent refresh token must not fail the logout
            // itself — the access token is already revoked either way.
            let _ = self.tokens.revoke(refresh_token).await;
        }

        self.audit_generic(claims.tenant_id, Some(claims.sub), AuditEventType::Logout, EventStatus::Success, ctx)
            .await;

        Ok(())
    }

    async fn list_users(&self, tenant_id: Uuid, page: i32, page_size: i32) -> Result<UserListResp, AppError> {
        let (users, total) = self.users.list(tenant_id, page, page_size).await?;
        Ok(UserListResp {
            users: users.iter().map(user_info_from).collect(),
            total,
            page,
            page_size,
        })
    }

    async fn get_user(&self, user_id: Uuid, tenant_id: Uuid) -> Result<UserInfo, AppError> {
        let user = self
            .users
            .find_by_id(user_id, tenant_id)
            .await?
            .ok_or_else(|| AppError::NotFound("user not found".into()))?;
        Ok(user_info_from(&user))
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use tokio::sync::Mutex as AsyncMutex;

    use super::super::model::{AccountStatus, KycStatus, Session, SubscriptionTier, VerificationToken, VerificationTokenType};
    use super::super::token_service::TokenPair;
    use super::*;

    fn ctx() -> HttpContext {
        HttpContext {
            ip_address: Some("127.0.0.1".to_string()),
            user_agent: Some("test-agent".to_string()),
            device_fingerprint: "fp-1".to_string(),
            correlation_id: Uuid::new_v4(),
        }
    }

    fn seed_user(tenant_id: Uuid) -> User {
        let now = chrono::Utc::now();
        User {
            user_id: Uuid::new_v4(),
            tenant_id,
            email: "trader@example.com".to_string(),
            password_hash: Some("irrelevant".to_string()),
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

    #[async_trait]
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

        async fn list(&self, tenant_id: Uuid, page: i32, page_size: i32) -> Result<(Vec<User>, i64), AppError> {
            let users: Vec<User> = self.users.lock().await.values().filter(|u| u.tenant_id == tenant_id).cloned().collect();
            let total = users.len() as i64;
            let _ = (page, page_size);
            Ok((users, total))
        }

        async fn email_exists(&self, email: &str, tenant_id: Uuid) -> Result<bool, AppError> {
            Ok(self.users.lock().await.values().any(|u| u.email == email && u.tenant_id == tenant_id))
        }

        async fn increment_failed_attempts(&self, _user_id: Uuid, _tenant_id: Uuid) -> Result<i32, AppError> {
            Ok(1)
        }

        async fn reset_failed_attempts(&self, _user_id: Uuid, _tenant_id: Uuid) -> Result<(), AppError> {
            Ok(())
        }

        async fn lock_account(&self, _user_id: Uuid, _tenant_id: Uuid, _locked_until: chrono::DateTime<chrono::Utc>) -> Result<(), AppError> {
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

        async fn set_password_hash(&self, _user_id: Uuid, _tenant_id: Uuid, _password_hash: &str) -> Result<(), AppError> {
            Ok(())
        }

        async fn mark_email_verified(&self, user_id: Uuid, tenant_id: Uuid) -> Result<(), AppError> {
            if let Some(u) = self.users.lock().await.get_mut(&user_id).filter(|u| u.tenant_id == tenant_id) {
                u.email_verified = true;
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct InMemoryVerificationTokenRepository {
        tokens: AsyncMutex<HashMap<Uuid, VerificationToken>>,
    }

    #[async_trait]
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
            _user_id: Uuid,
            _tenant_id: Uuid,
            _token_type: VerificationTokenType,
        ) -> Result<(), AppError> {
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

    #[async_trait]
    impl EmailSender for NullEmailSender {
        async fn send_verification_email(&self, _to: &str, _token_plaintext: &str) -> Result<(), AppError> {
            Ok(())
        }

        async fn send_password_reset_email(&self, _to: &str, _token_plaintext: &str) -> Result<(), AppError> {
            Ok(())
        }
    }

    #[derive(Default)]
    struct InMemorySessionManager;

    #[async_trait]
    impl SessionManager for InMemorySessionManager {
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

        async fn terminate_all_for_user(&self, _user_id: Uuid) -> Result<u64, AppError> {
            Ok(0)
        }

        async fn cleanup_expired(&self) -> Result<u64, AppError> {
            Ok(0)
        }
    }

    #[derive(Default)]
    struct NullRevocationStore;

    #[async_trait]
    impl RevocationStore for NullRevocationStore {
        async fn revoke(&self, _jti: &str, _ttl: std::time::Duration) -> Result<bool, AppError> {
            Ok(true)
        }

        async fn is_revoked(&self, _jti: &str) -> Result<bool, AppError> {
            Ok(false)
        }

        async fn set_user_token_floor(&self, _user_id: Uuid, _floor_iat: i64) -> Result<(), AppError> {
            Ok(())
        }

        async fn user_token_floor(&self, _user_id: Uuid) -> Result<Option<i64>, AppError> {
            Ok(None)
        }
    }

    #[derive(Default)]
    struct InMemoryAuditLog {
        appended: AsyncMutex<Vec<NewAuditEvent>>,
    }

    #[async_trait]
    impl AuditLogService for InMemoryAuditLog {
        async fn append(&self, event: NewAuditEvent) -> Result<super::super::model::AuditRecord, AppError> {
            self.appended.lock().await.push(event.clone());
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
            _from: chrono::DateTime<chrono::Utc>,
            _to: chrono::DateTime<chrono::Utc>,
        ) -> Result<Option<Uuid>, AppError> {
            Ok(None)
        }
    }

    /// A `TokenService` fake that issues deterministic tokens and always
    /// validates them back to the same fixed claims — enough to exercise
    /// `refresh_token`/`logout` dispatch without a real signer.
    struct FixedClaimsTokenService {
        user_id: Uuid,
        tenant_id: Uuid,
    }

    #[async_trait]
    impl TokenService for FixedClaimsTokenService {
        async fn issue(&self, user_id: Uuid, tenant_id: Uuid, _role: &str, _device_fingerprint: &str) -> Result<TokenPair, AppError> {
            Ok(TokenPair {
                access_token: format!("access-{user_id}-{tenant_id}"),
                refresh_token: format!("refresh-{user_id}-{tenant_id}"),
                expires_in: 900,
            })
        }

        async fn validate(&self, _token: &str, _kind: TokenKind) -> Result<shared_jwt::Claims, AppError> {
            Ok(shared_jwt::Claims::new(
                TokenKind::Access,
                self.user_id,
                self.tenant_id,
                "user".to_string(),
                "fp-1".to_string(),
                "kid-1".to_string(),
                900,
            ))
        }

        async fn refresh(&self, _refresh_token: &str, _current_device_fingerprint: &str) -> Result<TokenPair, AppError> {
            Ok(TokenPair {
                access_token: format!("access-{}", self.user_id),
                refresh_token: format!("refresh-{}", self.user_id),
                expires_in: 900,
            })
        }

        async fn revoke(&self, _token: &str) -> Result<(), AppError> {
            Ok(())
        }
    }

    type TestService = AuthServiceImpl<
        InMemoryUserRepository,
        InMemoryVerificationTokenRepository,
        NullEmailSender,
        InMemorySessionManager,
        NullRevocationStore,
        InMemoryAuditLog,
        FixedClaimsTokenService,
    >;

    fn service_with_user(user: User) -> (TestService, Arc<InMemoryUserRepository>) {
        let users = Arc::new(InMemoryUserRepository::seeded(user.clone()));
        let verification = Arc::new(InMemoryVerificationTokenRepository::default());
        let email = Arc::new(NullEmailSender);
        let sessions = Arc::new(InMemorySessionManager::default());
        let revocation = Arc::new(NullRevocationStore);
        let audit = Arc::new(InMemoryAuditLog::default());
        let breakers = Arc::new(shared_breaker::BreakerRegistry::new(shared_breaker::BreakerConfig::builder().build()));
        let tokens = Arc::new(FixedClaimsTokenService { user_id: user.user_id, tenant_id: user.tenant_id });

        let registration = Arc::new(RegistrationPipeline::new(users.clone(), verification.clone(), email.clone(), audit.clone(), breakers.clone()));
        let password_manager = Arc::new(PasswordManager::new(
            users.clone(), verification, email, sessions.clone(), revocation, audit.clone(), breakers, 1,
        ));
        let registry = Arc::new(StrategyRegistry::new(Vec::new()));

        (
            AuthServiceImpl::new(registry, registration, password_manager, users.clone(), tokens, sessions, audit),
            users,
        )
    }

    #[tokio::test]
    async fn login_with_no_matching_strategy_is_bad_credentials() {
        let tenant_id = Uuid::new_v4();
        let (service, _) = service_with_user(seed_user(tenant_id));

        let req = LoginReq {
            email: "trader@example.com".to_string(),
            password: "whatever12".to_string(),
            mfa_code: None,
            social_provider: None,
            social_token: None,
        };

        let err = service.login(tenant_id, req, &ctx()).await.unwrap_err();
        assert!(matches!(err, AppError::BadCredentials));
    }

    #[tokio::test]
    async fn get_user_returns_not_found_for_unknown_id() {
        let tenant_id = Uuid::new_v4();
        let (service, _) = service_with_user(seed_user(tenant_id));

        let err = service.get_user(Uuid::new_v4(), tenant_id).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn get_user_splits_full_name_into_first_and_last() {
        let tenant_id = Uuid::new_v4();
        let user = seed_user(tenant_id);
        let user_id = user.user_id;
        let (service, _) = service_with_user(user);

        let info = service.get_user(user_id, tenant_id).await.expect("user found");
        assert_eq!(info.first_name, "Jane");
        assert_eq!(info.last_name, "Trader");
    }

    #[tokio::test]
    async fn list_users_reports_total_matching_tenant() {
        let tenant_id = Uuid::new_v4();
        let (service, _) = service_with_user(seed_user(tenant_id));

        let resp = service.list_users(tenant_id, 1, 20).await.expect("list succeeds");
        assert_eq!(resp.total, 1);
        assert_eq!(resp.users.len(), 1);
    }

    #[tokio::test]
    async fn refresh_token_returns_a_fresh_pair_for_the_resolved_user() {
        let tenant_id = Uuid::new_v4();
        let user = seed_user(tenant_id);
        let (service, _) = service_with_user(user);

        let req = RefreshReq { refresh_token: "some-refresh-token".to_string() };
        let resp = service.refresh_token(req, &ctx()).await.expect("refresh succeeds");
        assert!(!resp.access_token.is_empty());
        assert!(!resp.refresh_token.is_empty());
    }

    #[tokio::test]
    async fn logout_revokes_access_and_refresh_tokens() {
        let tenant_id = Uuid::new_v4();
        let (service, _) = service_with_user(seed_user(tenant_id));

        let result = service.logout("some-access-token", Some("some-refresh-token"), &ctx()).await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn register_issues_tokens_and_creates_a_session() {
        let tenant_id = Uuid::new_v4();
        let (service, users) = service_with_user(seed_user(tenant_id));

        let req = RegisterReq {
            email: "new-trader@example.com".to_string(),
            password: "brand-new-password".to_string(),
            first_name: "New".to_string(),
            last_name: "Trader".to_string(),
            date_of_birth: None,
            phone_number: None,
            address: None,
            tenant_name: None,
        };

        let resp = service.register(tenant_id, req, &ctx()).await.expect("register succeeds");
        assert!(!resp.access_token.is_empty());
        assert_eq!(resp.user.email, "new-trader@example.com");
        assert_eq!(users.users.lock().await.len(), 2);
    }
}
