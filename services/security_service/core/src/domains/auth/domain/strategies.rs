//! Authentication strategy registry (C11, spec.md §4.8). Each strategy is a
//! `(predicate, execute)` pair; the registry picks the highest-priority
//! strategy whose predicate matches the request.

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use shared_error::AppError;
use shared_jwt::TokenKind;

use super::errors::AuthError;
use super::http_context::HttpContext;
use super::mfa_service::MfaService;
use super::model::{AccountStatus, AuditEventType, EventStatus, NewAuditEvent, User};
use super::repository::UserRepository;
use super::session_manager::SessionManager;
use super::token_service::TokenService;

/// Request shape a strategy inspects. Built by the façade/handler from the
/// HTTP request body (`LoginReq`) plus an optional service API-key header —
/// kept in `core` as a plain struct so strategies never depend on axum.
#[derive(Debug, Clone)]
pub struct LoginRequest {
    pub tenant_id: Uuid,
    pub email: String,
    pub password: String,
    pub mfa_code: Option<String>,
    pub social_provider: Option<String>,
    pub social_token: Option<String>,
    pub service_api_key: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AuthResponse {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,
    pub user: Option<User>,
    pub requires_mfa: bool,
}

#[async_trait]
pub trait AuthStrategy: Send + Sync {
    /// Higher value wins when more than one strategy's predicate matches.
    fn priority(&self) -> u8;
    fn applies(&self, request: &LoginRequest) -> bool;
    async fn execute(&self, request: &LoginRequest, ctx: &HttpContext) -> Result<AuthResponse, AuthError>;
}

pub struct StrategyRegistry {
    strategies: Vec<Arc<dyn AuthStrategy>>,
}

impl StrategyRegistry {
    pub fn new(strategies: Vec<Arc<dyn AuthStrategy>>) -> Self {
        Self { strategies }
    }

    /// Returns the highest-priority strategy whose predicate matches, or
    /// `None` if the request matches nothing (callers should treat this as
    /// `BAD_CREDENTIALS` rather than leak which field was missing).
    pub fn select(&self, request: &LoginRequest) -> Option<Arc<dyn AuthStrategy>> {
        self.strategies
            .iter()
            .filter(|s| s.applies(request))
            .max_by_key(|s| s.priority())
            .cloned()
    }
}

/// Priorities per spec.md §4.8 ranking, highest first: service API key >
/// social > MFA > password.
pub mod priority {
    pub const SERVICE_API_KEY: u8 = 40;
    pub const SOCIAL: u8 = 30;
    pub const MFA: u8 = 20;
    pub const PASSWORD: u8 = 10;
}

fn canonical_email(email: &str) -> String {
    email.trim().to_lowercase()
}

async fn audit_login(
    audit: &Arc<dyn super::audit_log_service::AuditLogService>,
    tenant_id: Uuid,
    user_id: Option<Uuid>,
    event_type: AuditEventType,
    status: EventStatus,
    ctx: &HttpContext,
    details: serde_json::Value,
) {
    let _ = audit
        .append(NewAuditEvent {
            tenant_id,
            user_id,
            event_type,
            event_status: status,
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone(),
            device_fingerprint: Some(ctx.device_fingerprint.clone()),
            details,
            session_id: None,
            correlation_id: Some(ctx.correlation_id),
        })
        .await;
}

fn account_status_error(user: &User) -> Option<AuthError> {
    match user.account_status {
        AccountStatus::Locked if user.is_locked() => {
            let retry_after_seconds = user
                .locked_until
                .map(|t| (t - chrono::Utc::now()).num_seconds().max(0))
                .unwrap_or(0);
            Some(AuthError::AccountLocked { retry_after_seconds })
        }
        AccountStatus::Suspended => Some(AuthError::AccountSuspended),
        AccountStatus::Deactivated => Some(AuthError::AccountDeactivated),
        _ => None,
    }
}

async fn issue_and_create_session<T: TokenService, S: SessionManager>(
    tokens: &Arc<T>,
    sessions: &Arc<S>,
    user: &User,
    ctx: &HttpContext,
) -> Result<AuthResponse, AppError> {
    let pair = tokens
        .issue(user.user_id, user.tenant_id, &user.role, &ctx.device_fingerprint)
        .await?;
    sessions.create(user.user_id, user.tenant_id, ctx).await?;
    Ok(AuthResponse {
        access_token: pair.access_token,
        refresh_token: pair.refresh_token,
        expires_in: pair.expires_in,
        user: Some(user.clone()),
        requires_mfa: false,
    })
}

/// Password strategy (spec.md §4.8 "Password strategy"). The fallback
/// strategy — lowest priority, `applies` always true so something always
/// handles a plain email/password login.
pub struct PasswordStrategy<U: UserRepository, T: TokenService, S: SessionManager, A: super::audit_log_service::AuditLogService> {
    users: Arc<U>,
    tokens: Arc<T>,
    sessions: Arc<S>,
    audit: Arc<A>,
    max_failed_attempts: i32,
    account_lock_duration_minutes: i64,
}

impl<U: UserRepository, T: TokenService, S: SessionManager, A: super::audit_log_service::AuditLogService>
    PasswordStrategy<U, T, S, A>
{
    pub fn new(
        users: Arc<U>,
        tokens: Arc<T>,
        sessions: Arc<S>,
        audit: Arc<A>,
        max_failed_attempts: i32,
        account_lock_duration_minutes: i64,
    ) -> Self {
        Self {
            users,
            tokens,
            sessions,
            audit,
            max_failed_attempts,
            account_lock_duration_minutes,
        }
    }

    async fn audit_generic(&self, tenant_id: Uuid, user_id: Option<Uuid>, status: EventStatus, ctx: &HttpContext, details: serde_json::Value) {
        let _ = self
            .audit
            .append(NewAuditEvent {
                tenant_id,
                user_id,
                event_type: AuditEventType::LoginFailure,
                event_status: status,
                ip_address: ctx.ip_address.clone(),
                user_agent: ctx.user_agent.clone(),
                device_fingerprint: Some(ctx.device_fingerprint.clone()),
                details,
                session_id: None,
                correlation_id: Some(ctx.correlation_id),
            })
            .await;
    }
}

#[async_trait]
impl<U: UserRepository, T: TokenService, S: SessionManager, A: super::audit_log_service::AuditLogService> AuthStrategy
    for PasswordStrategy<U, T, S, A>
{
    fn priority(&self) -> u8 {
        priority::PASSWORD
    }

    fn applies(&self, _request: &LoginRequest) -> bool {
        true
    }

    async fn execute(&self, request: &LoginRequest, ctx: &HttpContext) -> Result<AuthResponse, AuthError> {
        if request.email.trim().is_empty() || request.password.len() < 8 {
            return Err(AuthError::BadCredentials);
        }

        let email = canonical_email(&request.email);
        let user = self
            .users
            .find_by_email(&email, request.tenant_id)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        let Some(user) = user else {
            self.audit_generic(request.tenant_id, None, EventStatus::Failed, ctx, serde_json::json!({"reason": "no_such_user"})).await;
            return Err(AuthError::BadCredentials);
        };

        let verified = user
            .password_hash
            .as_deref()
            .map(|hash| bcrypt::verify(&request.password, hash).unwrap_or(false))
            .unwrap_or(false);

        if !verified {
            let attempts = self
                .users
                .increment_failed_attempts(user.user_id, user.tenant_id)
                .await
                .map_err(|e| AuthError::Internal(e.to_string()))?;

            if attempts >= self.max_failed_attempts {
                let locked_until = chrono::Utc::now() + chrono::Duration::minutes(self.account_lock_duration_minutes);
                self.users
                    .lock_account(user.user_id, user.tenant_id, locked_until)
                    .await
                    .map_err(|e| AuthError::Internal(e.to_string()))?;
                self.audit_generic(
                    request.tenant_id,
                    Some(user.user_id),
                    EventStatus::Blocked,
                    ctx,
                    serde_json::json!({"attempts": attempts}),
                )
                .await;
                return Err(AuthError::AccountLocked {
                    retry_after_seconds: self.account_lock_duration_minutes * 60,
                });
            }

            self.audit_generic(
                request.tenant_id,
                Some(user.user_id),
                EventStatus::Failed,
                ctx,
                serde_json::json!({"attempts": attempts}),
            )
            .await;
            return Err(AuthError::BadCredentials);
        }

        // Account-status is checked only after the password has verified —
        // checking it first would let an unauthenticated caller distinguish
        // locked/suspended accounts from a bad password.
        if let Some(err) = account_status_error(&user) {
            return Err(err);
        }

        self.users
            .reset_failed_attempts(user.user_id, user.tenant_id)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        let resp = issue_and_create_session(&self.tokens, &self.sessions, &user, ctx)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        audit_login(
            &(self.audit.clone() as Arc<dyn super::audit_log_service::AuditLogService>),
            request.tenant_id,
            Some(user.user_id),
            AuditEventType::LoginSuccess,
            EventStatus::Success,
            ctx,
            serde_json::json!({}),
        )
        .await;

        Ok(resp)
    }
}

/// MFA strategy: identical to password up to credential verification, then
/// requires and verifies `mfa_code` (spec.md §4.8 "MFA strategy").
pub struct MfaStrategy<U: UserRepository, T: TokenService, S: SessionManager, M: MfaService, A: super::audit_log_service::AuditLogService> {
    users: Arc<U>,
    tokens: Arc<T>,
    sessions: Arc<S>,
    mfa: Arc<M>,
    audit: Arc<A>,
}

impl<U: UserRepository, T: TokenService, S: SessionManager, M: MfaService, A: super::audit_log_service::AuditLogService>
    MfaStrategy<U, T, S, M, A>
{
    pub fn new(users: Arc<U>, tokens: Arc<T>, sessions: Arc<S>, mfa: Arc<M>, audit: Arc<A>) -> Self {
        Self { users, tokens, sessions, mfa, audit }
    }
}

#[async_trait]
impl<U: UserRepository, T: TokenService, S: SessionManager, M: MfaService, A: super::audit_log_service::AuditLogService>
    AuthStrategy for MfaStrategy<U, T, S, M, A>
{
    fn priority(&self) -> u8 {
        priority::MFA
    }

    fn applies(&self, request: &LoginRequest) -> bool {
        request.mfa_code.is_some()
    }

    async fn execute(&self, request: &LoginRequest, ctx: &HttpContext) -> Result<AuthResponse, AuthError> {
        let email = canonical_email(&request.email);
        let user = self
            .users
            .find_by_email(&email, request.tenant_id)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?
            .ok_or(AuthError::BadCredentials)?;

        let verified = user
            .password_hash
            .as_deref()
            .map(|hash| bcrypt::verify(&request.password, hash).unwrap_or(false))
            .unwrap_or(false);
        if !verified {
            return Err(AuthError::BadCredentials);
        }

        if let Some(err) = account_status_error(&user) {
            return Err(err);
        }

        let code = request.mfa_code.as_deref().ok_or(AuthError::MfaRequired)?;
        let ok = self
            .mfa
            .verify(user.user_id, user.tenant_id, code)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        if !ok {
            audit_login(
                &(self.audit.clone() as Arc<dyn super::audit_log_service::AuditLogService>),
                request.tenant_id,
                Some(user.user_id),
                AuditEventType::MfaVerificationFailed,
                EventStatus::Failed,
                ctx,
                serde_json::json!({}),
            )
            .await;
            return Err(AuthError::BadMfa);
        }

        let resp = issue_and_create_session(&self.tokens, &self.sessions, &user, ctx)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        audit_login(
            &(self.audit.clone() as Arc<dyn super::audit_log_service::AuditLogService>),
            request.tenant_id,
            Some(user.user_id),
            AuditEventType::LoginSuccess,
            EventStatus::Success,
            ctx,
            serde_json::json!({"mfa": true}),
        )
        .await;

        Ok(resp)
    }
}

/// Verifies a social-provider token out-of-band and returns the vouched-for
/// email (spec.md §4.8 "Social strategy"). C3-wrapped at the call site.
#[async_trait]
pub trait SocialProviderClient: Send + Sync {
    async fn verify(&self, provider: &str, token: &str) -> Result<String, AppError>;
}

/// Default social provider: spec.md's Open Question (see DESIGN.md) is
/// resolved by refusing every provider until a real one is wired in
/// `infra` — this keeps the strategy's `applies` truthful (it matches the
/// request shape) while its `execute` always reports `UNSUPPORTED_PROVIDER`
/// rather than silently accepting arbitrary tokens.
pub struct RefusingSocialProvider;

#[async_trait]
impl SocialProviderClient for RefusingSocialProvider {
    async fn verify(&self, _provider: &str, _token: &str) -> Result<String, AppError> {
        Err(AppError::ValidationError("unsupported provider".into()))
    }
}

pub struct SocialStrategy<C: SocialProviderClient, U: UserRepository, T: TokenService, S: SessionManager, A: super::audit_log_service::AuditLogService> {
    client: Arc<C>,
    users: Arc<U>,
    tokens: Arc<T>,
    sessions: Arc<S>,
    audit: Arc<A>,
    breakers: Arc<shared_breaker::BreakerRegistry>,
    supported_providers: Vec<String>,
}

impl<C: SocialProviderClient, U: UserRepository, T: TokenService, S: SessionManager, A: super::audit_log_service::AuditLogService>
    SocialStrategy<C, U, T, S, A>
{
    pub fn new(
        client: Arc<C>,
        users: Arc<U>,
        tokens: Arc<T>,
        sessions: Arc<S>,
        audit: Arc<A>,
        breakers: Arc<shared_breaker::BreakerRegistry>,
        supported_providers: Vec<String>,
    ) -> Self {
        Self { client, users, tokens, sessions, audit, breakers, supported_providers }
    }
}

#[async_trait]
impl<C: SocialProviderClient, U: UserRepository, T: TokenService, S: SessionManager, A: super::audit_log_service::AuditLogService>
    AuthStrategy for SocialStrategy<C, U, T, S, A>
{
    fn priority(&self) -> u8 {
        priority::SOCIAL
    }

    fn applies(&self, request: &LoginRequest) -> bool {
        request.social_provider.is_some() && request.social_token.is_some()
    }

    async fn execute(&self, request: &LoginRequest, ctx: &HttpContext) -> Result<AuthResponse, AuthError> {
        let provider = request.social_provider.clone().unwrap_or_default();
        let token = request.social_token.clone().unwrap_or_default();

        if !self.supported_providers.iter().any(|p| p == &provider) {
            return Err(AuthError::UnsupportedProvider);
        }

        let client = self.client.clone();
        let provider_for_call = provider.clone();
        let email = self
            .breakers
            .execute(shared_breaker::EXTERNAL_API, || async move {
                client.verify(&provider_for_call, &token).await
            })
            .await
            .map_err(|_| AuthError::ProviderRejected)?;

        let email = canonical_email(&email);
        let existing = self
            .users
            .find_by_email(&email, request.tenant_id)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        let user = match existing {
            Some(u) => u,
            None => {
                let now = chrono::Utc::now();
                let new_user = User {
                    user_id: Uuid::new_v4(),
                    tenant_id: request.tenant_id,
                    email: email.clone(),
                    password_hash: None,
                    account_status: AccountStatus::Active,
                    kyc_status: super::model::KycStatus::Pending,
                    subscription_tier: super::model::SubscriptionTier::Free,
                    email_verified: true,
                    phone_verified: false,
                    full_name: None,
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
                };
                self.users
                    .create(&new_user)
                    .await
                    .map_err(|e| AuthError::Internal(e.to_string()))?
            }
        };

        if let Some(err) = account_status_error(&user) {
            return Err(err);
        }

        let resp = issue_and_create_session(&self.tokens, &self.sessions, &user, ctx)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        audit_login(
            &(self.audit.clone() as Arc<dyn super::audit_log_service::AuditLogService>),
            request.tenant_id,
            Some(user.user_id),
            AuditEventType::LoginSuccess,
            EventStatus::Success,
            ctx,
            serde_json::json!({"provider": provider}),
        )
        .await;

        Ok(resp)
    }
}

/// Service identity resolved from a pre-provisioned API key (spec.md §4.8
/// "Service API-key strategy") — no associated user row.
#[async_trait]
pub trait ServiceIdentityResolver: Send + Sync {
    async fn resolve(&self, api_key: &str) -> Result<Option<(Uuid, String)>, AppError>;
}

pub struct ServiceApiKeyStrategy<R: ServiceIdentityResolver> {
    resolver: Arc<R>,
    secret: String,
    kid: String,
    ttl_seconds: i64,
}

impl<R: ServiceIdentityResolver> ServiceApiKeyStrategy<R> {
    pub fn new(resolver: Arc<R>, secret: impl Into<String>, kid: impl Into<String>, ttl_seconds: i64) -> Self {
        Self { resolver, secret: secret.into(), kid: kid.into(), ttl_seconds }
    }
}

#[async_trait]
impl<R: ServiceIdentityResolver> AuthStrategy for ServiceApiKeyStrategy<R> {
    fn priority(&self) -> u8 {
        priority::SERVICE_API_KEY
    }

    fn applies(&self, request: &LoginRequest) -> bool {
        request.service_api_key.is_some()
    }

    async fn execute(&self, request: &LoginRequest, ctx: &HttpContext) -> Result<AuthResponse, AuthError> {
        let api_key = request.service_api_key.as_deref().unwrap_or_default();
        let identity = self
            .resolver
            .resolve(api_key)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        let Some((tenant_id, service_name)) = identity else {
            return Err(AuthError::BadCredentials);
        };

        let claims = shared_jwt::Claims::new(
            TokenKind::Access,
            Uuid::nil(),
            tenant_id,
            format!("service:{service_name}"),
            shared_crypto::sha256_hex(ctx.device_fingerprint.as_bytes()),
            self.kid.clone(),
            self.ttl_seconds,
        );
        let access_token = shared_jwt::encode_jwt(&claims, &self.secret).map_err(|e| AuthError::Internal(e.to_string()))?;

        Ok(AuthResponse {
            access_token,
            refresh_token: String::new(),
            expires_in: self.ttl_seconds,
            user: None,
            requires_mfa: false,
        })
    }
}
