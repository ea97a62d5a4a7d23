//! Registration pipeline (C12, spec.md §4.9): an 8-stage railway built on
//! `ValidationChain`/`Outcome` (C1/C2).

use std::sync::Arc;

use shared_breaker::BreakerRegistry;
use shared_error::AppError;
use shared_outcome::{Outcome, ValidationChain};
use uuid::Uuid;

use super::model::{
    AccountStatus, AuditEventType, EventStatus, KycStatus, NewAuditEvent, SubscriptionTier, User,
    VerificationToken, VerificationTokenType,
};
use super::audit_log_service::AuditLogService;
use super::http_context::HttpContext;
use super::repository::UserRepository;
use super::verification_token_repository::{EmailSender, VerificationTokenRepository};

#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub tenant_id: Uuid,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub phone_number: Option<String>,
}

#[derive(Debug, Clone)]
pub struct RegistrationOutcome {
    pub user: User,
    /// `false` if the verification email failed to send — the token is
    /// still valid and the caller should tell the client delivery is
    /// pending (spec.md §4.9 "Idempotency").
    pub email_delivery_pending: bool,
}

#[derive(Debug, Clone)]
pub enum RegistrationError {
    Validation(String),
    EmailTaken,
    Internal(String),
}

impl From<RegistrationError> for AppError {
    fn from(err: RegistrationError) -> Self {
        match err {
            RegistrationError::Validation(msg) => AppError::ValidationError(msg),
            RegistrationError::EmailTaken => AppError::Conflict("email already registered".into()),
            RegistrationError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

fn validation_chain() -> ValidationChain<'static, RegisterInput, RegistrationError> {
    ValidationChain::new()
        .rule(
            "email_format",
            |input: &RegisterInput| input.email.contains('@') && input.email.len() > 3,
            |_| RegistrationError::Validation("invalid email format".into()),
        )
        .rule(
            "password_policy",
            |input: &RegisterInput| input.password.len() >= 8,
            |_| RegistrationError::Validation("password must be at least 8 characters".into()),
        )
        .rule(
            "first_name_present",
            |input: &RegisterInput| !input.first_name.trim().is_empty(),
            |_| RegistrationError::Validation("first name is required".into()),
        )
        .rule(
            "last_name_present",
            |input: &RegisterInput| !input.last_name.trim().is_empty(),
            |_| RegistrationError::Validation("last name is required".into()),
        )
}

pub struct RegistrationPipeline<U: UserRepository, V: VerificationTokenRepository, E: EmailSender, A: AuditLogService> {
    users: Arc<U>,
    tokens: Arc<V>,
    email: Arc<E>,
    audit: Arc<A>,
    breakers: Arc<BreakerRegistry>,
}

impl<U: UserRepository, V: VerificationTokenRepository, E: EmailSender, A: AuditLogService>
    RegistrationPipeline<U, V, E, A>
{
    pub fn new(users: Arc<U>, tokens: Arc<V>, email: Arc<E>, audit: Arc<A>, breakers: Arc<BreakerRegistry>) -> Self {
        Self { users, tokens, email, audit, breakers }
    }

    /// Runs the full 8-stage pipeline (spec.md §4.9). Stages 1-2 are plain
    /// validation/lookup; stages 3-7 are the "single logical transaction"
    /// the spec calls for (approximated here as sequential repository calls
    /// — the authoritative store's own transaction boundary lives in
    /// `infra`'s implementation of `UserRepository::create`).
    pub async fn register(&self, input: RegisterInput, ctx: &HttpContext) -> Result<RegistrationOutcome, AppError> {
        let tenant_id = input.tenant_id;
        let attempted_email = input.email.clone();
        let validated = validation_chain().validate(input);
        let input = match validated {
            Outcome::Success(v) => v,
            Outcome::Failure(e) => {
                let _ = self
                    .audit
                    .append(NewAuditEvent {
                        tenant_id,
                        user_id: None,
                        event_type: AuditEventType::UserRegistration,
                        event_status: EventStatus::Failed,
                        ip_address: ctx.ip_address.clone(),
                        user_agent: ctx.user_agent.clone(),
                        device_fingerprint: Some(ctx.device_fingerprint.clone()),
                        details: serde_json::json!({"email": attempted_email, "reason": format!("{e:?}")}),
                        session_id: None,
                        correlation_id: Some(ctx.correlation_id),
                    })
                    .await;
                return Err(e.into());
            }
        };

        let email = input.email.trim().to_lowercase();

        if self
            .users
            .email_exists(&email, input.tenant_id)
            .await?
        {
            let _ = self
                .audit
                .append(NewAuditEvent {
                    tenant_id: input.tenant_id,
                    user_id: None,
                    event_type: AuditEventType::UserRegistration,
                    event_status: EventStatus::Failed,
                    ip_address: ctx.ip_address.clone(),
                    user_agent: ctx.user_agent.clone(),
                    device_fingerprint: Some(ctx.device_fingerprint.clone()),
                    details: serde_json::json!({"email": email, "reason": "email_taken"}),
                    session_id: None,
                    correlation_id: Some(ctx.correlation_id),
                })
                .await;
            return Err(RegistrationError::EmailTaken.into());
        }

        let password_hash = bcrypt::hash(&input.password, bcrypt::DEFAULT_COST)
            .map_err(|e| AppError::Internal(format!("password hashing failed: {e}")))?;

        let now = chrono::Utc::now();
        let user = User {
            user_id: Uuid::new_v4(),
            tenant_id: input.tenant_id,
            email: email.clone(),
            password_hash: Some(password_hash),
            account_status: AccountStatus::Active,
            kyc_status: KycStatus::Pending,
            subscription_tier: SubscriptionTier::Free,
            email_verified: false,
            phone_verified: false,
            full_name: Some(format!("{} {}", input.first_name.trim(), input.last_name.trim())),
            phone: input.phone_number.clone(),
            role: "user".to_string(),
            failed_login_attempts: 0,
            locked_until: None,
            password_changed_at: Some(now),
            last_login_at: None,
            last_login_ip: None,
            last_device_fingerprint: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        };

        let persisted = self.users.create(&user).await?;

        let plaintext_token = shared_crypto::random_token(32);
        let token_hash = shared_crypto::sha256_hex(plaintext_token.as_bytes());
        let verification_token = VerificationToken {
            token_id: Uuid::new_v4(),
            user_id: persisted.user_id,
            tenant_id: persisted.tenant_id,
            token_hash,
            token_type: VerificationTokenType::EmailVerification,
            expires_at: now + chrono::Duration::hours(24),
            used_at: None,
            ip_address: ctx.ip_address.clone(),
            user_agent: ctx.user_agent.clone(),
            created_at: now,
        };
        self.tokens.create(&verification_token).await?;

        let email_for_send = persisted.email.clone();
        let email_sender = self.email.clone();
        let plaintext_for_send = plaintext_token.clone();
        let send_result = self
            .breakers
            .execute(shared_breaker::EMAIL, || async move {
                email_sender.send_verification_email(&email_for_send, &plaintext_for_send).await
            })
            .await;

        let email_delivery_pending = send_result.is_err();
        if email_delivery_pending {
            tracing::warn!(user_id = %persisted.user_id, "verification email send failed, delivery pending");
        }

        let _ = self
            .audit
            .append(NewAuditEvent {
                tenant_id: persisted.tenant_id,
                user_id: Some(persisted.user_id),
                event_type: AuditEventType::UserRegistration,
                event_status: EventStatus::Success,
                ip_address: ctx.ip_address.clone(),
                user_agent: ctx.user_agent.clone(),
                device_fingerprint: Some(ctx.device_fingerprint.clone()),
                details: serde_json::json!({"email_delivery_pending": email_delivery_pending}),
                session_id: None,
                correlation_id: Some(ctx.correlation_id),
            })
            .await;

        Ok(RegistrationOutcome { user: persisted, email_delivery_pending })
    }

    /// `GET /auth/verify/email/{token}` (spec.md §6).
    pub async fn verify_email(&self, plaintext_token: &str) -> Result<User, AppError> {
        let token_hash = shared_crypto::sha256_hex(plaintext_token.as_bytes());
        let token = self
            .tokens
            .find_by_token_hash(&token_hash)
            .await?
            .ok_or_else(|| AppError::NotFound("verification token not found".into()))?;

        if !token.is_valid(chrono::Utc::now()) {
            return Err(AppError::ValidationError("token expired or already used".into()));
        }

        self.tokens.mark_used(token.token_id).await?;

        let user = self
            .users
            .find_by_id(token.user_id, token.tenant_id)
            .await?
            .ok_or_else(|| AppError::NotFound("user not found".into()))?;

        self.users.mark_email_verified(user.user_id, user.tenant_id).await?;

        let _ = self
            .audit
            .append(NewAuditEvent {
                tenant_id: user.tenant_id,
                user_id: Some(user.user_id),
                event_type: AuditEventType::EmailVerified,
                event_status: EventStatus::Success,
                ip_address: None,
                user_agent: None,
                device_fingerprint: None,
                details: serde_json::json!({}),
                session_id: None,
                correlation_id: None,
            })
            .await;

        Ok(user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_chain_rejects_short_password() {
        let input = RegisterInput {
            tenant_id: Uuid::new_v4(),
            email: "a@b.com".to_string(),
            password: "short".to_string(),
            first_name: "A".to_string(),
            last_name: "B".to_string(),
            phone_number: None,
        };
        let result = validation_chain().validate(input);
        assert!(matches!(result, Outcome::Failure(RegistrationError::Validation(_))));
    }

    #[test]
    fn validation_chain_accepts_well_formed_input() {
        let input = RegisterInput {
            tenant_id: Uuid::new_v4(),
            email: "a@b.com".to_string(),
            password: "longenough1".to_string(),
            first_name: "A".to_string(),
            last_name: "B".to_string(),
            phone_number: None,
        };
        assert!(validation_chain().validate(input).is_success());
    }
}
