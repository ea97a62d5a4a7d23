//! Persistence for the unified `VerificationToken` (spec.md §3 "Verification
//! token"), shared by the registration pipeline's email-verification step
//! (C12) and password management (C13) rather than two parallel tables.

use async_trait::async_trait;
use shared_error::AppError;
use uuid::Uuid;

use super::model::{VerificationToken, VerificationTokenType};

#[async_trait]
pub trait VerificationTokenRepository: Send + Sync {
    async fn create(&self, token: &VerificationToken) -> Result<VerificationToken, AppError>;

    async fn find_by_token_hash(&self, token_hash: &str) -> Result<Option<VerificationToken>, AppError>;

    /// Invalidates (marks used) every outstanding token of `token_type` for
    /// this user — called before issuing a new one so at most one is live
    /// at a time (spec.md §4.10 "Initiate reset": "invalidating prior ones").
    async fn invalidate_all_for_user(
        &self,
        user_id: Uuid,
        tenant_id: Uuid,
        token_type: VerificationTokenType,
    ) -> Result<(), AppError>;

    async fn mark_used(&self, token_id: Uuid) -> Result<(), AppError>;

    async fn delete_expired(&self) -> Result<u64, AppError>;
}

/// Notification side-channel for registration/password-reset emails
/// (C3-wrapped at the call site via `shared_breaker::EMAIL`). Kept in
/// `core` as a trait so the pipelines never depend on a transport crate.
#[async_trait]
pub trait EmailSender: Send + Sync {
    async fn send_verification_email(&self, to: &str, token_plaintext: &str) -> Result<(), AppError>;
    async fn send_password_reset_email(&self, to: &str, token_plaintext: &str) -> Result<(), AppError>;
}
