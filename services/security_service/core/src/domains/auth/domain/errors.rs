use shared_error::AppError;
use thiserror::Error;

/// C6's error taxonomy (spec.md §4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenError {
    #[error("token malformed")]
    Malformed,
    #[error("bad signature")]
    BadSignature,
    #[error("token expired")]
    Expired,
    #[error("token revoked")]
    Revoked,
    #[error("token wrong kind")]
    WrongKind,
    #[error("device fingerprint mismatch")]
    DeviceMismatch,
}

impl From<TokenError> for AppError {
    fn from(err: TokenError) -> Self {
        match err {
            TokenError::Malformed | TokenError::BadSignature => AppError::TokenMalformed,
            TokenError::Expired => AppError::TokenExpired,
            TokenError::Revoked => AppError::TokenRevoked,
            TokenError::WrongKind => AppError::TokenWrongKind,
            TokenError::DeviceMismatch => AppError::DeviceMismatch,
        }
    }
}

/// C11's error taxonomy (spec.md §4.8).
#[derive(Debug, Clone, Error)]
pub enum AuthError {
    #[error("bad credentials")]
    BadCredentials,
    #[error("account locked, retry after {retry_after_seconds}s")]
    AccountLocked { retry_after_seconds: i64 },
    #[error("account suspended")]
    AccountSuspended,
    #[error("account deactivated")]
    AccountDeactivated,
    #[error("bad mfa code")]
    BadMfa,
    #[error("mfa required")]
    MfaRequired,
    #[error("unsupported social provider")]
    UnsupportedProvider,
    #[error("provider rejected the token")]
    ProviderRejected,
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<AuthError> for AppError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::BadCredentials => AppError::BadCredentials,
            AuthError::AccountLocked { retry_after_seconds } => {
                AppError::AccountLocked { retry_after_seconds }
            }
            AuthError::AccountSuspended => AppError::AccountSuspended,
            AuthError::AccountDeactivated => AppError::AccountDeactivated,
            AuthError::BadMfa => AppError::BadMfa,
            AuthError::MfaRequired => AppError::MfaRequired,
            AuthError::UnsupportedProvider => AppError::ValidationError("unsupported provider".into()),
            AuthError::ProviderRejected => AppError::BadCredentials,
            AuthError::Internal(msg) => AppError::Internal(msg),
        }
    }
}

/// C8's error taxonomy.
#[derive(Debug, Clone, Error)]
pub enum AuditError {
    #[error("invalid audit event: {0}")]
    Invalid(String),
    #[error("unknown enum value: {0}")]
    EnumParse(String),
    #[error("persistence failed: {0}")]
    Persistence(String),
}

impl From<AuditError> for AppError {
    fn from(err: AuditError) -> Self {
        match err {
            AuditError::Invalid(msg) | AuditError::EnumParse(msg) => AppError::ValidationError(msg),
            AuditError::Persistence(msg) => AppError::Internal(msg),
        }
    }
}
