use axum::{
    http::{HeaderName, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use shared_breaker::BreakerError;
use shared_crypto::CryptoError;
use std::fmt;

/// Single error type returned from every fallible operation in the security
/// core, and the `E` parameter of `Outcome<T, AppError>` at service
/// boundaries. Narrower enums (`TokenError`, `CryptoError`, `BreakerError`,
/// `AuthError`) convert into this via `From` impls below, mirroring the
/// teacher's `impl From<sqlx::Error> for AppError`.
#[derive(Debug)]
pub enum AppError {
    // Database errors
    Database(sqlx::Error),
    Redis(String),

    // Generic request-shape errors
    ValidationError(String),
    NotFound(String),
    Forbidden(String),
    Conflict(String),

    // Authentication / credential errors (spec.md §7)
    BadCredentials,
    AccountLocked { retry_after_seconds: i64 },
    AccountSuspended,
    AccountDeactivated,
    MfaRequired,
    BadMfa,

    // Token errors (C6)
    TokenMalformed,
    TokenExpired,
    TokenRevoked,
    TokenWrongKind,
    DeviceMismatch,

    // Outbound-dependency errors (C3)
    UpstreamUnavailable { dependency: String },
    UpstreamTimeout { dependency: String },

    // Crypto errors (C4/C5) — never reveals the underlying cause
    CryptoTampered,

    // Catch-all
    Internal(String),
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AppError::Database(e) => write!(f, "database error: {}", e),
            AppError::Redis(msg) => write!(f, "cache error: {}", msg),
            AppError::ValidationError(msg) => write!(f, "validation error: {}", msg),
            AppError::NotFound(msg) => write!(f, "not found: {}", msg),
            AppError::Forbidden(msg) => write!(f, "forbidden: {}", msg),
            AppError::Conflict(msg) => write!(f, "conflict: {}", msg),
            AppError::BadCredentials => write!(f, "bad credentials"),
            AppError::AccountLocked { .. } => write!(f, "account locked"),
            AppError::AccountSuspended => write!(f, "account suspended"),
            AppError::AccountDeactivated => write!(f, "account deactivated"),
            AppError::MfaRequired => write!(f, "mfa required"),
            AppError::BadMfa => write!(f, "bad mfa code"),
            AppError::TokenMalformed => write!(f, "token malformed"),
            AppError::TokenExpired => write!(f, "token expired"),
            AppError::TokenRevoked => write!(f, "token revoked"),
            AppError::TokenWrongKind => write!(f, "token wrong kind"),
            AppError::DeviceMismatch => write!(f, "device fingerprint mismatch"),
            AppError::UpstreamUnavailable { dependency } => {
                write!(f, "upstream unavailable: {}", dependency)
            }
            AppError::UpstreamTimeout { dependency } => {
                write!(f, "upstream timeout: {}", dependency)
            }
            AppError::CryptoTampered => write!(f, "ciphertext failed authentication"),
            AppError::Internal(msg) => write!(f, "internal error: {}", msg),
        }
    }
}

impl std::error::Error for AppError {}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message, error_code) = match &self {
            AppError::Database(e) => {
                tracing::error!("database error: {:?}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                    "INTERNAL_ERROR",
                )
            }
            AppError::Redis(msg) => {
                tracing::error!("cache error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                    "INTERNAL_ERROR",
                )
            }
            AppError::ValidationError(msg) => {
                (StatusCode::BAD_REQUEST, msg.clone(), "VALIDATION_ERROR")
            }
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone(), "NOT_FOUND"),
            AppError::Forbidden(msg) => (StatusCode::FORBIDDEN, msg.clone(), "FORBIDDEN"),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg.clone(), "CONFLICT"),
            // Authentication errors are normalised to a generic message so the
            // response never becomes an oracle for which step failed
            // (spec.md §7 "User-visible behaviour").
            AppError::BadCredentials => (
                StatusCode::UNAUTHORIZED,
                "bad_credentials".to_string(),
                "BAD_CREDENTIALS",
            ),
            AppError::AccountLocked { .. } => (
                StatusCode::LOCKED,
                "account_locked".to_string(),
                "ACCOUNT_LOCKED",
            ),
            AppError::AccountSuspended => (
                StatusCode::FORBIDDEN,
                "account_suspended".to_string(),
                "ACCOUNT_SUSPENDED",
            ),
            AppError::AccountDeactivated => (
                StatusCode::FORBIDDEN,
                "account_deactivated".to_string(),
                "ACCOUNT_DEACTIVATED",
            ),
            AppError::MfaRequired => (
                StatusCode::OK,
                "mfa_required".to_string(),
                "MFA_REQUIRED",
            ),
            AppError::BadMfa => (StatusCode::UNAUTHORIZED, "bad_mfa".to_string(), "BAD_MFA"),
            AppError::TokenMalformed
            | AppError::TokenExpired
            | AppError::TokenRevoked
            | AppError::TokenWrongKind => (
                StatusCode::UNAUTHORIZED,
                "token_error".to_string(),
                "TOKEN_ERROR",
            ),
            AppError::DeviceMismatch => (
                StatusCode::UNAUTHORIZED,
                "device_mismatch".to_string(),
                "DEVICE_MISMATCH",
            ),
            AppError::UpstreamUnavailable { dependency } => {
                return (
                    StatusCode::SERVICE_UNAVAILABLE,
                    [(
                        HeaderName::from_static("x-upstream-degraded"),
                        HeaderValue::from_str(dependency).unwrap_or_else(|_| {
                            HeaderValue::from_static("unknown")
                        }),
                    )],
                    Json(json!({"error": "upstream_unavailable"})),
                )
                    .into_response();
            }
            AppError::UpstreamTimeout { .. } => (
                StatusCode::GATEWAY_TIMEOUT,
                "upstream_timeout".to_string(),
                "UPSTREAM_TIMEOUT",
            ),
            // Never reveals the underlying cause (spec.md §4.3 invariant).
            AppError::CryptoTampered => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal error".to_string(),
                "CRYPTO_TAMPERED",
            ),
            AppError::Internal(msg) => {
                tracing::error!("internal error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal error".to_string(),
                    "INTERNAL_ERROR",
                )
            }
        };

        let body = Json(json!({
            "error": error_message,
            "code": error_code,
        }));

        (status, body).into_response()
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::Database(err)
    }
}

impl From<redis::RedisError> for AppError {
    fn from(err: redis::RedisError) -> Self {
        AppError::Redis(err.to_string())
    }
}

impl From<std::env::VarError> for AppError {
    fn from(err: std::env::VarError) -> Self {
        AppError::Internal(format!("configuration error: {}", err))
    }
}

/// Any `CryptoError` becomes the opaque `CryptoTampered` variant — the
/// distinction between a bad key, corrupted ciphertext, or a malformed
/// envelope must never reach the caller (spec.md §4.3 invariant).
impl From<CryptoError> for AppError {
    fn from(err: CryptoError) -> Self {
        tracing::error!("crypto operation failed: {:?}", err);
        AppError::CryptoTampered
    }
}

/// Unwraps a breaker-wrapped call into the façade's own outbound-dependency
/// errors; the wrapped operation's error (already an `AppError` at every
/// call site in this core) passes through untouched.
impl<E> From<BreakerError<E>> for AppError
where
    E: Into<AppError>,
{
    fn from(err: BreakerError<E>) -> Self {
        match err {
            BreakerError::OpenRejected(name) => AppError::UpstreamUnavailable { dependency: name },
            BreakerError::Timeout(name) => AppError::UpstreamTimeout { dependency: name },
            BreakerError::ExecutionFailed(inner) => inner.into(),
        }
    }
}
