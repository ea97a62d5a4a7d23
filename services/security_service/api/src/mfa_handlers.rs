use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use validator::Validate;

use security_service_core::domains::auth::domain::mfa_service::MfaService;
use security_service_core::domains::auth::domain::service::AuthService;
use security_service_core::domains::auth::dto::mfa_dto::{
    ConfirmMfaReq, EnrollMfaResp, VerifyMfaReq, VerifyMfaResp,
};
use shared_error::AppError;

use crate::extractors::{AuthenticatedUser, TenantHeader};
use crate::AppState;

/// Issuer name embedded in the TOTP provisioning URI (spec.md §4.5
/// "Enrollment"). Shown in authenticator apps next to the account label.
const TOTP_ISSUER: &str = "SecurityService";

/// `POST /auth/mfa/enroll` (spec.md §6). Generates a new TOTP secret and
/// backup codes for the authenticated user; MFA stays disabled until
/// `confirm` proves the authenticator app was wired up correctly.
#[utoipa::path(
    post,
    path = "/auth/mfa/enroll",
    tag = "mfa",
    operation_id = "security_mfa_enroll",
    responses((status = 200, description = "Enrollment material issued", body = EnrollMfaResp)),
    security(("bearer_auth" = [])),
)]
pub async fn enroll(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
) -> Result<Json<EnrollMfaResp>, AppError> {
    let user = state.auth.get_user(claims.sub, claims.tenant_id).await?;
    let (secret_key, provisioning_uri, backup_codes) = state
        .mfa
        .enroll(claims.sub, claims.tenant_id, &user.email, TOTP_ISSUER)
        .await?;

    Ok(Json(EnrollMfaResp { secret_key, provisioning_uri, backup_codes }))
}

/// `POST /auth/mfa/confirm` (spec.md §6). The first TOTP code after
/// enrollment; success flips MFA to enabled.
#[utoipa::path(
    post,
    path = "/auth/mfa/confirm",
    tag = "mfa",
    operation_id = "security_mfa_confirm",
    request_body = ConfirmMfaReq,
    responses(
        (status = 204, description = "MFA enabled"),
        (status = 401, description = "Bad code", body = String),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn confirm(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    Json(req): Json<ConfirmMfaReq>,
) -> Result<StatusCode, AppError> {
    req.validate().map_err(|e| AppError::ValidationError(e.to_string()))?;
    state.mfa.confirm_enrollment(claims.sub, claims.tenant_id, &req.code).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /auth/mfa/verify` (spec.md §6). Unauthenticated step-up check
/// used mid-login by the MFA strategy (C11) or by any caller that already
/// knows the user id (e.g. a step-up prompt on a sensitive action).
#[utoipa::path(
    post,
    path = "/auth/mfa/verify",
    tag = "mfa",
    operation_id = "security_mfa_verify",
    request_body = VerifyMfaReq,
    responses((status = 200, description = "Verification result", body = VerifyMfaResp)),
)]
pub async fn verify(
    State(state): State<AppState>,
    TenantHeader(tenant_header): TenantHeader,
    Json(req): Json<VerifyMfaReq>,
) -> Result<Json<VerifyMfaResp>, AppError> {
    req.validate().map_err(|e| AppError::ValidationError(e.to_string()))?;

    let tenant_id = state.tenants.resolve_existing(tenant_header).await?;
    let verified = state.mfa.verify(req.user_id, tenant_id, &req.code).await?;
    Ok(Json(VerifyMfaResp { verified }))
}
