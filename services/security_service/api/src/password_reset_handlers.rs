use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use validator::Validate;

use security_service_core::domains::auth::dto::password_reset_dto::{
    ChangePasswordReq, CompletePasswordResetReq, InitiatePasswordResetReq,
};
use shared_error::AppError;

use crate::extractors::{AuthenticatedUser, RequestContext, TenantHeader};
use crate::AppState;

/// `POST /auth/password/forgot` (spec.md §6, §4.10). Always responds 202
/// whether or not the email exists in this tenant, so the response can
/// never be used to enumerate registered accounts.
#[utoipa::path(
    post,
    path = "/auth/password/forgot",
    tag = "auth",
    operation_id = "security_initiate_password_reset",
    request_body = InitiatePasswordResetReq,
    responses((status = 202, description = "Reset email sent if the account exists")),
)]
pub async fn initiate_reset(
    State(state): State<AppState>,
    TenantHeader(tenant_header): TenantHeader,
    RequestContext(ctx): RequestContext,
    Json(req): Json<InitiatePasswordResetReq>,
) -> Result<StatusCode, AppError> {
    req.validate().map_err(|e| AppError::ValidationError(e.to_string()))?;

    let tenant_id = state.tenants.resolve_existing(tenant_header).await?;
    state
        .auth
        .password_manager()
        .initiate_reset(&req.email, tenant_id, &ctx)
        .await?;
    Ok(StatusCode::ACCEPTED)
}

/// `POST /auth/password/reset` (spec.md §6, §4.10). Consumes the mailed
/// token, sets the new password, and terminates every existing session.
#[utoipa::path(
    post,
    path = "/auth/password/reset",
    tag = "auth",
    operation_id = "security_complete_password_reset",
    request_body = CompletePasswordResetReq,
    responses(
        (status = 204, description = "Password reset"),
        (status = 400, description = "Invalid or expired token"),
    ),
)]
pub async fn complete_reset(
    State(state): State<AppState>,
    RequestContext(ctx): RequestContext,
    Json(req): Json<CompletePasswordResetReq>,
) -> Result<StatusCode, AppError> {
    req.validate().map_err(|e| AppError::ValidationError(e.to_string()))?;

    state
        .auth
        .password_manager()
        .reset(&req.token, &req.new_password, &ctx)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /auth/password/change` (spec.md §6, §4.10). Authenticated —
/// requires proof of the current password rather than a mailed token.
#[utoipa::path(
    post,
    path = "/auth/password/change",
    tag = "auth",
    operation_id = "security_change_password",
    request_body = ChangePasswordReq,
    responses(
        (status = 204, description = "Password changed"),
        (status = 401, description = "Current password incorrect"),
    ),
    security(("bearer_auth" = [])),
)]
pub async fn change_password(
    State(state): State<AppState>,
    AuthenticatedUser(claims): AuthenticatedUser,
    RequestContext(ctx): RequestContext,
    Json(req): Json<ChangePasswordReq>,
) -> Result<StatusCode, AppError> {
    req.validate().map_err(|e| AppError::ValidationError(e.to_string()))?;

    state
        .auth
        .password_manager()
        .change(claims.sub, claims.tenant_id, &req.current_password, &req.new_password, &ctx)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
