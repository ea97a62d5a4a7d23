use axum::extract::{Path, State};
use axum::Json;

use security_service_core::domains::auth::dto::email_verification_dto::VerifyEmailResp;
use shared_error::AppError;

use crate::AppState;

/// `GET /auth/verify/email/{token}` (spec.md §6, §4.9). The link mailed at
/// registration; consumes the token and marks the account verified.
#[utoipa::path(
    get,
    path = "/auth/verify/email/{token}",
    tag = "auth",
    operation_id = "security_verify_email",
    params(("token" = String, Path, description = "Plaintext verification token from the mailed link")),
    responses(
        (status = 200, description = "Email verified", body = VerifyEmailResp),
        (status = 400, description = "Invalid or expired token"),
    ),
)]
pub async fn verify_email(
    State(state): State<AppState>,
    Path(token): Path<String>,
) -> Result<Json<VerifyEmailResp>, AppError> {
    let user = state.auth.registration().verify_email(&token).await?;
    Ok(Json(VerifyEmailResp {
        user_id: user.user_id,
        email: user.email,
        verified: true,
    }))
}
